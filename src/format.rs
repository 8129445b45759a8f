//! Input and output format selection.
//!
//! [`SequenceFormat`] specifies and auto-detects the input file format
//! (FASTA or FASTQ). [`OutputFormat`] selects how the final top-N result is
//! rendered.

use clap::ValueEnum;
use std::ffi::OsStr;
use std::path::Path;

/// Input sequence file format.
///
/// Used to specify the format of input files. When set to `Auto`, the format
/// is detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SequenceFormat {
    /// Auto-detect format from file extension.
    ///
    /// Detection rules:
    /// - `.fq`, `.fastq`, `.fq.gz`, `.fastq.gz` -> FASTQ
    /// - `.fa`, `.fasta`, `.fna`, `.fa.gz`, `.fasta.gz`, `.fna.gz` -> FASTA
    /// - Unknown or stdin -> FASTA (default)
    #[default]
    Auto,
    /// FASTA format (`.fa`, `.fasta`, `.fna`).
    Fasta,
    /// FASTQ format (`.fq`, `.fastq`).
    Fastq,
}

impl SequenceFormat {
    /// Detects the sequence format from a file path's extension.
    ///
    /// Handles gzip-compressed files by stripping the `.gz` extension first.
    ///
    /// # Examples
    ///
    /// ```
    /// use kmerust::format::SequenceFormat;
    /// use std::path::Path;
    ///
    /// assert_eq!(SequenceFormat::from_extension(Path::new("reads.fq")), SequenceFormat::Fastq);
    /// assert_eq!(SequenceFormat::from_extension(Path::new("reads.fastq.gz")), SequenceFormat::Fastq);
    /// assert_eq!(SequenceFormat::from_extension(Path::new("genome.fa")), SequenceFormat::Fasta);
    /// assert_eq!(SequenceFormat::from_extension(Path::new("genome.fasta.gz")), SequenceFormat::Fasta);
    /// ```
    #[must_use]
    pub fn from_extension(path: &Path) -> Self {
        // Get the extension, stripping .gz if present
        let ext = path
            .extension()
            .and_then(OsStr::to_str)
            .map(|e| e.to_lowercase());

        let effective_ext = match ext.as_deref() {
            Some("gz") => {
                // Strip .gz and get the real extension
                path.file_stem()
                    .and_then(|stem| Path::new(stem).extension())
                    .and_then(OsStr::to_str)
                    .map(|e| e.to_lowercase())
            }
            other => other.map(String::from),
        };

        match effective_ext.as_deref() {
            Some("fq" | "fastq") => Self::Fastq,
            Some("fa" | "fasta" | "fna") => Self::Fasta,
            _ => Self::Fasta, // Default to FASTA for unknown extensions
        }
    }

    /// Resolves `Auto` format to a concrete format based on the file path.
    ///
    /// - If format is already `Fasta` or `Fastq`, returns it unchanged.
    /// - If format is `Auto` and a path is provided, detects from extension.
    /// - If format is `Auto` and no path is provided (stdin), defaults to `Fasta`.
    ///
    /// # Examples
    ///
    /// ```
    /// use kmerust::format::SequenceFormat;
    /// use std::path::Path;
    ///
    /// // Auto-detection from path
    /// let format = SequenceFormat::Auto.resolve(Some(Path::new("reads.fq")));
    /// assert_eq!(format, SequenceFormat::Fastq);
    ///
    /// // Explicit format is unchanged
    /// let format = SequenceFormat::Fasta.resolve(Some(Path::new("reads.fq")));
    /// assert_eq!(format, SequenceFormat::Fasta);
    ///
    /// // Stdin defaults to FASTA
    /// let format = SequenceFormat::Auto.resolve(None);
    /// assert_eq!(format, SequenceFormat::Fasta);
    /// ```
    #[must_use]
    pub fn resolve(self, path: Option<&Path>) -> Self {
        match self {
            Self::Auto => path.map_or(Self::Fasta, Self::from_extension),
            other => other,
        }
    }

    /// Returns `true` if this format is FASTQ.
    #[must_use]
    pub fn is_fastq(self) -> bool {
        matches!(self, Self::Fastq)
    }

    /// Returns `true` if this format is FASTA.
    #[must_use]
    pub fn is_fasta(self) -> bool {
        matches!(self, Self::Fasta)
    }
}

impl std::fmt::Display for SequenceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Fasta => write!(f, "fasta"),
            Self::Fastq => write!(f, "fastq"),
        }
    }
}

/// Output rendering for the final top-N result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// `>kmer\ncount` pairs, one per line.
    #[default]
    Fasta,
    /// `kmer\tcount`, tab-separated, one per line.
    Tsv,
    /// A JSON array of `{"kmer": ..., "count": ...}` objects.
    Json,
    /// Count-of-counts histogram instead of individual k-mers.
    Histogram,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fasta => write!(f, "fasta"),
            Self::Tsv => write!(f, "tsv"),
            Self::Json => write!(f, "json"),
            Self::Histogram => write!(f, "histogram"),
        }
    }
}
