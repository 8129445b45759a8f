//! Command-line interface definition.

use std::path::PathBuf;

use clap::Parser;

use crate::config::Algorithm;
use crate::format::{OutputFormat, SequenceFormat};
use crate::input::Input;

/// A memory-bounded k-mer frequency counter for FASTA/FASTQ data.
///
/// Picks between an in-memory, filter-gated engine and a disk-partitioned
/// engine depending on how the input compares to `--target-memory`.
///
/// # Examples
///
/// ```bash
/// kmerust sequences.fa --k 21 --n 10
/// cat reads.fq | kmerust - --k 21 --n 10 --input-format fastq
/// kmerust big.fa --k 31 --n 100 --algorithm dsk --target-memory 2 --target-disk 50
/// ```
#[derive(Parser, Debug)]
#[command(name = "kmerust")]
#[command(version, author, about, long_about = None)]
pub struct Args {
    /// Input file path (use '-' or omit for stdin)
    #[arg(default_value = "-")]
    pub file: PathBuf,

    /// K-mer length (1-32)
    #[arg(short, long)]
    pub k: usize,

    /// Number of top k-mers to report
    #[arg(short, long)]
    pub n: usize,

    /// Bloom filter false-positive rate (BFEngine only)
    #[arg(long = "error-rate", default_value = "0.001")]
    pub error_rate: f64,

    /// Scratch disk budget in GiB (DSKEngine only)
    #[arg(long = "target-disk", default_value = "25")]
    pub target_disk: f64,

    /// Memory budget in GiB
    #[arg(long = "target-memory", default_value = "4")]
    pub target_memory: f64,

    /// Which counting engine to use
    #[arg(long, value_enum, default_value = "auto")]
    pub algorithm: Algorithm,

    /// Emit progress and engine-selection logging to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Output rendering for the final top-N result
    #[arg(long, value_enum, default_value = "fasta")]
    pub format: OutputFormat,

    /// Input file format (auto-detected from extension if not specified)
    #[arg(long = "input-format", value_enum, default_value = "auto")]
    pub input_format: SequenceFormat,

    /// Save the final counts as a binary index at this path
    #[arg(long)]
    pub save: Option<PathBuf>,
}

impl Args {
    /// Returns the input source (file or stdin).
    #[must_use]
    pub fn input(&self) -> Input {
        Input::from_path(&self.file)
    }

    /// Returns the resolved input format.
    ///
    /// If `input_format` is `Auto`, detects from the file extension; stdin
    /// without an explicit format defaults to FASTA.
    #[must_use]
    pub fn resolved_input_format(&self) -> SequenceFormat {
        self.input_format.resolve(self.input().as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::parse_from(std::iter::once(&"kmerust").chain(args).copied())
    }

    #[test]
    fn parses_required_flags() {
        let args = parse(&["genome.fa", "--k", "21", "--n", "10"]);
        assert_eq!(args.file, PathBuf::from("genome.fa"));
        assert_eq!(args.k, 21);
        assert_eq!(args.n, 10);
    }

    #[test]
    fn defaults_match_spec() {
        let args = parse(&["genome.fa", "--k", "21", "--n", "10"]);
        assert!((args.error_rate - 0.001).abs() < f64::EPSILON);
        assert!((args.target_disk - 25.0).abs() < f64::EPSILON);
        assert!((args.target_memory - 4.0).abs() < f64::EPSILON);
        assert_eq!(args.algorithm, Algorithm::Auto);
        assert!(!args.verbose);
    }

    #[test]
    fn missing_path_defaults_to_stdin() {
        let args = parse(&["--k", "21", "--n", "10"]);
        assert!(args.input().is_stdin());
    }

    #[test]
    fn explicit_dash_is_stdin() {
        let args = parse(&["-", "--k", "21", "--n", "10"]);
        assert!(args.input().is_stdin());
    }

    #[test]
    fn resolved_input_format_detects_from_extension() {
        let args = parse(&["reads.fq", "--k", "21", "--n", "10"]);
        assert_eq!(args.resolved_input_format(), SequenceFormat::Fastq);
    }

    #[test]
    fn forced_algorithm_is_parsed() {
        let args = parse(&["genome.fa", "--k", "21", "--n", "10", "--algorithm", "dsk"]);
        assert_eq!(args.algorithm, Algorithm::Dsk);
    }
}
