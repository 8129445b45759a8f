//! Read source: turns a FASTA or FASTQ input into a stream of raw
//! nucleotide sequences.
//!
//! This is the "ReadSource" collaborator from the component design — FASTQ
//! tokenization itself is treated as an external concern (spec.md §1), so
//! this module's job stops at handing back each record's sequence bytes; it
//! does not interpret quality scores or headers. Parsing itself is `bio`'s
//! job, same as the teacher's `lib.rs`/`reader.rs`: `fasta::Reader` and
//! `fastq::Reader` both parse incrementally off a `BufRead`, so a record is
//! never buffered further than one `Record` at a time regardless of file
//! size — the property the spec's "input files routinely exceed available
//! memory" framing requires of a `ReadSource`.
//!
//! A `ReadSource` is lazy, finite, and non-restartable (spec.md §2): calling
//! [`for_each_sequence`] again re-opens the underlying file from scratch,
//! which is a fresh `ReadSource`, not a rewind of a live one. Stdin cannot
//! be reopened this way — callers that need a second pass over stdin input
//! must materialize it to a file first (see [`crate::input::Input::materialize`]).

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use bio::io::{fasta, fastq};

use crate::error::KmerustError;
use crate::format::SequenceFormat;
use crate::input::Input;

fn io_err(input: &Input, e: io::Error) -> KmerustError {
    match input {
        Input::File(path) => KmerustError::io(path, e),
        Input::Stdin => KmerustError::io("<stdin>", e),
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

fn open_reader(input: &Input) -> Result<Box<dyn BufRead>, KmerustError> {
    match input {
        Input::Stdin => Ok(Box::new(BufReader::new(io::stdin()))),
        Input::File(path) => {
            let file = File::open(path).map_err(|e| KmerustError::io(path, e))?;
            #[cfg(feature = "gzip")]
            if is_gzip(path) {
                let decoder = flate2::read::GzDecoder::new(file);
                return Ok(Box::new(BufReader::new(decoder)));
            }
            #[cfg(not(feature = "gzip"))]
            if is_gzip(path) {
                return Err(KmerustError::Usage(format!(
                    "{}: gzip input requires the `gzip` feature",
                    path.display()
                )));
            }
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

/// Streams every record's sequence bytes out of `input` to `visit`, in file
/// order, without ever holding more than one record in memory.
///
/// `format` must already be resolved (not [`SequenceFormat::Auto`]) — the
/// caller (`cli`/`run`) resolves auto-detection once, against the path,
/// before a `ReadSource` is ever opened.
pub fn for_each_sequence(
    input: &Input,
    format: SequenceFormat,
    mut visit: impl FnMut(&[u8]) -> Result<(), KmerustError>,
) -> Result<(), KmerustError> {
    let reader = open_reader(input)?;
    match format {
        SequenceFormat::Fastq => {
            let records = fastq::Reader::new(reader).records();
            for record in records {
                let record = record.map_err(|e| io_err(input, io::Error::other(e)))?;
                visit(record.seq())?;
            }
        }
        SequenceFormat::Fasta | SequenceFormat::Auto => {
            let records = fasta::Reader::new(reader).records();
            for record in records {
                let record = record.map_err(|e| io_err(input, io::Error::other(e)))?;
                visit(record.seq())?;
            }
        }
    }
    Ok(())
}
