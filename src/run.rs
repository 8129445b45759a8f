//! Orchestration: input resolution, engine selection, counting, output.
//!
//! [`execute`] is the library's single entry point: it materializes the
//! input (spooling stdin to a scratch file if needed), asks
//! [`EngineSelector`](crate::engine::EngineSelector) which engine to run,
//! runs it, and returns the top-N `(packed_kmer, count)` pairs. [`render`]
//! and [`emit`] turn that result into the requested output format.

use std::io::Write as IoWrite;
use std::path::Path;

use crate::config::{Algorithm, Config};
use crate::engine::{self, bf, dsk, EngineSelector};
use crate::error::KmerustError;
use crate::format::{OutputFormat, SequenceFormat};
use crate::histogram::compute_histogram_packed;
use crate::index::{self, KmerIndex};
use crate::input::Input;
use crate::kmer::{unpack_to_string, KmerLength};
use crate::progress::{CancellationToken, ProgressTracker};

#[cfg(feature = "tracing")]
use tracing::info;

/// The outcome of one counting run: the top-N entries and which engine
/// actually produced them (useful to callers running with `Algorithm::Auto`).
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub counts: Vec<(u64, u64)>,
    pub algorithm: Algorithm,
}

/// Materializes `input`, selects an engine, and runs it to completion.
///
/// # Errors
///
/// Returns whatever the selected engine or input materialization returns
/// (`KmerustError::Io`, `ResourceExhausted`, `PartitionOverflow`,
/// `Cancelled`).
pub fn execute(
    input: &Input,
    input_format: SequenceFormat,
    cfg: &Config,
    scratch_dir: &Path,
    progress: Option<&ProgressTracker>,
    cancel: Option<&CancellationToken>,
) -> Result<RunOutcome, KmerustError> {
    let (materialized, input_bytes) = input.materialize(scratch_dir)?;

    let algorithm = EngineSelector::select(
        cfg.algorithm,
        input_bytes,
        cfg.k,
        cfg.error_rate,
        cfg.target_memory_bytes,
    );

    #[cfg(feature = "tracing")]
    if cfg.verbose {
        info!(?algorithm, input_bytes, k = cfg.k.get(), "engine selected");
    }
    #[cfg(not(feature = "tracing"))]
    if cfg.verbose {
        use colored::Colorize;
        eprintln!(
            "{}",
            format!("selected {algorithm:?} engine ({input_bytes} input bytes)").cyan()
        );
    }

    // Both engines size themselves off the same file-size-derived estimate
    // of distinct/total k-mer volume; BFEngine wants distinct k-mers for
    // its filter, DSKEngine wants total occurrences for its I/P sizing.
    // Reusing one estimator for both is an approximation spec.md §4.6
    // explicitly permits.
    let estimate = engine::estimate_distinct_kmers(input_bytes).max(1);

    let counts = match algorithm {
        Algorithm::Bf => bf::run(
            &materialized,
            input_format,
            bf::BfParams {
                k: cfg.k,
                expected_distinct: estimate,
                error_rate: cfg.error_rate,
                top_n: cfg.top_n,
                target_memory_bytes: cfg.target_memory_bytes,
            },
            scratch_dir,
            progress,
            cancel,
        )?,
        Algorithm::Dsk | Algorithm::Auto => dsk::run(
            &materialized,
            input_format,
            dsk::DskParams {
                k: cfg.k,
                top_n: cfg.top_n,
                total_kmer_volume: estimate,
                target_memory_bytes: cfg.target_memory_bytes,
                target_disk_bytes: cfg.target_disk_bytes,
            },
            scratch_dir,
            progress,
            cancel,
        )?,
    };

    Ok(RunOutcome { counts, algorithm })
}

/// Renders a run's top-N counts in the requested output format.
#[must_use]
pub fn render(outcome: &RunOutcome, k: KmerLength, format: OutputFormat) -> String {
    match format {
        OutputFormat::Fasta => {
            let mut out = String::new();
            for (kmer, count) in &outcome.counts {
                out.push_str(&format!(">{count}\n{}\n", unpack_to_string(*kmer, k)));
            }
            out
        }
        OutputFormat::Tsv => {
            let mut out = String::new();
            for (kmer, count) in &outcome.counts {
                out.push_str(&format!("{}\t{count}\n", unpack_to_string(*kmer, k)));
            }
            out
        }
        OutputFormat::Json => {
            let entries: Vec<_> = outcome
                .counts
                .iter()
                .map(|(kmer, count)| {
                    serde_json::json!({
                        "kmer": unpack_to_string(*kmer, k),
                        "count": count,
                    })
                })
                .collect();
            serde_json::json!(entries).to_string()
        }
        OutputFormat::Histogram => {
            let as_map: std::collections::HashMap<u64, u64> = outcome.counts.iter().copied().collect();
            let histogram = compute_histogram_packed(&as_map);
            let mut out = String::new();
            for (count, frequency) in histogram {
                out.push_str(&format!("{count}\t{frequency}\n"));
            }
            out
        }
    }
}

/// Writes a rendered run to `writer`, and optionally saves the raw counts
/// as a binary index at `save_path`.
///
/// # Errors
///
/// Returns `KmerustError::Io` if writing the rendered output or the saved
/// index fails.
pub fn emit(
    outcome: &RunOutcome,
    k: KmerLength,
    format: OutputFormat,
    writer: &mut impl IoWrite,
    save_path: Option<&Path>,
) -> Result<(), KmerustError> {
    let rendered = render(outcome, k, format);
    writer
        .write_all(rendered.as_bytes())
        .map_err(|e| KmerustError::io("<stdout>", e))?;

    if let Some(path) = save_path {
        let counts: std::collections::HashMap<u64, u64> = outcome.counts.iter().copied().collect();
        let index = KmerIndex::new(k, counts);
        index::save_index(&index, path)?;
    }

    Ok(())
}

/// Convenience wrapper: runs [`execute`] and writes the rendered result to
/// stdout, saving an index if `cfg.save`-equivalent behavior is requested
/// via `save_path`.
///
/// # Errors
///
/// Propagates any error from [`execute`] or [`emit`].
pub fn run_to_stdout(
    input: &Input,
    input_format: SequenceFormat,
    cfg: &Config,
    scratch_dir: &Path,
    save_path: Option<&Path>,
    output_format: OutputFormat,
    progress: Option<&ProgressTracker>,
    cancel: Option<&CancellationToken>,
) -> Result<(), KmerustError> {
    let outcome = execute(input, input_format, cfg, scratch_dir, progress, cancel)?;
    let stdout = std::io::stdout();
    let mut lock = stdout.lock();
    emit(&outcome, cfg.k, output_format, &mut lock, save_path)
}
