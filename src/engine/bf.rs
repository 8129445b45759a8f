//! BFEngine: the singleton-suppression, in-memory counting engine.
//!
//! A two-pass algorithm built on [`MembershipFilter`] and an exact hash
//! table. Pass 1 uses the filter to decide, without ever allocating a table
//! slot for a k-mer seen only once, which k-mers are worth tracking
//! exactly. Pass 2 re-streams the input and tallies only those k-mers.

use std::collections::HashMap;
use std::hash::BuildHasherDefault;
use std::path::Path;

use rustc_hash::FxHasher;

use crate::error::KmerustError;
use crate::format::SequenceFormat;
use crate::input::Input;
use crate::kmer::KmerExtractor;
use crate::kmer::KmerLength;
use crate::membership::MembershipFilter;
use crate::progress::{CancellationToken, ProgressTracker};
use crate::reader;
use crate::topn::TopNExtractor;

type FxMap<V> = HashMap<u64, V, BuildHasherDefault<FxHasher>>;

/// A table entry's size once promoted from the filter: 16 bytes, matching
/// the open-addressed `Kmer -> u32` overhead assumed in spec.md §4.5/§4.6.
const TABLE_ENTRY_BUDGET_BYTES: u64 = 16;

/// Tunable parameters for one [`run`].
#[derive(Debug, Clone, Copy)]
pub struct BfParams {
    pub k: KmerLength,
    pub expected_distinct: u64,
    pub error_rate: f64,
    pub top_n: usize,
    pub target_memory_bytes: u64,
}

/// Runs the two-pass algorithm against `input`, returning the top-N
/// `(packed_kmer, count)` pairs after dropping singletons.
pub fn run(
    input: &Input,
    format: SequenceFormat,
    params: BfParams,
    scratch_dir: &Path,
    progress: Option<&ProgressTracker>,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<(u64, u64)>, KmerustError> {
    let extractor = KmerExtractor::new(params.k);
    let mut filter =
        MembershipFilter::create(scratch_dir, params.expected_distinct, params.error_rate)?;
    let mut table: FxMap<u32> = FxMap::default();

    // Pass 1: filter build + promotion of repeated k-mers into the exact
    // table. Each call to `for_each_sequence` re-opens `input` as a fresh
    // `ReadSource`, so neither pass holds more than one record in memory —
    // unlike pass 1 mutating the filter, pass 2 below only reads it.
    let mut exhausted = None;
    reader::for_each_sequence(input, format, |seq| {
        if let Some(cancel) = cancel {
            if cancel.is_cancelled() {
                return Err(KmerustError::Cancelled);
            }
        }
        extractor.for_each_kmer(seq, |kmer| {
            if filter.probably_contains(kmer) {
                *table.entry(kmer).or_insert(0) += 1;
            } else {
                // insert() only fails once frozen, which cannot happen
                // mid-pass-1; a failure here indicates a logic error.
                let _ = filter.insert(kmer);
            }
        });
        if let Some(progress) = progress {
            progress.record_sequence(seq.len() as u64);
        }
        if (table.len() as u64) * TABLE_ENTRY_BUDGET_BYTES > params.target_memory_bytes {
            exhausted = Some(KmerustError::ResourceExhausted {
                component: "BFEngine exact table".into(),
            });
            return Err(KmerustError::Cancelled);
        }
        Ok(())
    })?;
    if let Some(err) = exhausted {
        return Err(err);
    }
    filter.freeze();

    // Pass 1 only counted occurrences after a k-mer was promoted, so its
    // tally undercounts every promoted key by at least one. Pass 2
    // re-streams from scratch against the now-fixed key set instead of
    // patching pass 1's partial counts.
    for count in table.values_mut() {
        *count = 0;
    }
    reader::for_each_sequence(input, format, |seq| {
        if let Some(cancel) = cancel {
            if cancel.is_cancelled() {
                return Err(KmerustError::Cancelled);
            }
        }
        extractor.for_each_kmer(seq, |kmer| {
            if let Some(count) = table.get_mut(&kmer) {
                *count += 1;
            }
        });
        Ok(())
    })?;

    let mut top = TopNExtractor::new(params.top_n);
    top.offer_all(
        table
            .into_iter()
            .filter(|&(_, count)| count > 1)
            .map(|(kmer, count)| (kmer, u64::from(count))),
    );
    Ok(top.into_sorted_vec())
}
