//! Counting engines and the policy that picks between them.

pub mod bf;
pub mod dsk;

use crate::config::Algorithm;
use crate::kmer::KmerLength;

/// The result of a completed counting run: the top entries and whatever
/// progress/cancellation bookkeeping the caller attached.
pub type CountResult = Vec<(u64, u64)>;

/// Bytes-per-entry overhead of an open-addressed `Kmer -> u32` exact table,
/// used by both [`dsk`] sizing and [`EngineSelector`]. Matches the DSK-paper
/// sizing criterion in spec.md §4.5 (`v`): packed k-mer bytes plus a fixed
/// per-entry overhead.
#[must_use]
pub fn exact_table_entry_bytes(k: KmerLength) -> u64 {
    const TABLE_OVERHEAD_BYTES: u64 = 16;
    crate::partition::record_width(k.get()) as u64 + TABLE_OVERHEAD_BYTES
}

/// Estimates the number of distinct k-mers a file of `input_bytes` could
/// contain, for sizing purposes only (spec.md §4.6 permits either a
/// file-size/read-length estimate or a measured pre-pass; this is the
/// former). FASTQ stores one quality byte and one sequence byte per base
/// plus two header lines per record, so roughly a quarter of the file is
/// nucleotide sequence; each base starts a new k-mer window.
#[must_use]
pub const fn estimate_distinct_kmers(input_bytes: u64) -> u64 {
    input_bytes / 4
}

/// Bits-per-element cost of a Bloom-filter-class membership filter at a
/// given false-positive rate (`1.44 * log2(1/eps)`, the standard optimal
/// bound), used by [`EngineSelector`] to estimate BFEngine's footprint.
#[must_use]
pub fn filter_bits_per_element(error_rate: f64) -> f64 {
    1.442_695_04 * (1.0 / error_rate).log2()
}

/// Chooses which engine a run should use, from input size, k, and the
/// caller's memory budget. Stateless and side-effect-free (spec.md §4.6).
#[derive(Debug, Clone, Copy)]
pub struct EngineSelector;

impl EngineSelector {
    /// Resolves `forced` (if not `Auto`) or applies the monotone decision
    /// rule: DSKEngine iff the BFEngine footprint estimate would exceed
    /// the memory budget.
    #[must_use]
    pub fn select(
        forced: Algorithm,
        input_bytes: u64,
        k: KmerLength,
        error_rate: f64,
        target_memory_bytes: u64,
    ) -> Algorithm {
        match forced {
            Algorithm::Bf | Algorithm::Dsk => forced,
            Algorithm::Auto => {
                let distinct = estimate_distinct_kmers(input_bytes);
                let filter_bytes_per_element = filter_bits_per_element(error_rate) / 8.0;
                let table_bytes_per_element = exact_table_entry_bytes(k) as f64;
                // Conservative: assume every distinct k-mer both occupies
                // filter space and, in the worst case, is promoted to the
                // exact table (a false positive or a true repeat).
                #[allow(clippy::cast_precision_loss)]
                let estimated_bytes =
                    distinct as f64 * (filter_bytes_per_element + table_bytes_per_element);
                #[allow(clippy::cast_precision_loss)]
                if estimated_bytes > target_memory_bytes as f64 {
                    Algorithm::Dsk
                } else {
                    Algorithm::Bf
                }
            }
        }
    }
}
