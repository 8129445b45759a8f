//! Probabilistic membership filter used by [`BFEngine`](crate::engine::bf::BFEngine)
//! to decide, in a single streaming pass and bounded memory, which k-mers
//! are worth tracking exactly.
//!
//! The filter's bit array lives in a memory-mapped scratch file rather than
//! a plain `Vec<u64>` (see the mmap rationale in `SPEC_FULL.md` / the
//! source design notes): sizing is driven by the expected k-mer count and a
//! target false-positive rate, which for large inputs can exceed what's
//! comfortable to keep as committed heap. The OS pages a memory-mapped file
//! in and out as needed instead.
//!
//! The filter is strictly two-phase: [`insert`](MembershipFilter::insert)
//! during the write-only pass, [`freeze`](MembershipFilter::freeze) between
//! passes, then [`probably_contains`](MembershipFilter::probably_contains)
//! during the read-only pass. Calling the wrong method for the current
//! phase is a programming error surfaced as `KmerustError::Usage`, not a
//! silent no-op — see spec.md §4.2's freeze-between-phases requirement.

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;

use crate::error::KmerustError;
use crate::hash::hash_kmer;

/// First of the two independent hash seeds used to derive `h1`/`h2`.
const SEED_A: u32 = 0x9E37_79B9;
/// Second of the two independent hash seeds. Distinct from `SEED_A` so the
/// two base hashes are not trivially related.
const SEED_B: u32 = 0x517C_C1B7;

/// A memory-mapped Bloom filter over packed k-mers.
///
/// Never produces false negatives: once a k-mer has been
/// [`insert`](MembershipFilter::insert)ed, `probably_contains` for that
/// k-mer always returns `true`. It may produce false positives at
/// approximately the configured rate.
pub struct MembershipFilter {
    mmap: MmapMut,
    /// Number of bits in the filter.
    m: u64,
    /// Number of hash functions (derived positions probed per operation).
    k: u32,
    frozen: bool,
    /// Backing scratch file, kept alive for the filter's lifetime and
    /// removed on drop (tempfile semantics).
    _file: tempfile::NamedTempFile,
}

impl MembershipFilter {
    /// Computes the optimal bit-array size `m` and hash-function count `k`
    /// for `expected_items` entries at false-positive rate `fp_rate`.
    ///
    /// Standard Bloom filter sizing: `m = ceil(-n * ln(eps) / ln(2)^2)`,
    /// `k = round((m / n) * ln(2))`, `k >= 1`.
    #[must_use]
    pub fn optimal_params(expected_items: u64, fp_rate: f64) -> (u64, u32) {
        let n = expected_items.max(1) as f64;
        let ln2_sq = std::f64::consts::LN_2 * std::f64::consts::LN_2;
        let m = (-n * fp_rate.ln() / ln2_sq).ceil().max(8.0) as u64;
        let k = (((m as f64) / n) * std::f64::consts::LN_2).round().max(1.0) as u32;
        (m, k)
    }

    /// Creates a new, empty filter backed by a memory-mapped temp file
    /// inside `scratch_dir`, sized for `expected_items` at `fp_rate`.
    pub fn create(
        scratch_dir: &Path,
        expected_items: u64,
        fp_rate: f64,
    ) -> Result<Self, KmerustError> {
        let (m, k) = Self::optimal_params(expected_items, fp_rate);
        let byte_len = usize::try_from((m + 7) / 8).unwrap_or(usize::MAX).max(1);

        let file = tempfile::Builder::new()
            .prefix("kmerust-bloom-")
            .tempfile_in(scratch_dir)
            .map_err(|e| KmerustError::io(scratch_dir, e))?;
        file.as_file()
            .set_len(byte_len as u64)
            .map_err(|e| KmerustError::io(scratch_dir, e))?;

        // SAFETY: `file` is a private, exclusively-owned temp file for the
        // lifetime of this `MembershipFilter`; nothing else maps or
        // truncates it concurrently.
        let mmap = unsafe { MmapMut::map_mut(file.as_file()) }
            .map_err(|e| KmerustError::io(scratch_dir, e))?;

        Ok(Self {
            mmap,
            m,
            k,
            frozen: false,
            _file: file,
        })
    }

    #[must_use]
    pub const fn bit_count(&self) -> u64 {
        self.m
    }

    #[must_use]
    pub const fn hash_count(&self) -> u32 {
        self.k
    }

    fn positions(&self, packed: u64) -> impl Iterator<Item = u64> + '_ {
        let h1 = hash_kmer(packed, SEED_A).h1;
        let h2 = hash_kmer(packed, SEED_B).h1;
        let base = crate::hash::Hash128 { h1, h2 };
        let m = self.m;
        (0..u64::from(self.k)).map(move |i| crate::hash::fast_range(base.derive(i), m))
    }

    fn set_bit(&mut self, pos: u64) {
        let byte = (pos / 8) as usize;
        let bit = (pos % 8) as u8;
        self.mmap[byte] |= 1 << bit;
    }

    fn get_bit(&self, pos: u64) -> bool {
        let byte = (pos / 8) as usize;
        let bit = (pos % 8) as u8;
        (self.mmap[byte] & (1 << bit)) != 0
    }

    /// Records `packed` as present. Valid only before [`freeze`](Self::freeze).
    pub fn insert(&mut self, packed: u64) -> Result<(), KmerustError> {
        if self.frozen {
            return Err(KmerustError::Usage(
                "MembershipFilter::insert called after freeze".into(),
            ));
        }
        for pos in self.positions(packed).collect::<Vec<_>>() {
            self.set_bit(pos);
        }
        Ok(())
    }

    /// Transitions from the write-only pass to the read-only pass. Once
    /// frozen, [`insert`](Self::insert) is no longer permitted. Queries are
    /// valid both before and after freezing — pass 1 of BFEngine tests
    /// membership to decide whether to insert, so reads during the write
    /// phase are part of the contract, not a violation of it.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Tests whether `packed` may have been inserted. Never false-negative;
    /// may be false-positive.
    #[must_use]
    pub fn probably_contains(&self, packed: u64) -> bool {
        self.positions(packed).all(|pos| self.get_bit(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optimal_params_reasonable() {
        let (m, k) = MembershipFilter::optimal_params(1_000_000, 0.001);
        assert!(m > 1_000_000);
        assert!(k >= 1 && k <= 20);
    }

    #[test]
    fn no_false_negatives() {
        let dir = tempfile::tempdir().unwrap();
        let mut filter = MembershipFilter::create(dir.path(), 1000, 0.01).unwrap();
        let items: Vec<u64> = (0..500).map(|i| i * 7919).collect();
        for &item in &items {
            filter.insert(item).unwrap();
        }
        filter.freeze();
        for &item in &items {
            assert!(filter.probably_contains(item));
        }
    }

    #[test]
    fn insert_after_freeze_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut filter = MembershipFilter::create(dir.path(), 100, 0.01).unwrap();
        filter.freeze();
        assert!(filter.insert(1).is_err());
    }

    #[test]
    fn query_before_freeze_is_allowed() {
        // Pass 1 of BFEngine tests membership before deciding whether to
        // insert, so queries must work pre-freeze too.
        let dir = tempfile::tempdir().unwrap();
        let mut filter = MembershipFilter::create(dir.path(), 100, 0.01).unwrap();
        assert!(!filter.probably_contains(1));
        filter.insert(1).unwrap();
        assert!(filter.probably_contains(1));
    }

    #[test]
    fn absent_item_usually_not_present() {
        let dir = tempfile::tempdir().unwrap();
        let mut filter = MembershipFilter::create(dir.path(), 1000, 0.001).unwrap();
        for i in 0..500u64 {
            filter.insert(i).unwrap();
        }
        filter.freeze();
        // Comfortably outside the inserted range; at eps=0.001 a collision
        // here would be surprising though not impossible.
        assert!(!filter.probably_contains(10_000_000));
    }
}
