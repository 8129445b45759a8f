//! Hashing primitives shared by the membership filter and the partition
//! assignment function.
//!
//! Both the Bloom-filter-class membership filter and the external/disk
//! partition layer need a single fast, well-distributed 64-bit hash of a
//! packed k-mer. We use the 128-bit x64 variant of MurmurHash3 (via the
//! `murmurhash3` crate) and fold it into the two independent 64-bit values
//! Kirsch & Mitzenmacher's construction needs to derive `k` hash positions
//! from two base hashes, instead of running `k` independent hash functions.

use murmurhash3::murmurhash3_x64_128;

/// The pair of independent 64-bit hashes derived from one MurmurHash3 call,
/// used as the `(h1, h2)` base of Kirsch-Mitzenmacher double hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hash128 {
    pub h1: u64,
    pub h2: u64,
}

/// Hashes a packed k-mer (plus a seed, so independent tables/filters built
/// from the same k-mer don't collide in lockstep).
#[must_use]
pub fn hash_kmer(packed: u64, seed: u32) -> Hash128 {
    let bytes = packed.to_le_bytes();
    let (h1, h2) = murmurhash3_x64_128(&bytes, seed);
    Hash128 { h1, h2 }
}

impl Hash128 {
    /// The `i`-th of `k` derived hash values, per Kirsch & Mitzenmacher
    /// (2006): `h_i = h1 + i * h2`. Wrapping arithmetic is intentional —
    /// only the low bits are used after reduction, so wraparound does not
    /// bias the result.
    #[must_use]
    pub fn derive(&self, i: u64) -> u64 {
        self.h1.wrapping_add(i.wrapping_mul(self.h2))
    }
}

/// Reduces a 64-bit hash to the range `[0, n)` without a modulo, using
/// Lemire's fast-range technique (the high 64 bits of the 128-bit product
/// `hash * n`). Avoids the near-uniform-but-not-quite bias of `hash % n`
/// for `n` that aren't powers of two, and is branch-free.
#[must_use]
pub fn fast_range(hash: u64, n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    ((u128::from(hash) * u128::from(n)) >> 64) as u64
}
