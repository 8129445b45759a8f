//! K-mer representation, extraction, and 2-bit packing.
//!
//! K-mers are represented as packed `u64` integers rather than byte slices:
//! two bits per base (A=00, C=01, G=10, T=11), most-significant-base first.
//! This keeps a k-mer (k <= 32) in a single machine word, which is what
//! lets [`MembershipFilter`](crate::membership::MembershipFilter) and the
//! partition layer hash and compare k-mers without ever materializing their
//! byte form. See the rolling-integer-encoding design note in `DESIGN.md`.
//!
//! K-mers here are never canonicalized against their reverse complement —
//! the value extracted from the read, packed, is the value counted.

use crate::error::KmerLengthError;

/// A validated k-mer length: `1 <= k <= 32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KmerLength(usize);

impl KmerLength {
    /// Validates and constructs a k-mer length.
    pub fn new(k: usize) -> Result<Self, KmerLengthError> {
        if k == 0 {
            Err(KmerLengthError::TooSmall(k))
        } else if k > 32 {
            Err(KmerLengthError::TooLarge(k))
        } else {
            Ok(Self(k))
        }
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// The length as a single byte, for compact on-disk encodings (e.g.
    /// `index.rs`'s result format). Always fits: `k <= 32`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn as_u8(self) -> u8 {
        self.0 as u8
    }

    /// A mask selecting the `2*k` low bits used by a packed k-mer of this length.
    #[must_use]
    pub const fn mask(self) -> u64 {
        if self.0 == 32 {
            u64::MAX
        } else {
            (1u64 << (2 * self.0)) - 1
        }
    }
}

/// Packs a single base byte (A/C/G/T, case-insensitive) into its 2-bit code.
///
/// Returns `None` for any other byte (N, IUPAC ambiguity codes, whitespace).
#[must_use]
pub const fn pack_base(byte: u8) -> Option<u64> {
    match byte {
        b'A' | b'a' => Some(0b00),
        b'C' | b'c' => Some(0b01),
        b'G' | b'g' => Some(0b10),
        b'T' | b't' => Some(0b11),
        _ => None,
    }
}

/// Unpacks a 2-bit code back to its uppercase ASCII base.
#[must_use]
pub const fn unpack_base(code: u64) -> u8 {
    match code & 0b11 {
        0b00 => b'A',
        0b01 => b'C',
        0b10 => b'G',
        _ => b'T',
    }
}

/// Unpacks a packed k-mer back into its ASCII string form.
#[must_use]
pub fn unpack_to_string(packed: u64, k: KmerLength) -> String {
    let k = k.get();
    let mut bytes = vec![0u8; k];
    let mut rem = packed;
    for slot in bytes.iter_mut().rev() {
        *slot = unpack_base(rem);
        rem >>= 2;
    }
    // SAFETY: unpack_base only ever produces ASCII A/C/G/T.
    String::from_utf8(bytes).expect("unpacked k-mer is always valid ASCII")
}

/// Extracts packed k-mers from a raw sequence using a rolling 2-bit window.
///
/// A base outside A/C/G/T (an `N`, an IUPAC ambiguity code, whitespace)
/// breaks the current window: the extractor discards whatever partial
/// window it was building and starts fresh on the next valid base, rather
/// than silently substituting a base. This is the behavior spec'd for
/// "N breaks the window" (see Open Question resolution in `SPEC_FULL.md`).
///
/// No canonicalization against the reverse complement is performed: the
/// k-mer emitted is exactly the one read off the forward strand.
#[derive(Debug, Clone, Copy)]
pub struct KmerExtractor {
    k: KmerLength,
}

impl KmerExtractor {
    #[must_use]
    pub const fn new(k: KmerLength) -> Self {
        Self { k }
    }

    #[must_use]
    pub const fn k(&self) -> KmerLength {
        self.k
    }

    /// Extracts all k-mers from `seq` in left-to-right order, as packed
    /// `u64` values. A sequence shorter than `k` (after accounting for
    /// window breaks) yields no k-mers.
    pub fn extract(&self, seq: &[u8]) -> Vec<u64> {
        let mut out = Vec::with_capacity(seq.len().saturating_sub(self.k.get() - 1).max(0));
        self.for_each_kmer(seq, |packed| out.push(packed));
        out
    }

    /// Streams k-mers to `visit` without allocating an intermediate `Vec`.
    pub fn for_each_kmer(&self, seq: &[u8], mut visit: impl FnMut(u64)) {
        let k = self.k.get();
        let mask = self.k.mask();
        let mut window: u64 = 0;
        let mut have = 0usize;
        for &byte in seq {
            match pack_base(byte) {
                Some(code) => {
                    window = ((window << 2) | code) & mask;
                    have += 1;
                    if have >= k {
                        visit(window);
                    }
                }
                None => {
                    window = 0;
                    have = 0;
                }
            }
        }
    }
}
