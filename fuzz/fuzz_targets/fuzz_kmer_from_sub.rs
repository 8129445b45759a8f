//! Fuzz target for `KmerExtractor::extract`.
//!
//! Tests that extraction never panics on arbitrary byte input, and that
//! every emitted k-mer round-trips to exactly k valid ACGT bases.

#![no_main]

use kmerust::kmer::{unpack_to_string, KmerExtractor, KmerLength};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&k_byte, seq)) = data.split_first() else {
        return;
    };
    let k = match KmerLength::new((k_byte % 32) as usize + 1) {
        Ok(k) => k,
        Err(_) => return,
    };

    let extractor = KmerExtractor::new(k);
    let kmers = extractor.extract(seq);

    for packed in kmers {
        let s = unpack_to_string(packed, k);
        assert_eq!(s.len(), k.get());
        assert!(s.bytes().all(|b| matches!(b, b'A' | b'C' | b'G' | b'T')));
    }
});
