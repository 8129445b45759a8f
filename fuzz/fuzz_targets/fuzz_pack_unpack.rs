//! Fuzz target for pack/unpack roundtrip.
//!
//! Tests that packing and unpacking a window of valid DNA bytes is the
//! identity operation, up to uppercasing.

#![no_main]

use kmerust::kmer::{pack_base, unpack_to_string, KmerLength};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() || data.len() > 32 {
        return;
    }
    for &byte in data {
        if !matches!(byte, b'A' | b'C' | b'G' | b'T' | b'a' | b'c' | b'g' | b't') {
            return;
        }
    }

    let k = match KmerLength::new(data.len()) {
        Ok(k) => k,
        Err(_) => return,
    };

    let mut window: u64 = 0;
    for &byte in data {
        let code = pack_base(byte).expect("already filtered to valid bases");
        window = (window << 2) | code;
    }
    window &= k.mask();

    let unpacked = unpack_to_string(window, k);
    let normalized: String = data.iter().map(|b| b.to_ascii_uppercase() as char).collect();
    assert_eq!(unpacked, normalized, "pack/unpack roundtrip failed");
});
