//! Basic k-mer counting example.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example basic_count -- sequences.fa 21 10
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::env;
use std::process;

use kmerust::config::{Algorithm, Config};
use kmerust::format::SequenceFormat;
use kmerust::input::Input;
use kmerust::kmer::unpack_to_string;
use kmerust::run;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <fasta_file> [k] [n]", args[0]);
        process::exit(1);
    }

    let path = std::path::PathBuf::from(&args[1]);
    let k: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(21);
    let n: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10);

    let cfg = Config::new(path.clone(), k, n, 0.001, 25.0, 4.0, Algorithm::Auto, false)
        .unwrap_or_else(|e| {
            eprintln!("Invalid configuration: {e}");
            process::exit(1);
        });

    let input = Input::File(path.clone());
    let input_format = SequenceFormat::Auto.resolve(Some(&path));
    let scratch = std::env::temp_dir().join("kmerust-demo-scratch");

    let outcome = run::execute(&input, input_format, &cfg, &scratch, None, None)
        .unwrap_or_else(|e| {
            eprintln!("Error counting k-mers: {e}");
            process::exit(e.exit_code());
        });

    println!("K-mer counting complete! ({:?} engine)", outcome.algorithm);
    println!("Top {} k-mers:", outcome.counts.len());
    for (kmer, count) in &outcome.counts {
        println!("  {}: {count}", unpack_to_string(*kmer, cfg.k));
    }
}
