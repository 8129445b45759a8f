//! K-mer counting with progress reporting.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example progress_bar -- large_genome.fa 21
//! ```

use std::env;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use kmerust::config::{Algorithm, Config};
use kmerust::format::SequenceFormat;
use kmerust::input::Input;
use kmerust::kmer::unpack_to_string;
use kmerust::progress::ProgressTracker;
use kmerust::run;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <fasta_file> [k]", args[0]);
        process::exit(1);
    }

    let path = std::path::PathBuf::from(&args[1]);
    let k: usize = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(21);

    let cfg = Config::new(path.clone(), k, 10, 0.001, 25.0, 4.0, Algorithm::Auto, true)
        .unwrap_or_else(|e| {
            eprintln!("Error: {e}");
            process::exit(e.exit_code());
        });

    let input = Input::File(path.clone());
    let input_format = SequenceFormat::Auto.resolve(Some(&path));
    let scratch = std::env::temp_dir().join("kmerust-demo-scratch");
    let tracker = Arc::new(ProgressTracker::new());

    let reporter_tracker = Arc::clone(&tracker);
    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let reporter_done = Arc::clone(&done);
    let reporter = thread::spawn(move || {
        while !reporter_done.load(std::sync::atomic::Ordering::Relaxed) {
            let snapshot = reporter_tracker.snapshot();
            eprint!(
                "\r  sequences: {:>8}  bases: {:>10}",
                snapshot.sequences_processed, snapshot.bases_processed
            );
            let _ = io::stderr().flush();
            thread::sleep(Duration::from_millis(200));
        }
    });

    let start = Instant::now();
    let outcome = run::execute(
        &input,
        input_format,
        &cfg,
        &scratch,
        Some(&tracker),
        None,
    );
    done.store(true, std::sync::atomic::Ordering::Relaxed);
    let _ = reporter.join();

    let outcome = outcome.unwrap_or_else(|e| {
        eprintln!("\nError: {e}");
        process::exit(e.exit_code());
    });

    eprintln!("\n\n=== Results ===");
    eprintln!("Engine:          {:?}", outcome.algorithm);
    eprintln!("Top k-mers kept: {}", outcome.counts.len());
    eprintln!("Elapsed:         {:.2?}", start.elapsed());

    for (kmer, count) in outcome.counts.iter().take(10) {
        println!("  {}: {count}", unpack_to_string(*kmer, cfg.k));
    }
}
