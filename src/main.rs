#![allow(clippy::too_many_lines)]

use std::process;

use clap::Parser;
use colored::Colorize;

use kmerust::cli::Args;
use kmerust::config::Config;
use kmerust::error::KmerustError;
use kmerust::input::Input;
use kmerust::progress::CancellationToken;
use kmerust::run;

/// Set `RUST_LOG=kmerust=debug` to see structured logging.
#[cfg(feature = "tracing")]
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

fn main() {
    #[cfg(feature = "tracing")]
    init_tracing();

    let args = Args::parse();

    if let Err(e) = run_args(args) {
        eprintln!("{}: {e}", "error".red().bold());
        process::exit(e.exit_code());
    }
}

fn run_args(args: Args) -> Result<(), KmerustError> {
    let input = args.input();

    if let Input::File(ref path) = input {
        if !path.exists() {
            return Err(KmerustError::io(
                path.clone(),
                std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            ));
        }
    }

    let input_format = args.resolved_input_format();

    let cfg = Config::new(
        args.file.clone(),
        args.k,
        args.n,
        args.error_rate,
        args.target_disk,
        args.target_memory,
        args.algorithm,
        args.verbose,
    )?;

    if args.verbose {
        eprintln!(
            "{}: {}   {}: {}   {}: {}",
            "k".bold(),
            cfg.k.get().to_string().cyan(),
            "n".bold(),
            cfg.top_n.to_string().cyan(),
            "input".bold(),
            input.to_string().cyan(),
        );
    }

    let cancel = CancellationToken::new();
    let scratch_dir = std::env::temp_dir().join("kmerust-scratch");

    run::run_to_stdout(
        &input,
        input_format,
        &cfg,
        &scratch_dir,
        args.save.as_deref(),
        args.format,
        None,
        Some(&cancel),
    )
}
