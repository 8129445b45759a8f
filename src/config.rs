//! Resolved, validated run configuration.
//!
//! [`Config`] is what [`cli::Args`](crate::cli::Args) turns into once every
//! flag has been checked; nothing downstream re-validates k-mer length,
//! disk/memory budgets, or the error rate.

use std::path::PathBuf;

use crate::error::KmerustError;
use crate::kmer::KmerLength;

/// Which counting engine to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Algorithm {
    /// The Bloom-filter-gated two-pass in-memory engine.
    Bf,
    /// The disk-partitioned external engine.
    Dsk,
    /// Let [`EngineSelector`](crate::engine::EngineSelector) decide.
    #[default]
    Auto,
}

/// A fully validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: PathBuf,
    pub k: KmerLength,
    pub top_n: usize,
    pub error_rate: f64,
    pub target_disk_bytes: u64,
    pub target_memory_bytes: u64,
    pub algorithm: Algorithm,
    pub verbose: bool,
}

const GIB: u64 = 1 << 30;

impl Config {
    /// Validates and constructs a configuration.
    ///
    /// # Errors
    ///
    /// Returns `KmerustError::Usage` if `k` is out of range, `top_n` is
    /// zero, `error_rate` is not in `(0, 1)`, or either budget is zero.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: PathBuf,
        k: usize,
        top_n: usize,
        error_rate: f64,
        target_disk_gib: f64,
        target_memory_gib: f64,
        algorithm: Algorithm,
        verbose: bool,
    ) -> Result<Self, KmerustError> {
        let k = KmerLength::new(k)?;

        if top_n == 0 {
            return Err(KmerustError::Usage("n must be at least 1".into()));
        }
        if !(error_rate > 0.0 && error_rate < 1.0) {
            return Err(KmerustError::Usage(
                "error-rate must be strictly between 0 and 1".into(),
            ));
        }
        if target_disk_gib <= 0.0 {
            return Err(KmerustError::Usage("target-disk must be positive".into()));
        }
        if target_memory_gib <= 0.0 {
            return Err(KmerustError::Usage(
                "target-memory must be positive".into(),
            ));
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let target_disk_bytes = (target_disk_gib * GIB as f64) as u64;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let target_memory_bytes = (target_memory_gib * GIB as f64) as u64;

        Ok(Self {
            path,
            k,
            top_n,
            error_rate,
            target_disk_bytes,
            target_memory_bytes,
            algorithm,
            verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(path: &str) -> Result<Config, KmerustError> {
        Config::new(path.into(), 21, 10, 0.001, 25.0, 4.0, Algorithm::Auto, false)
    }

    #[test]
    fn accepts_reasonable_defaults() {
        assert!(valid("genome.fa").is_ok());
    }

    #[test]
    fn rejects_k_zero() {
        let err = Config::new("x".into(), 0, 10, 0.001, 25.0, 4.0, Algorithm::Auto, false)
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn rejects_top_n_zero() {
        let err = Config::new("x".into(), 21, 0, 0.001, 25.0, 4.0, Algorithm::Auto, false)
            .unwrap_err();
        assert!(matches!(err, KmerustError::Usage(_)));
    }

    #[test]
    fn rejects_out_of_range_error_rate() {
        assert!(Config::new("x".into(), 21, 10, 0.0, 25.0, 4.0, Algorithm::Auto, false).is_err());
        assert!(Config::new("x".into(), 21, 10, 1.0, 25.0, 4.0, Algorithm::Auto, false).is_err());
    }

    #[test]
    fn rejects_nonpositive_budgets() {
        assert!(Config::new("x".into(), 21, 10, 0.001, 0.0, 4.0, Algorithm::Auto, false).is_err());
        assert!(Config::new("x".into(), 21, 10, 0.001, 25.0, 0.0, Algorithm::Auto, false).is_err());
    }

    #[test]
    fn converts_gib_to_bytes() {
        let cfg = valid("x").unwrap();
        assert_eq!(cfg.target_disk_bytes, 25 * GIB);
        assert_eq!(cfg.target_memory_bytes, 4 * GIB);
    }
}
