//! Error taxonomy for k-mer counting.
//!
//! Every failure mode a caller can observe is one of five kinds: a bad
//! invocation, an I/O failure against a named path, a component running out
//! of its memory/disk budget, a partition growing past its framed-record
//! limit, or cooperative cancellation. There is no "unknown" variant —
//! engines are expected to attribute every failure to one of these.

use std::path::PathBuf;

/// The crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum KmerustError {
    /// Bad CLI invocation: invalid flag combination, out-of-range `k`, etc.
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O failure against a specific path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A component exceeded the memory budget it was given.
    #[error("resource exhausted in {component}")]
    ResourceExhausted { component: String },

    /// A partition file grew past its allotted size.
    #[error("partition {partition} exceeded {bytes} bytes")]
    PartitionOverflow { partition: u32, bytes: u64 },

    /// The run was cancelled cooperatively before completion.
    #[error("operation cancelled")]
    Cancelled,
}

impl KmerustError {
    /// Wrap an I/O error with the path that caused it.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error, per the CLI contract.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Io { .. } => 3,
            Self::ResourceExhausted { .. } => 4,
            Self::PartitionOverflow { .. } => 5,
            Self::Cancelled => 1,
        }
    }
}

/// Error constructing a `KmerLength`: zero, or greater than 32 (a k-mer must
/// fit in a single `u64` under 2-bit packing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KmerLengthError {
    #[error("k must be at least 1, got {0}")]
    TooSmall(usize),
    #[error("k must be at most 32 to fit in a packed u64, got {0}")]
    TooLarge(usize),
}

impl From<KmerLengthError> for KmerustError {
    fn from(e: KmerLengthError) -> Self {
        Self::Usage(e.to_string())
    }
}
