//! Progress tracking and cooperative cancellation for counting runs.
//!
//! [`ProgressTracker`] accumulates sequence/base counts as engines stream
//! through their input; [`CancellationToken`] lets a caller ask a run to
//! stop early without tearing down the process.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Progress snapshot during k-mer counting.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    /// Number of sequences processed so far.
    pub sequences_processed: u64,
    /// Total number of bases processed so far.
    pub bases_processed: u64,
}

/// Thread-safe progress tracker using atomic counters.
///
/// This struct maintains atomic counters that can be safely updated from
/// multiple threads during parallel k-mer counting.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    sequences: AtomicU64,
    bases: AtomicU64,
}

impl ProgressTracker {
    /// Create a new progress tracker with zero counts.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sequences: AtomicU64::new(0),
            bases: AtomicU64::new(0),
        }
    }

    /// Record that a sequence has been processed.
    ///
    /// This method is thread-safe and can be called from multiple threads.
    ///
    /// # Arguments
    ///
    /// * `bases` - The number of bases in the processed sequence.
    pub fn record_sequence(&self, bases: u64) {
        self.sequences.fetch_add(1, Ordering::Relaxed);
        self.bases.fetch_add(bases, Ordering::Relaxed);
    }

    /// Get a snapshot of the current progress.
    ///
    /// The returned values represent the state at a point in time and may
    /// change immediately after this call returns.
    pub fn snapshot(&self) -> Progress {
        Progress {
            sequences_processed: self.sequences.load(Ordering::Relaxed),
            bases_processed: self.bases.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.sequences.store(0, Ordering::Relaxed);
        self.bases.store(0, Ordering::Relaxed);
    }
}

/// Cooperative cancellation signal, checked by engines per-read and
/// per-partition (spec.md §5). Setting it does not interrupt any in-flight
/// blocking I/O; it is observed at the next checkpoint.
#[derive(Debug, Default)]
pub struct CancellationToken {
    cancelled: AtomicBool,
}

impl CancellationToken {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
