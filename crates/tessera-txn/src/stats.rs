//! Coordinator statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about the transaction coordinator.
#[derive(Debug, Default)]
pub struct TransactionStats {
    /// Transactions started (first engine registered).
    pub started: AtomicU64,
    /// Transactions committed.
    pub committed: AtomicU64,
    /// Transactions rolled back.
    pub rolled_back: AtomicU64,
    /// Individual engine prepare calls.
    pub prepares: AtomicU64,
    /// Commits that went through a prepare round.
    pub two_phase_commits: AtomicU64,
    /// Commits that skipped the prepare round.
    pub one_phase_commits: AtomicU64,
    /// Engine commit calls that failed.
    pub commit_failures: AtomicU64,
    /// Savepoints set.
    pub savepoints: AtomicU64,
}

impl TransactionStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Display for TransactionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TransactionStats {{ started: {}, committed: {}, rolled_back: {}, prepares: {}, two_phase: {}, one_phase: {}, commit_failures: {} }}",
            self.started.load(Ordering::Relaxed),
            self.committed.load(Ordering::Relaxed),
            self.rolled_back.load(Ordering::Relaxed),
            self.prepares.load(Ordering::Relaxed),
            self.two_phase_commits.load(Ordering::Relaxed),
            self.one_phase_commits.load(Ordering::Relaxed),
            self.commit_failures.load(Ordering::Relaxed),
        )
    }
}
