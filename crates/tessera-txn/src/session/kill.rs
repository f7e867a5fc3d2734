//! Session interruption flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Interruption flag shared between a session and whoever may kill it.
///
/// The coordinator polls the flag between engine calls; it never
/// interrupts a call in progress.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch(Arc<AtomicBool>);

impl KillSwitch {
    /// Creates an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests interruption.
    pub fn kill(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true once interruption was requested.
    #[inline]
    pub fn is_killed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Clears the flag, for a session that survives a query kill.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}
