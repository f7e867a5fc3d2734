//! Registry statistics for monitoring and debugging.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for registry operations.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Total number of lookups.
    lookups: AtomicU64,
    /// Lookups that found a value.
    hits: AtomicU64,
    /// Lookups that found nothing.
    misses: AtomicU64,
    /// Lookups that found a placeholder.
    placeholder_hits: AtomicU64,
    /// Successful placeholder reservations.
    locks: AtomicU64,
    /// Completed insertions.
    inserts: AtomicU64,
    /// Removed entries (erase and unlock).
    removals: AtomicU64,
}

impl CacheStats {
    /// Creates new statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a lookup that found a value.
    #[inline]
    pub fn record_hit(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a lookup that found nothing.
    #[inline]
    pub fn record_miss(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a lookup that found a placeholder.
    #[inline]
    pub fn record_placeholder_hit(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.placeholder_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a placeholder reservation.
    #[inline]
    pub fn record_lock(&self) {
        self.locks.fetch_add(1, Ordering::Relaxed);
    }

    /// Records an insertion.
    #[inline]
    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a removal.
    #[inline]
    pub fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns total lookups.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Returns lookups that found a value.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Returns lookups that found nothing.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns lookups that found a placeholder.
    pub fn placeholder_hits(&self) -> u64 {
        self.placeholder_hits.load(Ordering::Relaxed)
    }

    /// Returns placeholder reservations.
    pub fn locks(&self) -> u64 {
        self.locks.load(Ordering::Relaxed)
    }

    /// Returns insertions.
    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Returns removals.
    pub fn removals(&self) -> u64 {
        self.removals.load(Ordering::Relaxed)
    }

    /// Returns the hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.lookups();
        if lookups == 0 {
            0.0
        } else {
            self.hits() as f64 / lookups as f64
        }
    }

    /// Resets all statistics.
    pub fn reset(&self) {
        self.lookups.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.placeholder_hits.store(0, Ordering::Relaxed);
        self.locks.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.removals.store(0, Ordering::Relaxed);
    }
}

impl Clone for CacheStats {
    fn clone(&self) -> Self {
        Self {
            lookups: AtomicU64::new(self.lookups()),
            hits: AtomicU64::new(self.hits()),
            misses: AtomicU64::new(self.misses()),
            placeholder_hits: AtomicU64::new(self.placeholder_hits()),
            locks: AtomicU64::new(self.locks()),
            inserts: AtomicU64::new(self.inserts()),
            removals: AtomicU64::new(self.removals()),
        }
    }
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "CacheStats {{ lookups: {}, hits: {}, misses: {}, placeholder_hits: {}, hit_ratio: {:.2}%, inserts: {}, removals: {} }}",
            self.lookups(),
            self.hits(),
            self.misses(),
            self.placeholder_hits(),
            self.hit_ratio() * 100.0,
            self.inserts(),
            self.removals()
        )
    }
}
