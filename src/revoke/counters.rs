// Package revoke provides counters for revoke processing and maintenance.

use std::sync::atomic::{AtomicI64, Ordering};

/// Counters for revoke operations, reset by the telemetry loop on every flush.
pub struct Counters {
    /// Revoke events recorded.
    pub revokes: AtomicI64,
    /// Cache keys removed from the store because of a revoke.
    pub evicted: AtomicI64,
    /// Populations rejected before registration.
    pub stale_before_register: AtomicI64,
    /// Populations rejected by the re-check after registration.
    pub stale_after_register: AtomicI64,
    /// Populations admitted into the cache.
    pub admitted: AtomicI64,
    /// Completed sweeps.
    pub sweeps: AtomicI64,
    /// Sweeps that failed or panicked.
    pub sweep_failures: AtomicI64,
    /// Index entries removed by sweeps.
    pub index_removed: AtomicI64,
}

/// Values captured by [`Counters::reset`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub revokes: i64,
    pub evicted: i64,
    pub stale_before_register: i64,
    pub stale_after_register: i64,
    pub admitted: i64,
    pub sweeps: i64,
    pub sweep_failures: i64,
    pub index_removed: i64,
}

impl Snapshot {
    pub fn stale_total(&self) -> i64 {
        self.stale_before_register + self.stale_after_register
    }
}

impl Counters {
    /// Creates new counters.
    pub fn new() -> Self {
        Self {
            revokes: AtomicI64::new(0),
            evicted: AtomicI64::new(0),
            stale_before_register: AtomicI64::new(0),
            stale_after_register: AtomicI64::new(0),
            admitted: AtomicI64::new(0),
            sweeps: AtomicI64::new(0),
            sweep_failures: AtomicI64::new(0),
            index_removed: AtomicI64::new(0),
        }
    }

    pub fn inc(counter: &AtomicI64, n: i64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Reads counters without resetting them.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            revokes: self.revokes.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            stale_before_register: self.stale_before_register.load(Ordering::Relaxed),
            stale_after_register: self.stale_after_register.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            sweep_failures: self.sweep_failures.load(Ordering::Relaxed),
            index_removed: self.index_removed.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters and returns their previous values.
    pub fn reset(&self) -> Snapshot {
        Snapshot {
            revokes: self.revokes.swap(0, Ordering::Relaxed),
            evicted: self.evicted.swap(0, Ordering::Relaxed),
            stale_before_register: self.stale_before_register.swap(0, Ordering::Relaxed),
            stale_after_register: self.stale_after_register.swap(0, Ordering::Relaxed),
            admitted: self.admitted.swap(0, Ordering::Relaxed),
            sweeps: self.sweeps.swap(0, Ordering::Relaxed),
            sweep_failures: self.sweep_failures.swap(0, Ordering::Relaxed),
            index_removed: self.index_removed.swap(0, Ordering::Relaxed),
        }
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::new()
    }
}
