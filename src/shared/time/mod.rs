//! Local clock for revoke receipt and population timestamps.
//!
//! Every node reasons only with its own readings; timestamps coming from
//! different nodes are never compared against each other, only merged by maximum.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;

/// Timestamp type used across the revoke protocol.
pub type Timestamp = DateTime<Utc>;

/// Minimum representable timestamp, used as "never revoked".
pub const NEVER: Timestamp = DateTime::<Utc>::MIN_UTC;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock backed by `Utc::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// Manually driven clock.
/// Lets tests place populations and revokes at exact instants.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock to `t`. Moving backwards is allowed on purpose,
    /// out-of-order delivery is part of what gets tested.
    pub fn set(&self, t: Timestamp) {
        *self.now.lock() = t;
    }

    /// Moves the clock forward by `d`. Saturates instead of overflowing.
    pub fn advance(&self, d: Duration) {
        let mut now = self.now.lock();
        if let Some(next) = chrono::Duration::from_std(d)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
        {
            *now = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

/// Builds a timestamp from Unix milliseconds, `NEVER` when out of range.
pub fn from_unix_millis(ms: i64) -> Timestamp {
    DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or(NEVER)
}

/// Returns `t - d`, or `None` when it underflows the representable range.
pub fn checked_sub(t: Timestamp, d: Duration) -> Option<Timestamp> {
    let delta = chrono::Duration::from_std(d).ok()?;
    t.checked_sub_signed(delta)
}
