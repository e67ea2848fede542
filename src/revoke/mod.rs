//! Revoke-driven cache invalidation.
//!
//! - [`ReverseIndex`]: revoke key -> dependent cache keys and last revoke time.
//! - [`RevokeQueueMaintainer`]: pending-revoke FIFO and the sweep bounding the index.
//! - [`RevokeCoordinator`]: race-free admission on population, eviction on revoke.

pub mod coordinator;
pub mod counters;
pub mod error;
pub mod maintainer;
pub mod reverse_index;
pub mod telemetry;

#[cfg(test)]
mod maintainer_test;

// Re-export main types
pub use coordinator::{Populated, RevokeCoordinator, RevokeHandler, RevokeStats, RevokeStatsSource};
pub use counters::Counters;
pub use error::MaintainError;
pub use maintainer::{RevokeQueueItem, RevokeQueueMaintainer};
pub use reverse_index::{CacheKey, ReverseIndex, RevokeKey};
