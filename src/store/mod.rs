// Cache store contract used by the revoke coordinator.

pub mod in_memory;


use futures::future::BoxFuture;
use std::collections::HashSet;
use std::sync::Arc;

use crate::revoke::RevokeKey;
use crate::time::Timestamp;

pub use in_memory::InMemoryStore;

/// One cached call result plus the metadata the revoke protocol needs.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub revoke_keys: HashSet<RevokeKey>,
    pub created_at: Timestamp,
}

/// Decision taken once a compute finished.
#[derive(Debug)]
pub enum Admission<V> {
    /// Make the entry visible to later readers.
    Keep(CacheEntry<V>),
    /// Hand the value to the callers waiting on this compute, then forget it.
    Discard(V),
}

impl<V> Admission<V> {
    pub fn value(&self) -> &V {
        match self {
            Admission::Keep(entry) => &entry.value,
            Admission::Discard(value) => value,
        }
    }

    pub fn is_kept(&self) -> bool {
        matches!(self, Admission::Keep(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The remote call behind a compute failed.
    #[error("compute failed: {0}")]
    Compute(String),
}

/// Called with every kept entry that leaves the store: removal, clearing,
/// expiry, or a compute that finished after its slot was detached.
pub type RemovalHook<V> = Arc<dyn Fn(&str, &CacheEntry<V>) + Send + Sync>;

/// Lazily started compute. The store polls it at most once per key at a time.
pub type Compute<V> = BoxFuture<'static, Result<Admission<V>, StoreError>>;

/// Keyed cache with get-or-compute-once semantics.
#[async_trait::async_trait]
pub trait CacheStore<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Returns the cached value for `key`, or runs `compute` to produce it.
    /// Concurrent callers for the same key share one compute.
    async fn get_or_compute(&self, key: &str, compute: Compute<V>) -> Result<V, StoreError>;

    /// Returns the cached value without computing.
    fn get(&self, key: &str) -> Option<V>;

    /// Removes `key`, including a compute still in flight. Returns true on hit.
    fn remove(&self, key: &str) -> bool;

    /// Number of keys, in-flight ones included.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes everything.
    fn clear(&self);

    /// Installs the hook notified about entries leaving the store, replacing
    /// any previous one.
    fn set_removal_hook(&self, hook: RemovalHook<V>);
}
