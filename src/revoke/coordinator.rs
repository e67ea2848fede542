// Package revoke provides the coordinator that reconciles cache population
// with revoke delivery.

use std::collections::HashSet;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use serde::Serialize;
use tracing::debug;

use crate::store::{Admission, CacheEntry, CacheStore, Compute, RemovalHook, StoreError};
use crate::time::{Clock, Timestamp};

use super::counters::Counters;
use super::maintainer::RevokeQueueMaintainer;
use super::reverse_index::{ReverseIndex, RevokeKey};

const COMPONENT: &str = "revoke-coordinator";

/// Result of a remote call: the value plus the revoke keys it depends on.
#[derive(Debug, Clone)]
pub struct Populated<V> {
    pub value: V,
    pub revoke_keys: Vec<RevokeKey>,
}

impl<V> Populated<V> {
    pub fn new(value: V, revoke_keys: Vec<RevokeKey>) -> Self {
        Self { value, revoke_keys }
    }
}

/// Receiver side of the revoke channel.
pub trait RevokeHandler: Send + Sync {
    /// Records a revoke received now. Returns the number of dependents it evicted.
    fn record_revoke(&self, revoke_key: &str) -> usize;
}

/// Backlog figures of the revoke subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RevokeStats {
    pub index_size: usize,
    pub queue_pending: usize,
    pub store_len: usize,
}

pub trait RevokeStatsSource: Send + Sync {
    fn stats(&self) -> RevokeStats;
}

/// RevokeCoordinator wraps a [`CacheStore`] so that no value whose revoke keys
/// were revoked during or after its compute stays visible in the cache.
///
/// Admission is decided in two phases around registration instead of under a
/// lock spanning the compute:
/// 1. `created_at` is taken when the compute starts, before the remote call;
/// 2. before registering, any revoke at or after `created_at` rejects the value;
/// 3. after registering, the revoke times are re-read and a revoke that landed in
///    between rolls the registration back.
pub struct RevokeCoordinator<V, S> {
    index: Arc<ReverseIndex>,
    maintainer: Arc<RevokeQueueMaintainer>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    counters: Arc<Counters>,
    _value: PhantomData<fn() -> V>,
}

impl<V, S> RevokeCoordinator<V, S>
where
    V: Clone + Send + Sync + 'static,
    S: CacheStore<V> + 'static,
{
    pub fn new(
        index: Arc<ReverseIndex>,
        maintainer: Arc<RevokeQueueMaintainer>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        counters: Arc<Counters>,
    ) -> Self {
        store.set_removal_hook(unregister_on_removal(Arc::clone(&index)));
        Self {
            index,
            maintainer,
            store,
            clock,
            counters,
            _value: PhantomData,
        }
    }

    pub fn index(&self) -> &Arc<ReverseIndex> {
        &self.index
    }

    pub fn maintainer(&self) -> &Arc<RevokeQueueMaintainer> {
        &self.maintainer
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    /// Returns the cached value for `cache_key`, or calls `fetch` on miss and
    /// admits its result according to the revoke protocol.
    ///
    /// A stale result is still returned to the callers of this compute; it is
    /// just never left in the cache.
    pub async fn get_or_populate<F, Fut>(&self, cache_key: &str, fetch: F) -> Result<V, StoreError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Populated<V>, StoreError>> + Send + 'static,
    {
        let index = Arc::clone(&self.index);
        let clock = Arc::clone(&self.clock);
        let counters = Arc::clone(&self.counters);
        let key = cache_key.to_string();

        let compute: Compute<V> = Box::pin(async move {
            // Must be read before the remote call starts, never after it returns.
            let created_at = clock.now();
            let populated = fetch().await?;
            Ok(admit(&index, &counters, &key, created_at, populated))
        });

        self.store.get_or_compute(cache_key, compute).await
    }

    /// Records a revoke of `revoke_key` at local receipt time.
    pub fn record_revoke(&self, revoke_key: &str) -> usize {
        self.record_revoke_at(revoke_key, self.clock.now())
    }

    /// Records a revoke at an explicit time: bumps the key's revoke time, evicts
    /// its dependents from the store and queues the key for cleanup.
    ///
    /// Replays are harmless; the revoke time merges by maximum.
    pub fn record_revoke_at(&self, revoke_key: &str, when: Timestamp) -> usize {
        let dependents = self.index.record_revoke(revoke_key, when);

        let mut evicted = 0;
        for cache_key in &dependents {
            if self.store.remove(cache_key) {
                evicted += 1;
            }
        }

        // Queued even without dependents so the entry gets cleaned up later.
        self.maintainer.enqueue(revoke_key, when);

        Counters::inc(&self.counters.revokes, 1);
        Counters::inc(&self.counters.evicted, evicted);
        debug!(
            component = COMPONENT,
            event = "revoked",
            revoke_key = %revoke_key,
            dependents = dependents.len(),
            evicted,
            "revoke recorded"
        );

        dependents.len()
    }
}

impl<V, S> RevokeHandler for RevokeCoordinator<V, S>
where
    V: Clone + Send + Sync + 'static,
    S: CacheStore<V> + 'static,
{
    fn record_revoke(&self, revoke_key: &str) -> usize {
        RevokeCoordinator::record_revoke(self, revoke_key)
    }
}

impl<V, S> RevokeStatsSource for RevokeCoordinator<V, S>
where
    V: Clone + Send + Sync + 'static,
    S: CacheStore<V> + 'static,
{
    fn stats(&self) -> RevokeStats {
        RevokeStats {
            index_size: self.index.len(),
            queue_pending: self.maintainer.queue_len(),
            store_len: self.store.len(),
        }
    }
}

/// Unregisters an entry leaving the store from every revoke key it was
/// admitted under. The tag check keeps a newer population of the same cache
/// key registered.
fn unregister_on_removal<V>(index: Arc<ReverseIndex>) -> RemovalHook<V> {
    Arc::new(move |cache_key: &str, entry: &CacheEntry<V>| {
        let revoke_keys: Vec<RevokeKey> = entry.revoke_keys.iter().cloned().collect();
        index.evict_at(cache_key, &revoke_keys, entry.created_at);
        debug!(
            component = COMPONENT,
            event = "unregistered",
            cache_key = %cache_key,
            revoke_keys = revoke_keys.len(),
            "entry left the store"
        );
    })
}

/// True if any of `revoke_keys` was revoked at or after `created_at`.
fn is_stale(index: &ReverseIndex, revoke_keys: &[RevokeKey], created_at: Timestamp) -> bool {
    revoke_keys
        .iter()
        .any(|key| index.last_revoked_at(key) >= created_at)
}

/// Decides whether a freshly computed value may enter the cache.
fn admit<V>(
    index: &ReverseIndex,
    counters: &Counters,
    cache_key: &str,
    created_at: Timestamp,
    populated: Populated<V>,
) -> Admission<V> {
    let Populated { value, revoke_keys } = populated;

    let unique: HashSet<RevokeKey> = revoke_keys.into_iter().collect();
    let revoke_keys: Vec<RevokeKey> = unique.iter().cloned().collect();

    if is_stale(index, &revoke_keys, created_at) {
        Counters::inc(&counters.stale_before_register, 1);
        debug!(
            component = COMPONENT,
            event = "stale_rejected",
            phase = "before_register",
            cache_key = %cache_key,
            "revoked during compute, result not cached"
        );
        return Admission::Discard(value);
    }

    index.register_at(cache_key, &revoke_keys, created_at);

    // A revoke may have landed between the check above and the registration.
    if is_stale(index, &revoke_keys, created_at) {
        index.evict_at(cache_key, &revoke_keys, created_at);
        Counters::inc(&counters.stale_after_register, 1);
        debug!(
            component = COMPONENT,
            event = "stale_rejected",
            phase = "after_register",
            cache_key = %cache_key,
            "revoked during registration, result not cached"
        );
        return Admission::Discard(value);
    }

    Counters::inc(&counters.admitted, 1);
    Admission::Keep(CacheEntry {
        value,
        revoke_keys: unique,
        created_at,
    })
}
