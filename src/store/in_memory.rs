// Package store provides an in-memory single-flight cache store.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Admission, CacheEntry, CacheStore, Compute, RemovalHook, StoreError};

struct Stored<V> {
    entry: CacheEntry<V>,
    stored_at: Instant,
}

type Cell<V> = Arc<OnceCell<Stored<V>>>;

/// A slot is inserted before its compute starts, so removing the key while the
/// compute is in flight detaches the slot: the finished value then reaches only
/// the callers already waiting on it.
struct Slot<V> {
    id: u64,
    cell: Cell<V>,
}

/// InMemoryStore keeps one slot per cache key and runs at most one compute per
/// slot at a time. A failed compute leaves the slot empty; the next waiter
/// retries with its own compute.
pub struct InMemoryStore<V> {
    slots: DashMap<String, Slot<V>>,
    next_id: AtomicU64,
    ttl: Option<Duration>,
    on_removed: RwLock<Option<RemovalHook<V>>>,
}

impl<V> InMemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            next_id: AtomicU64::new(1),
            ttl: None,
            on_removed: RwLock::new(None),
        }
    }

    /// Store whose kept entries turn into misses once older than `ttl`.
    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            ..Self::new()
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn is_expired(&self, stored: &Stored<V>) -> bool {
        self.ttl.is_some_and(|ttl| stored.stored_at.elapsed() >= ttl)
    }

    /// Returns the slot for `key`, creating an empty one on miss or expiry.
    fn slot(&self, key: &str) -> (u64, Cell<V>) {
        let expired = match self.slots.get(key) {
            Some(slot) => match slot.cell.get() {
                Some(stored) if self.is_expired(stored) => Some(slot.id),
                _ => return (slot.id, Arc::clone(&slot.cell)),
            },
            None => None,
        };
        if let Some(id) = expired {
            self.detach(key, id);
        }

        let slot = self.slots.entry(key.to_string()).or_insert_with(|| Slot {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            cell: Arc::new(OnceCell::new()),
        });
        (slot.id, Arc::clone(&slot.cell))
    }

    fn is_attached(&self, key: &str, id: u64) -> bool {
        self.slots.get(key).is_some_and(|slot| slot.id == id)
    }

    /// Removes the slot only if it is still the one identified by `id`.
    fn detach(&self, key: &str, id: u64) -> bool {
        match self.slots.remove_if(key, |_, slot| slot.id == id) {
            Some((key, slot)) => {
                self.notify_removed(&key, &slot.cell);
                true
            }
            None => false,
        }
    }

    /// Reports a kept entry to the removal hook. Empty cells and discarded
    /// values carry no registrations and are skipped.
    fn notify_removed(&self, key: &str, cell: &Cell<V>) {
        let Some(stored) = cell.get() else {
            return;
        };
        if stored.entry.revoke_keys.is_empty() {
            return;
        }
        let hook = self.on_removed.read().clone();
        if let Some(hook) = hook {
            hook(key, &stored.entry);
        }
    }

    /// Returns the full cached entry for `key`, if one has been computed.
    pub fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let cell = self.slots.get(key).map(|slot| Arc::clone(&slot.cell))?;
        let stored = cell.get()?;
        if self.is_expired(stored) {
            return None;
        }
        Some(stored.entry.clone())
    }

    /// Drops every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let expired: Vec<(String, u64)> = self
            .slots
            .iter()
            .filter(|slot| slot.cell.get().is_some_and(|stored| self.is_expired(stored)))
            .map(|slot| (slot.key().clone(), slot.id))
            .collect();

        expired
            .into_iter()
            .filter(|(key, id)| self.detach(key, *id))
            .count()
    }
}

impl<V> Default for InMemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<V> CacheStore<V> for InMemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get_or_compute(&self, key: &str, compute: Compute<V>) -> Result<V, StoreError> {
        let (id, cell) = self.slot(key);
        let computed_here = AtomicBool::new(false);
        let computed = &computed_here;

        let stored = cell
            .get_or_try_init(|| async move {
                let entry = match compute.await? {
                    Admission::Keep(entry) => entry,
                    Admission::Discard(value) => {
                        // Detach before publishing so no new reader can find it.
                        self.detach(key, id);
                        CacheEntry {
                            value,
                            revoke_keys: Default::default(),
                            created_at: crate::time::NEVER,
                        }
                    }
                };
                computed.store(true, Ordering::Relaxed);
                Ok::<_, StoreError>(Stored {
                    entry,
                    stored_at: Instant::now(),
                })
            })
            .await?;

        // The slot was removed while this compute ran; its remover saw an empty
        // cell, so the kept entry is reported here.
        if computed_here.load(Ordering::Relaxed) && !self.is_attached(key, id) {
            self.notify_removed(key, &cell);
        }

        Ok(stored.entry.value.clone())
    }

    fn get(&self, key: &str) -> Option<V> {
        self.entry(key).map(|entry| entry.value)
    }

    fn remove(&self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some((key, slot)) => {
                self.notify_removed(&key, &slot.cell);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn clear(&self) {
        let mut removed = Vec::new();
        self.slots.retain(|key, slot| {
            removed.push((key.clone(), Arc::clone(&slot.cell)));
            false
        });
        for (key, cell) in removed {
            self.notify_removed(&key, &cell);
        }
    }

    fn set_removal_hook(&self, hook: RemovalHook<V>) {
        *self.on_removed.write() = Some(hook);
    }
}

/// Periodically drops expired entries so that keys never read again still
/// leave the store, and their registrations leave the reverse index.
pub async fn janitor<V>(
    shutdown_token: CancellationToken,
    store: Arc<InMemoryStore<V>>,
    each: Duration,
) where
    V: Clone + Send + Sync + 'static,
{
    info!(
        component = "store-janitor",
        event = "started",
        interval = %humantime::format_duration(each),
        "expired entries janitor started"
    );
    let mut ticker = tokio::time::interval(each);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown_token.cancelled() => {
                info!(component = "store-janitor", event = "stopped", "expired entries janitor stopped");
                return;
            }
            _ = ticker.tick() => {
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!(
                        component = "store-janitor",
                        event = "purged",
                        purged,
                        "expired entries dropped"
                    );
                }
            }
        }
    }
}
