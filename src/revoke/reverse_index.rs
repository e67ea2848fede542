// Package revoke provides the reverse index from revoke key to dependent cache keys.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::time::{Timestamp, NEVER};

/// Identifier of an invalidation group.
pub type RevokeKey = String;
/// Identifier of one cached call result.
pub type CacheKey = String;

/// State guarded by a single entry lock.
#[derive(Debug)]
struct EntryState {
    /// Dependents and the creation time of the population that registered them.
    cache_keys: HashMap<CacheKey, Timestamp>,
    last_revoked_at: Timestamp,
    /// Set under the entry lock when the sweep detaches the entry from the map.
    /// Writers holding a stale handle must retry against the live one.
    retired: bool,
}

impl EntryState {
    fn new() -> Self {
        Self {
            cache_keys: HashMap::new(),
            last_revoked_at: NEVER,
            retired: false,
        }
    }

    fn is_removable(&self, older_than: Timestamp) -> bool {
        !self.retired && self.cache_keys.is_empty() && self.last_revoked_at <= older_than
    }
}

type Entry = Arc<RwLock<EntryState>>;

/// ReverseIndex maps a revoke key to the cache keys currently depending on it
/// plus the last time the key was revoked on this node.
///
/// Entries are created lazily by registration or revoke and destroyed only by
/// [`ReverseIndex::try_remove_if_empty`]. Every lock is scoped to one entry and
/// no entry lock is held while another one is taken.
pub struct ReverseIndex {
    entries: DashMap<RevokeKey, Entry>,
}

impl ReverseIndex {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of revoke keys currently tracked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the handle for `key` without creating it.
    fn lookup(&self, key: &str) -> Option<Entry> {
        self.entries.get(key).map(|e| Arc::clone(e.value()))
    }

    /// Returns the handle for `key`, creating an empty entry on first use.
    fn lookup_or_create(&self, key: &str) -> Entry {
        if let Some(entry) = self.lookup(key) {
            return entry;
        }
        Arc::clone(
            self.entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(EntryState::new())))
                .value(),
        )
    }

    /// Applies `f` to the live entry for `key` under its write lock.
    fn with_live_entry<R>(&self, key: &str, mut f: impl FnMut(&mut EntryState) -> R) -> R {
        loop {
            let entry = self.lookup_or_create(key);
            let mut state = entry.write();
            if state.retired {
                // Lost a race with the sweep, the map holds a fresh entry now.
                continue;
            }
            return f(&mut state);
        }
    }

    /// Adds `cache_key` as a dependent of every key in `revoke_keys`.
    /// Returns, per revoke key, whether the cache key was newly added.
    pub fn register(&self, cache_key: &str, revoke_keys: &[RevokeKey]) -> Vec<bool> {
        self.register_at(cache_key, revoke_keys, NEVER)
    }

    /// Like [`Self::register`], tagging the registration with the creation time
    /// of the population behind it. An existing tag is only moved forward.
    pub fn register_at(
        &self,
        cache_key: &str,
        revoke_keys: &[RevokeKey],
        created_at: Timestamp,
    ) -> Vec<bool> {
        revoke_keys
            .iter()
            .map(|revoke_key| {
                self.with_live_entry(revoke_key, |state| {
                    match state.cache_keys.get_mut(cache_key) {
                        Some(tag) => {
                            if created_at > *tag {
                                *tag = created_at;
                            }
                            false
                        }
                        None => {
                            state.cache_keys.insert(cache_key.to_string(), created_at);
                            true
                        }
                    }
                })
            })
            .collect()
    }

    /// Removes `cache_key` from every key in `revoke_keys`. Unknown keys are skipped.
    pub fn evict(&self, cache_key: &str, revoke_keys: &[RevokeKey]) {
        self.evict_where(cache_key, revoke_keys, |_| true);
    }

    /// Removes `cache_key` only where it is still tagged with `created_at`, so a
    /// rolled back population never drops the registration of a newer one.
    pub fn evict_at(&self, cache_key: &str, revoke_keys: &[RevokeKey], created_at: Timestamp) {
        self.evict_where(cache_key, revoke_keys, |tag| tag == created_at);
    }

    fn evict_where(
        &self,
        cache_key: &str,
        revoke_keys: &[RevokeKey],
        matches: impl Fn(Timestamp) -> bool,
    ) {
        for revoke_key in revoke_keys {
            while let Some(entry) = self.lookup(revoke_key) {
                let mut state = entry.write();
                if state.retired {
                    continue;
                }
                if state.cache_keys.get(cache_key).is_some_and(|tag| matches(*tag)) {
                    state.cache_keys.remove(cache_key);
                }
                break;
            }
        }
    }

    /// Merges `when` into the entry's revoke time (maximum, never downward),
    /// clears its dependents and returns them.
    ///
    /// Replaying the same `(revoke_key, when)` only repeats the maximum merge.
    pub fn record_revoke(&self, revoke_key: &str, when: Timestamp) -> Vec<CacheKey> {
        self.with_live_entry(revoke_key, |state| {
            if when > state.last_revoked_at {
                state.last_revoked_at = when;
            }
            state.cache_keys.drain().map(|(cache_key, _)| cache_key).collect()
        })
    }

    /// Last time `revoke_key` was revoked on this node, `NEVER` if unknown.
    pub fn last_revoked_at(&self, revoke_key: &str) -> Timestamp {
        match self.lookup(revoke_key) {
            Some(entry) => entry.read().last_revoked_at,
            None => NEVER,
        }
    }

    /// Snapshot of the cache keys depending on `revoke_key`.
    pub fn dependents(&self, revoke_key: &str) -> Vec<CacheKey> {
        match self.lookup(revoke_key) {
            Some(entry) => entry.read().cache_keys.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Removes the entry when it has no dependents and was not revoked after `older_than`.
    ///
    /// Double-checked: a cheap read-locked check first, then the removal itself
    /// re-checks under the entry's write lock so a registration landing in between
    /// keeps the entry alive.
    pub fn try_remove_if_empty(&self, revoke_key: &str, older_than: Timestamp) -> bool {
        let Some(entry) = self.lookup(revoke_key) else {
            return false;
        };
        if !entry.read().is_removable(older_than) {
            return false;
        }

        self.entries
            .remove_if(revoke_key, |_, current| {
                if !Arc::ptr_eq(current, &entry) {
                    return false;
                }
                let mut state = current.write();
                if !state.is_removable(older_than) {
                    return false;
                }
                state.retired = true;
                true
            })
            .is_some()
    }
}

impl Default for ReverseIndex {
    fn default() -> Self {
        Self::new()
    }
}
