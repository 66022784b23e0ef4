//! Unbounded cache whose values are shed under memory pressure.
//!
//! ## Architecture
//!
//! ```text
//!   SoftCache<K, V>  ── Arc<SoftInner> ──┐
//!                                        ▼
//!   ┌──────────────────────────────────────────────────────────┐
//!   │ store:  ConcurrentHashMapStore<K, SoftRef<V>>  unbounded │
//!   │ locks:  KeyLockTable<K>                                  │
//!   │ clock:  AtomicU64          (access stamps)               │
//!   │ soft_limit: Option<usize>  (pressure threshold)          │
//!   │ sweeper: Option<SweeperHandle>                           │
//!   └──────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no collector to tell the cache when memory runs short, so
//! pressure is modelled two ways:
//!
//! - **Soft limit**: when a `put` leaves more than `soft_limit` entries, the
//!   least recently used holders are cleared until the cache is back at the
//!   limit. Recency is approximate: stamps come from a shared counter bumped
//!   on `put` and `get`.
//! - **Explicit signal**: [`SoftCache::reclaim`] clears the `n` least recently
//!   used holders, for an embedding application that watches memory itself.
//!
//! A cleared holder reads as absent immediately. Removing its map entry is
//! queued on the sweeper when one is attached, and done inline otherwise;
//! reads also purge cleared holders they run into.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use refcache::policy::soft::SoftCache;
//! use refcache::traits::ObjectCache;
//!
//! let cache = SoftCache::with_soft_limit(2);
//! cache.put("a", Arc::new(1));
//! cache.put("b", Arc::new(2));
//! cache.get(&"a");                 // "b" is now least recently used
//! cache.put("c", Arc::new(3));     // over the limit: "b" is reclaimed
//!
//! assert!(cache.get(&"b").is_none());
//! assert!(cache.contains_key(&"a"));
//! assert!(cache.contains_key(&"c"));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ds::KeyLockTable;
use crate::error::LockStateError;
use crate::reclaim::{ReclaimableRef, SoftRef, SweeperHandle};
use crate::store::hashmap::ConcurrentHashMapStore;
use crate::store::traits::{ConcurrentStore, StoreCore};
use crate::traits::ObjectCache;

struct SoftInner<K, V> {
    store: ConcurrentHashMapStore<K, SoftRef<V>>,
    locks: KeyLockTable<K>,
    clock: AtomicU64,
    soft_limit: Option<usize>,
    sweeper: Option<SweeperHandle>,
}

impl<K, V> SoftInner<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    #[inline]
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Removes `key` only if it still maps to `holder`.
    fn purge(&self, key: &K, holder: &Arc<SoftRef<V>>) {
        self.store.remove_if(key, |current| Arc::ptr_eq(current, holder));
    }
}

/// Soft-reference cache with simulated memory-pressure reclamation.
pub struct SoftCache<K, V> {
    inner: Arc<SoftInner<K, V>>,
}

impl<K, V> SoftCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a cache that only sheds values on [`reclaim`](Self::reclaim).
    pub fn new() -> Self {
        Self::with_options(None, None)
    }

    /// Creates a cache that sheds least recently used values beyond `limit`.
    pub fn with_soft_limit(limit: usize) -> Self {
        Self::with_options(Some(limit), None)
    }

    /// Creates a cache with an optional soft limit, queueing purges on
    /// `sweeper` when given.
    pub fn with_options(soft_limit: Option<usize>, sweeper: Option<SweeperHandle>) -> Self {
        Self {
            inner: Arc::new(SoftInner {
                store: ConcurrentHashMapStore::unbounded(),
                locks: KeyLockTable::new(),
                clock: AtomicU64::new(0),
                soft_limit,
                sweeper,
            }),
        }
    }

    /// The configured pressure threshold, if any.
    pub fn soft_limit(&self) -> Option<usize> {
        self.inner.soft_limit
    }

    /// Returns `true` if some thread holds the write lock for `key`.
    pub fn is_write_locked(&self, key: &K) -> bool {
        self.inner.locks.is_locked(key)
    }

    /// Clears up to `count` live values, least recently used first.
    ///
    /// Returns how many values were cleared.
    pub fn reclaim(&self, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        let cleared = self.clear_oldest(self.live_entries(), count);
        tracing::trace!(requested = count, cleared, "soft cache reclaimed values");
        cleared
    }

    fn live_entries(&self) -> Vec<(u64, K, Arc<SoftRef<V>>)> {
        self.inner
            .store
            .entries()
            .into_iter()
            .filter(|(_, holder)| !holder.is_cleared())
            .map(|(key, holder)| (holder.stamp(), key, holder))
            .collect()
    }

    fn clear_oldest(&self, mut live: Vec<(u64, K, Arc<SoftRef<V>>)>, count: usize) -> usize {
        live.sort_unstable_by_key(|(stamp, _, _)| *stamp);
        let mut cleared = 0;
        for (_, key, holder) in live.into_iter().take(count) {
            if holder.clear() {
                cleared += 1;
                self.schedule_purge(key, holder);
            }
        }
        cleared
    }

    fn relieve_pressure(&self) {
        let Some(limit) = self.inner.soft_limit else {
            return;
        };
        if self.inner.store.len() <= limit {
            return;
        }
        // Holders still waiting for their queued purge do not count.
        let live = self.live_entries();
        if live.len() > limit {
            let excess = live.len() - limit;
            let cleared = self.clear_oldest(live, excess);
            tracing::trace!(limit, cleared, "soft cache over its limit");
        }
    }

    fn schedule_purge(&self, key: K, holder: Arc<SoftRef<V>>) {
        if let Some(sweeper) = &self.inner.sweeper {
            let owner = Arc::downgrade(&self.inner);
            let queued_key = key.clone();
            let queued_holder = Arc::clone(&holder);
            let queued = sweeper.enqueue(Box::new(move || {
                if let Some(inner) = owner.upgrade() {
                    inner.purge(&queued_key, &queued_holder);
                }
                Ok(())
            }));
            if queued {
                return;
            }
        }
        self.inner.purge(&key, &holder);
    }

    fn lookup(&self, key: &K, touch: bool) -> Option<Arc<V>> {
        let holder = self.inner.store.get(key)?;
        match holder.get() {
            Some(value) => {
                if touch {
                    holder.touch(self.inner.tick());
                }
                Some(value)
            },
            None => {
                self.inner.purge(key, &holder);
                None
            },
        }
    }
}

impl<K, V> Default for SoftCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for SoftCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftCache")
            .field("store", &self.inner.store)
            .field("soft_limit", &self.inner.soft_limit)
            .field("sweeper", &self.inner.sweeper.is_some())
            .finish()
    }
}

impl<K, V> ObjectCache<K, V> for SoftCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<Arc<V>> {
        self.lookup(key, true)
    }

    fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.lookup(key, false)
    }

    fn put(&self, key: K, value: Arc<V>) {
        {
            let _guard = self.inner.locks.guard(&key);
            let holder = Arc::new(SoftRef::new(value, self.inner.tick()));
            // The store is unbounded, so this never reports full.
            let _ = self.inner.store.try_insert(key, holder);
        }
        self.relieve_pressure();
    }

    fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.inner.store.remove(key).and_then(|holder| holder.get())
    }

    fn clear(&self) {
        self.inner.store.clear();
    }

    fn keys(&self) -> HashSet<K> {
        self.inner
            .store
            .entries()
            .into_iter()
            .filter(|(_, holder)| !holder.is_cleared())
            .map(|(key, _)| key)
            .collect()
    }

    fn contains_key(&self, key: &K) -> bool {
        self.peek(key).is_some()
    }

    fn len(&self) -> usize {
        self.inner.store.len()
    }

    fn write_lock(&self, key: &K) {
        self.inner.locks.lock(key);
    }

    fn write_unlock(&self, key: &K) -> Result<(), LockStateError> {
        self.inner.locks.unlock(key)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::reclaim::Sweeper;

    #[test]
    fn unlimited_cache_keeps_everything() {
        let cache = SoftCache::new();
        for i in 0..100u32 {
            cache.put(i, Arc::new(i));
        }
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.get(&42).as_deref(), Some(&42));
        assert_eq!(cache.soft_limit(), None);
    }

    #[test]
    fn soft_limit_sheds_least_recently_used() {
        let cache = SoftCache::with_soft_limit(3);
        cache.put(1u32, Arc::new("one"));
        cache.put(2u32, Arc::new("two"));
        cache.put(3u32, Arc::new("three"));
        cache.get(&1);
        cache.put(4u32, Arc::new("four"));

        assert!(cache.get(&2).is_none());
        assert_eq!(cache.keys(), HashSet::from([1, 3, 4]));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn peek_does_not_refresh_recency() {
        let cache = SoftCache::with_soft_limit(2);
        cache.put("a", Arc::new(1));
        cache.put("b", Arc::new(2));
        cache.peek(&"a");
        cache.put("c", Arc::new(3));
        assert!(!cache.contains_key(&"a"));
        assert!(cache.contains_key(&"b"));
    }

    #[test]
    fn explicit_reclaim_clears_oldest_first() {
        let cache = SoftCache::new();
        for i in 0..5u32 {
            cache.put(i, Arc::new(i));
        }
        assert_eq!(cache.reclaim(2), 2);
        assert!(cache.get(&0).is_none());
        assert!(cache.get(&1).is_none());
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.reclaim(0), 0);
        assert_eq!(cache.reclaim(10), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn reclaimed_values_stay_alive_for_their_owners() {
        let cache = SoftCache::new();
        let value = Arc::new(String::from("held elsewhere"));
        cache.put("k", Arc::clone(&value));
        cache.reclaim(1);
        assert!(cache.get(&"k").is_none());
        assert_eq!(*value, "held elsewhere");
    }

    #[test]
    fn sweeper_purges_reclaimed_entries() {
        let sweeper = Sweeper::start().unwrap();
        let cache = SoftCache::with_options(None, Some(sweeper.handle()));
        cache.put(1u32, Arc::new(1u32));
        cache.put(2u32, Arc::new(2u32));

        assert_eq!(cache.reclaim(1), 1);
        assert!(sweeper.handle().sync(Duration::from_secs(5)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.keys(), HashSet::from([2]));
    }

    #[test]
    fn queued_purges_do_not_count_toward_the_limit() {
        let sweeper = Sweeper::start().unwrap();
        let cache = SoftCache::with_options(Some(2), Some(sweeper.handle()));

        // Hold the worker so every purge stays queued.
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        sweeper.handle().enqueue(Box::new(move || {
            let _ = release_rx.recv();
            Ok(())
        }));
        for i in 1..=4u32 {
            cache.put(i, Arc::new(i));
        }
        assert_eq!(cache.keys(), HashSet::from([3, 4]));

        release_tx.send(()).unwrap();
        assert!(sweeper.handle().sync(Duration::from_secs(5)));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.keys(), HashSet::from([3, 4]));
    }

    #[test]
    fn replaced_holder_survives_stale_purge() {
        let sweeper = Sweeper::start().unwrap();
        let cache = SoftCache::with_options(None, Some(sweeper.handle()));
        cache.put("k", Arc::new(1));

        // Hold the worker so the purge is still queued when "k" is replaced.
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        sweeper.handle().enqueue(Box::new(move || {
            let _ = release_rx.recv();
            Ok(())
        }));
        cache.reclaim(1);
        cache.put("k", Arc::new(2));
        release_tx.send(()).unwrap();

        assert!(sweeper.handle().sync(Duration::from_secs(5)));
        assert_eq!(cache.get(&"k").as_deref(), Some(&2));
    }

    #[test]
    fn remove_returns_live_value() {
        let cache = SoftCache::new();
        cache.put("k", Arc::new(9));
        assert_eq!(cache.remove(&"k").as_deref(), Some(&9));
        assert!(cache.remove(&"k").is_none());
    }
}
