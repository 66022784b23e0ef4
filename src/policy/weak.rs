//! Unbounded cache that never keeps its values alive.
//!
//! ## Architecture
//!
//! ```text
//!   WeakCache<K, V> ── Arc<WeakInner> ──► store: ConcurrentHashMapStore<K, WeakRef<V>>
//!                                         locks: KeyLockTable<K>
//!                                         sweeper: Option<SweeperHandle>
//!
//!   put(k, v):   lock(k) ─► store k ─► WeakRef(v)
//!                          └► v.on_release(hook: "remove k if its holder is dead")
//!                                          (replaces this cache's earlier hook for k)
//!
//!   last owner drops v ─► Tracked::drop ─► hook ─► sweeper purges k
//! ```
//!
//! An entry lives exactly as long as some other part of the program owns the
//! value. Values must be [`Reclaimable`] so the cache can ask to be told when
//! that happens; wrap plain types in [`Tracked`](crate::reclaim::Tracked).
//!
//! Without a sweeper no hooks are registered and dead entries are only
//! purged when a read runs into them.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use refcache::policy::weak::WeakCache;
//! use refcache::reclaim::Tracked;
//! use refcache::traits::ObjectCache;
//!
//! let cache = WeakCache::new();
//! let datum = Arc::new(Tracked::new(String::from("WGS 84")));
//! cache.put("EPSG:6326", Arc::clone(&datum));
//! assert!(cache.contains_key(&"EPSG:6326"));
//!
//! drop(datum);
//! assert!(cache.get(&"EPSG:6326").is_none());
//! ```

use std::collections::HashSet;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use crate::ds::KeyLockTable;
use crate::error::LockStateError;
use crate::reclaim::{
    HookTag, Reclaimable, ReclaimableRef, ReleaseHook, SweeperHandle, WeakRef,
};
use crate::store::hashmap::ConcurrentHashMapStore;
use crate::store::traits::{ConcurrentStore, StoreCore};
use crate::traits::ObjectCache;

struct WeakInner<K, V> {
    store: ConcurrentHashMapStore<K, WeakRef<V>>,
    locks: KeyLockTable<K>,
    sweeper: Option<SweeperHandle>,
    hasher: RandomState,
}

/// Weak-reference cache.
pub struct WeakCache<K, V> {
    inner: Arc<WeakInner<K, V>>,
}

impl<K, V> WeakCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Reclaimable + Send + Sync + 'static,
{
    /// Creates a cache that purges dead entries on read only.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates a cache whose dead entries are purged by `sweeper`.
    pub fn with_sweeper(sweeper: SweeperHandle) -> Self {
        Self::build(Some(sweeper))
    }

    fn build(sweeper: Option<SweeperHandle>) -> Self {
        Self {
            inner: Arc::new(WeakInner {
                store: ConcurrentHashMapStore::unbounded(),
                locks: KeyLockTable::new(),
                sweeper,
                hasher: RandomState::new(),
            }),
        }
    }

    /// Returns `true` if some thread holds the write lock for `key`.
    pub fn is_write_locked(&self, key: &K) -> bool {
        self.inner.locks.is_locked(key)
    }

    fn watch(&self, key: K, value: &V) {
        let Some(sweeper) = &self.inner.sweeper else {
            return;
        };
        // One hook per (cache, key) on a value; re-putting after a remove
        // replaces it. Colliding key hashes share a hook and the other entry
        // is purged on read.
        let tag = HookTag::new(Arc::as_ptr(&self.inner), self.inner.hasher.hash_one(&key));
        let owner = Arc::downgrade(&self.inner);
        value.on_release(ReleaseHook::tagged(
            sweeper.clone(),
            tag,
            Box::new(move || {
                if let Some(inner) = owner.upgrade() {
                    inner.store.remove_if(&key, |holder| holder.is_cleared());
                }
                Ok(())
            }),
        ));
    }
}

impl<K, V> Default for WeakCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Reclaimable + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for WeakCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakCache")
            .field("store", &self.inner.store)
            .field("sweeper", &self.inner.sweeper.is_some())
            .finish()
    }
}

impl<K, V> ObjectCache<K, V> for WeakCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Reclaimable + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<Arc<V>> {
        let holder = self.inner.store.get(key)?;
        let value = holder.get();
        if value.is_none() {
            self.inner
                .store
                .remove_if(key, |current| Arc::ptr_eq(current, &holder));
        }
        value
    }

    fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.get(key)
    }

    fn put(&self, key: K, value: Arc<V>) {
        let _guard = self.inner.locks.guard(&key);
        let unchanged = self
            .inner
            .store
            .get(&key)
            .is_some_and(|holder| holder.refers_to(&value));
        if unchanged {
            return;
        }
        let holder = Arc::new(WeakRef::new(&value));
        // The store is unbounded, so this never reports full.
        let _ = self.inner.store.try_insert(key.clone(), holder);
        self.watch(key, &value);
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
        self.get(key).is_some()
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
