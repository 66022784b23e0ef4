//! Fixed-capacity cache holding strong references.
//!
//! ## Architecture
//!
//! ```text
//!   BoundedCache<K, V>
//!   ┌───────────────────────────────────────────┐
//!   │ store: ConcurrentHashMapStore<K, V>       │  capacity N, strong Arc<V>
//!   │ locks: KeyLockTable<K>                    │  per-key write locks
//!   └───────────────────────────────────────────┘
//!
//!   put(k, v):  lock(k) ─► store.try_insert ─► Ok      ─► unlock(k)
//!                                          └─► StoreFull ─► drop v silently
//! ```
//!
//! The cache never evicts. Once `N` keys are mapped, puts for new keys are
//! declined without error until something is removed; existing keys can
//! still be replaced.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use refcache::policy::bounded::BoundedCache;
//! use refcache::traits::ObjectCache;
//!
//! let cache = BoundedCache::new(2);
//! cache.put(1, Arc::new("one"));
//! cache.put(2, Arc::new("two"));
//! cache.put(3, Arc::new("three")); // declined
//!
//! assert_eq!(cache.len(), 2);
//! assert!(cache.get(&3).is_none());
//! ```

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::ds::KeyLockTable;
use crate::error::LockStateError;
use crate::store::hashmap::ConcurrentHashMapStore;
use crate::store::traits::{ConcurrentStore, StoreCore, StoreFull};
use crate::traits::{DEFAULT_CAPACITY, ObjectCache};

/// Strong-reference cache with a hard entry limit.
pub struct BoundedCache<K, V> {
    store: ConcurrentHashMapStore<K, V>,
    locks: KeyLockTable<K>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// A capacity of 0 creates a cache that accepts nothing.
    pub fn new(capacity: usize) -> Self {
        Self {
            store: ConcurrentHashMapStore::new(capacity),
            locks: KeyLockTable::new(),
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.store.capacity()
    }

    /// Returns `true` if some thread holds the write lock for `key`.
    pub fn is_write_locked(&self, key: &K) -> bool {
        self.locks.is_locked(key)
    }
}

impl<K, V> Default for BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Creates a cache with [`DEFAULT_CAPACITY`] entries.
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<K, V> fmt::Debug for BoundedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedCache")
            .field("store", &self.store)
            .field("locks", &self.locks)
            .finish()
    }
}

impl<K, V> ObjectCache<K, V> for BoundedCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
{
    fn get(&self, key: &K) -> Option<Arc<V>> {
        self.store.get(key)
    }

    fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.store.get(key)
    }

    fn put(&self, key: K, value: Arc<V>) {
        let _guard = self.locks.guard(&key);
        if let Err(StoreFull) = self.store.try_insert(key, value) {
            tracing::trace!(capacity = self.store.capacity(), "bounded cache full, put declined");
        }
    }

    fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.store.remove(key)
    }

    fn clear(&self) {
        self.store.clear();
    }

    fn keys(&self) -> HashSet<K> {
        self.store.keys().into_iter().collect()
    }

    fn contains_key(&self, key: &K) -> bool {
        self.store.contains(key)
    }

    fn len(&self) -> usize {
        self.store.len()
    }

    fn write_lock(&self, key: &K) {
        self.locks.lock(key);
    }

    fn write_unlock(&self, key: &K) -> Result<(), LockStateError> {
        self.locks.unlock(key)
    }
}
