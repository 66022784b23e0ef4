//! Cache that never stores anything.
//!
//! Useful to switch caching off without changing call sites: every `put` is
//! dropped and every lookup misses. The write-lock half of the contract still
//! works (and still rejects unbalanced unlocks), so code that wraps
//! computations in `write_guard` keeps its mutual exclusion and its
//! lock-discipline checks.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use refcache::policy::null::NullCache;
//! use refcache::traits::ObjectCache;
//!
//! let cache = NullCache::new();
//! cache.put("k", Arc::new(1));
//! assert!(cache.get(&"k").is_none());
//! assert!(!cache.contains_key(&"k"));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::ds::KeyLockTable;
use crate::error::LockStateError;
use crate::traits::ObjectCache;

/// A cache with capacity zero.
pub struct NullCache<K, V> {
    locks: KeyLockTable<K>,
    _values: PhantomData<fn() -> V>,
}

impl<K, V> NullCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a null cache.
    pub fn new() -> Self {
        Self {
            locks: KeyLockTable::new(),
            _values: PhantomData,
        }
    }

    /// Returns `true` if some thread holds the write lock for `key`.
    pub fn is_write_locked(&self, key: &K) -> bool {
        self.locks.is_locked(key)
    }
}

impl<K, V> Default for NullCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for NullCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NullCache").finish_non_exhaustive()
    }
}

impl<K, V> ObjectCache<K, V> for NullCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn get(&self, _key: &K) -> Option<Arc<V>> {
        None
    }

    fn peek(&self, _key: &K) -> Option<Arc<V>> {
        None
    }

    fn put(&self, _key: K, _value: Arc<V>) {}

    fn remove(&self, _key: &K) -> Option<Arc<V>> {
        None
    }

    fn clear(&self) {}

    fn keys(&self) -> HashSet<K> {
        HashSet::new()
    }

    fn contains_key(&self, _key: &K) -> bool {
        false
    }

    fn len(&self) -> usize {
        0
    }

    fn write_lock(&self, key: &K) {
        self.locks.lock(key);
    }

    fn write_unlock(&self, key: &K) -> Result<(), LockStateError> {
        self.locks.unlock(key)
    }
}
