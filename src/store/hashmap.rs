//! HashMap-backed concurrent store.
//!
//! ## Architecture
//! - Keys are stored in a `HashMap<K, Arc<V>>` behind one `parking_lot::RwLock`.
//! - Capacity is enforced by entry count, not byte size.
//! - The lock only guards the structure of the map (insert/remove of an
//!   entry); per-key write serialization is the owning cache's business.
//!
//! ## Core Operations
//! - `try_insert`: insert or update by key, refusing new keys when full.
//! - `get`: fetch by key.
//! - `remove` / `remove_if`: delete by key, optionally only if the stored
//!   holder is still the one the caller expects.
//! - `clear`: drop all entries.
//! - `keys` / `entries`: point-in-time snapshots.
//!
//! ## Example Usage
//! ```rust
//! use std::sync::Arc;
//!
//! use refcache::store::hashmap::ConcurrentHashMapStore;
//! use refcache::store::traits::{ConcurrentStore, StoreCore, StoreFull};
//!
//! let store: ConcurrentHashMapStore<u64, String> = ConcurrentHashMapStore::new(1);
//! store.try_insert(1, Arc::new("a".to_string())).unwrap();
//! assert!(store.contains(&1));
//! assert_eq!(store.try_insert(2, Arc::new("b".to_string())), Err(StoreFull));
//! ```
//!
//! ## Type Constraints
//! - `K: Eq + Hash` for key lookup.
//! - `S: BuildHasher` for custom hashers (defaults to `RandomState`).

use std::collections::HashMap;
use std::collections::hash_map::{Entry, RandomState};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::store::traits::{ConcurrentStore, StoreCore, StoreFull};

/// Concurrent HashMap-backed store using interior mutability.
pub struct ConcurrentHashMapStore<K, V, S = RandomState> {
    map: RwLock<HashMap<K, Arc<V>, S>>,
    capacity: usize,
}

impl<K, V> ConcurrentHashMapStore<K, V, RandomState>
where
    K: Eq + Hash,
{
    /// Create a store holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self::with_hasher(capacity, RandomState::new())
    }

    /// Create a store with no entry limit.
    pub fn unbounded() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
            capacity: usize::MAX,
        }
    }
}

impl<K, V, S> ConcurrentHashMapStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Create a store with a custom hasher.
    pub fn with_hasher(capacity: usize, hasher: S) -> Self {
        // Don't preallocate absurd capacities for "effectively unbounded" stores.
        let prealloc = capacity.min(1024);
        Self {
            map: RwLock::new(HashMap::with_capacity_and_hasher(prealloc, hasher)),
            capacity,
        }
    }
}

impl<K, V, S> StoreCore<K, V> for ConcurrentHashMapStore<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Fetch a value by key.
    fn get(&self, key: &K) -> Option<Arc<V>> {
        self.map.read().get(key).cloned()
    }

    /// Check whether a key exists.
    fn contains(&self, key: &K) -> bool {
        self.map.read().contains_key(key)
    }

    /// Return the number of entries.
    fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Return the maximum capacity.
    fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<K, V, S> ConcurrentStore<K, V> for ConcurrentHashMapStore<K, V, S>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Send + Sync,
    S: BuildHasher + Send + Sync,
{
    /// Insert or update an entry.
    fn try_insert(&self, key: K, value: Arc<V>) -> Result<Option<Arc<V>>, StoreFull> {
        let mut map = self.map.write();
        let len = map.len();
        match map.entry(key) {
            Entry::Occupied(mut entry) => Ok(Some(entry.insert(value))),
            Entry::Vacant(entry) => {
                if len >= self.capacity {
                    return Err(StoreFull);
                }
                entry.insert(value);
                Ok(None)
            },
        }
    }

    /// Remove a value by key.
    fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.map.write().remove(key)
    }

    /// Remove a value by key if the predicate accepts it.
    fn remove_if<F>(&self, key: &K, predicate: F) -> Option<Arc<V>>
    where
        F: FnOnce(&Arc<V>) -> bool,
    {
        let mut map = self.map.write();
        if map.get(key).is_some_and(predicate) {
            map.remove(key)
        } else {
            None
        }
    }

    /// Clear all entries.
    fn clear(&self) {
        self.map.write().clear()
    }

    /// Snapshot the stored keys.
    fn keys(&self) -> Vec<K> {
        self.map.read().keys().cloned().collect()
    }

    /// Snapshot the stored entries.
    fn entries(&self) -> Vec<(K, Arc<V>)> {
        self.map
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), Arc::clone(value)))
            .collect()
    }
}

impl<K, V, S> fmt::Debug for ConcurrentHashMapStore<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentHashMapStore")
            .field("len", &self.map.read().len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
