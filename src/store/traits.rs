//! Storage backends for cache policies.
//!
//! Stores focus on key/holder ownership and lookup semantics, while policies
//! decide what a holder is (the value itself, a soft holder, a weak holder)
//! and when entries go away. This keeps policy logic independent of how
//! entries are stored.

use std::sync::Arc;

/// Error returned when a store is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreFull;

/// Core store operations common to all backends.
pub trait StoreCore<K, V> {
    /// Fetch a value by key.
    fn get(&self, key: &K) -> Option<Arc<V>>;

    /// Check if a key exists.
    fn contains(&self, key: &K) -> bool;

    /// Current number of entries.
    fn len(&self) -> usize;

    /// Check if the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum entries allowed by the policy.
    fn capacity(&self) -> usize;
}

/// Mutable store operations for concurrent backends (interior mutability).
pub trait ConcurrentStore<K, V>: StoreCore<K, V> + Send + Sync {
    /// Insert or update a value. Returns the previous value if present.
    /// Returns `StoreFull` if at capacity and inserting a new key.
    fn try_insert(&self, key: K, value: Arc<V>) -> Result<Option<Arc<V>>, StoreFull>;

    /// Remove a value by key.
    fn remove(&self, key: &K) -> Option<Arc<V>>;

    /// Remove a value by key only if `predicate` accepts the stored value.
    ///
    /// The check and the removal happen under one write lock.
    fn remove_if<F>(&self, key: &K, predicate: F) -> Option<Arc<V>>
    where
        F: FnOnce(&Arc<V>) -> bool;

    /// Remove all entries.
    fn clear(&self);

    /// Snapshot of the keys currently stored.
    fn keys(&self) -> Vec<K>;

    /// Snapshot of the entries currently stored.
    fn entries(&self) -> Vec<(K, Arc<V>)>;
}
