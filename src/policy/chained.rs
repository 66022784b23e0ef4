//! Two-level cache built from any pair of backends.
//!
//! ```text
//!   get(k) ──► level1 ── hit ─────────────────────────► v
//!                │ miss
//!                ▼
//!              level2 ── hit ──► level1.put(k, v) ────► v
//!                │ miss
//!                ▼
//!              None
//!
//!   put(k, v) ──► level1.put + level2.put
//!   write_lock / write_unlock ──► level2 only
//! ```
//!
//! The usual pairing is a small [`BoundedCache`](super::bounded::BoundedCache)
//! in front of a [`SoftCache`](super::soft::SoftCache) or
//! [`WeakCache`](super::weak::WeakCache): recently used values stay strongly
//! reachable while the bulk can be reclaimed. Locks live in the second level
//! only, so both levels share one lock per key.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use refcache::policy::bounded::BoundedCache;
//! use refcache::policy::chained::ChainedCache;
//! use refcache::policy::soft::SoftCache;
//! use refcache::traits::ObjectCache;
//!
//! let cache = ChainedCache::new(BoundedCache::new(1), SoftCache::new());
//! cache.put("a", Arc::new(1));
//! cache.put("b", Arc::new(2)); // level 1 is full, level 2 takes it
//!
//! assert_eq!(cache.first().len(), 1);
//! assert_eq!(cache.get(&"b").as_deref(), Some(&2));
//! ```

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;

use crate::error::LockStateError;
use crate::traits::ObjectCache;

/// Cache that consults `first`, then `second`.
#[derive(Debug, Default)]
pub struct ChainedCache<C1, C2> {
    first: C1,
    second: C2,
}

impl<C1, C2> ChainedCache<C1, C2> {
    /// Chains `first` in front of `second`.
    pub fn new(first: C1, second: C2) -> Self {
        Self { first, second }
    }

    /// The first (fast) level.
    pub fn first(&self) -> &C1 {
        &self.first
    }

    /// The second level, which also owns the write locks.
    pub fn second(&self) -> &C2 {
        &self.second
    }

    /// Splits the chain back into its levels.
    pub fn into_inner(self) -> (C1, C2) {
        (self.first, self.second)
    }
}

impl<K, V, C1, C2> ObjectCache<K, V> for ChainedCache<C1, C2>
where
    K: Eq + Hash + Clone,
    C1: ObjectCache<K, V>,
    C2: ObjectCache<K, V>,
{
    fn get(&self, key: &K) -> Option<Arc<V>> {
        if let Some(value) = self.first.get(key) {
            return Some(value);
        }
        let value = self.second.get(key)?;
        self.first.put(key.clone(), Arc::clone(&value));
        Some(value)
    }

    fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.first.peek(key).or_else(|| self.second.peek(key))
    }

    fn put(&self, key: K, value: Arc<V>) {
        self.first.put(key.clone(), Arc::clone(&value));
        self.second.put(key, value);
    }

    fn remove(&self, key: &K) -> Option<Arc<V>> {
        let first = self.first.remove(key);
        let second = self.second.remove(key);
        first.or(second)
    }

    fn clear(&self) {
        self.first.clear();
        self.second.clear();
    }

    fn keys(&self) -> HashSet<K> {
        let mut keys = self.second.keys();
        keys.extend(self.first.keys());
        keys
    }

    fn contains_key(&self, key: &K) -> bool {
        self.first.contains_key(key) || self.second.contains_key(key)
    }

    /// Number of distinct keys across both levels (builds a key snapshot).
    fn len(&self) -> usize {
        self.keys().len()
    }

    fn is_empty(&self) -> bool {
        self.first.is_empty() && self.second.is_empty()
    }

    fn write_lock(&self, key: &K) {
        self.second.write_lock(key);
    }

    fn write_unlock(&self, key: &K) -> Result<(), LockStateError> {
        self.second.write_unlock(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::bounded::BoundedCache;
    use crate::policy::null::NullCache;
    use crate::policy::soft::SoftCache;

    #[test]
    fn second_level_hit_is_promoted() {
        let cache = ChainedCache::new(BoundedCache::new(4), SoftCache::new());
        cache.second().put("k", Arc::new(1));
        assert!(cache.first().get(&"k").is_none());

        assert_eq!(cache.get(&"k").as_deref(), Some(&1));
        assert_eq!(cache.first().get(&"k").as_deref(), Some(&1));
    }

    #[test]
    fn peek_does_not_promote() {
        let cache = ChainedCache::new(BoundedCache::new(4), SoftCache::new());
        cache.second().put("k", Arc::new(1));
        assert_eq!(cache.peek(&"k").as_deref(), Some(&1));
        assert!(cache.first().peek(&"k").is_none());
    }

    #[test]
    fn put_writes_both_levels_and_remove_clears_both() {
        let cache = ChainedCache::new(BoundedCache::new(4), BoundedCache::new(4));
        cache.put(1u32, Arc::new("one"));
        assert!(cache.first().contains_key(&1));
        assert!(cache.second().contains_key(&1));

        assert_eq!(cache.remove(&1).as_deref(), Some(&"one"));
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_are_the_union() {
        let cache = ChainedCache::new(BoundedCache::new(1), BoundedCache::new(10));
        cache.put(1u8, Arc::new(()));
        cache.put(2u8, Arc::new(()));
        assert_eq!(cache.keys(), HashSet::from([1, 2]));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn locks_belong_to_second_level() {
        let cache: ChainedCache<BoundedCache<u32, u32>, NullCache<u32, u32>> =
            ChainedCache::new(BoundedCache::new(4), NullCache::new());
        cache.write_lock(&3);
        assert!(cache.second().is_write_locked(&3));
        assert!(!cache.first().is_write_locked(&3));
        cache.write_unlock(&3).unwrap();
        assert_eq!(cache.write_unlock(&3), Err(LockStateError::NotLocked));
    }
}
