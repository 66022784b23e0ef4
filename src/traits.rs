//! # Object Cache Contract
//!
//! This module defines [`ObjectCache`], the one contract shared by every cache
//! backend in the crate, plus the scoped [`WriteGuard`] used for the
//! check-then-compute pattern.
//!
//! ## Architecture
//!
//! ```text
//!                     ┌──────────────────────────────────────────────┐
//!                     │              ObjectCache<K, V>               │
//!                     │                                              │
//!                     │  get(&K) → Option<Arc<V>>                    │
//!                     │  peek(&K) → Option<Arc<V>>                   │
//!                     │  put(K, Arc<V>)                              │
//!                     │  remove(&K) → Option<Arc<V>>                 │
//!                     │  clear()                                     │
//!                     │  keys() → HashSet<K>      (snapshot)         │
//!                     │  contains_key(&K) → bool                     │
//!                     │  write_lock(&K) / write_unlock(&K)           │
//!                     │  write_guard(&K) → WriteGuard                │
//!                     │  get_or_try_insert_with(K, f)                │
//!                     └──────────────────────┬───────────────────────┘
//!                                            │
//!        ┌──────────────────┬────────────────┼─────────────────┬──────────────────┐
//!        ▼                  ▼                ▼                 ▼                  ▼
//!   NullCache         BoundedCache       SoftCache         WeakCache        ChainedCache
//!   (stores nothing)  (strong, fixed N)  (soft holders)    (weak holders)   (two levels)
//! ```
//!
//! ## Locking Discipline
//!
//! `get`/`put` never take the per-key write lock on the caller's behalf (apart
//! from the brief internal acquisition inside `put`). A caller that needs
//! "compute at most once per key" wraps the sequence itself:
//!
//! ```text
//!   get(k) ── hit ──────────────────────────────────────────────► value
//!     │ miss
//!     ▼
//!   write_lock(k) ── peek(k) ── hit (someone filled it) ─────────► value
//!                      │ miss
//!                      ▼
//!                   compute ── put(k, v) ── write_unlock(k) ─────► v
//! ```
//!
//! [`ObjectCache::get_or_try_insert_with`] implements exactly that, releasing
//! the lock on every exit path through [`WriteGuard`].
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use refcache::policy::bounded::BoundedCache;
//! use refcache::traits::ObjectCache;
//!
//! fn lookup<C: ObjectCache<String, String>>(cache: &C, code: &str) -> Arc<String> {
//!     cache
//!         .get_or_try_insert_with(code.to_string(), || {
//!             Ok::<_, std::convert::Infallible>(Arc::new(format!("resolved {code}")))
//!         })
//!         .unwrap()
//! }
//!
//! let cache = BoundedCache::new(10);
//! let first = lookup(&cache, "EPSG:4326");
//! let second = lookup(&cache, "EPSG:4326");
//! assert!(Arc::ptr_eq(&first, &second));
//! ```

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::LockStateError;

/// Default entry limit for bounded caches when none is given.
pub const DEFAULT_CAPACITY: usize = 50;

/// Keyed object cache with per-key write locking.
///
/// All methods take `&self`; implementations are internally synchronized and
/// meant to be shared across threads (typically behind an `Arc`).
///
/// Absence is always `None`. The only error in the contract is
/// [`LockStateError`], returned when a write lock is released out of
/// discipline.
pub trait ObjectCache<K, V> {
    /// Returns the live value for `key`.
    ///
    /// A holder whose referent has been reclaimed reads as `None` and is
    /// purged as a side effect.
    fn get(&self, key: &K) -> Option<Arc<V>>;

    /// Like [`get`](Self::get), for re-checking a key while holding its write
    /// lock. Never refreshes recency information.
    fn peek(&self, key: &K) -> Option<Arc<V>>;

    /// Installs `value` for `key`, replacing any previous holder.
    ///
    /// Backends may decline silently (a full bounded cache, the null cache);
    /// a later `get` then returns `None`.
    fn put(&self, key: K, value: Arc<V>);

    /// Drops the entry for `key`, returning its value if it was still live.
    ///
    /// Leaves the key's write lock alone: lock records already go away on
    /// their last unlock.
    fn remove(&self, key: &K) -> Option<Arc<V>>;

    /// Drops every entry.
    fn clear(&self);

    /// Returns a point-in-time copy of the keys with live values.
    fn keys(&self) -> HashSet<K>;

    /// Returns `true` if `key` maps to a live value.
    fn contains_key(&self, key: &K) -> bool;

    /// Number of mapped entries.
    ///
    /// For reclaiming backends this may count entries whose values were
    /// reclaimed but not yet purged.
    fn len(&self) -> usize;

    /// Returns `true` if no entries are mapped.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks until the calling thread holds the write lock for `key`.
    ///
    /// Reentrant. Every call must be matched by one
    /// [`write_unlock`](Self::write_unlock) on the same thread; prefer
    /// [`write_guard`](Self::write_guard).
    fn write_lock(&self, key: &K);

    /// Releases one hold of the write lock for `key`.
    ///
    /// Fails if the calling thread does not hold it.
    fn write_unlock(&self, key: &K) -> Result<(), LockStateError>;

    /// Acquires the write lock for `key`, releasing it when the guard drops.
    fn write_guard(&self, key: &K) -> WriteGuard<'_, K, V, Self>
    where
        Self: Sized,
        K: Clone,
    {
        self.write_lock(key);
        WriteGuard {
            cache: self,
            key: key.clone(),
            _marker: PhantomData,
        }
    }

    /// Returns the cached value for `key`, computing and storing it with `f`
    /// if absent.
    ///
    /// Concurrent callers for the same key compute at most once between
    /// them (as long as the backend retains the value). Errors from `f` are
    /// returned unchanged and nothing is stored.
    fn get_or_try_insert_with<F, E>(&self, key: K, f: F) -> Result<Arc<V>, E>
    where
        Self: Sized,
        K: Clone,
        F: FnOnce() -> Result<Arc<V>, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let _guard = self.write_guard(&key);
        if let Some(value) = self.peek(&key) {
            return Ok(value);
        }
        let value = f()?;
        self.put(key, Arc::clone(&value));
        Ok(value)
    }
}

/// Scoped hold of one key's write lock.
///
/// Created by [`ObjectCache::write_guard`]. Not `Send`: the lock belongs to
/// the thread that took it.
pub struct WriteGuard<'a, K, V, C>
where
    C: ObjectCache<K, V> + ?Sized,
{
    cache: &'a C,
    key: K,
    _marker: PhantomData<(fn() -> V, *const ())>,
}

impl<K, V, C> WriteGuard<'_, K, V, C>
where
    C: ObjectCache<K, V> + ?Sized,
{
    /// The key this guard holds.
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K, V, C> Drop for WriteGuard<'_, K, V, C>
where
    C: ObjectCache<K, V> + ?Sized,
{
    fn drop(&mut self) {
        if let Err(err) = self.cache.write_unlock(&self.key) {
            // Someone released our hold by hand.
            tracing::error!(error = %err, "write guard found its lock already released");
        }
    }
}
