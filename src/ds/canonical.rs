//! Weak canonicalizing set.
//!
//! Hands out one shared representative per equivalence class of values, so
//! that equal immutable objects created independently (parsed identifiers,
//! datum definitions, unit descriptors) collapse to a single allocation.
//! The set never keeps a representative alive on its own: once every owner
//! drops it, the next `unique` of an equal value installs a fresh one.
//!
//! ## Architecture
//!
//! ```text
//!   CanonicalSet<T>
//!   ┌─────────────────────────────────────────────────────────┐
//!   │ table: Arc<Mutex<WeakHashSet<Weak<T>>>>                 │
//!   │                                                         │
//!   │   [ Weak(a₁), Weak(b₁), Weak(dead), Weak(c₁), ... ]     │
//!   └─────────────────────────────────────────────────────────┘
//!            ▲
//!            │ remove_expired() on release, via the sweeper
//!   Tracked<T>::drop
//! ```
//!
//! The table is a [`weak_table::WeakHashSet`]: lookups hash and compare the
//! live referents, and the set drops expired slots itself when it grows.
//! With a sweeper attached, a representative's release also queues a full
//! `remove_expired` pass, registered once per value and set.
//!
//! One mutex guards the whole table. Operations are short and never call
//! user code other than `Hash` and `Eq` while holding it.
//!
//! ## Example Usage
//!
//! ```
//! use std::sync::Arc;
//! use refcache::ds::CanonicalSet;
//! use refcache::reclaim::Tracked;
//!
//! let set = CanonicalSet::new();
//! let a = set.intern(Tracked::new(String::from("EPSG:4326")));
//! let b = set.intern(Tracked::new(String::from("EPSG:4326")));
//! assert!(Arc::ptr_eq(&a, &b));
//!
//! // Lookup by the plain inner value, without inserting.
//! assert!(set.get(&String::from("EPSG:4326")).is_some());
//! assert!(set.get(&String::from("EPSG:3857")).is_none());
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use weak_table::WeakHashSet;

use crate::reclaim::{HookTag, Reclaimable, ReleaseHook, SweeperHandle};

type Table<T> = Mutex<WeakHashSet<Weak<T>>>;

/// Set of weakly held canonical representatives.
pub struct CanonicalSet<T> {
    table: Arc<Table<T>>,
    sweeper: Option<SweeperHandle>,
}

impl<T> CanonicalSet<T>
where
    T: Eq + Hash + Reclaimable + Send + Sync + 'static,
{
    /// Creates an empty set that prunes dead entries lazily.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates an empty set whose dead entries are pruned by `sweeper`.
    pub fn with_sweeper(sweeper: SweeperHandle) -> Self {
        Self::build(Some(sweeper))
    }

    fn build(sweeper: Option<SweeperHandle>) -> Self {
        Self {
            table: Arc::new(Mutex::new(WeakHashSet::new())),
            sweeper,
        }
    }

    /// Returns the representative equal to `value`, without inserting.
    pub fn get<Q>(&self, value: &Q) -> Option<Arc<T>>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.lock().get(value)
    }

    /// Returns `true` if a live representative equal to `value` exists.
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.lock().contains(value)
    }

    /// Returns the representative equal to `value`, installing `value` itself
    /// if there is none.
    ///
    /// When an equal representative exists, `value` is dropped and the
    /// existing one is returned, so the first value installed wins.
    pub fn unique(&self, value: Arc<T>) -> Arc<T> {
        {
            let mut table = self.table.lock();
            if let Some(existing) = table.get(&*value) {
                return existing;
            }
            table.insert(Arc::clone(&value));
        }
        self.watch(&value);
        value
    }

    /// Replaces every slot of `values` with its canonical representative.
    ///
    /// Equal elements within the slice end up pointer-identical.
    pub fn uniques(&self, values: &mut [Arc<T>]) {
        for slot in values.iter_mut() {
            *slot = self.unique(Arc::clone(slot));
        }
    }

    /// Wraps `value` in an `Arc` and canonicalizes it.
    pub fn intern(&self, value: T) -> Arc<T> {
        self.unique(Arc::new(value))
    }

    /// Number of live representatives.
    pub fn len(&self) -> usize {
        self.table.lock().iter().count()
    }

    /// Returns `true` if no live representative exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry. Representatives stay valid for their owners.
    pub fn clear(&self) {
        *self.table.lock() = WeakHashSet::new();
    }

    fn watch(&self, value: &T) {
        let Some(sweeper) = &self.sweeper else {
            return;
        };
        let tag = HookTag::new(Arc::as_ptr(&self.table), 0);
        let table = Arc::downgrade(&self.table);
        value.on_release(ReleaseHook::tagged(
            sweeper.clone(),
            tag,
            Box::new(move || {
                if let Some(table) = table.upgrade() {
                    table.lock().remove_expired();
                }
                Ok(())
            }),
        ));
    }
}

impl<T> Default for CanonicalSet<T>
where
    T: Eq + Hash + Reclaimable + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for CanonicalSet<T>
where
    T: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalSet")
            .field("slots", &self.table.lock().len())
            .field("sweeper", &self.sweeper.is_some())
            .finish()
    }
}
