//! Reclaimable value holders and the sweeper that purges them.
//!
//! ## Architecture
//!
//! ```text
//!   owner drops last Arc<Tracked<T>>
//!            │
//!            ▼
//!   Tracked::drop ── fires every ReleaseHook ──► SweeperHandle::enqueue(cleanup)
//!                                                       │
//!                                                       ▼  (MPSC queue)
//!                                              Sweeper thread runs cleanup:
//!                                              "remove key K from cache C
//!                                               if its holder is still dead"
//! ```
//!
//! Rust has no tracing collector to tell us when a referent goes away, so the
//! weak tier works from an explicit release signal: values that live in a
//! [`WeakCache`](crate::policy::weak::WeakCache) or a
//! [`CanonicalSet`](crate::ds::canonical::CanonicalSet) implement
//! [`Reclaimable`], and the provided [`Tracked`] wrapper fires its registered
//! hooks from `Drop`. The soft tier has no owner signal at all; the cache
//! clears [`SoftRef`] holders itself under simulated memory pressure and
//! queues the same kind of cleanup.
//!
//! Every holder also reads as absent once cleared, and caches purge such
//! entries on the next read, so a stopped or missing sweeper only delays
//! cleanup.
//!
//! ## Key Components
//!
//! - [`ReclaimableRef`]: a holder whose referent may disappear.
//! - [`SoftRef`] / [`WeakRef`]: the soft and weak holders.
//! - [`Reclaimable`] / [`Tracked`]: owner-side release notification.
//! - [`ReleaseHook`] / [`HookTag`]: a cleanup job bound to the sweeper that
//!   will run it, optionally named after the entry it cleans up.
//! - [`Sweeper`] / [`SweeperHandle`]: the background worker and its queue.

pub mod sweeper;

use std::borrow::Borrow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

pub use sweeper::{Cleanup, Sweeper, SweeperConfig, SweeperHandle};

// ---------------------------------------------------------------------------
// Holders
// ---------------------------------------------------------------------------

/// A value holder whose referent may be reclaimed behind the owner's back.
pub trait ReclaimableRef<V> {
    /// Returns the referent if it is still live.
    fn get(&self) -> Option<Arc<V>>;

    /// Returns `true` once the referent is gone for good.
    fn is_cleared(&self) -> bool;
}

/// Holder that keeps its value strongly until the cache decides to drop it.
///
/// Carries an access stamp so the owning cache can pick the least recently
/// used holders when it needs to shed memory.
pub struct SoftRef<V> {
    value: Mutex<Option<Arc<V>>>,
    stamp: AtomicU64,
}

impl<V> SoftRef<V> {
    /// Creates a live holder stamped with `stamp`.
    pub fn new(value: Arc<V>, stamp: u64) -> Self {
        Self {
            value: Mutex::new(Some(value)),
            stamp: AtomicU64::new(stamp),
        }
    }

    /// Records an access at `stamp`.
    #[inline]
    pub fn touch(&self, stamp: u64) {
        self.stamp.store(stamp, Ordering::Relaxed);
    }

    /// Returns the most recent access stamp.
    #[inline]
    pub fn stamp(&self) -> u64 {
        self.stamp.load(Ordering::Relaxed)
    }

    /// Drops the referent. Returns `true` if this call cleared it.
    pub fn clear(&self) -> bool {
        self.value.lock().take().is_some()
    }
}

impl<V> ReclaimableRef<V> for SoftRef<V> {
    fn get(&self) -> Option<Arc<V>> {
        self.value.lock().clone()
    }

    fn is_cleared(&self) -> bool {
        self.value.lock().is_none()
    }
}

impl<V> fmt::Debug for SoftRef<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SoftRef")
            .field("cleared", &self.is_cleared())
            .field("stamp", &self.stamp())
            .finish()
    }
}

/// Holder that never keeps its referent alive.
pub struct WeakRef<V>(Weak<V>);

impl<V> WeakRef<V> {
    /// Creates a holder observing `value`.
    pub fn new(value: &Arc<V>) -> Self {
        Self(Arc::downgrade(value))
    }

    /// Returns `true` if this holder observes the same allocation as `value`.
    pub fn refers_to(&self, value: &Arc<V>) -> bool {
        std::ptr::eq(self.0.as_ptr(), Arc::as_ptr(value))
    }
}

impl<V> ReclaimableRef<V> for WeakRef<V> {
    fn get(&self) -> Option<Arc<V>> {
        self.0.upgrade()
    }

    fn is_cleared(&self) -> bool {
        self.0.strong_count() == 0
    }
}

impl<V> fmt::Debug for WeakRef<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRef")
            .field("cleared", &self.is_cleared())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Release notification
// ---------------------------------------------------------------------------

/// Identifies the entry a [`ReleaseHook`] cleans up.
///
/// `owner` is the address of the collection's shared state and `slot` names
/// the entry within it. A hook keeps a `Weak` to that state, so the address
/// cannot be reused by another collection while the hook is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookTag {
    owner: usize,
    slot: u64,
}

impl HookTag {
    /// Tags the entry `slot` of the collection whose state lives at `owner`.
    pub fn new<S>(owner: *const S, slot: u64) -> Self {
        Self {
            owner: owner.cast::<()>() as usize,
            slot,
        }
    }
}

/// A cleanup job bound to the sweeper queue that will run it.
pub struct ReleaseHook {
    queue: SweeperHandle,
    tag: Option<HookTag>,
    cleanup: Cleanup,
}

impl ReleaseHook {
    /// Binds `cleanup` to `queue`.
    pub fn new(queue: SweeperHandle, cleanup: Cleanup) -> Self {
        Self {
            queue,
            tag: None,
            cleanup,
        }
    }

    /// Binds `cleanup` to `queue` for the entry named by `tag`.
    ///
    /// Registering a tagged hook replaces any hook already registered on the
    /// same value under an equal tag.
    pub fn tagged(queue: SweeperHandle, tag: HookTag, cleanup: Cleanup) -> Self {
        Self {
            queue,
            tag: Some(tag),
            cleanup,
        }
    }

    /// Hands the cleanup to the sweeper.
    ///
    /// If the sweeper is gone the job is dropped; the owning collection then
    /// purges the dead entry on its next read instead.
    pub fn fire(self) {
        if !self.queue.enqueue(self.cleanup) {
            tracing::debug!("sweeper stopped, leaving dead entry for lazy purge");
        }
    }
}

impl fmt::Debug for ReleaseHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseHook")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// A value that tells interested collections when its last owner is gone.
///
/// Implemented by [`Tracked`]. Weak-tier collections register a
/// [`ReleaseHook`] for every entry they store; the value must fire each hook
/// exactly once, when it is dropped, and must keep at most one hook per
/// [`HookTag`].
pub trait Reclaimable {
    /// Registers `hook` to fire when this value is dropped.
    fn on_release(&self, hook: ReleaseHook);
}

/// Wrapper that makes any value [`Reclaimable`].
///
/// Equality and hashing of the wrapper are those of the inner value, and it
/// borrows as `T`, so collections of `Tracked<T>` can be queried with a
/// plain `&T`.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use refcache::reclaim::Tracked;
///
/// let name = Arc::new(Tracked::new(String::from("EPSG:4326")));
/// assert_eq!(name.len(), 9);
/// assert_eq!(*name, Tracked::new(String::from("EPSG:4326")));
/// ```
pub struct Tracked<T> {
    value: T,
    hooks: Mutex<Vec<ReleaseHook>>,
}

impl<T> Tracked<T> {
    /// Wraps `value` with no hooks registered.
    pub fn new(value: T) -> Self {
        Self {
            value,
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Returns a reference to the wrapped value.
    #[inline]
    pub fn get(&self) -> &T {
        &self.value
    }

    /// Number of hooks waiting for this value to be dropped.
    pub fn pending_hooks(&self) -> usize {
        self.hooks.lock().len()
    }
}

impl<T> Reclaimable for Tracked<T> {
    fn on_release(&self, hook: ReleaseHook) {
        let mut hooks = self.hooks.lock();
        let existing = hook
            .tag
            .and_then(|tag| hooks.iter().position(|held| held.tag == Some(tag)));
        match existing {
            Some(index) => hooks[index] = hook,
            None => hooks.push(hook),
        }
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        for hook in self.hooks.get_mut().drain(..) {
            hook.fire();
        }
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Borrow<T> for Tracked<T> {
    #[inline]
    fn borrow(&self) -> &T {
        &self.value
    }
}

impl<T> From<T> for Tracked<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: PartialEq> PartialEq for Tracked<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for Tracked<T> {}

impl<T: Hash> Hash for Tracked<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tracked").field(&self.value).finish()
    }
}

impl<T: fmt::Display> fmt::Display for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}
