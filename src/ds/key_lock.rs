//! Per-key reentrant write locks.
//!
//! ## Architecture
//!
//! ```text
//!   KeyLockTable<K>
//!   ┌──────────────────────────────────────────────┐
//!   │ table: Mutex<FxHashMap<K, LockSlot>>         │  short-held, structural only
//!   │                                              │
//!   │   "a" ──► LockSlot { refs: 2, lock ─────┐ }  │
//!   │   "b" ──► LockSlot { refs: 1, lock ──┐  │ }  │
//!   └──────────────────────────────────────┼──┼────┘
//!                                          ▼  ▼
//!                          KeyLock { state: Mutex<LockState>, released: Condvar }
//!                                    owner: Option<ThreadId>, holds: usize
//! ```
//!
//! `lock(key)` finds or creates the slot and bumps `refs` under the table
//! mutex, then drops the table mutex before blocking on the key's own lock.
//! A thread waiting on key A therefore never stalls a thread locking key B.
//!
//! `refs` counts every outstanding `lock` call that has not been matched by an
//! `unlock`, waiters included. It only changes under the table mutex, so when
//! it reaches zero no thread holds or is about to wait on the record and the
//! slot can be dropped from the table safely.
//!
//! ## Thread Safety
//!
//! The table is `Send + Sync`. Ownership is per thread: the thread that
//! acquired a key must release it, and may acquire it again reentrantly.
//!
//! ## Example Usage
//!
//! ```
//! use refcache::ds::KeyLockTable;
//!
//! let locks = KeyLockTable::new();
//! locks.lock(&"tile:7");
//! locks.lock(&"tile:7"); // reentrant
//! assert_eq!(locks.hold_count(&"tile:7"), 2);
//!
//! locks.unlock(&"tile:7").unwrap();
//! locks.unlock(&"tile:7").unwrap();
//! assert!(locks.is_empty());
//! assert!(locks.unlock(&"tile:7").is_err());
//! ```

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;

use crate::error::LockStateError;

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    holds: usize,
}

/// A reentrant lock whose acquire and release are separate calls.
#[derive(Debug, Default)]
struct KeyLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl KeyLock {
    fn acquire(&self, me: ThreadId) {
        let mut state = self.state.lock();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(me);
                    state.holds = 1;
                    return;
                },
                Some(owner) if owner == me => {
                    state.holds += 1;
                    return;
                },
                Some(_) => self.released.wait(&mut state),
            }
        }
    }

    fn release(&self, me: ThreadId) -> Result<(), LockStateError> {
        let mut state = self.state.lock();
        match state.owner {
            None => return Err(LockStateError::NotLocked),
            Some(owner) if owner != me => return Err(LockStateError::NotOwner),
            Some(_) => {},
        }
        if state.holds == 0 {
            return Err(LockStateError::NotLocked);
        }
        state.holds -= 1;
        if state.holds == 0 {
            state.owner = None;
            self.released.notify_one();
        }
        Ok(())
    }
}

#[derive(Debug)]
struct LockSlot {
    lock: Arc<KeyLock>,
    refs: usize,
}

/// Lazily populated map from key to reentrant write lock.
pub struct KeyLockTable<K> {
    table: Mutex<FxHashMap<K, LockSlot>>,
}

impl<K> KeyLockTable<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self {
            table: Mutex::new(FxHashMap::default()),
        }
    }

    /// Blocks until the calling thread owns the lock for `key`.
    ///
    /// Reentrant: a thread that already owns `key` returns immediately with
    /// the hold count incremented. There is no timeout.
    pub fn lock(&self, key: &K) {
        let record = {
            let mut table = self.table.lock();
            let slot = table.entry(key.clone()).or_insert_with(|| LockSlot {
                lock: Arc::new(KeyLock::default()),
                refs: 0,
            });
            slot.refs += 1;
            Arc::clone(&slot.lock)
        };
        record.acquire(thread::current().id());
    }

    /// Locks `key` and returns a guard that releases it on drop.
    pub fn guard(&self, key: &K) -> KeyGuard<'_, K> {
        self.lock(key);
        KeyGuard {
            table: self,
            key: key.clone(),
            _not_send: PhantomData,
        }
    }

    /// Releases one hold of `key` taken by the calling thread.
    ///
    /// Fails with [`LockStateError::NotLocked`] when no lock is recorded for
    /// `key`, and with [`LockStateError::NotOwner`] when another thread holds it.
    pub fn unlock(&self, key: &K) -> Result<(), LockStateError> {
        let me = thread::current().id();
        let mut table = self.table.lock();
        let slot = table.get_mut(key).ok_or(LockStateError::NotLocked)?;
        slot.lock.release(me)?;
        slot.refs -= 1;
        if slot.refs == 0 {
            table.remove(key);
        }
        Ok(())
    }

    /// Returns `true` if some thread currently owns `key`.
    pub fn is_locked(&self, key: &K) -> bool {
        let record = match self.table.lock().get(key) {
            Some(slot) => Arc::clone(&slot.lock),
            None => return false,
        };
        record.state.lock().owner.is_some()
    }

    /// Returns how many times the calling thread holds `key` (0 if it does not).
    pub fn hold_count(&self, key: &K) -> usize {
        let record = match self.table.lock().get(key) {
            Some(slot) => Arc::clone(&slot.lock),
            None => return 0,
        };
        let state = record.state.lock();
        if state.owner == Some(thread::current().id()) {
            state.holds
        } else {
            0
        }
    }

    /// Number of live lock records (held or awaited keys).
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Returns `true` if no key is held or awaited.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Scoped hold on one key of a [`KeyLockTable`].
pub struct KeyGuard<'a, K>
where
    K: Eq + Hash + Clone,
{
    table: &'a KeyLockTable<K>,
    key: K,
    _not_send: PhantomData<*const ()>,
}

impl<K> Drop for KeyGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        if let Err(err) = self.table.unlock(&self.key) {
            tracing::error!(error = %err, "key guard found its lock already released");
        }
    }
}

impl<K> Default for KeyLockTable<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for KeyLockTable<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyLockTable")
            .field("records", &self.table.lock().len())
            .finish_non_exhaustive()
    }
}
