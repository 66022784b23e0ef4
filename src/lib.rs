//! refcache: keyed object caches with strong, soft and weak reference
//! policies, per-key write locks, and weak canonicalizing sets.
//!
//! ## Layout
//!
//! ```text
//!   traits    ObjectCache contract, WriteGuard, DEFAULT_CAPACITY
//!   policy    NullCache, BoundedCache, SoftCache, WeakCache, ChainedCache
//!   builder   CachePolicy (by name), CacheConfig, CacheBuilder, Cache
//!   ds        KeyLockTable (per-key reentrant locks), CanonicalSet
//!   reclaim   SoftRef / WeakRef holders, Tracked, Sweeper
//!   store     ConcurrentHashMapStore, the key → holder map under each cache
//!   error     LockStateError, ConfigError, CleanupError
//! ```
//!
//! Values are shared as `Arc<V>`. Reclaimed values read as absent; nothing
//! in the crate reports absence as an error.
//!
//! Diagnostics go through `tracing`. The crate installs no subscriber.

pub mod builder;
pub mod ds;
pub mod error;
pub mod policy;
pub mod prelude;
pub mod reclaim;
pub mod store;
pub mod traits;
