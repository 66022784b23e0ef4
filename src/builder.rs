//! Unified cache builder for all reference policies.
//!
//! Caches can be created by policy value or by policy name, so the caching
//! strategy of an application can come from configuration:
//!
//! | Name(s)              | Policy                 | Backend                      |
//! |----------------------|------------------------|------------------------------|
//! | `none`, `null`       | [`CachePolicy::Null`]    | [`NullCache`]                |
//! | `fixed`, `bounded`   | [`CachePolicy::Bounded`] | [`BoundedCache`] (capacity)  |
//! | `soft`, `default`    | [`CachePolicy::Soft`]    | [`SoftCache`] (soft limit)   |
//! | `weak`               | [`CachePolicy::Weak`]    | [`WeakCache`]                |
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use refcache::builder::{CacheBuilder, CachePolicy};
//! use refcache::traits::ObjectCache;
//!
//! let policy: CachePolicy = "fixed".parse().unwrap();
//! let cache = CacheBuilder::new(100).try_build::<u64, String>(policy).unwrap();
//! cache.put(1, Arc::new("hello".to_string()));
//! assert_eq!(cache.get(&1).as_deref(), Some(&"hello".to_string()));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ConfigError, LockStateError};
use crate::policy::bounded::BoundedCache;
use crate::policy::null::NullCache;
use crate::policy::soft::SoftCache;
use crate::policy::weak::WeakCache;
use crate::reclaim::{Reclaimable, SweeperHandle};
use crate::traits::{DEFAULT_CAPACITY, ObjectCache};

/// Available reference policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CachePolicy {
    /// Store nothing.
    Null,
    /// Strong references, fixed capacity, no eviction.
    Bounded,
    /// Soft references shed under simulated memory pressure.
    #[default]
    Soft,
    /// Weak references that live as long as their owners.
    Weak,
}

impl CachePolicy {
    /// Canonical configuration name.
    pub fn name(self) -> &'static str {
        match self {
            CachePolicy::Null => "none",
            CachePolicy::Bounded => "fixed",
            CachePolicy::Soft => "soft",
            CachePolicy::Weak => "weak",
        }
    }
}

impl fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CachePolicy {
    type Err = ConfigError;

    /// Parses a policy name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "null" => Ok(CachePolicy::Null),
            "fixed" | "bounded" => Ok(CachePolicy::Bounded),
            "soft" | "default" => Ok(CachePolicy::Soft),
            "weak" => Ok(CachePolicy::Weak),
            other => Err(ConfigError::new(format!("unknown cache policy: {other:?}"))),
        }
    }
}

/// Declarative cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Reference policy.
    pub policy: CachePolicy,
    /// Entry limit for [`CachePolicy::Bounded`].
    pub capacity: usize,
    /// Pressure threshold for [`CachePolicy::Soft`]; `None` means explicit
    /// reclamation only.
    pub soft_limit: Option<usize>,
}

impl Default for CacheConfig {
    /// Soft policy, capacity [`DEFAULT_CAPACITY`], no soft limit.
    fn default() -> Self {
        Self {
            policy: CachePolicy::default(),
            capacity: DEFAULT_CAPACITY,
            soft_limit: None,
        }
    }
}

impl CacheConfig {
    /// Checks the configuration for values no backend can honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.soft_limit == Some(0) {
            return Err(ConfigError::new("soft_limit must be greater than zero"));
        }
        if self.policy == CachePolicy::Bounded && self.capacity == 0 {
            return Err(ConfigError::new(
                "bounded cache needs a capacity greater than zero (use the \"none\" policy instead)",
            ));
        }
        Ok(())
    }
}

/// Cache of any policy behind one type.
pub struct Cache<K, V> {
    policy: CachePolicy,
    inner: CacheInner<K, V>,
}

enum CacheInner<K, V> {
    Null(NullCache<K, V>),
    Bounded(BoundedCache<K, V>),
    Soft(SoftCache<K, V>),
    // Boxed so that only weak caches require `V: Reclaimable`.
    Weak(Box<dyn ObjectCache<K, V> + Send + Sync>),
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// The policy this cache was built with.
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Entry limit for bounded caches, `None` otherwise.
    pub fn capacity(&self) -> Option<usize> {
        match &self.inner {
            CacheInner::Bounded(bounded) => Some(bounded.capacity()),
            _ => None,
        }
    }

    /// Signals memory pressure to a soft cache: clears up to `count` least
    /// recently used values. Other policies have nothing to shed.
    pub fn reclaim(&self, count: usize) -> usize {
        match &self.inner {
            CacheInner::Soft(soft) => soft.reclaim(count),
            _ => 0,
        }
    }

    fn as_dyn(&self) -> &dyn ObjectCache<K, V> {
        match &self.inner {
            CacheInner::Null(null) => null,
            CacheInner::Bounded(bounded) => bounded,
            CacheInner::Soft(soft) => soft,
            CacheInner::Weak(weak) => &**weak,
        }
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<K, V> ObjectCache<K, V> for Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Option<Arc<V>> {
        self.as_dyn().get(key)
    }

    fn peek(&self, key: &K) -> Option<Arc<V>> {
        self.as_dyn().peek(key)
    }

    fn put(&self, key: K, value: Arc<V>) {
        self.as_dyn().put(key, value)
    }

    fn remove(&self, key: &K) -> Option<Arc<V>> {
        self.as_dyn().remove(key)
    }

    fn clear(&self) {
        self.as_dyn().clear()
    }

    fn keys(&self) -> HashSet<K> {
        self.as_dyn().keys()
    }

    fn contains_key(&self, key: &K) -> bool {
        self.as_dyn().contains_key(key)
    }

    fn len(&self) -> usize {
        self.as_dyn().len()
    }

    fn write_lock(&self, key: &K) {
        self.as_dyn().write_lock(key)
    }

    fn write_unlock(&self, key: &K) -> Result<(), LockStateError> {
        self.as_dyn().write_unlock(key)
    }
}

/// Builder for creating cache instances.
#[derive(Debug, Clone)]
pub struct CacheBuilder {
    capacity: usize,
    soft_limit: Option<usize>,
    sweeper: Option<SweeperHandle>,
}

impl Default for CacheBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl CacheBuilder {
    /// Create a new cache builder; `capacity` applies to bounded caches.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            soft_limit: None,
            sweeper: None,
        }
    }

    /// Create a builder from a validated configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            capacity: config.capacity,
            soft_limit: config.soft_limit,
            sweeper: None,
        })
    }

    /// Shed soft-cache values beyond `limit` entries.
    ///
    /// A zero limit is rejected by [`try_build`](Self::try_build) and raised
    /// to one by [`build`](Self::build).
    pub fn soft_limit(mut self, limit: usize) -> Self {
        self.soft_limit = Some(limit);
        self
    }

    /// Queue reclamation cleanups on `sweeper`.
    pub fn sweeper(mut self, sweeper: SweeperHandle) -> Self {
        self.sweeper = Some(sweeper);
        self
    }

    /// Build a cache with the specified policy.
    ///
    /// Values must be [`Reclaimable`] because `policy` may be
    /// [`CachePolicy::Weak`]; use [`try_build`](Self::try_build) for plain
    /// values.
    ///
    /// # Example
    ///
    /// ```rust
    /// use refcache::builder::{CacheBuilder, CachePolicy};
    /// use refcache::reclaim::{Sweeper, Tracked};
    ///
    /// let sweeper = Sweeper::start().unwrap();
    /// let cache = CacheBuilder::new(100)
    ///     .sweeper(sweeper.handle())
    ///     .build::<u64, Tracked<String>>(CachePolicy::Weak);
    /// assert_eq!(cache.policy(), CachePolicy::Weak);
    /// ```
    pub fn build<K, V>(self, policy: CachePolicy) -> Cache<K, V>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Reclaimable + Send + Sync + 'static,
    {
        if self.soft_limit == Some(0) {
            tracing::warn!("soft limit of zero raised to one");
        }
        let soft_limit = self.soft_limit.map(|limit| limit.max(1));
        let inner = match policy {
            CachePolicy::Null => CacheInner::Null(NullCache::new()),
            CachePolicy::Bounded => CacheInner::Bounded(BoundedCache::new(self.capacity)),
            CachePolicy::Soft => {
                CacheInner::Soft(SoftCache::with_options(soft_limit, self.sweeper))
            },
            CachePolicy::Weak => CacheInner::Weak(Box::new(match self.sweeper {
                Some(sweeper) => WeakCache::with_sweeper(sweeper),
                None => WeakCache::new(),
            })),
        };
        Self::finish(policy, self.capacity, inner)
    }

    /// Build a cache for values that cannot report their release.
    ///
    /// Fails for [`CachePolicy::Weak`], which needs [`Reclaimable`] values,
    /// and for settings [`CacheConfig::validate`] rejects.
    pub fn try_build<K, V>(self, policy: CachePolicy) -> Result<Cache<K, V>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        CacheConfig {
            policy,
            capacity: self.capacity,
            soft_limit: self.soft_limit,
        }
        .validate()?;
        let inner = match policy {
            CachePolicy::Null => CacheInner::Null(NullCache::new()),
            CachePolicy::Bounded => CacheInner::Bounded(BoundedCache::new(self.capacity)),
            CachePolicy::Soft => {
                CacheInner::Soft(SoftCache::with_options(self.soft_limit, self.sweeper))
            },
            CachePolicy::Weak => {
                return Err(ConfigError::new(
                    "weak policy requires Reclaimable values; use CacheBuilder::build",
                ));
            },
        };
        Ok(Self::finish(policy, self.capacity, inner))
    }

    /// Validate `config` and build the cache it describes.
    pub fn try_build_from_config<K, V>(config: &CacheConfig) -> Result<Cache<K, V>, ConfigError>
    where
        K: Eq + Hash + Clone + Send + Sync + 'static,
        V: Send + Sync + 'static,
    {
        Self::from_config(config)?.try_build(config.policy)
    }

    fn finish<K, V>(policy: CachePolicy, capacity: usize, inner: CacheInner<K, V>) -> Cache<K, V> {
        tracing::debug!(%policy, capacity, "cache built");
        Cache { policy, inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reclaim::Tracked;

    #[test]
    fn parses_policy_names() {
        let cases = [
            ("none", CachePolicy::Null),
            ("NULL", CachePolicy::Null),
            ("fixed", CachePolicy::Bounded),
            ("bounded", CachePolicy::Bounded),
            (" soft ", CachePolicy::Soft),
            ("default", CachePolicy::Soft),
            ("Weak", CachePolicy::Weak),
        ];
        for (name, expected) in cases {
            assert_eq!(name.parse::<CachePolicy>().unwrap(), expected, "{name}");
        }
        let err = "lru".parse::<CachePolicy>().unwrap_err();
        assert!(err.message().contains("lru"));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for policy in [
            CachePolicy::Null,
            CachePolicy::Bounded,
            CachePolicy::Soft,
            CachePolicy::Weak,
        ] {
            assert_eq!(policy.to_string().parse::<CachePolicy>().unwrap(), policy);
        }
    }

    #[test]
    fn config_defaults_and_validation() {
        let config = CacheConfig::default();
        assert_eq!(config.policy, CachePolicy::Soft);
        assert_eq!(config.capacity, 50);
        assert!(config.validate().is_ok());

        let zero_limit = CacheConfig {
            soft_limit: Some(0),
            ..CacheConfig::default()
        };
        assert!(zero_limit.validate().is_err());

        let zero_bounded = CacheConfig {
            policy: CachePolicy::Bounded,
            capacity: 0,
            soft_limit: None,
        };
        assert!(zero_bounded.validate().is_err());
    }

    #[test]
    fn all_strong_policies_basic_ops() {
        for policy in [CachePolicy::Bounded, CachePolicy::Soft] {
            let cache = CacheBuilder::new(10).try_build::<u64, String>(policy).unwrap();
            cache.put(1, Arc::new("one".to_string()));
            cache.put(2, Arc::new("two".to_string()));

            assert_eq!(cache.get(&1).as_deref(), Some(&"one".to_string()));
            assert!(cache.contains_key(&2));
            assert!(!cache.contains_key(&99));
            assert_eq!(cache.len(), 2);
            assert_eq!(cache.keys(), HashSet::from([1, 2]));

            cache.write_lock(&1);
            cache.write_unlock(&1).unwrap();
            assert!(cache.write_unlock(&1).is_err());

            cache.clear();
            assert!(cache.is_empty());
        }
    }

    #[test]
    fn null_policy_stores_nothing() {
        let cache = CacheBuilder::default()
            .try_build::<u64, u64>(CachePolicy::Null)
            .unwrap();
        cache.put(1, Arc::new(1));
        assert!(cache.get(&1).is_none());
        assert_eq!(cache.capacity(), None);
    }

    #[test]
    fn bounded_policy_uses_capacity() {
        let cache = CacheBuilder::new(2)
            .try_build::<u64, u64>(CachePolicy::Bounded)
            .unwrap();
        assert_eq!(cache.capacity(), Some(2));
        for i in 0..5 {
            cache.put(i, Arc::new(i));
        }
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn soft_policy_honours_limit() {
        let cache = CacheBuilder::new(10)
            .soft_limit(2)
            .try_build::<u64, u64>(CachePolicy::Soft)
            .unwrap();
        for i in 0..5 {
            cache.put(i, Arc::new(i));
        }
        assert_eq!(cache.keys().len(), 2);
        assert_eq!(cache.reclaim(1), 1);
        assert_eq!(cache.keys().len(), 1);
    }

    #[test]
    fn weak_policy_needs_reclaimable_values() {
        assert!(
            CacheBuilder::new(10)
                .try_build::<u64, String>(CachePolicy::Weak)
                .is_err()
        );

        let cache = CacheBuilder::new(10).build::<u64, Tracked<String>>(CachePolicy::Weak);
        let value = Arc::new(Tracked::new("held".to_string()));
        cache.put(1, Arc::clone(&value));
        assert!(cache.contains_key(&1));
        drop(value);
        assert!(!cache.contains_key(&1));
    }

    #[test]
    fn zero_soft_limit_is_rejected_or_raised() {
        let err = CacheBuilder::new(10)
            .soft_limit(0)
            .try_build::<u64, u64>(CachePolicy::Soft)
            .unwrap_err();
        assert!(err.message().contains("soft"));

        let cache = CacheBuilder::new(10)
            .soft_limit(0)
            .build::<u64, Tracked<u64>>(CachePolicy::Soft);
        let value = Arc::new(Tracked::new(7));
        cache.put(1, Arc::clone(&value));
        assert!(Arc::ptr_eq(&cache.get(&1).unwrap(), &value));
    }

    #[test]
    fn try_build_rejects_zero_bounded_capacity() {
        assert!(
            CacheBuilder::new(0)
                .try_build::<u64, u64>(CachePolicy::Bounded)
                .is_err()
        );
        assert!(
            CacheBuilder::new(0)
                .try_build::<u64, u64>(CachePolicy::Soft)
                .is_ok()
        );
    }

    #[test]
    fn builds_from_config() {
        let config = CacheConfig {
            policy: "fixed".parse().unwrap(),
            capacity: 3,
            soft_limit: None,
        };
        let cache = CacheBuilder::try_build_from_config::<u32, u32>(&config).unwrap();
        assert_eq!(cache.policy(), CachePolicy::Bounded);
        assert_eq!(cache.capacity(), Some(3));

        let invalid = CacheConfig {
            soft_limit: Some(0),
            ..CacheConfig::default()
        };
        assert!(CacheBuilder::try_build_from_config::<u32, u32>(&invalid).is_err());
    }
}
