//! Error types for the refcache library.
//!
//! ## Key Components
//!
//! - [`LockStateError`]: Returned when a per-key write lock is released without
//!   a matching acquisition. This is a caller bug, never a runtime condition.
//! - [`ConfigError`]: Returned when cache configuration is invalid
//!   (e.g. unknown policy name, zero soft limit).
//! - [`CleanupError`]: Returned by a reclamation cleanup job. The sweeper logs
//!   it and keeps going.
//!
//! Absence of a key is never an error; lookups return `Option`.
//!
//! ## Example Usage
//!
//! ```
//! use refcache::error::LockStateError;
//! use refcache::policy::bounded::BoundedCache;
//! use refcache::traits::ObjectCache;
//!
//! let cache: BoundedCache<&str, u32> = BoundedCache::new(10);
//!
//! // Releasing a lock nobody took fails loudly
//! assert_eq!(cache.write_unlock(&"k"), Err(LockStateError::NotLocked));
//!
//! cache.write_lock(&"k");
//! assert_eq!(cache.write_unlock(&"k"), Ok(()));
//! ```

use std::fmt;

// ---------------------------------------------------------------------------
// LockStateError
// ---------------------------------------------------------------------------

/// Error returned when a per-key write lock is released out of discipline.
///
/// Produced by [`ObjectCache::write_unlock`](crate::traits::ObjectCache::write_unlock)
/// and [`KeyLockTable::unlock`](crate::ds::key_lock::KeyLockTable::unlock).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStateError {
    /// No lock record exists for the key, or its hold count is already zero.
    NotLocked,
    /// The lock is held, but by a different thread.
    NotOwner,
}

impl fmt::Display for LockStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStateError::NotLocked => f.write_str("write lock released but not held"),
            LockStateError::NotOwner => {
                f.write_str("write lock released by a thread that does not own it")
            },
        }
    }
}

impl std::error::Error for LockStateError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by [`CacheConfig::validate`](crate::builder::CacheConfig::validate),
/// policy-name parsing and builder `try_build*()` methods. Carries a
/// human-readable description of which parameter failed validation.
///
/// # Example
///
/// ```
/// use refcache::builder::CachePolicy;
///
/// let err = "lru".parse::<CachePolicy>().unwrap_err();
/// assert!(err.to_string().contains("lru"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// CleanupError
// ---------------------------------------------------------------------------

/// Error returned by a reclamation cleanup job.
///
/// The sweeper never propagates it; it is logged and the next job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupError(String);

impl CleanupError {
    /// Creates a new `CleanupError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CleanupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for CleanupError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- LockStateError ---------------------------------------------------

    #[test]
    fn lock_state_display_names_the_violation() {
        assert_eq!(
            LockStateError::NotLocked.to_string(),
            "write lock released but not held"
        );
        assert!(LockStateError::NotOwner.to_string().contains("does not own"));
    }

    #[test]
    fn lock_state_implements_std_error() {
        fn assert_error<T: std::error::Error + Send + Sync + 'static>() {}
        assert_error::<LockStateError>();
    }

    // -- ConfigError ------------------------------------------------------

    #[test]
    fn config_display_shows_message() {
        let err = ConfigError::new("soft_limit must be > 0");
        assert_eq!(err.to_string(), "soft_limit must be > 0");
    }

    #[test]
    fn config_message_accessor() {
        let err = ConfigError::new("test");
        assert_eq!(err.message(), "test");
    }

    #[test]
    fn config_clone_and_eq() {
        let a = ConfigError::new("x");
        let b = a.clone();
        assert_eq!(a, b);
    }

    // -- CleanupError -----------------------------------------------------

    #[test]
    fn cleanup_display_shows_message() {
        let err = CleanupError::new("owner map poisoned");
        assert_eq!(err.to_string(), "owner map poisoned");
        assert_eq!(err.message(), "owner map poisoned");
    }

    #[test]
    fn cleanup_debug_includes_message() {
        let dbg = format!("{:?}", CleanupError::new("bad hook"));
        assert!(dbg.contains("bad hook"));
    }
}
