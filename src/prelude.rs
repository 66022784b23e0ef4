pub use crate::builder::{Cache, CacheBuilder, CacheConfig, CachePolicy};
pub use crate::ds::{CanonicalSet, KeyLockTable};
pub use crate::error::{CleanupError, ConfigError, LockStateError};
pub use crate::policy::bounded::BoundedCache;
pub use crate::policy::chained::ChainedCache;
pub use crate::policy::null::NullCache;
pub use crate::policy::soft::SoftCache;
pub use crate::policy::weak::WeakCache;
pub use crate::reclaim::{Reclaimable, Sweeper, SweeperConfig, SweeperHandle, Tracked};
pub use crate::traits::{DEFAULT_CAPACITY, ObjectCache, WriteGuard};
