pub mod canonical;
pub mod key_lock;

pub use canonical::CanonicalSet;
pub use key_lock::{KeyGuard, KeyLockTable};
