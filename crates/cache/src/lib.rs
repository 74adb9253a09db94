//! Bounded in-memory key/value cache with per-entry expiration and
//! least-recently-used eviction.

pub mod janitor;
pub mod lru;

use thiserror::Error;

pub use janitor::{spawn_janitor, DEFAULT_JANITOR_INTERVAL};
pub use lru::TtlLruCache;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache capacity must be positive")]
    ZeroCapacity,

    #[error("cache ttl must be positive")]
    ZeroTtl,
}

/// Byte-level cache contract.
///
/// Values are opaque to the cache. Callers own the encoding.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Insert or refresh `key`. Refreshing resets the expiration.
    fn set(&self, key: String, value: Vec<u8>);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
