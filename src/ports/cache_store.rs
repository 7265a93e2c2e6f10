use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for cache backends. Only construction can fail loudly; the
/// per-key operations of [`CacheStore`] absorb their errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CacheError {
    /// Error when the store cannot be reached or rejects a command
    #[error("Cache connection error: {0}")]
    Connection(String),

    /// Error when a cache round trip exceeds its deadline
    #[error("Cache operation timed out after {0:?}")]
    Timeout(Duration),
}

/// CacheStore defines the port for the key-value store backing token
/// validity, the token blacklist and cached responses.
///
/// Every operation is advisory. Implementations never return errors from
/// these methods: a failed `get` reads as a miss, a failed `set` / `delete`
/// returns `false`. Callers must treat an unavailable store as "verify /
/// execute again", never as "trust".
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Liveness probe; `false` on any failure.
    async fn ping(&self) -> bool;

    /// Stored value for `key`, `None` on miss, error or undecodable data.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, expiring after `ttl` when given.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool;

    /// Remove `key`; `true` if something was deleted.
    async fn delete(&self, key: &str) -> bool;
}
