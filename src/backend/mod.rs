//! Store backends: the connection capability caches write through.

use crate::error::Result;
use std::future::Future;
use std::time::Duration;

pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend};

/// Trait for store backends.
///
/// Abstracts the remote key-value store so cache handles and policies stay
/// independent of the transport. Implementations: Redis (pooled), in-memory.
///
/// **IMPORTANT:** All methods use `&self` to allow concurrent access.
/// Backends are cloned into every cache handle and must share their state
/// (connection pool, `Arc`-wrapped map).
///
/// **ASYNC:** Implementations may use `async fn`; the returned futures must be
/// `Send` so cache writes can be queued in a transaction and handles can be
/// used from spawned tasks.
///
/// **ERRORS:** Transport failures and timeouts are reported as
/// `Error::StoreUnavailable`.
pub trait CacheBackend: Send + Sync + Clone + 'static {
    /// Retrieve value by physical key.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Value found
    /// - `Ok(None)` - Key not found or expired
    ///
    /// # Errors
    /// Returns `Err` if the store is unreachable or the command times out.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Store value with optional TTL.
    ///
    /// # Arguments
    /// - `key`: Physical key
    /// - `value`: Serialized value bytes
    /// - `ttl`: Time-to-live. None = never expire
    ///
    /// # Errors
    /// Returns `Err` if the store is unreachable or the command times out.
    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove value.
    ///
    /// # Errors
    /// Returns `Err` if the store is unreachable or the command times out.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Check if key exists.
    ///
    /// # Errors
    /// Returns `Err` if the store is unreachable or the command times out.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        async move { self.get(key).await.map(|value| value.is_some()) }
    }

    /// Remove every key starting with `prefix`. An empty prefix removes all keys.
    ///
    /// # Errors
    /// Returns `Err` if the store is unreachable or the command times out.
    fn delete_prefixed(&self, prefix: &str) -> impl Future<Output = Result<()>> + Send;

    /// Health check - verify the store is reachable.
    ///
    /// # Errors
    /// Returns `Err` if the store is not accessible.
    fn health_check(&self) -> impl Future<Output = Result<bool>> + Send {
        async { Ok(true) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_exists_default() {
        let backend = InMemoryBackend::new();
        backend
            .set("key", vec![1, 2, 3], None)
            .await
            .expect("Failed to set key");
        assert!(backend.exists("key").await.expect("Failed to check exists"));
        assert!(!backend
            .exists("nonexistent")
            .await
            .expect("Failed to check exists"));
    }
}
