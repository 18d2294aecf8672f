//! Redis store backend.

use super::CacheBackend;
use crate::connection::ConnectionDescriptor;
use crate::error::{Error, Result};
use deadpool_redis::{redis::AsyncCommands, Config as PoolConfig, Connection, Pool, Runtime};
use std::future::Future;
use std::time::Duration;

/// Pool statistics information.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Default Redis connection pool size.
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: usize = 16;

/// Keys fetched per SCAN round trip when clearing a cache.
const SCAN_BATCH: usize = 500;

/// Redis backend with connection pooling and async operations.
///
/// Uses deadpool for pooling. Connections are opened lazily: constructing the
/// backend validates the descriptor but never talks to the server. Every
/// command (including waiting for a pooled connection) is bounded by the
/// descriptor's command timeout.
///
/// # Example
///
/// ```no_run
/// # use redis_cache_manager::backend::{CacheBackend, RedisBackend};
/// # use redis_cache_manager::config::RawRedisSettings;
/// # use redis_cache_manager::connection::ConnectionDescriptor;
/// # use redis_cache_manager::placeholder::DeploymentIdentity;
/// # async fn example() -> redis_cache_manager::Result<()> {
/// let settings = RawRedisSettings::default().resolve(&DeploymentIdentity::new())?;
/// let backend = RedisBackend::connect(&ConnectionDescriptor::from_settings(&settings))?;
///
/// backend.set("key", b"value".to_vec(), None).await?;
/// let value = backend.get("key").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
    command_timeout: Duration,
}

impl RedisBackend {
    /// Create the pooled connection factory for `descriptor`.
    ///
    /// Pool size is determined by:
    /// 1. `REDIS_POOL_SIZE` environment variable (if set)
    /// 2. `DEFAULT_POOL_SIZE` constant (16)
    ///
    /// # Errors
    /// Returns `Error::ConnectionUnavailable` if the pool cannot be created
    /// from the descriptor (e.g. the address does not form a valid URL).
    pub fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        let mut cfg = PoolConfig::from_url(descriptor.connection_string());
        cfg.pool = Some(deadpool_redis::PoolConfig::new(pool_size));

        let pool = cfg.create_pool(Some(Runtime::Tokio1)).map_err(|e| {
            Error::ConnectionUnavailable(format!(
                "Failed to create Redis pool for {}: {}",
                descriptor.address(),
                e
            ))
        })?;

        info!(
            "✓ Redis backend initialized: {} (pool size: {}, command timeout: {:?})",
            descriptor.address(),
            pool_size,
            descriptor.command_timeout
        );

        Ok(RedisBackend {
            pool,
            command_timeout: descriptor.command_timeout,
        })
    }

    /// Get current pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }

    /// Run `op` with a pooled connection, bounded by the command timeout.
    async fn with_connection<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let call = async {
            let conn = self.pool.get().await.map_err(|e| {
                Error::StoreUnavailable(format!("Failed to get Redis connection: {}", e))
            })?;
            op(conn).await
        };

        tokio::time::timeout(self.command_timeout, call).await?
    }
}

/// Escape glob metacharacters so a literal prefix can be used with SCAN MATCH.
fn escape_pattern(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('*');
    escaped
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.with_connection(|mut conn| async move {
            let value: Option<Vec<u8>> = conn.get(key).await.map_err(|e| {
                Error::StoreUnavailable(format!("Redis GET failed for key {}: {}", key, e))
            })?;

            if value.is_some() {
                debug!("✓ Redis GET {} -> HIT", key);
            } else {
                debug!("✓ Redis GET {} -> MISS", key);
            }

            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.with_connection(|mut conn| async move {
            match ttl {
                Some(duration) => {
                    let millis = (duration.as_millis() as u64).max(1);
                    conn.pset_ex::<_, _, ()>(key, value, millis)
                        .await
                        .map_err(|e| {
                            Error::StoreUnavailable(format!(
                                "Redis PSETEX failed for key {}: {}",
                                key, e
                            ))
                        })?;
                    debug!("✓ Redis SET {} (TTL: {}ms)", key, millis);
                }
                None => {
                    conn.set::<_, _, ()>(key, value).await.map_err(|e| {
                        Error::StoreUnavailable(format!("Redis SET failed for key {}: {}", key, e))
                    })?;
                    debug!("✓ Redis SET {}", key);
                }
            }
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.with_connection(|mut conn| async move {
            conn.del::<_, ()>(key).await.map_err(|e| {
                Error::StoreUnavailable(format!("Redis DEL failed for key {}: {}", key, e))
            })?;

            debug!("✓ Redis DELETE {}", key);
            Ok(())
        })
        .await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.with_connection(|mut conn| async move {
            let exists: bool = conn.exists(key).await.map_err(|e| {
                Error::StoreUnavailable(format!("Redis EXISTS failed for key {}: {}", key, e))
            })?;
            Ok(exists)
        })
        .await
    }

    async fn delete_prefixed(&self, prefix: &str) -> Result<()> {
        let pattern = escape_pattern(prefix);

        self.with_connection(|mut conn| async move {
            let mut cursor: u64 = 0;
            let mut deleted = 0usize;

            loop {
                let (next, keys): (u64, Vec<String>) = deadpool_redis::redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(SCAN_BATCH)
                    .query_async(&mut *conn)
                    .await
                    .map_err(|e| Error::StoreUnavailable(format!("Redis SCAN failed: {}", e)))?;

                if !keys.is_empty() {
                    conn.del::<_, ()>(&keys).await.map_err(|e| {
                        Error::StoreUnavailable(format!("Redis DEL (bulk) failed: {}", e))
                    })?;
                    deleted += keys.len();
                }

                if next == 0 {
                    break;
                }
                cursor = next;
            }

            debug!("✓ Redis DELETE {} ({} keys)", pattern, deleted);
            Ok(())
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.with_connection(|mut conn| async move {
            let pong: String = deadpool_redis::redis::cmd("PING")
                .query_async(&mut *conn)
                .await
                .map_err(|e| Error::StoreUnavailable(format!("Redis PING failed: {}", e)))?;

            Ok(pong.contains("PONG"))
        })
        .await
    }
}
