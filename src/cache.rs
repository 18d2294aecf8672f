//! Handle to one named cache.

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::observability::CacheMetrics;
use crate::policy::CachePolicy;
use crate::transaction::CacheTransaction;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Write operation, applied immediately or queued in a transaction.
enum Write {
    Put {
        key: String,
        bytes: Vec<u8>,
        ttl: Option<Duration>,
    },
    Evict {
        key: String,
    },
    Clear,
}

/// Handle to a named cache.
///
/// Every operation applies the cache's [`CachePolicy`]: keys are prefixed with
/// `<prefix><name>::` when prefixing is enabled, values are JSON encoded,
/// writes carry the policy's TTL and null values are skipped unless the
/// policy allows them.
///
/// Handles are cheap to clone and can be shared across tasks.
///
/// # Example
///
/// ```ignore
/// let orders = manager.get_cache("orders");
///
/// orders.put(&42, &order).await?;
/// let cached: Option<Order> = orders.get(&42).await?;
/// orders.evict(&42).await?;
/// ```
pub struct Cache<B: CacheBackend> {
    name: Arc<str>,
    policy: Arc<CachePolicy>,
    backend: B,
    metrics: Arc<dyn CacheMetrics>,
}

impl<B: CacheBackend> Clone for Cache<B> {
    fn clone(&self) -> Self {
        Cache {
            name: Arc::clone(&self.name),
            policy: Arc::clone(&self.policy),
            backend: self.backend.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<B: CacheBackend> fmt::Debug for Cache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<B: CacheBackend> Cache<B> {
    pub(crate) fn new(
        name: &str,
        policy: CachePolicy,
        backend: B,
        metrics: Arc<dyn CacheMetrics>,
    ) -> Self {
        Cache {
            name: Arc::from(name),
            policy: Arc::new(policy),
            backend,
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Physical store key for `key`.
    pub fn physical_key<K: Display + ?Sized>(&self, key: &K) -> String {
        self.policy.physical_key(&self.name, key)
    }

    /// Look up `key`.
    ///
    /// A cached null decodes as `Some(None)` when `V` is an `Option`.
    ///
    /// # Errors
    ///
    /// - `Error::StoreUnavailable`: store unreachable or command timed out
    /// - `Error::DeserializationError`: stored bytes are not valid for `V`
    pub async fn get<V, K>(&self, key: &K) -> Result<Option<V>>
    where
        V: DeserializeOwned,
        K: Display + ?Sized,
    {
        let timer = Instant::now();
        let physical = self.physical_key(key);

        let bytes = match self.backend.get(&physical).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics
                    .record_error(&self.name, &physical, &e.to_string());
                return Err(e);
            }
        };

        match bytes {
            Some(bytes) => {
                self.metrics.record_hit(&self.name, &physical, timer.elapsed());
                self.policy.value_serialization().decode(&bytes).map(Some)
            }
            None => {
                self.metrics
                    .record_miss(&self.name, &physical, timer.elapsed());
                Ok(None)
            }
        }
    }

    /// Store `value` under `key` with the policy's expiration.
    ///
    /// Null values (`None`, `()`) are silently skipped unless the policy caches
    /// nulls. Inside an active [`CacheTransaction`] the write is deferred for
    /// transaction-aware caches.
    ///
    /// # Errors
    ///
    /// - `Error::SerializationError`: `value` cannot be encoded
    /// - `Error::StoreUnavailable`: store unreachable or command timed out
    pub async fn put<V, K>(&self, key: &K, value: &V) -> Result<()>
    where
        V: Serialize + ?Sized,
        K: Display + ?Sized,
    {
        let physical = self.physical_key(key);
        let serialization = self.policy.value_serialization();

        let bytes = match serialization.encode(value)? {
            Some(bytes) => bytes,
            None if self.policy.cache_null_values() => serialization.encode_null(),
            None => {
                debug!(
                    "Skipping null value for {} (cache '{}' does not cache nulls)",
                    physical, self.name
                );
                return Ok(());
            }
        };

        self.write(Write::Put {
            key: physical,
            bytes,
            ttl: self.policy.expiration().ttl(),
        })
        .await
    }

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if the store cannot be reached.
    pub async fn evict<K: Display + ?Sized>(&self, key: &K) -> Result<()> {
        self.write(Write::Evict {
            key: self.physical_key(key),
        })
        .await
    }

    /// Remove every entry of this cache.
    ///
    /// With prefixing disabled, entries of different caches cannot be told
    /// apart and the whole logical database is cleared.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if the store cannot be reached.
    pub async fn clear(&self) -> Result<()> {
        self.write(Write::Clear).await
    }

    /// Read-through lookup: return the cached value or compute, store and
    /// return it.
    ///
    /// # Errors
    ///
    /// Returns errors from the lookup, the loader or the write.
    pub async fn get_or_insert_with<V, K, F, Fut>(&self, key: &K, loader: F) -> Result<V>
    where
        V: Serialize + DeserializeOwned,
        K: Display + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }

        let value = loader().await?;
        self.put(key, &value).await?;
        Ok(value)
    }

    async fn write(&self, write: Write) -> Result<()> {
        if self.policy.transaction_aware() {
            if let Some(tx) = CacheTransaction::current() {
                let cache = self.clone();
                let deferred = Box::new(move || async move { cache.apply(write).await }.boxed());
                match tx.defer(deferred) {
                    Ok(()) => {
                        debug!(
                            "Deferred write to cache '{}' until commit ({} pending)",
                            self.name,
                            tx.pending()
                        );
                        return Ok(());
                    }
                    // Transaction already completed: apply right away.
                    Err(deferred) => return deferred().await,
                }
            }
        }

        self.apply(write).await
    }

    async fn apply(&self, write: Write) -> Result<()> {
        let timer = Instant::now();

        match write {
            Write::Put { key, bytes, ttl } => {
                let result = self.backend.set(&key, bytes, ttl).await;
                self.observe(&key, &result, |m, name, key| {
                    m.record_put(name, key, timer.elapsed())
                });
                result
            }
            Write::Evict { key } => {
                let result = self.backend.delete(&key).await;
                self.observe(&key, &result, |m, name, key| {
                    m.record_evict(name, key, timer.elapsed())
                });
                result
            }
            Write::Clear => {
                let prefix = self.policy.prefix_for(&self.name).unwrap_or_default();
                if prefix.is_empty() {
                    warn!(
                        "⚠ Clearing cache '{}' without key prefix - all keys in the database are removed!",
                        self.name
                    );
                }
                let result = self.backend.delete_prefixed(&prefix).await;
                self.observe(&prefix, &result, |_, _, _| {});
                if result.is_ok() {
                    info!("✓ Cache '{}' cleared", self.name);
                }
                result
            }
        }
    }

    fn observe(
        &self,
        key: &str,
        result: &Result<()>,
        on_success: impl FnOnce(&dyn CacheMetrics, &str, &str),
    ) {
        match result {
            Ok(()) => on_success(self.metrics.as_ref(), &self.name, key),
            Err(e) => self.metrics.record_error(&self.name, key, &e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::observability::{CacheStatistics, NoOpMetrics};
    use crate::policy::{Expiration, KeyPrefix};
    use serde::Deserialize;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        item: String,
    }

    fn order() -> Order {
        Order {
            id: 42,
            item: "book".to_string(),
        }
    }

    fn prefixed_policy() -> CachePolicy {
        CachePolicy::default()
            .with_key_prefix(KeyPrefix::Global("svc:prod:".to_string()))
            .with_cache_null_values(false)
    }

    fn cache(policy: CachePolicy) -> (Cache<InMemoryBackend>, InMemoryBackend) {
        let backend = InMemoryBackend::new();
        let cache = Cache::new("orders", policy, backend.clone(), Arc::new(NoOpMetrics));
        (cache, backend)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (cache, _) = cache(prefixed_policy());

        cache.put(&42, &order()).await.expect("Failed to put");
        let cached: Option<Order> = cache.get(&42).await.expect("Failed to get");

        assert_eq!(cached, Some(order()));
    }

    #[tokio::test]
    async fn test_physical_key_layout() {
        let (cache, backend) = cache(prefixed_policy());
        cache.put("42", &order()).await.expect("Failed to put");
        assert_eq!(backend.keys(), vec!["svc:prod:orders::42".to_string()]);

        let (cache, backend) = self::cache(CachePolicy::default());
        cache.put("42", &order()).await.expect("Failed to put");
        assert_eq!(backend.keys(), vec!["42".to_string()]);
    }

    #[tokio::test]
    async fn test_stored_value_is_json() {
        let (cache, backend) = cache(prefixed_policy());
        cache.put(&42, &order()).await.expect("Failed to put");

        let raw = backend
            .get("svc:prod:orders::42")
            .await
            .expect("Failed to get")
            .expect("value present");
        assert_eq!(raw, br#"{"id":42,"item":"book"}"#);
    }

    #[tokio::test]
    async fn test_null_value_skipped_when_not_allowed() {
        let (cache, backend) = cache(prefixed_policy());

        cache
            .put(&1, &None::<Order>)
            .await
            .expect("null put is a no-op, not an error");

        assert!(backend.is_empty());
        let cached: Option<Option<Order>> = cache.get(&1).await.expect("Failed to get");
        assert_eq!(cached, None);
    }

    #[tokio::test]
    async fn test_null_value_cached_when_allowed() {
        let (cache, backend) = cache(prefixed_policy().with_cache_null_values(true));

        cache.put(&1, &None::<Order>).await.expect("Failed to put");

        assert_eq!(backend.len(), 1);
        let cached: Option<Option<Order>> = cache.get(&1).await.expect("Failed to get");
        assert_eq!(cached, Some(None));
    }

    #[tokio::test]
    async fn test_expiration_applied() {
        let policy = prefixed_policy().with_expiration(Expiration::After(Duration::from_secs(60)));
        let (cache, backend) = cache(policy);
        cache.put(&1, &order()).await.expect("Failed to put");

        let ttl = backend.ttl("svc:prod:orders::1").expect("ttl set");
        assert!(ttl <= Duration::from_secs(60));
        assert!(ttl > Duration::from_secs(50));

        let (cache, backend) = self::cache(prefixed_policy());
        cache.put(&1, &order()).await.expect("Failed to put");
        assert_eq!(backend.ttl("svc:prod:orders::1"), None);
    }

    #[tokio::test]
    async fn test_evict() {
        let (cache, _) = cache(prefixed_policy());
        cache.put(&1, &order()).await.expect("Failed to put");
        cache.evict(&1).await.expect("Failed to evict");

        let cached: Option<Order> = cache.get(&1).await.expect("Failed to get");
        assert_eq!(cached, None);
    }

    #[tokio::test]
    async fn test_clear_only_touches_own_prefix() {
        let backend = InMemoryBackend::new();
        let metrics: Arc<dyn CacheMetrics> = Arc::new(NoOpMetrics);
        let orders = Cache::new("orders", prefixed_policy(), backend.clone(), metrics.clone());
        let users = Cache::new("users", prefixed_policy(), backend.clone(), metrics);

        orders.put(&1, &order()).await.expect("Failed to put");
        orders.put(&2, &order()).await.expect("Failed to put");
        users.put(&1, &"alice").await.expect("Failed to put");

        orders.clear().await.expect("Failed to clear");

        assert_eq!(backend.keys(), vec!["svc:prod:users::1".to_string()]);
    }

    #[tokio::test]
    async fn test_get_or_insert_with() {
        let (cache, _) = cache(prefixed_policy());

        let loaded = cache
            .get_or_insert_with(&42, || async { Ok(order()) })
            .await
            .expect("Failed to load");
        assert_eq!(loaded, order());

        let calls = std::sync::atomic::AtomicUsize::new(0);
        let cached = cache
            .get_or_insert_with(&42, || async {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(Order {
                    id: 0,
                    item: "fresh".to_string(),
                })
            })
            .await
            .expect("Failed to load");
        assert_eq!(cached, order());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_unavailable_surfaces() {
        let stats = Arc::new(CacheStatistics::new());
        let backend = InMemoryBackend::new();
        let cache = Cache::new("orders", prefixed_policy(), backend.clone(), stats.clone());

        backend.set_available(false);
        let err = cache.get::<Order, _>(&1).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(cache.put(&1, &order()).await.unwrap_err().is_retryable());
        assert_eq!(stats.errors(), 2);
    }

    #[tokio::test]
    async fn test_metrics_recorded() {
        let stats = Arc::new(CacheStatistics::new());
        let cache = Cache::new(
            "orders",
            prefixed_policy(),
            InMemoryBackend::new(),
            stats.clone(),
        );

        let _: Option<Order> = cache.get(&1).await.expect("Failed to get");
        cache.put(&1, &order()).await.expect("Failed to put");
        let _: Option<Order> = cache.get(&1).await.expect("Failed to get");
        cache.evict(&1).await.expect("Failed to evict");

        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.puts(), 1);
        assert_eq!(stats.evictions(), 1);
    }
}
