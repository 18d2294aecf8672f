//! Cache manager: registry of named caches sharing one backend.

use crate::backend::CacheBackend;
use crate::cache::Cache;
use crate::error::Result;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::policy::CompiledPolicies;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

struct Inner<B: CacheBackend> {
    backend: B,
    policies: Arc<CompiledPolicies>,
    caches: DashMap<String, Cache<B>>,
    metrics: Arc<dyn CacheMetrics>,
}

/// Registry of named caches.
///
/// Caches listed in the compiled policies are created up front. Any other name
/// is created on first use with the default policy. Repeated lookups of the
/// same name return handles to the same cache, also under concurrent access.
///
/// `CacheManager` is cheap to clone (`Arc` increment) and can be shared across
/// tasks.
///
/// # Example
///
/// ```
/// use redis_cache_manager::backend::InMemoryBackend;
/// use redis_cache_manager::manager::CacheManager;
/// use redis_cache_manager::policy::CompiledPolicies;
///
/// let manager = CacheManager::new(InMemoryBackend::new(), CompiledPolicies::default());
/// let orders = manager.get_cache("orders");
/// assert_eq!(orders.name(), "orders");
/// assert_eq!(manager.cache_names(), vec!["orders".to_string()]);
/// ```
pub struct CacheManager<B: CacheBackend> {
    inner: Arc<Inner<B>>,
}

impl<B: CacheBackend> Clone for CacheManager<B> {
    fn clone(&self) -> Self {
        CacheManager {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: CacheBackend> CacheManager<B> {
    /// Create a manager over `backend`, pre-registering every named policy.
    pub fn new(backend: B, policies: CompiledPolicies) -> Self {
        Self::with_metrics(backend, policies, Arc::new(NoOpMetrics))
    }

    /// Create a manager reporting cache events to `metrics`.
    pub fn with_metrics(
        backend: B,
        policies: CompiledPolicies,
        metrics: Arc<dyn CacheMetrics>,
    ) -> Self {
        let caches = DashMap::new();
        for (name, policy) in policies.initial() {
            caches.insert(
                name.clone(),
                Cache::new(name, policy.clone(), backend.clone(), Arc::clone(&metrics)),
            );
        }

        debug!(
            "Cache manager created with {} pre-registered cache(s)",
            caches.len()
        );

        CacheManager {
            inner: Arc::new(Inner {
                backend,
                policies: Arc::new(policies),
                caches,
                metrics,
            }),
        }
    }

    /// Handle for cache `name`, created with the default policy on first use.
    pub fn get_cache(&self, name: &str) -> Cache<B> {
        if let Some(cache) = self.inner.caches.get(name) {
            return cache.clone();
        }

        self.inner
            .caches
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Creating cache '{}' with default policy", name);
                Cache::new(
                    name,
                    self.inner.policies.defaults().clone(),
                    self.inner.backend.clone(),
                    Arc::clone(&self.inner.metrics),
                )
            })
            .clone()
    }

    /// Names of all caches created so far, sorted.
    pub fn cache_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .caches
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn policies(&self) -> &CompiledPolicies {
        &self.inner.policies
    }

    pub fn backend(&self) -> &B {
        &self.inner.backend
    }

    /// Check that the backing store is reachable.
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if the store cannot be reached.
    pub async fn health_check(&self) -> Result<bool> {
        self.inner.backend.health_check().await
    }
}

impl<B: CacheBackend> fmt::Debug for CacheManager<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheManager")
            .field("caches", &self.cache_names())
            .field("policies", &self.inner.policies)
            .finish()
    }
}
