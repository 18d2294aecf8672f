//! Provisioning: settings to a ready cache manager.
//!
//! ```text
//! RedisSettings ──► ConnectionDescriptor ──► backend ──┐
//!               └─► CachePolicyCompiler ──► policies ──┴─► CacheManager
//! ```

use crate::backend::CacheBackend;
#[cfg(feature = "redis")]
use crate::backend::RedisBackend;
use crate::config::RedisSettings;
use crate::connection::ConnectionDescriptor;
#[cfg(feature = "redis")]
use crate::error::Result;
use crate::manager::CacheManager;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::policy::{CachePolicyCompiler, CompiledPolicies};
use std::sync::Arc;

/// Assembles a [`CacheManager`] from validated settings.
///
/// Steps run in a fixed order: derive the connection descriptor, compile the
/// cache policies, then combine both with a backend. Nothing is shared between
/// factories.
///
/// # Example
///
/// ```
/// use redis_cache_manager::backend::InMemoryBackend;
/// use redis_cache_manager::config::RawRedisSettings;
/// use redis_cache_manager::factory::CacheManagerFactory;
/// use redis_cache_manager::placeholder::DeploymentIdentity;
///
/// let identity = DeploymentIdentity::new()
///     .with_application_name("billing")
///     .with_active_profile("prod");
/// let settings = RawRedisSettings::default().resolve(&identity).unwrap();
///
/// let manager = CacheManagerFactory::new(settings).build_with(InMemoryBackend::new());
/// assert_eq!(
///     manager.get_cache("orders").physical_key(&42),
///     "billing:prod:orders::42"
/// );
/// ```
pub struct CacheManagerFactory {
    settings: RedisSettings,
    metrics: Arc<dyn CacheMetrics>,
}

impl CacheManagerFactory {
    pub fn new(settings: RedisSettings) -> Self {
        CacheManagerFactory {
            settings,
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Report events of every created cache to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn settings(&self) -> &RedisSettings {
        &self.settings
    }

    pub fn connection_descriptor(&self) -> ConnectionDescriptor {
        ConnectionDescriptor::from_settings(&self.settings)
    }

    pub fn compile_policies(&self) -> CompiledPolicies {
        CachePolicyCompiler::compile(self.settings.cache())
    }

    /// Build the manager over an already constructed backend.
    pub fn build_with<B: CacheBackend>(&self, backend: B) -> CacheManager<B> {
        let policies = self.compile_policies();

        info!(
            "✓ Cache manager provisioned ({} pre-registered cache(s), default TTL: {:?}, prefix: {})",
            policies.initial().len(),
            policies.defaults().expiration(),
            if self.settings.cache().use_prefix() {
                self.settings.cache().key_prefix()
            } else {
                "<disabled>"
            }
        );

        CacheManager::with_metrics(backend, policies, Arc::clone(&self.metrics))
    }

    /// Build the manager over a pooled Redis backend.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConnectionUnavailable` if the connection pool cannot be
    /// created from the settings.
    #[cfg(feature = "redis")]
    pub fn build(&self) -> Result<CacheManager<RedisBackend>> {
        let descriptor = self.connection_descriptor();
        info!("Provisioning Redis cache at {}", descriptor.address());

        let backend = RedisBackend::connect(&descriptor)?;
        Ok(self.build_with(backend))
    }
}

/// Provision a Redis-backed cache manager, or nothing when caching is disabled.
///
/// # Errors
///
/// Returns `Error::ConnectionUnavailable` if the connection pool cannot be
/// created from the settings.
#[cfg(feature = "redis")]
pub fn provision(settings: RedisSettings) -> Result<Option<CacheManager<RedisBackend>>> {
    if !settings.enabled() {
        info!("Redis caching disabled; no cache manager provisioned");
        return Ok(None);
    }

    CacheManagerFactory::new(settings).build().map(Some)
}
