//! # redis-cache-manager
//!
//! Provisions a Redis-backed caching layer from declarative settings.
//!
//! ## Features
//!
//! - **Validated Settings:** Connection and cache policy options are checked
//!   up front; a bad port or a blank cache name aborts startup with the
//!   offending field named
//! - **Named Cache Policies:** A global TTL, key prefix and null-value policy,
//!   with per-cache TTL overrides
//! - **Deployment-Aware Prefixes:** Keys are namespaced as
//!   `<app>:<profile>:<cache>::<key>` so deployments can share one database
//! - **Backend Agnostic:** Pooled Redis for production, in-memory for tests
//! - **Transaction-Aware Writes:** Optionally defer cache writes until the
//!   surrounding unit of work commits
//!
//! ## Quick Start
//!
//! ```ignore
//! use redis_cache_manager::{provision, ConfigLoader};
//!
//! // 1. Load settings (TOML file + APP_* environment variables)
//! let settings = ConfigLoader::new()
//!     .with_config_path("config/cache.toml")
//!     .load()?;
//!
//! // 2. Provision the manager (None when redis.enabled = false)
//! let Some(caches) = provision(settings)? else {
//!     return Ok(());
//! };
//!
//! // 3. Use named caches
//! let orders = caches.get_cache("orders");
//! orders.put(&42, &order).await?;
//! let cached: Option<Order> = orders.get(&42).await?;
//! ```
//!
//! ### Custom Backends
//!
//! Use [`CacheManagerFactory::build_with`] to provision over any
//! [`CacheBackend`]:
//!
//! ```
//! use redis_cache_manager::backend::InMemoryBackend;
//! use redis_cache_manager::{CacheManagerFactory, DeploymentIdentity, RawRedisSettings};
//!
//! let settings = RawRedisSettings::default()
//!     .resolve(&DeploymentIdentity::new().with_application_name("billing"))
//!     .unwrap();
//! let caches = CacheManagerFactory::new(settings).build_with(InMemoryBackend::new());
//! assert_eq!(caches.get_cache("users").physical_key("7"), "billing:default:users::7");
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod factory;
pub mod loader;
pub mod manager;
pub mod observability;
pub mod placeholder;
pub mod policy;
pub mod serialization;
pub mod transaction;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use cache::Cache;
pub use config::{RawRedisSettings, RedisSettings};
pub use connection::ConnectionDescriptor;
pub use error::{Error, Result};
#[cfg(feature = "redis")]
pub use factory::provision;
pub use factory::CacheManagerFactory;
pub use loader::ConfigLoader;
pub use manager::CacheManager;
pub use placeholder::DeploymentIdentity;
pub use policy::{CachePolicy, CachePolicyCompiler, CompiledPolicies};
pub use transaction::CacheTransaction;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
