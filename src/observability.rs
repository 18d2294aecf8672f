//! Metrics hooks for cache operations.
//!
//! Implement [`CacheMetrics`] to forward cache events to your monitoring
//! system and install it with
//! [`CacheManager::with_metrics`](crate::manager::CacheManager::with_metrics):
//!
//! ```ignore
//! use redis_cache_manager::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, cache: &str, _key: &str, duration: Duration) {
//!         // counter!("cache_hits", "cache" => cache).inc();
//!         // histogram!("cache_latency").record(duration);
//!     }
//!     // ... implement other methods
//! }
//! ```
//!
//! The default trait methods log through the `log` crate. [`NoOpMetrics`]
//! discards everything, [`CacheStatistics`] keeps atomic counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, cache: &str, key: &str, duration: Duration) {
        debug!("Cache HIT: {}/{} took {:?}", cache, key, duration);
    }

    /// Record a cache miss.
    fn record_miss(&self, cache: &str, key: &str, duration: Duration) {
        debug!("Cache MISS: {}/{} took {:?}", cache, key, duration);
    }

    /// Record a write.
    fn record_put(&self, cache: &str, key: &str, duration: Duration) {
        debug!("Cache PUT: {}/{} took {:?}", cache, key, duration);
    }

    /// Record an eviction.
    fn record_evict(&self, cache: &str, key: &str, duration: Duration) {
        debug!("Cache EVICT: {}/{} took {:?}", cache, key, duration);
    }

    /// Record an error.
    fn record_error(&self, cache: &str, key: &str, error: &str) {
        warn!("Cache ERROR for {}/{}: {}", cache, key, error);
    }
}

/// Metrics implementation that ignores every event.
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _cache: &str, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _cache: &str, _key: &str, _duration: Duration) {}
    fn record_put(&self, _cache: &str, _key: &str, _duration: Duration) {}
    fn record_evict(&self, _cache: &str, _key: &str, _duration: Duration) {}
    fn record_error(&self, _cache: &str, _key: &str, _error: &str) {}
}

/// Process-wide counters across all caches.
#[derive(Debug, Default)]
pub struct CacheStatistics {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    evictions: AtomicU64,
    errors: AtomicU64,
}

impl CacheStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Hits over lookups, 0.0 before the first lookup.
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits();
        let lookups = hits + self.misses();
        if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        }
    }
}

impl CacheMetrics for CacheStatistics {
    fn record_hit(&self, _cache: &str, _key: &str, _duration: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self, _cache: &str, _key: &str, _duration: Duration) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_put(&self, _cache: &str, _key: &str, _duration: Duration) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    fn record_evict(&self, _cache: &str, _key: &str, _duration: Duration) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, cache: &str, key: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        warn!("Cache ERROR for {}/{}: {}", cache, key, error);
    }
}
