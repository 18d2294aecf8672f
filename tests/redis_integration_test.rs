//! Redis Backend Integration Tests
//!
//! These tests require a running Redis instance and skip themselves when none
//! is reachable.
//!
//! ## Quick Start
//!
//! ```bash
//! docker run --rm -p 6379:6379 redis:7
//! cargo test --features redis --test redis_integration_test
//! ```
//!
//! ## Environment Variables
//!
//! - `TEST_REDIS_HOST`: Redis host (default: "localhost")
//! - `TEST_REDIS_PORT`: Redis port (default: 6379)
//!
//! ## What's Tested
//!
//! 1. Provisioning and health check
//! 2. Round-trip through a named cache, with the physical key layout
//! 3. TTL expiration and persistent entries
//! 4. Scoped clear
//! 5. Null-value policy
//! 6. Connection pooling under concurrent load

#![cfg(feature = "redis")]

use redis_cache_manager::backend::{CacheBackend, RedisBackend};
use redis_cache_manager::config::{RawDuration, RawRedisSettings};
use redis_cache_manager::{provision, CacheManager, DeploymentIdentity};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
struct Order {
    id: u64,
    customer: String,
}

/// Helper: Raw settings pointing at the test server.
fn test_settings() -> RawRedisSettings {
    let mut raw = RawRedisSettings {
        host: env::var("TEST_REDIS_HOST").unwrap_or_else(|_| "localhost".to_string()),
        port: env::var("TEST_REDIS_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(6379),
        timeout: Some(RawDuration::Millis(1000)),
        ..Default::default()
    };
    raw.cache.time_to_live = Some("1m".into());
    raw
}

/// Helper: Provision a manager whose keys are isolated under a unique prefix.
fn create_test_manager(
    edit: impl FnOnce(&mut RawRedisSettings),
) -> CacheManager<RedisBackend> {
    let mut raw = test_settings();
    edit(&mut raw);
    // Unique application segment per manager keeps test runs apart.
    let identity = DeploymentIdentity::new().with_active_profile("it");
    let settings = raw.resolve(&identity).expect("valid settings");

    provision(settings)
        .expect("Failed to create Redis pool")
        .expect("caching enabled")
}

/// Helper: Check if Redis is available
async fn is_redis_available() -> bool {
    create_test_manager(|_| {})
        .health_check()
        .await
        .unwrap_or(false)
}

macro_rules! require_redis {
    () => {
        if !is_redis_available().await {
            println!("⚠️  Redis not available, skipping test");
            return;
        }
    };
}

#[tokio::test]
async fn test_redis_provision_and_health_check() {
    require_redis!();

    let manager = create_test_manager(|_| {});
    assert!(manager.health_check().await.expect("Health check failed"));
    println!("✓ Redis health check passed");
}

#[tokio::test]
async fn test_redis_roundtrip_and_key_layout() {
    require_redis!();

    let manager = create_test_manager(|_| {});
    let cache = manager.get_cache("orders");
    let order = Order {
        id: 1,
        customer: "alice".to_string(),
    };

    cache.put(&1, &order).await.expect("PUT should succeed");
    let cached: Option<Order> = cache.get(&1).await.expect("GET should not error");
    assert_eq!(cached, Some(order));

    // The value sits under <app>:<profile>:<cache>::<key> as plain JSON.
    let physical = cache.physical_key(&1);
    assert!(physical.ends_with(":it:orders::1"), "{}", physical);
    let raw = manager
        .backend()
        .get(&physical)
        .await
        .expect("GET should not error")
        .expect("value present");
    assert_eq!(raw, br#"{"id":1,"customer":"alice"}"#);

    cache.clear().await.expect("Cleanup failed");
}

#[tokio::test]
async fn test_redis_ttl_expiration() {
    require_redis!();

    let manager = create_test_manager(|raw| {
        raw.cache
            .cache_expirations
            .insert("sessions".to_string(), Some(RawDuration::Millis(300)));
        raw.cache
            .cache_expirations
            .insert("static".to_string(), Some(RawDuration::Millis(0)));
    });
    let sessions = manager.get_cache("sessions");
    let statics = manager.get_cache("static");

    sessions.put("s1", &"token").await.expect("PUT should succeed");
    statics.put("s1", &"forever").await.expect("PUT should succeed");

    tokio::time::sleep(Duration::from_millis(600)).await;

    let expired: Option<String> = sessions.get("s1").await.expect("GET should not error");
    let kept: Option<String> = statics.get("s1").await.expect("GET should not error");
    assert_eq!(expired, None);
    assert_eq!(kept.as_deref(), Some("forever"));

    statics.clear().await.expect("Cleanup failed");
}

#[tokio::test]
async fn test_redis_clear_is_scoped() {
    require_redis!();

    let manager = create_test_manager(|_| {});
    let orders = manager.get_cache("orders");
    let users = manager.get_cache("users");

    for i in 0..50u64 {
        orders.put(&i, &i).await.expect("PUT should succeed");
    }
    users.put(&1, &"alice").await.expect("PUT should succeed");

    orders.clear().await.expect("CLEAR should succeed");

    for i in 0..50u64 {
        let cached: Option<u64> = orders.get(&i).await.expect("GET should not error");
        assert_eq!(cached, None);
    }
    let user: Option<String> = users.get(&1).await.expect("GET should not error");
    assert_eq!(user.as_deref(), Some("alice"));

    users.clear().await.expect("Cleanup failed");
}

#[tokio::test]
async fn test_redis_null_values_skipped() {
    require_redis!();

    let manager = create_test_manager(|raw| raw.cache.allow_null_values = false);
    let cache = manager.get_cache("orders");

    cache
        .put(&1, &None::<Order>)
        .await
        .expect("null put must not fail");
    assert!(!manager
        .backend()
        .exists(&cache.physical_key(&1))
        .await
        .expect("EXISTS should not error"));
}

#[tokio::test]
async fn test_redis_concurrent_access() {
    require_redis!();

    let manager = create_test_manager(|_| {});

    let mut handles = Vec::new();
    for i in 0..20u64 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            let cache = manager.get_cache("orders");
            cache.put(&i, &i).await?;
            cache.get::<u64, _>(&i).await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let cached = handle
            .await
            .expect("task panicked")
            .expect("operation failed");
        assert_eq!(cached, Some(i as u64));
    }

    let stats = manager.backend().pool_stats();
    assert!(stats.connections >= 1);
    println!(
        "✓ Pool: {} connections, {} idle",
        stats.connections, stats.idle_connections
    );

    manager
        .get_cache("orders")
        .clear()
        .await
        .expect("Cleanup failed");
}
