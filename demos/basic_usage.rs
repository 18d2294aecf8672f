//! Provisioning walkthrough over the in-memory backend.
//!
//! Run with: cargo run --example basic_usage
//! Override settings with APP_* variables, e.g.
//! `APP_REDIS__CACHE__TIME_TO_LIVE=30s APP_APPLICATION__NAME=billing`.

use redis_cache_manager::backend::InMemoryBackend;
use redis_cache_manager::config::RawDuration;
use redis_cache_manager::{
    CacheManagerFactory, CacheTransaction, ConfigLoader, DeploymentIdentity, RawRedisSettings,
    Result,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Invoice {
    id: u64,
    customer: String,
    amount: f64,
}

fn invoice(id: u64) -> Invoice {
    Invoice {
        id,
        customer: "ACME Corp".to_string(),
        amount: 1250.0,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== Redis Cache Manager - Basic Example ===\n");

    // 1. Load settings from the environment
    println!("1. Loading settings...");
    let settings = ConfigLoader::new().load()?;
    println!("   ✓ Key prefix: {:?}", settings.cache().key_prefix());
    println!("   ✓ Default TTL: {:?}\n", settings.cache().time_to_live());

    // 2. Provision over an in-memory store
    println!("2. Provisioning cache manager...");
    let backend = InMemoryBackend::new();
    let manager = CacheManagerFactory::new(settings).build_with(backend.clone());
    let invoices = manager.get_cache("invoices");
    println!("   ✓ Physical key for invoice 1: {}\n", invoices.physical_key(&1));

    // 3. Read-through loading
    println!("3. Loading invoice 1 (miss, then hit):");
    for _ in 0..2 {
        let loaded = invoices
            .get_or_insert_with(&1, || async {
                println!("   → loading from the primary store");
                Ok(invoice(1))
            })
            .await?;
        println!("   ✓ {} owes ${:.2}", loaded.customer, loaded.amount);
    }
    println!();

    // 4. Transaction-aware caches defer writes until commit
    println!("4. Deferred writes:");
    let mut raw = RawRedisSettings::default();
    raw.cache.transaction_aware = true;
    raw.cache
        .cache_expirations
        .insert("drafts".to_string(), Some(RawDuration::from("5m")));
    let settings = raw.resolve(&DeploymentIdentity::new().with_application_name("demo"))?;
    let drafts = CacheManagerFactory::new(settings)
        .build_with(backend.clone())
        .get_cache("drafts");

    let tx = CacheTransaction::new();
    tx.scope(drafts.put(&2, &invoice(2))).await?;
    println!("   ✓ {} write(s) pending", tx.pending());
    tx.commit().await?;
    let committed: Option<Invoice> = drafts.get(&2).await?;
    println!("   ✓ After commit: {:?}\n", committed.map(|i| i.id));

    // 5. Clear one cache
    println!("5. Clearing 'invoices'...");
    invoices.clear().await?;
    println!("   ✓ Remaining keys: {:?}\n", backend.keys());

    Ok(())
}
