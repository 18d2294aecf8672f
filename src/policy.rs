//! Cache policies and their compilation from [`CacheSettings`].
//!
//! A [`CachePolicy`] is an immutable value. Every `with_*` method consumes the
//! policy and returns a new one, so named policies derived from the same base
//! never share mutable state.
//!
//! # Compilation
//!
//! ```text
//! CacheSettings ──► base policy ──► prefix strategy ──► per-name overrides
//!                   (serializers,    (Disabled or       (base with TTL
//!                    TTL, nulls,      Global(prefix))    replaced)
//!                    transactions)
//! ```
//!
//! ```
//! use redis_cache_manager::config::RawRedisSettings;
//! use redis_cache_manager::placeholder::DeploymentIdentity;
//! use redis_cache_manager::policy::{CachePolicyCompiler, Expiration};
//! use std::time::Duration;
//!
//! let mut raw = RawRedisSettings::default();
//! raw.cache.key_prefix = "svc:prod:".to_string();
//! raw.cache.cache_expirations.insert("orders".to_string(), Some("10m".into()));
//! let settings = raw.resolve(&DeploymentIdentity::new()).unwrap();
//!
//! let policies = CachePolicyCompiler::compile(settings.cache());
//! let orders = policies.policy_for("orders");
//! assert_eq!(orders.expiration(), Expiration::After(Duration::from_secs(600)));
//! assert_eq!(orders.physical_key("orders", &42), "svc:prod:orders::42");
//! ```

use crate::config::CacheSettings;
use crate::serialization::{KeySerialization, ValueSerialization};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::Duration;

/// Separator between the cache name and the serialized key.
pub const CACHE_NAME_SEPARATOR: &str = "::";

/// Lifetime of entries written through a cache.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Expiration {
    /// Entries never expire.
    #[default]
    Never,
    /// Entries expire after the given duration.
    After(Duration),
}

impl Expiration {
    /// Zero means "never expire", not "expire immediately".
    pub fn from_duration(duration: Duration) -> Self {
        if duration.is_zero() {
            Expiration::Never
        } else {
            Expiration::After(duration)
        }
    }

    /// TTL to pass to the backend, `None` for persistent entries.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Expiration::Never => None,
            Expiration::After(d) => Some(*d),
        }
    }
}

impl From<Duration> for Expiration {
    fn from(duration: Duration) -> Self {
        Self::from_duration(duration)
    }
}

/// How cache names are turned into a physical key prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum KeyPrefix {
    /// Keys are written as-is, without any cache name segment.
    #[default]
    Disabled,
    /// `<global><cacheName>::` is prepended to every key.
    Global(String),
}

impl KeyPrefix {
    /// Prefix for the keys of cache `name`, `None` when prefixing is off.
    pub fn compute(&self, name: &str) -> Option<String> {
        match self {
            KeyPrefix::Disabled => None,
            KeyPrefix::Global(global) => Some(format!(
                "{}{}{}",
                global, name, CACHE_NAME_SEPARATOR
            )),
        }
    }
}

/// Resolved rules governing one named cache.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    key_serialization: KeySerialization,
    value_serialization: ValueSerialization,
    expiration: Expiration,
    cache_null_values: bool,
    key_prefix: KeyPrefix,
    transaction_aware: bool,
}

impl Default for CachePolicy {
    /// UTF-8 keys, JSON values, no expiration, nulls cached, no prefix.
    fn default() -> Self {
        CachePolicy {
            key_serialization: KeySerialization::Utf8String,
            value_serialization: ValueSerialization::Json,
            expiration: Expiration::Never,
            cache_null_values: true,
            key_prefix: KeyPrefix::Disabled,
            transaction_aware: false,
        }
    }
}

impl CachePolicy {
    pub fn with_expiration(self, expiration: Expiration) -> Self {
        CachePolicy { expiration, ..self }
    }

    pub fn with_cache_null_values(self, cache_null_values: bool) -> Self {
        CachePolicy {
            cache_null_values,
            ..self
        }
    }

    pub fn with_key_prefix(self, key_prefix: KeyPrefix) -> Self {
        CachePolicy { key_prefix, ..self }
    }

    pub fn with_transaction_aware(self, transaction_aware: bool) -> Self {
        CachePolicy {
            transaction_aware,
            ..self
        }
    }

    pub fn key_serialization(&self) -> KeySerialization {
        self.key_serialization
    }

    pub fn value_serialization(&self) -> ValueSerialization {
        self.value_serialization
    }

    pub fn expiration(&self) -> Expiration {
        self.expiration
    }

    pub fn cache_null_values(&self) -> bool {
        self.cache_null_values
    }

    pub fn key_prefix(&self) -> &KeyPrefix {
        &self.key_prefix
    }

    pub fn transaction_aware(&self) -> bool {
        self.transaction_aware
    }

    /// Prefix for cache `name`, `None` when prefixing is disabled.
    pub fn prefix_for(&self, name: &str) -> Option<String> {
        self.key_prefix.compute(name)
    }

    /// Physical store key for `key` in cache `name`.
    pub fn physical_key<K: Display + ?Sized>(&self, name: &str, key: &K) -> String {
        let key = self.key_serialization.encode(key);
        match self.prefix_for(name) {
            Some(prefix) => prefix + &key,
            None => key,
        }
    }
}

/// Output of [`CachePolicyCompiler::compile`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompiledPolicies {
    defaults: CachePolicy,
    initial: BTreeMap<String, CachePolicy>,
}

impl CompiledPolicies {
    /// Policy used for any cache name without an override.
    pub fn defaults(&self) -> &CachePolicy {
        &self.defaults
    }

    /// Pre-registered policies, ordered by cache name.
    pub fn initial(&self) -> &BTreeMap<String, CachePolicy> {
        &self.initial
    }

    /// Policy for `name`: its override if registered, the defaults otherwise.
    pub fn policy_for(&self, name: &str) -> &CachePolicy {
        self.initial.get(name).unwrap_or(&self.defaults)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.initial.contains_key(name)
    }
}

/// Merges global cache settings with per-cache overrides.
pub struct CachePolicyCompiler;

impl CachePolicyCompiler {
    /// Compile `settings` into the default policy plus one policy per override.
    pub fn compile(settings: &CacheSettings) -> CompiledPolicies {
        let defaults = Self::base_policy(settings);

        let initial: BTreeMap<String, CachePolicy> = settings
            .cache_expirations()
            .iter()
            .map(|(name, ttl)| {
                let policy = defaults
                    .clone()
                    .with_expiration(Expiration::from_duration(*ttl));
                (name.clone(), policy)
            })
            .collect();

        debug!(
            "Compiled cache policies: defaults {:?}, {} named override(s)",
            defaults.expiration(),
            initial.len()
        );

        CompiledPolicies { defaults, initial }
    }

    fn base_policy(settings: &CacheSettings) -> CachePolicy {
        let key_prefix = if settings.use_prefix() {
            KeyPrefix::Global(settings.key_prefix().to_string())
        } else {
            KeyPrefix::Disabled
        };

        CachePolicy::default()
            .with_expiration(Expiration::from_duration(settings.time_to_live()))
            .with_cache_null_values(settings.allow_null_values())
            .with_key_prefix(key_prefix)
            .with_transaction_aware(settings.transaction_aware())
    }
}
