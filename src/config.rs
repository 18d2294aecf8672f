//! Typed, validated connection and cache policy settings.
//!
//! Raw input arrives as [`RawRedisSettings`] (deserialized by the
//! [`loader`](crate::loader) or built by hand) and is turned into an immutable
//! [`RedisSettings`] by [`RawRedisSettings::resolve`]. Defaults are applied
//! first, then every constraint is checked; nothing is constructed unless all
//! checks pass.

use crate::error::{Error, Result};
use crate::placeholder::{self, PlaceholderSource, DEFAULT_KEY_PREFIX_TEMPLATE};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Default command timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Duration as written in configuration.
///
/// Integers are milliseconds, strings use humantime syntax (`"2s"`, `"1h 30m"`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDuration {
    Millis(u64),
    Text(String),
}

impl RawDuration {
    fn parse(&self, field: &str) -> Result<Duration> {
        match self {
            RawDuration::Millis(ms) => Ok(Duration::from_millis(*ms)),
            RawDuration::Text(text) => humantime::parse_duration(text.trim()).map_err(|e| {
                Error::invalid_value(field, format!("'{}' is not a valid duration: {}", text, e))
            }),
        }
    }
}

impl From<Duration> for RawDuration {
    fn from(d: Duration) -> Self {
        RawDuration::Millis(d.as_millis() as u64)
    }
}

impl From<&str> for RawDuration {
    fn from(s: &str) -> Self {
        RawDuration::Text(s.to_string())
    }
}

/// Scalar accepted where text is expected, e.g. an all-digit password.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(scalar: Scalar) -> Self {
        match scalar {
            Scalar::Text(text) => text,
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Signed(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(String::from)
}

fn lenient_option_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

/// Raw connection settings, before validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawRedisSettings {
    pub enabled: bool,
    #[serde(deserialize_with = "lenient_string")]
    pub host: String,
    /// Wide integer so out-of-range ports are reported, not truncated.
    pub port: i64,
    pub database: i64,
    #[serde(deserialize_with = "lenient_option_string")]
    pub username: Option<String>,
    #[serde(deserialize_with = "lenient_option_string")]
    pub password: Option<String>,
    pub timeout: Option<RawDuration>,
    pub cache: RawCacheSettings,
}

impl Default for RawRedisSettings {
    fn default() -> Self {
        RawRedisSettings {
            enabled: true,
            host: "localhost".to_string(),
            port: 6379,
            database: 0,
            username: None,
            password: None,
            timeout: Some(RawDuration::from(DEFAULT_TIMEOUT)),
            cache: RawCacheSettings::default(),
        }
    }
}

/// Raw cache policy settings, before validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawCacheSettings {
    #[serde(alias = "time_to_live")]
    pub time_to_live: Option<RawDuration>,
    #[serde(alias = "use_prefix")]
    pub use_prefix: bool,
    #[serde(alias = "key_prefix")]
    pub key_prefix: String,
    #[serde(alias = "allow_null_values")]
    pub allow_null_values: bool,
    #[serde(alias = "transaction_aware")]
    pub transaction_aware: bool,
    #[serde(alias = "cache_expirations")]
    pub cache_expirations: BTreeMap<String, Option<RawDuration>>,
}

impl Default for RawCacheSettings {
    fn default() -> Self {
        RawCacheSettings {
            time_to_live: Some(RawDuration::Millis(0)),
            use_prefix: true,
            key_prefix: DEFAULT_KEY_PREFIX_TEMPLATE.to_string(),
            allow_null_values: false,
            transaction_aware: false,
            cache_expirations: BTreeMap::new(),
        }
    }
}

impl RawRedisSettings {
    /// Validate and resolve into [`RedisSettings`].
    ///
    /// `placeholders` renders the key prefix template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] naming the first offending field.
    pub fn resolve(self, placeholders: &dyn PlaceholderSource) -> Result<RedisSettings> {
        if self.host.trim().is_empty() {
            return Err(Error::invalid_value("host", "must not be blank"));
        }

        let port = u16::try_from(self.port)
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| {
                Error::invalid_value(
                    "port",
                    format!("must be between 1 and 65535, got {}", self.port),
                )
            })?;

        let database = u32::try_from(self.database).map_err(|_| {
            Error::invalid_value(
                "database",
                format!("must be a non-negative index, got {}", self.database),
            )
        })?;

        let timeout = self
            .timeout
            .as_ref()
            .ok_or_else(|| Error::invalid_value("timeout", "must not be null"))?
            .parse("timeout")?;

        let cache = self.cache.resolve(placeholders)?;

        Ok(RedisSettings {
            enabled: self.enabled,
            host: self.host,
            port,
            database,
            username: self.username,
            password: self.password,
            timeout,
            cache,
        })
    }
}

impl RawCacheSettings {
    fn resolve(self, placeholders: &dyn PlaceholderSource) -> Result<CacheSettings> {
        let time_to_live = self
            .time_to_live
            .as_ref()
            .ok_or_else(|| Error::invalid_value("cache.timeToLive", "must not be null"))?
            .parse("cache.timeToLive")?;

        let mut cache_expirations = BTreeMap::new();
        for (name, ttl) in &self.cache_expirations {
            if name.trim().is_empty() {
                return Err(Error::invalid_value(
                    "cache.cacheExpirations",
                    "cache name must not be blank",
                ));
            }
            let field = format!("cache.cacheExpirations.{}", name);
            let ttl = ttl
                .as_ref()
                .ok_or_else(|| Error::invalid_value(&field, "must not be null"))?
                .parse(&field)?;
            cache_expirations.insert(name.clone(), ttl);
        }

        // The template only matters when prefixing is on.
        let key_prefix = if self.use_prefix {
            placeholder::render(&self.key_prefix, placeholders)
                .map_err(|e| Error::invalid_value("cache.keyPrefix", e))?
        } else {
            String::new()
        };

        Ok(CacheSettings {
            time_to_live,
            use_prefix: self.use_prefix,
            key_prefix,
            allow_null_values: self.allow_null_values,
            transaction_aware: self.transaction_aware,
            cache_expirations,
        })
    }
}

/// Validated connection and cache settings.
#[derive(Clone, PartialEq)]
pub struct RedisSettings {
    enabled: bool,
    host: String,
    port: u16,
    database: u32,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
    cache: CacheSettings,
}

impl RedisSettings {
    /// Whether caching is switched on at all.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> u32 {
        self.database
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Upper bound for every individual store command.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cache(&self) -> &CacheSettings {
        &self.cache
    }
}

impl fmt::Debug for RedisSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisSettings")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Validated cache policy settings.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheSettings {
    time_to_live: Duration,
    use_prefix: bool,
    key_prefix: String,
    allow_null_values: bool,
    transaction_aware: bool,
    cache_expirations: BTreeMap<String, Duration>,
}

impl CacheSettings {
    /// Default time-to-live. Zero means entries never expire.
    pub fn time_to_live(&self) -> Duration {
        self.time_to_live
    }

    pub fn use_prefix(&self) -> bool {
        self.use_prefix
    }

    /// Rendered key prefix. Empty when prefixing is disabled.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn allow_null_values(&self) -> bool {
        self.allow_null_values
    }

    pub fn transaction_aware(&self) -> bool {
        self.transaction_aware
    }

    /// Per-cache time-to-live overrides.
    pub fn cache_expirations(&self) -> &BTreeMap<String, Duration> {
        &self.cache_expirations
    }
}
