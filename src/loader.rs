//! Layered configuration loading.
//!
//! Sources are merged in this order (later sources override earlier):
//! 1. Defaults from [`RawRedisSettings::default`]
//! 2. TOML configuration file (if given and present)
//! 3. Environment variables with prefix, `__` separating nested keys
//!    (e.g. `APP_REDIS__CACHE__TIME_TO_LIVE=10m`)
//!
//! Environment keys are rewritten to the camelCase used in files, so
//! `TIME_TO_LIVE` overrides `timeToLive`. Cache names under
//! `CACHE_EXPIRATIONS` are only lowercased. Text settings such as the password
//! keep the variable's exact value instead of being parsed as numbers.
//!
//! Connection and cache settings live under the `redis` namespace. The
//! deployment identity used to render the key prefix is read from
//! `application.name` and `profiles.active`.
//!
//! ```toml
//! [application]
//! name = "billing"
//!
//! [profiles]
//! active = "prod"
//!
//! [redis]
//! host = "cache.internal"
//! timeout = "500ms"
//!
//! [redis.cache]
//! timeToLive = "1h"
//!
//! [redis.cache.cacheExpirations]
//! orders = "10m"
//! ```

use crate::config::{RawRedisSettings, RedisSettings};
use crate::error::Result;
use crate::placeholder::DeploymentIdentity;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "APP_";

/// Namespace holding connection and cache settings.
pub const REDIS_NAMESPACE: &str = "redis";

/// Environment keys whose values are taken verbatim.
const TEXT_KEYS: &[&str] = &[
    "redis.host",
    "redis.username",
    "redis.password",
    "redis.cache.keyPrefix",
    "application.name",
    "profiles.active",
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RedisKeys {
    redis: RawRedisSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IdentityKeys {
    application: ApplicationKeys,
    profiles: ProfileKeys,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApplicationKeys {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProfileKeys {
    active: Option<ActiveProfiles>,
}

/// `profiles.active` as a comma separated string or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ActiveProfiles {
    List(Vec<String>),
    Joined(String),
}

impl ActiveProfiles {
    fn into_vec(self) -> Vec<String> {
        match self {
            ActiveProfiles::List(profiles) => profiles,
            ActiveProfiles::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Configuration loader.
#[derive(Clone, Debug)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
        }
    }

    /// Set the configuration file path.
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix (including any trailing `_`).
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// The merged configuration sources.
    pub fn figment(&self) -> Figment {
        let mut figment = Figment::new();

        if let Some(config_path) = &self.config_path {
            if config_path.exists() {
                info!("Loading configuration from {}", config_path.display());
                figment = figment.merge(Toml::file(config_path));
            } else {
                warn!(
                    "Configuration file {} not found, using defaults and environment",
                    config_path.display()
                );
            }
        }

        let env = self.env();
        let text_values: Vec<(String, String)> = env
            .iter()
            .filter(|(key, _)| TEXT_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.as_str().to_string(), value))
            .collect();

        figment = figment.merge(env);
        for (key, value) in text_values {
            figment = figment.merge(Serialized::default(&key, value));
        }
        figment
    }

    /// Prefixed environment variables, keyed like the configuration file.
    fn env(&self) -> Env {
        Env::prefixed(&self.env_prefix)
            .map(|key| env_key_path(key.as_str()).into())
            .lowercase(false)
    }

    /// Load and resolve settings from all sources.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidValue` when a source holds a value of the wrong
    /// type or the merged settings fail validation.
    pub fn load(&self) -> Result<RedisSettings> {
        Self::extract(&self.figment())
    }

    /// Resolve settings from an already assembled [`Figment`].
    ///
    /// # Errors
    ///
    /// Same as [`ConfigLoader::load`].
    pub fn extract(figment: &Figment) -> Result<RedisSettings> {
        if !figment.contains(REDIS_NAMESPACE) {
            debug!("No '{}' configuration found, using defaults", REDIS_NAMESPACE);
        }
        let keys: RedisKeys = figment.extract()?;

        let identity = Self::identity(figment)?;
        let settings = keys
            .redis
            .resolve(&identity)
            .map_err(|e| e.within(REDIS_NAMESPACE))?;

        debug!("Loaded Redis settings: {:?}", settings);
        Ok(settings)
    }

    /// Deployment identity from `application.name` and `profiles.active`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidValue` when either key has the wrong type.
    pub fn identity(figment: &Figment) -> Result<DeploymentIdentity> {
        let keys: IdentityKeys = figment.extract()?;

        let mut identity = DeploymentIdentity::new();
        if let Some(name) = keys.application.name {
            identity = identity.with_application_name(name);
        }
        for profile in keys.profiles.active.map(ActiveProfiles::into_vec).unwrap_or_default() {
            identity = identity.with_active_profile(profile);
        }

        Ok(identity)
    }
}

/// Dotted configuration path for an environment key with the prefix removed.
///
/// `REDIS__CACHE__TIME_TO_LIVE` becomes `redis.cache.timeToLive`.
fn env_key_path(key: &str) -> String {
    let mut segments: Vec<String> = Vec::new();
    for segment in key.split("__") {
        let segment = segment.to_ascii_lowercase();
        let is_cache_name = segments.last().is_some_and(|parent| parent == "cacheExpirations");
        segments.push(if is_cache_name {
            segment
        } else {
            camel_case(&segment)
        });
    }
    segments.join(".")
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper_next = false;
    for c in snake.chars() {
        if c == '_' && !out.is_empty() {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
