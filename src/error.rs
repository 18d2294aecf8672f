//! Error types for cache provisioning and cache operations.

use std::fmt;

/// Result type for provisioning and cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cache manager.
///
/// Provisioning failures (`InvalidValue`, `ConnectionUnavailable`) are fatal and
/// abort startup. Runtime failures (`StoreUnavailable`) are transient: callers
/// should treat the cache as empty and fall back to the primary data source.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Configuration failed static validation.
    ///
    /// Raised while resolving raw settings, before anything is constructed.
    /// Common causes:
    /// - Port outside `1..=65535`
    /// - Blank host or blank cache name in `cacheExpirations`
    /// - Missing or unparseable duration
    /// - Key prefix template with an unresolvable placeholder
    ///
    /// **Recovery:** Fix configuration and restart.
    InvalidValue {
        /// Dotted path of the offending field, e.g. `cache.cacheExpirations.orders`
        field: String,
        /// Human readable description of the violated constraint
        constraint: String,
    },

    /// The connection factory could not be built from the connection descriptor.
    ///
    /// Live connectivity is checked lazily, so this only covers failures that
    /// are detectable at construction time (malformed address, pool setup).
    ///
    /// **Recovery:** Fix configuration and restart.
    ConnectionUnavailable(String),

    /// A cache operation timed out or the store could not be reached.
    ///
    /// **Recovery:** Treat as a cache miss and use the underlying data source.
    /// The operation is not retried internally.
    StoreUnavailable(String),

    /// Serialization failed when converting a value to JSON.
    SerializationError(String),

    /// Deserialization failed when converting stored bytes back into a value.
    ///
    /// **Recovery:** Evict the entry and recompute.
    DeserializationError(String),
}

impl Error {
    /// Shorthand for building an [`Error::InvalidValue`].
    pub fn invalid_value(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Error::InvalidValue {
            field: field.into(),
            constraint: constraint.into(),
        }
    }

    /// Qualify the field of an [`Error::InvalidValue`] with the namespace it
    /// was loaded from. Other variants pass through.
    pub fn within(self, namespace: &str) -> Self {
        match self {
            Error::InvalidValue { field, constraint } => Error::InvalidValue {
                field: format!("{}.{}", namespace, field),
                constraint,
            },
            other => other,
        }
    }

    /// Whether the failure is transient and the operation may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }

    /// Whether the failure happened while provisioning (and must abort startup).
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidValue { .. } | Error::ConnectionUnavailable(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidValue { field, constraint } => {
                write!(f, "Invalid value for '{}': {}", field, constraint)
            }
            Error::ConnectionUnavailable(msg) => write!(f, "Connection unavailable: {}", msg),
            Error::StoreUnavailable(msg) => write!(f, "Store unavailable: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        if e.is_io() {
            Error::StoreUnavailable(e.to_string())
        } else if e.is_syntax() || e.is_eof() || e.is_data() {
            Error::DeserializationError(e.to_string())
        } else {
            Error::SerializationError(e.to_string())
        }
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        let field = if e.path.is_empty() {
            "<root>".to_string()
        } else {
            e.path.join(".")
        };
        Error::InvalidValue {
            field,
            constraint: e.kind.to_string(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Error::StoreUnavailable(format!("command timed out: {}", e))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::StoreUnavailable(format!("Redis error: {}", e))
    }
}
