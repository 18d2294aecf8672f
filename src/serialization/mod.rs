//! Key and value encodings used for every cache.
//!
//! Both are fixed: keys are written as raw UTF-8 strings and values as JSON,
//! so anything with a stable `serde` representation round-trips through the
//! store and stays readable with `redis-cli`.
//!
//! ```rust
//! use redis_cache_manager::serialization::ValueSerialization;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Order {
//!     id: u64,
//!     total: f64,
//! }
//!
//! # fn main() -> redis_cache_manager::Result<()> {
//! let order = Order { id: 42, total: 9.5 };
//! let bytes = ValueSerialization::Json.encode(&order)?.expect("not null");
//! assert_eq!(bytes, br#"{"id":42,"total":9.5}"#);
//!
//! let decoded: Order = ValueSerialization::Json.decode(&bytes)?;
//! assert_eq!(order, decoded);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;

/// How logical keys are turned into physical key segments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeySerialization {
    /// `Display` output, stored as UTF-8.
    #[default]
    Utf8String,
}

impl KeySerialization {
    pub fn encode<K: Display + ?Sized>(&self, key: &K) -> String {
        match self {
            KeySerialization::Utf8String => key.to_string(),
        }
    }
}

/// How values are turned into stored bytes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValueSerialization {
    /// `serde_json` encoding.
    #[default]
    Json,
}

impl ValueSerialization {
    /// Encode `value`.
    ///
    /// Returns `Ok(None)` when the value is null (`None`, `()`, JSON `null`),
    /// so callers can apply the null-value policy before writing.
    ///
    /// # Errors
    ///
    /// Returns `Error::SerializationError` if `serde_json` fails.
    pub fn encode<V: Serialize + ?Sized>(&self, value: &V) -> Result<Option<Vec<u8>>> {
        match self {
            ValueSerialization::Json => {
                let json = serde_json::to_value(value).map_err(|e| {
                    error!("Cache value serialization failed: {}", e);
                    Error::SerializationError(e.to_string())
                })?;
                if json.is_null() {
                    return Ok(None);
                }
                serde_json::to_vec(&json)
                    .map(Some)
                    .map_err(|e| Error::SerializationError(e.to_string()))
            }
        }
    }

    /// Encoding of a cached null.
    pub fn encode_null(&self) -> Vec<u8> {
        match self {
            ValueSerialization::Json => b"null".to_vec(),
        }
    }

    /// Decode stored bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeserializationError` when the bytes are not valid JSON
    /// for `V`.
    pub fn decode<V: DeserializeOwned>(&self, bytes: &[u8]) -> Result<V> {
        match self {
            ValueSerialization::Json => serde_json::from_slice(bytes).map_err(|e| {
                warn!("Cache value deserialization failed: {}", e);
                Error::DeserializationError(e.to_string())
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
    struct TestData {
        id: u64,
        name: String,
        tags: Vec<String>,
        attributes: BTreeMap<String, i32>,
    }

    fn sample() -> TestData {
        let mut attributes = BTreeMap::new();
        attributes.insert("weight".to_string(), 3);
        TestData {
            id: 123,
            name: "test".to_string(),
            tags: vec!["a".to_string(), "b".to_string()],
            attributes,
        }
    }

    #[test]
    fn test_roundtrip() {
        let data = sample();
        let bytes = ValueSerialization::Json.encode(&data).unwrap().unwrap();
        let decoded: TestData = ValueSerialization::Json.decode(&bytes).unwrap();
        assert_eq!(data, decoded);
    }

    #[test]
    fn test_values_are_plain_json() {
        let bytes = ValueSerialization::Json.encode(&sample()).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["id"], 123);
        assert_eq!(json["name"], "test");
    }

    #[test]
    fn test_null_values_detected() {
        assert_eq!(ValueSerialization::Json.encode(&None::<u32>).unwrap(), None);
        assert_eq!(ValueSerialization::Json.encode(&()).unwrap(), None);
        assert_eq!(
            ValueSerialization::Json.encode(&serde_json::Value::Null).unwrap(),
            None
        );
        assert!(ValueSerialization::Json.encode(&Some(0)).unwrap().is_some());
    }

    #[test]
    fn test_cached_null_decodes_as_none() {
        let bytes = ValueSerialization::Json.encode_null();
        let decoded: Option<TestData> = ValueSerialization::Json.decode(&bytes).unwrap();
        assert_eq!(decoded, None);
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        let mut bytes = ValueSerialization::Json.encode(&sample()).unwrap().unwrap();
        bytes.truncate(bytes.len() / 2);

        let result: Result<TestData> = ValueSerialization::Json.decode(&bytes);
        match result.unwrap_err() {
            Error::DeserializationError(_) => {}
            e => panic!("Expected DeserializationError, got {:?}", e),
        }
    }

    #[test]
    fn test_key_encoding() {
        assert_eq!(KeySerialization::Utf8String.encode(&42), "42");
        assert_eq!(KeySerialization::Utf8String.encode("user:ü"), "user:ü");
    }
}
