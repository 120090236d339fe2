//! Request DTOs for the cache daemon API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::cache::SetOptions;

/// Longest key accepted over HTTP.
pub const MAX_KEY_LEN: usize = 512;

/// Request body for `PUT /entries`
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    pub key: String,
    /// Any JSON payload
    pub value: Value,
    /// Optional TTL in milliseconds (uses the configured default otherwise)
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LEN {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LEN
            ));
        }
        if self.dependencies.iter().any(String::is_empty) {
            return Some("Dependency tags cannot be empty".to_string());
        }
        None
    }

    /// Splits the request into key, payload and write options.
    pub fn into_parts(self) -> (String, Value, SetOptions) {
        let mut options = SetOptions::new().dependencies(self.dependencies);
        if let Some(ttl) = self.ttl_ms {
            options = options.ttl(ttl);
        }
        if let Some(version) = self.version {
            options = options.version(version);
        }
        (self.key, self.value, options)
    }
}

/// Request body for `POST /invalidate/pattern`
#[derive(Debug, Clone, Deserialize)]
pub struct PatternRequest {
    /// Regular expression matched against keys
    pub pattern: String,
}

/// Query string for `GET /entries/:key`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GetQuery {
    pub version: Option<String>,
}
