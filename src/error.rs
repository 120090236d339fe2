//! Error types for the cache
//!
//! Provides unified error handling using thiserror.
//!
//! A cache miss is never an error: lookups return `Option`. The variants here
//! cover the durable store, the HTTP surface and request validation.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Storage Error Enum ==
/// Failure reported by a durable key-value backend.
///
/// The cache recovers from all of these locally; they only surface through
/// logs and the `storage_errors` counter.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend refused the write because its quota is exhausted
    #[error("Storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    /// Filesystem failure
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored value could not be decoded into an entry
    #[error("Corrupt entry '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    /// Entry could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend is not usable (poisoned lock, missing directory)
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

// == Cache Error Enum ==
/// Unified error type for the cache daemon.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not present (or expired, or version mismatch)
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalidation pattern is not a valid regular expression
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Durable store failure that could not be absorbed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::InvalidPattern(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Storage(StorageError::QuotaExceeded { .. }) => {
                StatusCode::INSUFFICIENT_STORAGE
            }
            CacheError::Storage(_) | CacheError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_404() {
        let response = CacheError::NotFound("projects_u1_all".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_pattern_maps_to_400() {
        let err = regex::Regex::new("(unclosed").unwrap_err();
        let response = CacheError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_quota_message() {
        let err = StorageError::QuotaExceeded {
            needed: 10,
            available: 4,
        };
        assert_eq!(
            err.to_string(),
            "Storage quota exceeded: 10 bytes needed, 4 available"
        );
    }
}
