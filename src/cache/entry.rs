//! Cache Entry Module
//!
//! Defines the record stored per key and the options accepted by `set`.

use serde::{Deserialize, Serialize};

/// Version tag applied when `set` is not given one.
pub const DEFAULT_VERSION: &str = "1.0";

// == Cache Entry ==
/// A cached payload plus the metadata that governs its lifetime.
///
/// Field names on the wire (`data`, `timestamp`, `ttl`, ...) are the durable
/// mirror's storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    /// The cached value
    #[serde(rename = "data")]
    pub payload: V,
    /// Write timestamp (Unix milliseconds)
    #[serde(rename = "timestamp")]
    pub written_at: u64,
    /// Time to live in milliseconds
    pub ttl: u64,
    /// Caller-supplied version tag
    pub version: String,
    /// Tags for group invalidation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates an entry written at `now_ms`, filling unset options from
    /// `default_ttl`.
    pub fn new(payload: V, now_ms: u64, default_ttl: u64, options: SetOptions) -> Self {
        let mut dependencies = options.dependencies;
        dependencies.sort();
        dependencies.dedup();

        Self {
            payload,
            written_at: now_ms,
            ttl: options.ttl_ms.unwrap_or(default_ttl),
            version: options
                .version
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            dependencies,
        }
    }

    // == Is Expired ==
    /// An entry is expired once strictly more than `ttl` ms have passed since
    /// it was written. A clock that moved backwards never expires anything.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.written_at) > self.ttl
    }

    /// Age in milliseconds at `now_ms`.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.written_at)
    }

    /// Remaining lifetime in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.ttl.saturating_sub(self.age_ms(now_ms))
    }

    /// True when `expected` is absent or equals the stored version.
    pub fn matches_version(&self, expected: Option<&str>) -> bool {
        expected.map_or(true, |v| v == self.version)
    }

    pub fn has_dependency(&self, tag: &str) -> bool {
        self.dependencies.iter().any(|d| d == tag)
    }
}

// == Set Options ==
/// Per-write overrides. Unset fields fall back to the cache configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOptions {
    pub ttl_ms: Option<u64>,
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn dependencies<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = tags.into_iter().map(Into::into).collect();
        self
    }
}
