//! Configuration Module
//!
//! Cache construction options and daemon settings loaded from environment
//! variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;

// == Cache Config ==
/// Options recognized when constructing a cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Fallback time to live in milliseconds when `set` omits one
    pub default_ttl_ms: u64,
    /// Resident-entry cap before LRU eviction begins
    pub max_size: usize,
    /// Mirror entries into the durable store
    pub persist_to_storage: bool,
    /// Serialized size in bytes above which durable writes are compressed
    pub compression_threshold: usize,
    /// Namespace prefix for durable keys
    pub storage_prefix: String,
    /// Share one fetch between concurrent misses on the same key
    pub coalesce_fetches: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: 5 * 60 * 1000,
            max_size: 200,
            persist_to_storage: true,
            compression_threshold: 5_000,
            storage_prefix: "cache_".to_string(),
            coalesce_fetches: false,
        }
    }
}

impl CacheConfig {
    /// Loads cache options from `CACHE_*` environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `CACHE_MAX_SIZE` - Resident-entry cap (default: 200)
    /// - `CACHE_PERSIST` - Enable the durable mirror (default: true)
    /// - `CACHE_COMPRESSION_THRESHOLD` - Compression trigger in bytes (default: 5000)
    /// - `CACHE_STORAGE_PREFIX` - Durable key prefix (default: "cache_")
    /// - `CACHE_COALESCE_FETCHES` - Coalesce concurrent misses (default: false)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_ttl_ms: env_or("CACHE_DEFAULT_TTL_MS", defaults.default_ttl_ms),
            max_size: env_or("CACHE_MAX_SIZE", defaults.max_size),
            persist_to_storage: env_or("CACHE_PERSIST", defaults.persist_to_storage),
            compression_threshold: env_or(
                "CACHE_COMPRESSION_THRESHOLD",
                defaults.compression_threshold,
            ),
            storage_prefix: env::var("CACHE_STORAGE_PREFIX").unwrap_or(defaults.storage_prefix),
            coalesce_fetches: env_or("CACHE_COALESCE_FETCHES", defaults.coalesce_fetches),
        }
    }
}

// == Daemon Config ==
/// Settings for the cache daemon binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    /// HTTP server port
    pub server_port: u16,
    /// Expired-entry sweep interval in seconds
    pub sweep_interval: u64,
    /// Directory backing the durable store
    pub storage_dir: PathBuf,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `STORAGE_DIR` - Durable store directory (default: ./cache-data)
    /// - plus everything read by [`CacheConfig::from_env`]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache: CacheConfig::from_env(),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            sweep_interval: env_or("SWEEP_INTERVAL", defaults.sweep_interval),
            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            server_port: 3000,
            sweep_interval: 60,
            storage_dir: PathBuf::from("./cache-data"),
        }
    }
}

/// Parses `name` from the environment, keeping `default` when unset or invalid.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
