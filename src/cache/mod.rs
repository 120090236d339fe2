//! Cache Module
//!
//! Dependency-aware in-memory cache with lazy TTL expiration, LRU eviction, an
//! optional durable mirror and read-through fetching.

mod clock;
mod entry;
mod lru;
mod mirror;
mod shared;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, SetOptions, DEFAULT_VERSION};
pub use lru::LruTracker;
pub use mirror::DurableMirror;
pub use shared::{FetchOptions, Origin, PreloadOptions, Served, SharedCache};
pub use stats::CacheStats;
pub use store::CacheStore;
