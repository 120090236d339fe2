//! Studio Cache - dependency-aware query cache
//!
//! TTL and LRU bounded caching of query results with a durable mirror,
//! read-through fetching with stale-while-revalidate, and invalidation driven
//! by dependency tags, key patterns and domain write-events.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod keys;
pub mod models;
pub mod policy;
pub mod query;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheStore, FetchOptions, Served, SetOptions, SharedCache};
pub use config::{CacheConfig, Config};
pub use events::EventBus;
pub use keys::{cache_key, CacheKeys, Entity};
pub use policy::{DomainEvent, InvalidationPolicy};
pub use query::{CachedQuery, FetchSource, QueryProfile};
pub use storage::{DurableStore, FileStorage, MemoryStorage};
pub use tasks::spawn_sweep_task;
