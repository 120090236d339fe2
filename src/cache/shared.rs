//! Shared Cache Handle
//!
//! A cloneable handle over one [`CacheStore`] plus the read-through flow
//! callers use: check the cache, otherwise run the caller's fetch and store
//! the result. Hits can optionally trigger a background revalidation
//! (stale-while-revalidate).
//!
//! Store operations never hold the lock across a fetch; the fetch runs with
//! the lock released and its result is written back afterwards. Two misses
//! racing on one key therefore both fetch, and the last write wins, unless
//! `coalesce_fetches` is enabled, in which case later callers wait for the
//! first fetch and are then served from the cache.
//!
//! A background revalidation only writes back while the entry it started
//! from is still in place. An invalidation, delete or newer write that lands
//! during the fetch wins, and the revalidated value is dropped.

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::{CacheStats, CacheStore, SetOptions};

// == Served ==
/// Where a read-through value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Served from the cache; `revalidating` is true when this read started a
    /// background refresh, meaning the value may be superseded shortly
    Cache { revalidating: bool },
    /// Produced by the caller's fetch and written to the cache
    Fetch,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Served<V> {
    pub value: V,
    pub origin: Origin,
}

impl<V> Served<V> {
    fn cached(value: V, revalidating: bool) -> Self {
        Self {
            value,
            origin: Origin::Cache { revalidating },
        }
    }

    fn fetched(value: V) -> Self {
        Self {
            value,
            origin: Origin::Fetch,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self.origin, Origin::Cache { .. })
    }

    /// True when the value came from the cache and a refresh is under way.
    pub fn is_stale(&self) -> bool {
        matches!(self.origin, Origin::Cache { revalidating: true })
    }

    pub fn into_value(self) -> V {
        self.value
    }
}

// == Fetch Options ==
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// TTL, version and dependencies for the entry written on fetch. The
    /// version doubles as the expected version when reading.
    pub set: SetOptions,
    pub stale_while_revalidate: bool,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl_ms: u64) -> Self {
        self.set = self.set.ttl(ttl_ms);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.set = self.set.version(version);
        self
    }

    pub fn dependencies<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set = self.set.dependencies(tags);
        self
    }

    pub fn stale_while_revalidate(mut self, enabled: bool) -> Self {
        self.stale_while_revalidate = enabled;
        self
    }
}

// == Preload Options ==
type Condition = Arc<dyn Fn() -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct PreloadOptions {
    pub set: SetOptions,
    condition: Option<Condition>,
}

impl PreloadOptions {
    pub fn new(set: SetOptions) -> Self {
        Self {
            set,
            condition: None,
        }
    }

    /// Only use the cache while `condition` returns true; otherwise the
    /// loader is called directly and nothing is stored.
    pub fn when(mut self, condition: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(condition));
        self
    }
}

impl fmt::Debug for PreloadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreloadOptions")
            .field("set", &self.set)
            .field("condition", &self.condition.is_some())
            .finish()
    }
}

// == Shared Cache ==
/// Cloneable handle; every clone operates on the same store.
#[derive(Clone)]
pub struct SharedCache<V> {
    store: Arc<RwLock<CacheStore<V>>>,
    /// Per-key gates serializing misses when coalescing is on
    in_flight: Arc<DashMap<String, Arc<Mutex<()>>>>,
    /// Keys with a background revalidation running
    revalidating: Arc<DashSet<String>>,
    coalesce: bool,
}

impl<V> SharedCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(store: CacheStore<V>) -> Self {
        let coalesce = store.config().coalesce_fetches;
        Self {
            store: Arc::new(RwLock::new(store)),
            in_flight: Arc::new(DashMap::new()),
            revalidating: Arc::new(DashSet::new()),
            coalesce,
        }
    }

    /// The underlying store, for callers batching several operations under
    /// one lock.
    pub fn store(&self) -> Arc<RwLock<CacheStore<V>>> {
        self.store.clone()
    }

    // == Store Operations ==
    pub async fn get(&self, key: &str, expected_version: Option<&str>) -> Option<V> {
        // Write lock: reads bump LRU order and may delete
        self.store.write().await.get(key, expected_version)
    }

    pub async fn set(&self, key: &str, payload: V, options: SetOptions) {
        self.store.write().await.set(key, payload, options);
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.write().await.delete(key)
    }

    pub async fn invalidate_by_dependency(&self, tag: &str) -> usize {
        self.store.write().await.invalidate_by_dependency(tag)
    }

    pub async fn invalidate_by_pattern(&self, pattern: &Regex) -> usize {
        self.store.write().await.invalidate_by_pattern(pattern)
    }

    /// Empties the cache, returning how many entries were removed.
    pub async fn clear(&self) -> usize {
        self.store.write().await.clear()
    }

    pub async fn load_from_storage(&self) -> usize {
        self.store.write().await.load_from_storage()
    }

    pub async fn sweep_expired(&self) -> usize {
        self.store.write().await.sweep_expired()
    }

    pub async fn stats(&self) -> CacheStats {
        self.store.read().await.stats()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.store.read().await.contains(key)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.store.read().await.keys()
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    /// Number of keys with a background revalidation running.
    pub fn revalidations_in_flight(&self) -> usize {
        self.revalidating.len()
    }

    // == Read Through ==
    /// Returns the cached value for `key`, or runs `fetcher`, caches its
    /// result and returns it.
    ///
    /// Fetch errors are returned unchanged and nothing is cached. With
    /// stale-while-revalidate on, a hit also spawns `fetcher` in the
    /// background (at most one per key at a time); its result replaces the
    /// entry but never the value already returned.
    pub async fn read_through<F, Fut, E>(
        &self,
        key: &str,
        options: FetchOptions,
        fetcher: F,
    ) -> Result<Served<V>, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let version = options.set.version.clone();

        if let Some((value, generation)) =
            self.get_with_generation(key, version.as_deref()).await
        {
            let revalidating = match generation {
                Some(generation) if options.stale_while_revalidate => {
                    self.spawn_revalidation(key, generation, options.set, fetcher)
                }
                _ => false,
            };
            return Ok(Served::cached(value, revalidating));
        }

        if !self.coalesce {
            let value = self.fetch_and_store(key, options.set, fetcher).await?;
            return Ok(Served::fetched(value));
        }

        let gate = self.in_flight.entry(key.to_string()).or_default().clone();
        let result = {
            let _turn = gate.lock().await;
            // Whoever held the gate before us may have filled the key
            match self.get(key, version.as_deref()).await {
                Some(value) => {
                    debug!("Coalesced fetch for '{}'", key);
                    Ok(Served::cached(value, false))
                }
                None => self
                    .fetch_and_store(key, options.set, fetcher)
                    .await
                    .map(Served::fetched),
            }
        };
        drop(gate);
        self.in_flight.remove_if(key, |_, gate| Arc::strong_count(gate) == 1);
        result
    }

    // == Preload ==
    /// Warms `key` eagerly. When the options carry a condition that
    /// currently returns false, the cache is bypassed entirely.
    pub async fn preload<F, Fut, E>(
        &self,
        key: &str,
        loader: F,
        options: PreloadOptions,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        if let Some(condition) = &options.condition {
            if !condition() {
                return loader().await;
            }
        }

        let fetch = FetchOptions {
            set: options.set,
            stale_while_revalidate: false,
        };
        Ok(self.read_through(key, fetch, loader).await?.into_value())
    }

    // == Refresh ==
    /// Fetches and stores a fresh value without consulting the cache.
    pub async fn refresh<F, Fut, E>(
        &self,
        key: &str,
        options: SetOptions,
        fetcher: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.fetch_and_store(key, options, fetcher).await
    }

    /// Drops `key` and immediately refetches it. The entry stays absent if the
    /// fetch fails.
    pub async fn invalidate_and_refetch<F, Fut, E>(
        &self,
        key: &str,
        options: SetOptions,
        fetcher: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.delete(key).await;
        self.fetch_and_store(key, options, fetcher).await
    }

    async fn fetch_and_store<F, Fut, E>(
        &self,
        key: &str,
        options: SetOptions,
        fetcher: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let value = fetcher().await?;
        self.set(key, value.clone(), options).await;
        Ok(value)
    }

    /// A hit together with the generation of the entry it was served from,
    /// read under one lock so no write can slip in between.
    async fn get_with_generation(
        &self,
        key: &str,
        expected_version: Option<&str>,
    ) -> Option<(V, Option<u64>)> {
        let mut store = self.store.write().await;
        let value = store.get(key, expected_version)?;
        Some((value, store.generation(key)))
    }

    fn spawn_revalidation<F, Fut, E>(
        &self,
        key: &str,
        generation: u64,
        options: SetOptions,
        fetcher: F,
    ) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let Some(mark) = RevalidationMark::claim(&self.revalidating, key) else {
            debug!("Revalidation of '{}' already in flight", key);
            return false;
        };

        let store = self.store.clone();
        tokio::spawn(async move {
            let key = &mark.key;
            match fetcher().await {
                Ok(fresh) => {
                    let mut store = store.write().await;
                    if store.set_if_generation(key, generation, fresh, options) {
                        debug!("Revalidated '{}'", key);
                    } else {
                        debug!("Entry '{}' changed during revalidation; result dropped", key);
                    }
                }
                Err(err) => warn!("Background revalidation of '{}' failed: {}", key, err),
            }
        });
        true
    }
}

// == Revalidation Mark ==
/// Membership of one key in the revalidating set, released on drop so a
/// panicking fetch cannot leave the key marked.
struct RevalidationMark {
    keys: Arc<DashSet<String>>,
    key: String,
}

impl RevalidationMark {
    fn claim(keys: &Arc<DashSet<String>>, key: &str) -> Option<Self> {
        if !keys.insert(key.to_string()) {
            return None;
        }
        Some(Self {
            keys: keys.clone(),
            key: key.to_string(),
        })
    }
}

impl Drop for RevalidationMark {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}
