//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with LRU tracking, lazy TTL
//! expiration, an optional durable mirror and bulk invalidation.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{
    CacheEntry, CacheStats, Clock, DurableMirror, LruTracker, SetOptions, SystemClock,
};
use crate::config::CacheConfig;
use crate::error::StorageError;
use crate::storage::DurableStore;

// == Cache Store ==
/// Bounded key -> entry map with least-recently-used eviction.
///
/// Expiry is checked lazily on read; nothing runs in the background unless
/// [`CacheStore::sweep_expired`] is called. Durable-store failures never
/// escape: they are logged, counted, and the operation carries on in memory.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// LRU access tracker
    lru: LruTracker,
    /// Performance statistics
    stats: CacheStats,
    config: CacheConfig,
    /// Present only when persistence is enabled and a backend is attached
    mirror: Option<DurableMirror>,
    clock: Arc<dyn Clock>,
    /// Write generation per resident key; dropped whenever the entry goes
    generations: HashMap<String, u64>,
    next_generation: u64,
}

impl<V> CacheStore<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    // == Constructor ==
    /// Creates an in-memory store. Attach a backend with
    /// [`with_storage`](Self::with_storage) to enable the durable mirror.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            lru: LruTracker::new(),
            stats: CacheStats::new(),
            config,
            mirror: None,
            clock: Arc::new(SystemClock),
            generations: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Attaches a durable backend. Ignored when `persist_to_storage` is off.
    ///
    /// Nothing is loaded here; call [`load_from_storage`](Self::load_from_storage)
    /// to warm the store from a previous run.
    pub fn with_storage(mut self, backend: Arc<dyn DurableStore>) -> Self {
        if self.config.persist_to_storage {
            self.mirror = Some(DurableMirror::new(
                backend,
                self.config.storage_prefix.clone(),
                self.config.compression_threshold,
            ));
        }
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_persistent(&self) -> bool {
        self.mirror.is_some()
    }

    // == Set ==
    /// Stores `payload` under `key`, replacing any previous entry.
    ///
    /// The key becomes the most recently used; the size cap is enforced
    /// afterwards, so the new key itself is never the one evicted unless the
    /// cap is zero.
    pub fn set(&mut self, key: impl Into<String>, payload: V, options: SetOptions) {
        let key = key.into();
        let entry = CacheEntry::new(
            payload,
            self.clock.now_ms(),
            self.config.default_ttl_ms,
            options,
        );

        if let Some(mirror) = self.mirror.clone() {
            if let Err(err) = mirror.write(&key, &entry) {
                self.record_storage_failure("write", &key, &err);
                // Never leave an older durable copy behind a newer in-memory value
                if let Err(err) = mirror.remove(&key) {
                    self.record_storage_failure("remove", &key, &err);
                }
            }
        }

        self.lru.touch(&key);
        self.insert_entry(key, entry);
        self.enforce_max_size();
    }

    /// Like [`set`](Self::set), but only while `key` still holds the write
    /// seen as `generation`.
    ///
    /// Returns false (and stores nothing) when the entry has since been
    /// removed, invalidated or overwritten.
    pub fn set_if_generation(
        &mut self,
        key: &str,
        generation: u64,
        payload: V,
        options: SetOptions,
    ) -> bool {
        if self.generations.get(key) != Some(&generation) {
            debug!("Discarding stale write for '{}' (generation {})", key, generation);
            return false;
        }
        self.set(key, payload, options);
        true
    }

    /// Generation of the resident entry for `key`.
    ///
    /// Every write, restore or load assigns a new one, so an unchanged
    /// generation means nothing replaced or removed the entry in between.
    pub fn generation(&self, key: &str) -> Option<u64> {
        self.generations.get(key).copied()
    }

    // == Get ==
    /// Returns the payload for `key` if present, unexpired, and (when
    /// `expected_version` is given) tagged with that version.
    ///
    /// Falls back to the durable mirror when the key is not resident. Expired
    /// and version-mismatched entries are deleted as a side effect.
    pub fn get(&mut self, key: &str, expected_version: Option<&str>) -> Option<V> {
        let now = self.clock.now_ms();

        if !self.entries.contains_key(key) {
            if let Some(entry) = self.read_durable(key) {
                debug!("Restored '{}' from durable storage", key);
                self.insert_entry(key.to_string(), entry);
            }
        }

        let (expired, version_ok) = match self.entries.get(key) {
            Some(entry) => (entry.is_expired(now), entry.matches_version(expected_version)),
            None => {
                self.stats.record_miss();
                return None;
            }
        };

        if expired {
            debug!("Entry '{}' expired", key);
            self.remove_entry(key);
            self.stats.record_expiration();
            self.stats.record_miss();
            return None;
        }

        if !version_ok {
            debug!(
                "Entry '{}' version mismatch (expected {:?})",
                key, expected_version
            );
            self.remove_entry(key);
            self.stats.record_miss();
            return None;
        }

        let payload = self.entries.get(key).map(|entry| entry.payload.clone());
        self.lru.touch(key);
        self.stats.record_hit();
        // A restore from the mirror may have pushed the map over the cap
        self.enforce_max_size();
        payload
    }

    // == Delete ==
    /// Removes `key` from memory and the durable mirror.
    ///
    /// Idempotent; returns whether the key was resident.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove_entry(key)
    }

    // == Invalidate By Dependency ==
    /// Removes every entry tagged with `tag`, resident or durable-only.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_by_dependency(&mut self, tag: &str) -> usize {
        let mut doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.has_dependency(tag))
            .map(|(key, _)| key.clone())
            .collect();

        if let Some(mirror) = self.mirror.clone() {
            for key in self.durable_only_keys() {
                match mirror.read::<IgnoredAny>(&key) {
                    Ok(Some(entry)) if entry.has_dependency(tag) => doomed.push(key),
                    Ok(_) => {}
                    Err(err) => self.record_storage_failure("read", &key, &err),
                }
            }
        }

        let count = self.remove_all(&doomed);
        debug!("Invalidated {} entries with dependency '{}'", count, tag);
        count
    }

    // == Invalidate By Pattern ==
    /// Removes every key matched by `pattern`, resident or durable-only.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_by_pattern(&mut self, pattern: &Regex) -> usize {
        let mut doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|key| pattern.is_match(key))
            .cloned()
            .collect();
        doomed.extend(
            self.durable_only_keys()
                .into_iter()
                .filter(|key| pattern.is_match(key)),
        );

        let count = self.remove_all(&doomed);
        debug!("Invalidated {} entries matching /{}/", count, pattern);
        count
    }

    // == Clear ==
    /// Removes every entry from memory and from the durable namespace.
    ///
    /// Returns the number of entries removed, resident and durable-only.
    pub fn clear(&mut self) -> usize {
        let resident = self.entries.len();
        let mut durable_only = 0;

        if let Some(mirror) = self.mirror.clone() {
            for key in self.durable_keys() {
                match mirror.remove(&key) {
                    Ok(()) if !self.entries.contains_key(&key) => durable_only += 1,
                    Ok(()) => {}
                    Err(err) => self.record_storage_failure("remove", &key, &err),
                }
            }
        }

        self.entries.clear();
        self.generations.clear();
        self.lru.clear();

        info!(
            "Cache cleared ({} resident, {} durable-only entries dropped)",
            resident, durable_only
        );
        resident + durable_only
    }

    // == Load From Storage ==
    /// Bulk-loads durable entries into memory.
    ///
    /// Corrupt entries are removed by the mirror and skipped; expired ones are
    /// removed here. Loaded entries enter the LRU order oldest-written first,
    /// then the size cap applies. Returns the number of entries loaded.
    pub fn load_from_storage(&mut self) -> usize {
        let Some(mirror) = self.mirror.clone() else {
            return 0;
        };
        let now = self.clock.now_ms();

        let mut loaded = Vec::new();
        for key in self.durable_keys() {
            if self.entries.contains_key(&key) {
                continue;
            }
            match mirror.read::<V>(&key) {
                Ok(Some(entry)) if entry.is_expired(now) => {
                    self.stats.record_expiration();
                    if let Err(err) = mirror.remove(&key) {
                        self.record_storage_failure("remove", &key, &err);
                    }
                }
                Ok(Some(entry)) => loaded.push((key, entry)),
                Ok(None) => {}
                Err(err) => self.record_storage_failure("load", &key, &err),
            }
        }

        loaded.sort_by_key(|(_, entry)| entry.written_at);
        let count = loaded.len();
        for (key, entry) in loaded {
            self.lru.touch(&key);
            self.insert_entry(key, entry);
        }
        self.enforce_max_size();

        info!("Loaded {} entries from durable storage", count);
        count
    }

    // == Sweep Expired ==
    /// Removes all expired entries, including durable-only ones, reclaiming
    /// storage that lazy expiry would never touch.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.clock.now_ms();

        let expired_keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        let mut count = self.remove_all(&expired_keys);

        if let Some(mirror) = self.mirror.clone() {
            for key in self.durable_only_keys() {
                match mirror.read::<IgnoredAny>(&key) {
                    Ok(Some(entry)) if entry.is_expired(now) => match mirror.remove(&key) {
                        Ok(()) => count += 1,
                        Err(err) => self.record_storage_failure("remove", &key, &err),
                    },
                    Ok(_) => {}
                    Err(err) => self.record_storage_failure("read", &key, &err),
                }
            }
        }

        for _ in 0..count {
            self.stats.record_expiration();
        }
        count
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now_ms();
        let mut stats = self.stats.clone();
        stats.total_entries = self.entries.len();
        stats.max_size = self.config.max_size;
        stats.oldest_item_age_ms = self
            .entries
            .values()
            .map(|entry| entry.age_ms(now))
            .max()
            .unwrap_or(0);
        stats.storage_usage_bytes = self
            .mirror
            .as_ref()
            .and_then(|mirror| mirror.usage_bytes().ok())
            .unwrap_or(0);
        stats
    }

    // == Inspection ==
    /// Returns the resident entry without touching LRU order or checking expiry.
    pub fn peek(&self, key: &str) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Resident keys from least to most recently used.
    pub fn keys(&self) -> Vec<String> {
        self.lru.keys().map(str::to_string).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Internals ==
    fn insert_entry(&mut self, key: String, entry: CacheEntry<V>) {
        self.next_generation += 1;
        self.generations.insert(key.clone(), self.next_generation);
        self.entries.insert(key, entry);
    }

    fn enforce_max_size(&mut self) {
        while self.entries.len() > self.config.max_size {
            let Some(oldest) = self.lru.evict_oldest() else {
                break;
            };
            self.entries.remove(&oldest);
            self.generations.remove(&oldest);
            if let Some(mirror) = self.mirror.clone() {
                if let Err(err) = mirror.remove(&oldest) {
                    self.record_storage_failure("remove", &oldest, &err);
                }
            }
            self.stats.record_eviction();
            debug!("Evicted least recently used entry '{}'", oldest);
        }
    }

    fn remove_entry(&mut self, key: &str) -> bool {
        let existed = self.entries.remove(key).is_some();
        self.generations.remove(key);
        self.lru.remove(key);
        if let Some(mirror) = self.mirror.clone() {
            if let Err(err) = mirror.remove(key) {
                self.record_storage_failure("remove", key, &err);
            }
        }
        existed
    }

    fn remove_all(&mut self, keys: &[String]) -> usize {
        for key in keys {
            self.remove_entry(key);
        }
        keys.len()
    }

    fn read_durable(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let mirror = self.mirror.clone()?;
        match mirror.read(key) {
            Ok(entry) => entry,
            Err(err) => {
                self.record_storage_failure("read", key, &err);
                None
            }
        }
    }

    fn durable_keys(&mut self) -> Vec<String> {
        let Some(mirror) = self.mirror.clone() else {
            return Vec::new();
        };
        match mirror.keys() {
            Ok(keys) => keys,
            Err(err) => {
                self.record_storage_failure("list", mirror.prefix(), &err);
                Vec::new()
            }
        }
    }

    fn durable_only_keys(&mut self) -> Vec<String> {
        let mut keys = self.durable_keys();
        keys.retain(|key| !self.entries.contains_key(key));
        keys
    }

    fn record_storage_failure(&mut self, operation: &str, key: &str, err: &StorageError) {
        warn!(
            "Durable storage {} failed for '{}': {}; continuing in memory",
            operation, key, err
        );
        self.stats.record_storage_error();
    }
}
