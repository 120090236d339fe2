//! Persistence Integration Tests
//!
//! Restarts a cache over the same directory-backed store and checks what
//! survives.

use std::sync::Arc;

use serde_json::{json, Value};
use studio_cache::{
    cache::ManualClock, CacheConfig, CacheKeys, CacheStore, DurableStore, FileStorage,
    SetOptions, SharedCache,
};
use tempfile::TempDir;

const START: u64 = 1_700_000_000_000;

fn open(dir: &TempDir, clock: &ManualClock, config: CacheConfig) -> CacheStore<Value> {
    let storage = FileStorage::open(dir.path()).unwrap();
    CacheStore::new(config)
        .with_storage(Arc::new(storage))
        .with_clock(Arc::new(clock.clone()))
}

#[test]
fn test_entries_survive_restart() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(START);

    {
        let mut store = open(&dir, &clock, CacheConfig::default());
        store.set(
            r#"projects_u1_{"status":"active"}"#,
            json!([{"id": 7}]),
            SetOptions::new().dependencies(["projects", "clients"]),
        );
        store.set("clients_u1_all", json!([]), SetOptions::new().ttl(10));
    }

    clock.advance(11);
    let mut restarted = open(&dir, &clock, CacheConfig::default());

    // The short-lived entry expired while we were down
    assert_eq!(restarted.load_from_storage(), 1);
    assert_eq!(
        restarted.get(r#"projects_u1_{"status":"active"}"#, None),
        Some(json!([{"id": 7}]))
    );
    assert_eq!(restarted.get("clients_u1_all", None), None);

    // Dependencies were persisted with the entry
    assert_eq!(restarted.invalidate_by_dependency("clients"), 1);
}

#[test]
fn test_large_payloads_are_compressed_on_disk() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(START);
    let config = CacheConfig {
        compression_threshold: 256,
        ..CacheConfig::default()
    };
    let rows: Vec<Value> = (0..200)
        .map(|i| json!({"id": i, "name": "repeated project name"}))
        .collect();

    {
        let mut store = open(&dir, &clock, config.clone());
        store.set("projects_u1_all", Value::Array(rows.clone()), SetOptions::new());
    }

    let storage = FileStorage::open(dir.path()).unwrap();
    let raw = storage.get("cache_projects_u1_all").unwrap().unwrap();
    assert!(!raw.starts_with('{'));
    assert!(raw.len() < serde_json::to_string(&rows).unwrap().len());

    let mut restarted = open(&dir, &clock, config);
    assert_eq!(restarted.get("projects_u1_all", None), Some(Value::Array(rows)));
}

#[test]
fn test_other_namespaces_are_left_alone() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(START);
    let storage = FileStorage::open(dir.path()).unwrap();
    storage.set("session_token", "abc").unwrap();

    let mut store = open(&dir, &clock, CacheConfig::default());
    store.set("k", json!(1), SetOptions::new());
    store.clear();

    assert_eq!(storage.get("session_token").unwrap().as_deref(), Some("abc"));
    assert!(storage.list_keys("cache_").unwrap().is_empty());
}

#[test]
fn test_eviction_removes_durable_copy() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(START);
    let config = CacheConfig {
        max_size: 2,
        ..CacheConfig::default()
    };

    let mut store = open(&dir, &clock, config.clone());
    for key in ["a", "b", "c"] {
        store.set(key, json!(key), SetOptions::new());
    }

    let mut restarted = open(&dir, &clock, config);
    assert_eq!(restarted.load_from_storage(), 2);
    assert_eq!(restarted.get("a", None), None);
}

#[tokio::test]
async fn test_shared_cache_warms_from_disk() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(START);

    {
        let mut store = open(&dir, &clock, CacheConfig::default());
        store.set("dashboard_stats_u1_all", json!({"revenue": 10}), SetOptions::new());
    }

    let cache = SharedCache::new(open(&dir, &clock, CacheConfig::default()));
    assert_eq!(cache.load_from_storage().await, 1);
    assert_eq!(cache.len().await, 1);
    assert_eq!(cache.stats().await.hits, 0);
}

#[test]
fn test_long_keys_survive_restart() {
    let dir = TempDir::new().unwrap();
    let clock = ManualClock::new(START);
    let filters = json!({
        "search": "quarterly retainer projects for the north east region",
        "status": ["active", "on_hold", "awaiting_review"],
        "tags": ["branding", "photography", "video", "copywriting"],
        "range": {"from": "2024-01-01", "to": "2024-12-31"},
    });
    let user_id = "user_0f8fad5b-d9cb-469f-a165-70867728950e";
    let key = CacheKeys::projects(user_id, Some(&filters));
    assert!(key.len() > 234);

    {
        let mut store = open(&dir, &clock, CacheConfig::default());
        store.set(&key, json!([{"id": 1}]), SetOptions::new());
        assert_eq!(store.stats().storage_errors, 0);
    }

    let mut restarted = open(&dir, &clock, CacheConfig::default());
    assert_eq!(restarted.load_from_storage(), 1);
    assert_eq!(restarted.get(&key, None), Some(json!([{"id": 1}])));

    assert!(restarted.delete(&key));
    let storage = FileStorage::open(dir.path()).unwrap();
    assert!(storage.list_keys("cache_").unwrap().is_empty());
}
