//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store's behavioural properties over arbitrary
//! operation sequences. Time is driven by a `ManualClock`, so TTL properties
//! need no sleeping.

use proptest::prelude::*;
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::cache::{CacheStore, ManualClock, SetOptions};
use crate::config::CacheConfig;

// == Test Configuration ==
const TEST_MAX_SIZE: usize = 100;
const START: u64 = 1_700_000_000_000;

fn store(max_size: usize) -> (CacheStore<String>, ManualClock) {
    let clock = ManualClock::new(START);
    let store = CacheStore::new(CacheConfig {
        max_size,
        default_ttl_ms: 60_000,
        ..CacheConfig::default()
    })
    .with_clock(Arc::new(clock.clone()));
    (store, clock)
}

// == Strategies ==
/// Generates cache keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9_]{1,16}"
}

/// Generates cache values
fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,64}"
}

/// Generates dependency tags from a small vocabulary so tags collide
fn tag_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["projects", "clients", "transactions", "analytics"])
        .prop_map(str::to_string)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Set { key: String, value: String },
    Get { key: String },
    Delete { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    // Narrow key space so operations revisit keys
    let key = "[a-h]";
    prop_oneof![
        (key, value_strategy()).prop_map(|(key, value)| CacheOp::Set { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Delete { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Read-after-write: a set is immediately visible with the exact value.
    #[test]
    fn prop_read_after_write(key in key_strategy(), value in value_strategy()) {
        let (mut store, _) = store(TEST_MAX_SIZE);

        store.set(key.clone(), value.clone(), SetOptions::new());

        prop_assert_eq!(store.get(&key, None), Some(value));
    }

    // Overwrite: the last write wins and there is one entry per key.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let (mut store, _) = store(TEST_MAX_SIZE);

        store.set(key.clone(), value1, SetOptions::new());
        store.set(key.clone(), value2.clone(), SetOptions::new());

        prop_assert_eq!(store.get(&key, None), Some(value2));
        prop_assert_eq!(store.len(), 1);
    }

    // TTL expiry: once more than ttl ms pass, the entry misses and is gone.
    #[test]
    fn prop_ttl_expiry(
        key in key_strategy(),
        value in value_strategy(),
        ttl in 1u64..100_000,
        extra in 1u64..100_000
    ) {
        let (mut store, clock) = store(TEST_MAX_SIZE);

        store.set(key.clone(), value.clone(), SetOptions::new().ttl(ttl));
        clock.advance(ttl);
        prop_assert_eq!(store.get(&key, None), Some(value));

        clock.advance(extra);
        prop_assert_eq!(store.get(&key, None), None);
        prop_assert!(!store.contains(&key));
    }

    // LRU bound: the resident set never exceeds max_size, and the evicted key
    // is always the least recently accessed one, checked against a model.
    #[test]
    fn prop_lru_matches_model(
        max_size in 1usize..8,
        ops in prop::collection::vec(cache_op_strategy(), 1..120)
    ) {
        let (mut store, _) = store(max_size);
        // Model: front = least recently used
        let mut order: VecDeque<String> = VecDeque::new();
        let mut values: HashMap<String, String> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Set { key, value } => {
                    store.set(key.clone(), value.clone(), SetOptions::new());
                    order.retain(|k| k != &key);
                    order.push_back(key.clone());
                    values.insert(key, value);
                    while order.len() > max_size {
                        if let Some(evicted) = order.pop_front() {
                            values.remove(&evicted);
                        }
                    }
                }
                CacheOp::Get { key } => {
                    let expected = values.get(&key).cloned();
                    if expected.is_some() {
                        order.retain(|k| k != &key);
                        order.push_back(key.clone());
                    }
                    prop_assert_eq!(store.get(&key, None), expected);
                }
                CacheOp::Delete { key } => {
                    store.delete(&key);
                    order.retain(|k| k != &key);
                    values.remove(&key);
                }
            }

            prop_assert!(store.len() <= max_size);
            prop_assert_eq!(store.keys(), order.iter().cloned().collect::<Vec<_>>());
        }
    }

    // Statistics: hits and misses match what get() returned.
    #[test]
    fn prop_statistics_accuracy(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let (mut store, _) = store(4);
        let mut expected_hits: u64 = 0;
        let mut expected_misses: u64 = 0;

        for op in ops {
            match op {
                CacheOp::Set { key, value } => store.set(key, value, SetOptions::new()),
                CacheOp::Get { key } => match store.get(&key, None) {
                    Some(_) => expected_hits += 1,
                    None => expected_misses += 1,
                },
                CacheOp::Delete { key } => {
                    store.delete(&key);
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.total_entries, store.len());
    }

    // Version isolation: a mismatched read deletes the entry for everyone.
    #[test]
    fn prop_version_isolation(
        key in key_strategy(),
        stored in "[0-9]{1,3}",
        requested in "[0-9]{1,3}"
    ) {
        prop_assume!(stored != requested);
        let (mut store, _) = store(TEST_MAX_SIZE);

        store.set(key.clone(), "v".to_string(), SetOptions::new().version(stored.clone()));

        prop_assert_eq!(store.get(&key, Some(requested.as_str())), None);
        prop_assert_eq!(store.get(&key, Some(stored.as_str())), None);
    }

    // Dependency invalidation removes exactly the tagged entries.
    #[test]
    fn prop_dependency_invalidation(
        entries in prop::collection::hash_map(
            key_strategy(),
            prop::collection::vec(tag_strategy(), 0..3),
            1..20
        ),
        target in tag_strategy()
    ) {
        let (mut store, _) = store(TEST_MAX_SIZE);
        for (key, tags) in &entries {
            store.set(key.clone(), "v".to_string(), SetOptions::new().dependencies(tags.clone()));
        }

        let expected_removed: HashSet<&String> = entries
            .iter()
            .filter(|(_, tags)| tags.contains(&target))
            .map(|(key, _)| key)
            .collect();

        prop_assert_eq!(store.invalidate_by_dependency(&target), expected_removed.len());
        for key in entries.keys() {
            prop_assert_eq!(store.contains(key), !expected_removed.contains(key));
        }
    }

    // Pattern invalidation removes exactly the matching keys.
    #[test]
    fn prop_pattern_invalidation(
        suffixes in prop::collection::hash_set("[a-z0-9]{1,8}", 1..10),
        entity in prop::sample::select(vec!["projects", "clients", "transactions"])
    ) {
        let (mut store, _) = store(TEST_MAX_SIZE);
        for suffix in &suffixes {
            for prefix in ["projects", "clients", "transactions"] {
                store.set(format!("{}_{}", prefix, suffix), "v".to_string(), SetOptions::new());
            }
        }

        let pattern = Regex::new(&format!("^{}_", entity)).unwrap();
        prop_assert_eq!(store.invalidate_by_pattern(&pattern), suffixes.len());
        let entity_prefix = format!("{}_", entity);
        prop_assert!(store.keys().iter().all(|key| !key.starts_with(&entity_prefix)));
        prop_assert_eq!(store.len(), suffixes.len() * 2);
    }

    // Delete on an absent key changes nothing.
    #[test]
    fn prop_delete_absent_is_noop(
        keys in prop::collection::hash_set(key_strategy(), 0..10),
        absent in key_strategy()
    ) {
        prop_assume!(!keys.contains(&absent));
        let (mut store, _) = store(TEST_MAX_SIZE);
        for key in &keys {
            store.set(key.clone(), "v".to_string(), SetOptions::new());
        }
        let before = store.keys();

        prop_assert!(!store.delete(&absent));
        prop_assert_eq!(store.keys(), before);
    }
}
