//! Expiry Sweep Task
//!
//! Reads already expire entries lazily; the sweep reclaims entries nobody reads
//! again, including ones that only exist in durable storage.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;

/// Spawns a task that sweeps `cache` every `interval`.
///
/// The returned handle is aborted during graceful shutdown.
pub fn spawn_sweep_task<V>(cache: SharedCache<V>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting expiry sweep every {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.sweep_expired().await;
            if removed > 0 {
                info!("Expiry sweep: removed {} entries", removed);
            } else {
                debug!("Expiry sweep: nothing expired");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::cache::{CacheStore, ManualClock, SetOptions};
    use crate::config::CacheConfig;
    use crate::storage::MemoryStorage;

    const TICK: Duration = Duration::from_millis(10);

    fn cache(storage: &MemoryStorage) -> (SharedCache<String>, ManualClock) {
        let clock = ManualClock::new(1_000);
        let store = CacheStore::new(CacheConfig::default())
            .with_storage(Arc::new(storage.clone()))
            .with_clock(Arc::new(clock.clone()));
        (SharedCache::new(store), clock)
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_entries() {
        let storage = MemoryStorage::new();
        let (cache, clock) = cache(&storage);
        cache.set("expire_soon", "v".to_string(), SetOptions::new().ttl(10)).await;
        cache.set("long_lived", "v".to_string(), SetOptions::new().ttl(60_000)).await;
        clock.advance(11);

        let handle = spawn_sweep_task(cache.clone(), TICK);
        tokio::time::sleep(TICK * 10).await;
        handle.abort();

        assert_eq!(cache.keys().await, vec!["long_lived".to_string()]);
        assert_eq!(storage.len(), 1);
        assert_eq!(cache.stats().await.expirations, 1);
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let (cache, _) = cache(&MemoryStorage::new());

        let handle = spawn_sweep_task(cache, TICK);
        handle.abort();

        tokio::time::sleep(TICK * 5).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
