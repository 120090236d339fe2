//! Event Bus
//!
//! Entry point for domain write-events. Publishing applies the invalidation
//! policy under the store's write lock before returning, then forwards the
//! event to subscribers (e.g. views that want to refetch).

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use crate::cache::SharedCache;
use crate::policy::{DomainEvent, InvalidationPolicy};

/// Events buffered per subscriber before lagging ones start missing events.
const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct EventBus<V> {
    cache: SharedCache<V>,
    policy: InvalidationPolicy,
    notify: broadcast::Sender<DomainEvent>,
}

impl<V> EventBus<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(cache: SharedCache<V>, policy: InvalidationPolicy) -> Self {
        let (notify, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            cache,
            policy,
            notify,
        }
    }

    pub fn policy(&self) -> &InvalidationPolicy {
        &self.policy
    }

    /// Invalidates everything `event` affects, then notifies subscribers.
    /// Returns the number of entries removed.
    pub async fn publish(&self, event: DomainEvent) -> usize {
        let removed = {
            let store = self.cache.store();
            let mut store = store.write().await;
            self.policy.apply(&mut store, &event)
        };
        info!("{:?} invalidated {} cache entries", event.kind(), removed);

        // No subscribers is not an error
        let _ = self.notify.send(event);
        removed
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.notify.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStore, SetOptions};
    use crate::config::CacheConfig;
    use crate::keys::CacheKeys;

    fn bus() -> EventBus<String> {
        let cache = SharedCache::new(CacheStore::new(CacheConfig::default()));
        EventBus::new(cache, InvalidationPolicy::standard())
    }

    #[tokio::test]
    async fn test_publish_invalidates_before_returning() {
        let bus = bus();
        let key = CacheKeys::projects("u1", None);
        bus.cache.set(&key, "list".to_string(), SetOptions::new()).await;

        let removed = bus
            .publish(DomainEvent::ProjectDeleted {
                project_id: "p1".into(),
                user_id: "u1".into(),
            })
            .await;

        assert_eq!(removed, 1);
        assert_eq!(bus.cache.get(&key, None).await, None);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = bus();
        let mut events = bus.subscribe();
        let event = DomainEvent::TransactionUpdated {
            user_id: "u1".into(),
        };

        bus.publish(event.clone()).await;

        assert_eq!(events.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = bus();
        let removed = bus
            .publish(DomainEvent::TeamPaymentUpdated {
                user_id: "u1".into(),
            })
            .await;
        assert_eq!(removed, 0);
    }
}
