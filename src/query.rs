//! Cached Queries
//!
//! Binds a [`FetchSource`] to the cache using per-entity profiles: the key is
//! derived from the entity, scope and filters, and each entity carries its own
//! TTL and dependency tags.

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::cache::{FetchOptions, Served, SetOptions, SharedCache};
use crate::keys::{cache_key, Entity};
use crate::policy::TEAM_PAYMENTS_TAG;

const MINUTE_MS: u64 = 60_000;

type PendingFetch<P, E> = Pin<Box<dyn Future<Output = Result<P, E>> + Send>>;

// == Fetch Source ==
/// Anything that can answer a query against the backing data store.
pub trait FetchSource: Send + Sync + 'static {
    type Payload;
    type Error: Display + Send + 'static;

    fn fetch(
        &self,
        entity: Entity,
        scope: &str,
        filters: Option<&Value>,
    ) -> impl Future<Output = Result<Self::Payload, Self::Error>> + Send;
}

// == Query Profile ==
/// Caching parameters for one entity's queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryProfile {
    pub ttl_ms: u64,
    pub dependencies: Vec<String>,
    pub stale_while_revalidate: bool,
}

impl QueryProfile {
    pub fn new<I, S>(ttl_ms: u64, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ttl_ms,
            dependencies: dependencies.into_iter().map(Into::into).collect(),
            stale_while_revalidate: true,
        }
    }

    pub fn for_entity(entity: Entity) -> Self {
        match entity {
            Entity::Projects => Self::new(2 * MINUTE_MS, ["projects", "clients"]),
            Entity::DashboardStats => Self::new(
                5 * MINUTE_MS,
                ["dashboard_stats", "projects", "transactions"],
            ),
            Entity::Analytics => {
                Self::new(10 * MINUTE_MS, ["analytics", "projects", TEAM_PAYMENTS_TAG])
            }
            Entity::Clients => Self::new(5 * MINUTE_MS, ["clients"]),
            Entity::Transactions => Self::new(5 * MINUTE_MS, ["transactions"]),
            Entity::TeamMembers => Self::new(5 * MINUTE_MS, ["team_members", TEAM_PAYMENTS_TAG]),
        }
    }

    pub fn set_options(&self) -> SetOptions {
        SetOptions::new()
            .ttl(self.ttl_ms)
            .dependencies(self.dependencies.iter().cloned())
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            set: self.set_options(),
            stale_while_revalidate: self.stale_while_revalidate,
        }
    }
}

// == Cached Query ==
pub struct CachedQuery<S: FetchSource> {
    cache: SharedCache<S::Payload>,
    source: Arc<S>,
    entity: Entity,
    profile: QueryProfile,
}

impl<S> CachedQuery<S>
where
    S: FetchSource,
    S::Payload: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(cache: SharedCache<S::Payload>, source: Arc<S>, entity: Entity) -> Self {
        Self {
            cache,
            source,
            entity,
            profile: QueryProfile::for_entity(entity),
        }
    }

    pub fn with_profile(mut self, profile: QueryProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn profile(&self) -> &QueryProfile {
        &self.profile
    }

    pub fn key(&self, scope: &str, filters: Option<&Value>) -> String {
        cache_key(self.entity, scope, filters)
    }

    /// Cached result for the query, fetching on a miss.
    pub async fn load(
        &self,
        scope: &str,
        filters: Option<Value>,
    ) -> Result<Served<S::Payload>, S::Error> {
        let key = self.key(scope, filters.as_ref());
        let fetcher = self.fetcher(scope, filters);
        self.cache
            .read_through(&key, self.profile.fetch_options(), fetcher)
            .await
    }

    /// Fetches and caches the query regardless of what is cached.
    pub async fn refresh(
        &self,
        scope: &str,
        filters: Option<Value>,
    ) -> Result<S::Payload, S::Error> {
        let key = self.key(scope, filters.as_ref());
        let fetcher = self.fetcher(scope, filters);
        self.cache
            .refresh(&key, self.profile.set_options(), fetcher)
            .await
    }

    /// Drops the cached result and fetches it again.
    pub async fn invalidate(
        &self,
        scope: &str,
        filters: Option<Value>,
    ) -> Result<S::Payload, S::Error> {
        let key = self.key(scope, filters.as_ref());
        let fetcher = self.fetcher(scope, filters);
        self.cache
            .invalidate_and_refetch(&key, self.profile.set_options(), fetcher)
            .await
    }

    fn fetcher(
        &self,
        scope: &str,
        filters: Option<Value>,
    ) -> impl FnOnce() -> PendingFetch<S::Payload, S::Error> + Send + 'static {
        let source = self.source.clone();
        let entity = self.entity;
        let scope = scope.to_string();
        move || Box::pin(async move { source.fetch(entity, &scope, filters.as_ref()).await })
    }
}
