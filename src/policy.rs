//! Invalidation Policy
//!
//! Maps domain write-events to the cache invalidations they require. Applying
//! a policy is synchronous with respect to the store, so once it returns no
//! read can observe data cached before the mutation.

use std::collections::HashMap;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::CacheStore;
use crate::keys::Entity;

/// Dependency tag carried by entries derived from team payment records.
pub const TEAM_PAYMENTS_TAG: &str = "team_payments";

// == Domain Event ==
/// An entity mutation reported by the application or the database's change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    ProjectUpdated { project_id: String, user_id: String },
    ProjectDeleted { project_id: String, user_id: String },
    ClientUpdated { client_id: String, user_id: String },
    ClientDeleted { client_id: String, user_id: String },
    TransactionUpdated { user_id: String },
    TeamPaymentUpdated { user_id: String },
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::ProjectUpdated { .. } | DomainEvent::ProjectDeleted { .. } => {
                EventKind::Project
            }
            DomainEvent::ClientUpdated { .. } | DomainEvent::ClientDeleted { .. } => {
                EventKind::Client
            }
            DomainEvent::TransactionUpdated { .. } => EventKind::Transaction,
            DomainEvent::TeamPaymentUpdated { .. } => EventKind::TeamPayment,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            DomainEvent::ProjectUpdated { user_id, .. }
            | DomainEvent::ProjectDeleted { user_id, .. }
            | DomainEvent::ClientUpdated { user_id, .. }
            | DomainEvent::ClientDeleted { user_id, .. }
            | DomainEvent::TransactionUpdated { user_id }
            | DomainEvent::TeamPaymentUpdated { user_id } => user_id,
        }
    }
}

/// Which family of records an event touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Project,
    Client,
    Transaction,
    TeamPayment,
}

// == Invalidation Action ==
#[derive(Debug, Clone)]
pub enum InvalidationAction {
    /// Remove every key matching the expression
    Pattern(Regex),
    /// Remove every entry carrying the tag
    Dependency(String),
}

impl InvalidationAction {
    /// All cached variants of `entity`.
    pub fn entity(entity: Entity) -> Self {
        InvalidationAction::Pattern(entity.key_pattern())
    }

    pub fn dependency(tag: impl Into<String>) -> Self {
        InvalidationAction::Dependency(tag.into())
    }

    /// Runs the action against `store`, returning how many entries it removed.
    pub fn apply<V>(&self, store: &mut CacheStore<V>) -> usize
    where
        V: Clone + Serialize + DeserializeOwned,
    {
        match self {
            InvalidationAction::Pattern(pattern) => store.invalidate_by_pattern(pattern),
            InvalidationAction::Dependency(tag) => store.invalidate_by_dependency(tag),
        }
    }
}

// == Invalidation Policy ==
#[derive(Debug, Clone, Default)]
pub struct InvalidationPolicy {
    rules: HashMap<EventKind, Vec<InvalidationAction>>,
}

impl InvalidationPolicy {
    /// Policy with no rules; events invalidate nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The studio's rules.
    ///
    /// | event | invalidates |
    /// |---|---|
    /// | project | `projects_*`, tags `dashboard_stats` and `analytics`, `dashboard_stats_*`, `analytics_*` |
    /// | client | `clients_*`, `projects_*` |
    /// | transaction | `transactions_*`, tag `dashboard_stats`, `dashboard_stats_*` |
    /// | team payment | tag `team_payments` |
    pub fn standard() -> Self {
        Self::empty()
            .with_rule(
                EventKind::Project,
                vec![
                    InvalidationAction::entity(Entity::Projects),
                    InvalidationAction::dependency(Entity::DashboardStats.name()),
                    InvalidationAction::dependency(Entity::Analytics.name()),
                    InvalidationAction::entity(Entity::DashboardStats),
                    InvalidationAction::entity(Entity::Analytics),
                ],
            )
            .with_rule(
                EventKind::Client,
                vec![
                    InvalidationAction::entity(Entity::Clients),
                    InvalidationAction::entity(Entity::Projects),
                ],
            )
            .with_rule(
                EventKind::Transaction,
                vec![
                    InvalidationAction::entity(Entity::Transactions),
                    InvalidationAction::dependency(Entity::DashboardStats.name()),
                    InvalidationAction::entity(Entity::DashboardStats),
                ],
            )
            .with_rule(
                EventKind::TeamPayment,
                vec![InvalidationAction::dependency(TEAM_PAYMENTS_TAG)],
            )
    }

    /// Replaces the actions for `kind`.
    pub fn with_rule(mut self, kind: EventKind, actions: Vec<InvalidationAction>) -> Self {
        self.rules.insert(kind, actions);
        self
    }

    pub fn actions_for(&self, kind: EventKind) -> &[InvalidationAction] {
        self.rules.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Applies every action for `event`, returning the total removed.
    pub fn apply<V>(&self, store: &mut CacheStore<V>, event: &DomainEvent) -> usize
    where
        V: Clone + Serialize + DeserializeOwned,
    {
        let removed = self
            .actions_for(event.kind())
            .iter()
            .map(|action| action.apply(store))
            .sum();
        debug!("{:?} invalidated {} entries", event, removed);
        removed
    }
}
