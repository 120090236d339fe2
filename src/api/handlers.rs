//! API Handlers
//!
//! HTTP request handlers for each cache daemon endpoint.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use regex::Regex;
use serde_json::Value;

use crate::cache::{CacheStore, SharedCache};
use crate::error::{CacheError, Result};
use crate::events::EventBus;
use crate::models::{
    DeleteResponse, GetQuery, GetResponse, HealthResponse, InvalidationResponse, PatternRequest,
    SetRequest, SetResponse, StatsResponse,
};
use crate::policy::{DomainEvent, InvalidationPolicy};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub cache: SharedCache<Value>,
    pub events: EventBus<Value>,
}

impl AppState {
    /// Wraps `store` with the standard invalidation policy.
    pub fn new(store: CacheStore<Value>) -> Self {
        let cache = SharedCache::new(store);
        let events = EventBus::new(cache.clone(), InvalidationPolicy::standard());
        Self { cache, events }
    }
}

/// Handler for PUT /entries
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let (key, value, options) = req.into_parts();
    state.cache.set(&key, value, options).await;

    Ok(Json(SetResponse::new(key)))
}

/// Handler for GET /entries/:key
///
/// `?version=` rejects (and drops) an entry stored under another version.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<GetQuery>,
) -> Result<Json<GetResponse>> {
    let value = state
        .cache
        .get(&key, query.version.as_deref())
        .await
        .ok_or_else(|| CacheError::NotFound(key.clone()))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /entries/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<DeleteResponse> {
    let deleted = state.cache.delete(&key).await;
    Json(DeleteResponse::new(key, deleted))
}

/// Handler for DELETE /entries
pub async fn clear_handler(State(state): State<AppState>) -> Json<InvalidationResponse> {
    let cleared = state.cache.clear().await;

    Json(InvalidationResponse::new(cleared))
}

/// Handler for POST /invalidate/dependency/:tag
pub async fn invalidate_dependency_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Json<InvalidationResponse> {
    let removed = state.cache.invalidate_by_dependency(&tag).await;
    Json(InvalidationResponse::new(removed))
}

/// Handler for POST /invalidate/pattern
pub async fn invalidate_pattern_handler(
    State(state): State<AppState>,
    Json(req): Json<PatternRequest>,
) -> Result<Json<InvalidationResponse>> {
    let pattern = Regex::new(&req.pattern)?;
    let removed = state.cache.invalidate_by_pattern(&pattern).await;

    Ok(Json(InvalidationResponse::new(removed)))
}

/// Handler for POST /events
///
/// Receives change notifications from the data store and applies the
/// invalidation policy before responding.
pub async fn event_handler(
    State(state): State<AppState>,
    Json(event): Json<DomainEvent>,
) -> Json<InvalidationResponse> {
    let removed = state.events.publish(event).await;
    Json(InvalidationResponse::new(removed))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.cache.stats().await;
    Json(StatsResponse::new(
        stats,
        state.cache.revalidations_in_flight(),
    ))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
