//! API Routes
//!
//! Configures the Axum router with all cache daemon endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, delete_handler, event_handler, get_handler, health_handler,
    invalidate_dependency_handler, invalidate_pattern_handler, set_handler, stats_handler,
    AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /entries` - Store an entry
/// - `DELETE /entries` - Clear the cache, durable copies included
/// - `GET /entries/:key?version=` - Retrieve an entry
/// - `DELETE /entries/:key` - Delete an entry
/// - `POST /invalidate/dependency/:tag` - Drop every entry carrying a tag
/// - `POST /invalidate/pattern` - Drop every key matching a regex
/// - `POST /events` - Apply the invalidation policy for a domain event
/// - `GET /stats` - Cache statistics
/// - `GET /health` - Health check
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/entries", put(set_handler).delete(clear_handler))
        .route("/entries/:key", get(get_handler).delete(delete_handler))
        .route(
            "/invalidate/dependency/:tag",
            post(invalidate_dependency_handler),
        )
        .route("/invalidate/pattern", post(invalidate_pattern_handler))
        .route("/events", post(event_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
