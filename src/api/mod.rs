//! API Module
//!
//! HTTP handlers and routing for the cache daemon's administration and
//! change-notification surface. Endpoints are listed on [`create_router`].

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
