//! Request and Response models for the cache daemon API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies. Error bodies
//! are produced by [`crate::error::CacheError`].

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{GetQuery, PatternRequest, SetRequest};
pub use responses::{
    DeleteResponse, GetResponse, HealthResponse, InvalidationResponse, SetResponse, StatsResponse,
};
