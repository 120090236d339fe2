//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: removes expired resident and durable entries

mod sweep;

pub use sweep::spawn_sweep_task;
