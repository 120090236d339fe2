//! Durable Storage Module
//!
//! The string-keyed persistent store the cache mirrors its entries into.
//!
//! # Backends
//! - [`MemoryStorage`]: shared in-process map with an optional byte quota
//! - [`FileStorage`]: one file per key inside a directory

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::error::StorageError;

// == Durable Store ==
/// Synchronous string key-value store.
///
/// Implementations use interior mutability so a single backend can be shared
/// behind an `Arc` between the cache and other subsystems. Keys written by the
/// cache always carry its configured prefix; other users of the same backend
/// must stay out of that namespace.
pub trait DurableStore: Send + Sync {
    /// Returns the stored string, or `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Writes `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Lists every stored key starting with `prefix`.
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}
