//! Durable Mirror Module
//!
//! Write-through copy of cache entries in a [`DurableStore`], partitioned by a
//! fixed key prefix. Serialized entries larger than the compression threshold
//! are gzipped and base64-encoded; reads fall back to raw text whenever that
//! decoding fails, so both forms coexist in the same namespace.

use std::io::{Read, Write};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::CacheEntry;
use crate::error::StorageError;
use crate::storage::DurableStore;

// == Durable Mirror ==
#[derive(Clone)]
pub struct DurableMirror {
    backend: Arc<dyn DurableStore>,
    prefix: String,
    compression_threshold: usize,
}

impl std::fmt::Debug for DurableMirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableMirror")
            .field("prefix", &self.prefix)
            .field("compression_threshold", &self.compression_threshold)
            .finish_non_exhaustive()
    }
}

impl DurableMirror {
    pub fn new(
        backend: Arc<dyn DurableStore>,
        prefix: impl Into<String>,
        compression_threshold: usize,
    ) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            compression_threshold,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    // == Write ==
    /// Serializes and stores `entry` under the prefixed key.
    pub fn write<V: Serialize>(
        &self,
        key: &str,
        entry: &CacheEntry<V>,
    ) -> Result<(), StorageError> {
        let serialized = serde_json::to_string(entry)?;
        let stored = encode(serialized, self.compression_threshold);
        self.backend.set(&self.storage_key(key), &stored)
    }

    // == Read ==
    /// Loads the entry for `key`.
    ///
    /// A stored value that does not parse is deleted before the `Corrupt`
    /// error is returned, so it cannot fail again on the next read.
    pub fn read<V: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<CacheEntry<V>>, StorageError> {
        let storage_key = self.storage_key(key);
        let Some(stored) = self.backend.get(&storage_key)? else {
            return Ok(None);
        };

        match serde_json::from_str(&decode(&stored)) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                // Best effort; the corrupt error is what the caller needs to see
                let _ = self.backend.delete(&storage_key);
                Err(StorageError::Corrupt {
                    key: key.to_string(),
                    reason: err.to_string(),
                })
            }
        }
    }

    // == Remove ==
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.backend.delete(&self.storage_key(key))
    }

    // == Keys ==
    /// Cache keys (prefix stripped) currently held in the durable store.
    pub fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self
            .backend
            .list_keys(&self.prefix)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&self.prefix).map(str::to_string))
            .collect())
    }

    // == Usage ==
    /// Total stored bytes (values only) under this mirror's prefix.
    pub fn usage_bytes(&self) -> Result<usize, StorageError> {
        let mut total = 0;
        for storage_key in self.backend.list_keys(&self.prefix)? {
            total += self.backend.get(&storage_key)?.map_or(0, |v| v.len());
        }
        Ok(total)
    }
}

// == Encoding ==
/// Compresses `serialized` when it is longer than `threshold` bytes.
///
/// Falls back to the raw text if compression itself fails.
pub fn encode(serialized: String, threshold: usize) -> String {
    if serialized.len() <= threshold {
        return serialized;
    }
    compress(&serialized).unwrap_or(serialized)
}

/// Reverses [`encode`]. Anything that is not base64-wrapped gzip is returned
/// unchanged.
pub fn decode(stored: &str) -> String {
    decompress(stored).unwrap_or_else(|| stored.to_string())
}

fn compress(text: &str) -> std::io::Result<String> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes())?;
    let bytes = encoder.finish()?;
    Ok(STANDARD.encode(bytes))
}

fn decompress(stored: &str) -> Option<String> {
    let bytes = STANDARD.decode(stored).ok()?;
    let mut decoder = GzDecoder::new(bytes.as_slice());
    let mut text = String::new();
    decoder.read_to_string(&mut text).ok()?;
    Some(text)
}
