//! Directory-backed durable store.
//!
//! Each key lives in its own file. File names are the URL-safe base64 form of
//! the key so arbitrary cache keys (colons, braces, quotes from serialized
//! filters) stay valid on every filesystem. Encodings longer than one path
//! component allows are split into nested `<segment>.d` directories; `.` is
//! outside the base64 alphabet, so directories never collide with files.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::error::StorageError;
use crate::storage::DurableStore;

const TMP_SUFFIX: &str = ".tmp";
const DIR_SUFFIX: &str = ".d";
/// Longest encoded segment per path component, well under the usual 255 byte limit
const SEGMENT_LEN: usize = 200;

// == File Storage ==
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Opens (creating if needed) a storage directory.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let encoded = URL_SAFE_NO_PAD.encode(key.as_bytes());
        let mut path = self.root.clone();
        let mut rest = encoded.as_str();

        // Base64 output is ASCII, so byte offsets are char boundaries
        while rest.len() > SEGMENT_LEN {
            let (segment, tail) = rest.split_at(SEGMENT_LEN);
            path.push(format!("{}{}", segment, DIR_SUFFIX));
            rest = tail;
        }
        path.push(rest);
        path
    }

    fn key_for(encoded: &str) -> Option<String> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        String::from_utf8(bytes).ok()
    }

    /// Collects decoded keys under `dir`, whose segments so far are `encoded`.
    fn collect_keys(
        dir: &Path,
        encoded: &str,
        prefix: &str,
        keys: &mut Vec<String>,
    ) -> Result<(), StorageError> {
        for dir_entry in fs::read_dir(dir)? {
            let dir_entry = dir_entry?;
            let file_name = dir_entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            if let Some(segment) = name.strip_suffix(DIR_SUFFIX) {
                if dir_entry.file_type()?.is_dir() {
                    let nested = format!("{}{}", encoded, segment);
                    Self::collect_keys(&dir_entry.path(), &nested, prefix, keys)?;
                }
                continue;
            }
            if name.contains('.') {
                // Leftover temp files
                continue;
            }
            if let Some(key) = Self::key_for(&format!("{}{}", encoded, name)) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        Ok(())
    }
}

impl DurableStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(TMP_SUFFIX);

        // Write then rename so a crash never leaves a half-written entry
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        // Prune segment directories left empty; remove_dir fails on non-empty ones
        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == self.root || fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        Self::collect_keys(&self.root, "", prefix, &mut keys)?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        storage
            .set("cache_projects_u1_{\"status\":\"active\"}", "payload")
            .unwrap();
        storage.set("other/namespace", "x").unwrap();

        assert_eq!(
            storage
                .get("cache_projects_u1_{\"status\":\"active\"}")
                .unwrap(),
            Some("payload".to_string())
        );
        assert_eq!(
            storage.list_keys("cache_").unwrap(),
            vec!["cache_projects_u1_{\"status\":\"active\"}".to_string()]
        );
    }

    #[test]
    fn test_missing_key_and_idempotent_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        assert_eq!(storage.get("cache_absent").unwrap(), None);
        storage.delete("cache_absent").unwrap();
    }

    #[test]
    fn test_reopen_sees_previous_writes() {
        let dir = tempfile::tempdir().unwrap();
        FileStorage::open(dir.path())
            .unwrap()
            .set("cache_a", "1")
            .unwrap();

        let reopened = FileStorage::open(dir.path()).unwrap();
        assert_eq!(reopened.get("cache_a").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn test_long_keys_are_split_into_segments() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        let long_key = format!("cache_projects_u1_{}", "x".repeat(600));

        storage.set(&long_key, "payload").unwrap();
        storage.set("cache_short", "1").unwrap();

        assert_eq!(storage.get(&long_key).unwrap(), Some("payload".to_string()));
        let mut keys = storage.list_keys("cache_").unwrap();
        keys.sort();
        assert_eq!(keys, vec![long_key.clone(), "cache_short".to_string()]);

        storage.delete(&long_key).unwrap();
        assert_eq!(storage.get(&long_key).unwrap(), None);
        assert_eq!(storage.list_keys("cache_").unwrap(), vec!["cache_short".to_string()]);
        // Emptied segment directories are pruned
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
