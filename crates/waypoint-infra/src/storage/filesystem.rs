//! Filesystem document store.
//!
//! Implements the `DocumentStore` trait from `waypoint-core` with one JSON
//! file per key at `{root}/{key}.json`. Writes go to a temporary file in the
//! same directory and are renamed into place, so a reader sees either the
//! old document or the new one, never a torn write.

use std::path::{Path, PathBuf};

use serde_json::Value;
use uuid::Uuid;
use waypoint_core::storage::keys;
use waypoint_core::storage::DocumentStore;
use waypoint_types::error::StoreError;

const EXTENSION: &str = "json";

/// Document store rooted at a directory.
///
/// Layout:
/// ```text
/// {root}/
///   tasks/
///     current.json
///     0192f0c4-....json
///   queues/
///     nightly-sync-1700000000000.json
/// ```
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    root: PathBuf,
}

impl FileDocumentStore {
    /// Create a store rooted at `root`. Directories are created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for a key.
    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if !keys::is_valid(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        let mut path = self.root.clone();
        path.push(format!("{key}.{EXTENSION}"));
        Ok(path)
    }

    /// Key for a file found under the root, if it is a document.
    fn key_for(&self, path: &Path) -> Option<String> {
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            return None;
        }
        let relative = path.strip_prefix(&self.root).ok()?.with_extension("");
        let segments: Option<Vec<&str>> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect();
        Some(segments?.join("/"))
    }
}

impl DocumentStore for FileDocumentStore {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(key, err)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StoreError::serialization(key, e))
    }

    async fn write(&self, key: &str, document: &Value) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(key, e))?;
        }

        let bytes =
            serde_json::to_vec_pretty(document).map_err(|e| StoreError::serialization(key, e))?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(format!(".tmp-{}", Uuid::now_v7()));
        let tmp_path = PathBuf::from(tmp_name);

        tokio::fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| StoreError::io(key, e))?;

        if let Err(err) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::io(key, err));
        }

        tracing::trace!(key, path = %path.display(), bytes = bytes.len(), "wrote document");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(StoreError::io(key, err)),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => return Err(StoreError::io(prefix, err)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::io(prefix, e))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StoreError::io(prefix, e))?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.key_for(&path) {
                    if key.starts_with(prefix) {
                        found.push(key);
                    }
                }
            }
        }

        found.sort();
        Ok(found)
    }
}
