//! Document store trait.
//!
//! A key-addressable durable blob store holding one JSON document per key.
//! Writes are whole-document overwrites; implementations must never expose
//! a half-written document to a reader. Implementations live in
//! waypoint-infra (filesystem) and `super::memory` (in-process).

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use waypoint_types::error::StoreError;

/// Trait for key-addressable JSON document storage.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait DocumentStore: Send + Sync {
    /// Read a document. Returns None if the key does not exist.
    fn read(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Write a document, replacing any previous version as a whole.
    fn write(
        &self,
        key: &str,
        document: &Value,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Delete a document. Returns `true` if it existed.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<bool, StoreError>> + Send;

    /// List all keys starting with `prefix`, sorted.
    fn list_keys(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, StoreError>> + Send;
}

impl<S: DocumentStore> DocumentStore for Arc<S> {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, document: &Value) -> Result<(), StoreError> {
        (**self).write(key, document).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        (**self).delete(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).list_keys(prefix).await
    }
}

/// Read and deserialize a typed document.
pub async fn load_document<S, T>(store: &S, key: &str) -> Result<Option<T>, StoreError>
where
    S: DocumentStore,
    T: DeserializeOwned,
{
    match store.read(key).await? {
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StoreError::serialization(key, e)),
        None => Ok(None),
    }
}

/// Serialize and write a typed document.
pub async fn save_document<S, T>(store: &S, key: &str, document: &T) -> Result<(), StoreError>
where
    S: DocumentStore,
    T: Serialize + Sync,
{
    let value = serde_json::to_value(document).map_err(|e| StoreError::serialization(key, e))?;
    store.write(key, &value).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDocumentStore;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        count: u32,
    }

    #[tokio::test]
    async fn typed_roundtrip_through_store() {
        let store = MemoryDocumentStore::new();
        let doc = Doc {
            name: "alpha".to_string(),
            count: 2,
        };

        save_document(&store, "docs/alpha", &doc).await.unwrap();
        let loaded: Option<Doc> = load_document(&store, "docs/alpha").await.unwrap();
        assert_eq!(loaded, Some(doc));

        let missing: Option<Doc> = load_document(&store, "docs/beta").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn load_document_reports_shape_mismatch() {
        let store = MemoryDocumentStore::new();
        store
            .write("docs/bad", &serde_json::json!({"unexpected": true}))
            .await
            .unwrap();

        let result: Result<Option<Doc>, _> = load_document(&store, "docs/bad").await;
        assert!(matches!(result, Err(StoreError::Serialization { .. })));
    }

    #[tokio::test]
    async fn arc_store_shares_documents() {
        let store = Arc::new(MemoryDocumentStore::new());
        let other = Arc::clone(&store);

        store.write("k", &serde_json::json!(1)).await.unwrap();
        assert_eq!(other.read("k").await.unwrap(), Some(serde_json::json!(1)));
    }
}
