//! In-process document store.
//!
//! Backed by a `DashMap`; each write replaces the whole value atomically.
//! Used by tests and by embedders that do not need durability.

use dashmap::DashMap;
use serde_json::Value;
use waypoint_types::error::StoreError;

use super::document_store::DocumentStore;
use super::keys;

/// `DocumentStore` that keeps documents in memory.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<String, Value>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn check_key(key: &str) -> Result<(), StoreError> {
    if keys::is_valid(key) {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        check_key(key)?;
        Ok(self.documents.get(key).map(|entry| entry.value().clone()))
    }

    async fn write(&self, key: &str, document: &Value) -> Result<(), StoreError> {
        check_key(key)?;
        self.documents.insert(key.to_string(), document.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        check_key(key)?;
        Ok(self.documents.remove(key).is_some())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut found: Vec<String> = self
            .documents
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        found.sort();
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn write_read_delete() {
        let store = MemoryDocumentStore::new();
        assert!(store.read("tasks/current").await.unwrap().is_none());

        store.write("tasks/current", &json!({"a": 1})).await.unwrap();
        assert_eq!(
            store.read("tasks/current").await.unwrap(),
            Some(json!({"a": 1}))
        );

        store.write("tasks/current", &json!({"a": 2})).await.unwrap();
        assert_eq!(
            store.read("tasks/current").await.unwrap(),
            Some(json!({"a": 2}))
        );

        assert!(store.delete("tasks/current").await.unwrap());
        assert!(!store.delete("tasks/current").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn list_keys_filters_by_prefix() {
        let store = MemoryDocumentStore::new();
        store.write("queues/b", &json!(1)).await.unwrap();
        store.write("queues/a", &json!(2)).await.unwrap();
        store.write("tasks/current", &json!(3)).await.unwrap();

        let found = store.list_keys("queues/").await.unwrap();
        assert_eq!(found, vec!["queues/a", "queues/b"]);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn invalid_keys_rejected() {
        let store = MemoryDocumentStore::new();
        let result = store.write("../escape", &json!(null)).await;
        assert!(matches!(result, Err(StoreError::InvalidKey(_))));
    }
}
