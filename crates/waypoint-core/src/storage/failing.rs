//! Test store whose writes start failing after a fixed number succeed.

use std::sync::Mutex;

use serde_json::Value;
use waypoint_types::error::StoreError;

use super::document_store::DocumentStore;
use super::memory::MemoryDocumentStore;

/// Wraps a `MemoryDocumentStore`. Reads always work; once the write budget
/// is spent every write returns `StoreError::Io`.
#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    inner: MemoryDocumentStore,
    writes_left: Mutex<Option<usize>>,
}

impl FailingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allow `count` more writes, then fail. `None` lifts the limit.
    pub(crate) fn allow_writes(&self, count: Option<usize>) {
        *self.writes_left.lock().unwrap() = count;
    }

    pub(crate) fn inner(&self) -> &MemoryDocumentStore {
        &self.inner
    }
}

impl DocumentStore for FailingStore {
    async fn read(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, document: &Value) -> Result<(), StoreError> {
        {
            let mut left = self.writes_left.lock().unwrap();
            match left.as_mut() {
                Some(0) => return Err(StoreError::io(key, "disk full")),
                Some(n) => *n -= 1,
                None => {}
            }
        }
        self.inner.write(key, document).await
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list_keys(prefix).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn writes_fail_once_budget_is_spent() {
        let store = FailingStore::new();
        store.allow_writes(Some(1));

        store.write("queues/a", &json!(1)).await.unwrap();
        let err = store.write("queues/b", &json!(2)).await.unwrap_err();
        assert!(matches!(err, StoreError::Io { ref key, .. } if key == "queues/b"));
        assert_eq!(store.inner().len(), 1);

        store.allow_writes(None);
        store.write("queues/b", &json!(2)).await.unwrap();
        assert_eq!(store.read("queues/b").await.unwrap(), Some(json!(2)));
    }
}
