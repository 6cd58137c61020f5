//! Work queue manager.
//!
//! Owns the lifecycle of `WorkQueue` documents: creation from collected work
//! grouped by plugin id, lookup, listing, deletion, and the
//! concurrency-sensitive item status update. There is no in-process lock on
//! queue documents; `update_item_status` writes the whole document, reads it
//! back, and retries with linear backoff when another writer won the race.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use waypoint_types::config::QueueDefaults;
use waypoint_types::error::StoreError;
use waypoint_types::queue::{
    QueueConfig, SelectionCriteria, WorkItem, WorkItemStatus, WorkQueue, QUEUE_SCHEMA_VERSION,
};

use crate::storage::document_store::{load_document, save_document, DocumentStore};
use crate::storage::keys;

use super::reducer::{apply_mutation, recompute, ItemMutation, ReduceError, Reduction};

/// Attempts made by `update_item_status` unless configured otherwise.
pub const DEFAULT_STATUS_UPDATE_RETRIES: u32 = 3;

/// Backoff unit between optimistic retries.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// How `QueueManager::set_item_status` settled a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    /// The requested status was written and read back.
    Applied,
    /// The item was already Completed and the request would have moved it.
    /// Nothing was written.
    AlreadyCompleted,
    /// Other writers kept winning until attempts ran out.
    Conflicted,
}

impl StatusUpdate {
    /// Applied or AlreadyCompleted.
    pub fn is_settled(self) -> bool {
        !matches!(self, StatusUpdate::Conflicted)
    }
}

// ---------------------------------------------------------------------------
// QueueManager
// ---------------------------------------------------------------------------

/// Manages work queue documents in a `DocumentStore`.
pub struct QueueManager<S: DocumentStore> {
    store: S,
    defaults: QueueDefaults,
    backoff: Duration,
    retries: u32,
}

impl<S: DocumentStore> QueueManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            defaults: QueueDefaults::default(),
            backoff: DEFAULT_RETRY_BACKOFF,
            retries: DEFAULT_STATUS_UPDATE_RETRIES,
        }
    }

    /// Run configuration applied to queues created from now on.
    pub fn with_defaults(mut self, defaults: QueueDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Backoff unit for the optimistic retry loop.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Attempts used by callers that do not pick their own bound.
    pub fn with_status_update_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn status_update_retries(&self) -> u32 {
        self.retries
    }

    // -----------------------------------------------------------------------
    // Queue lifecycle
    // -----------------------------------------------------------------------

    /// Build and persist a queue from work grouped by plugin id.
    ///
    /// Groups keep the caller's order. Empty groups are dropped and a plugin
    /// id seen twice has its operations appended to the first occurrence.
    /// `display_name` maps a plugin id to the item's display name.
    pub async fn create_queue<I, F>(
        &self,
        selection: SelectionCriteria,
        grouped_work: I,
        display_name: F,
    ) -> Result<WorkQueue, QueueError>
    where
        I: IntoIterator<Item = (String, Vec<Value>)>,
        F: Fn(&str) -> String,
    {
        let now = Utc::now();

        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
        for (plugin_id, operations) in grouped_work {
            if operations.is_empty() {
                tracing::debug!(plugin_id = plugin_id.as_str(), "dropping empty work group");
                continue;
            }
            match groups.get_mut(&plugin_id) {
                Some(existing) => existing.extend(operations),
                None => {
                    order.push(plugin_id.clone());
                    groups.insert(plugin_id, operations);
                }
            }
        }

        let items: Vec<WorkItem> = order
            .into_iter()
            .filter_map(|plugin_id| {
                let operations = groups.remove(&plugin_id)?;
                let name = display_name(&plugin_id);
                Some(WorkItem::new(plugin_id, name, operations, now))
            })
            .collect();

        let id = self.unused_queue_id(&selection.label, now.timestamp_millis()).await?;
        let name = if selection.label.trim().is_empty() {
            id.clone()
        } else {
            selection.label.clone()
        };

        let mut queue = WorkQueue {
            schema_version: QUEUE_SCHEMA_VERSION,
            id,
            name,
            created_at: now,
            updated_at: now,
            config: QueueConfig {
                selection,
                allow_retry: self.defaults.allow_retry,
                default_max_retries: self.defaults.default_max_retries,
            },
            items,
            status: WorkItemStatus::Pending,
            progress: Default::default(),
        };
        recompute(&mut queue);

        save_document(&self.store, &keys::queue(&queue.id), &queue).await?;

        tracing::info!(
            queue_id = queue.id.as_str(),
            items = queue.items.len(),
            "created work queue"
        );

        Ok(queue)
    }

    pub async fn load_queue(&self, id: &str) -> Result<Option<WorkQueue>, QueueError> {
        Ok(load_document(&self.store, &keys::queue(id)).await?)
    }

    /// All stored queues, newest first.
    pub async fn list_queues(&self) -> Result<Vec<WorkQueue>, QueueError> {
        let mut queues = Vec::new();
        for key in self.store.list_keys(keys::QUEUE_PREFIX).await? {
            if let Some(queue) = load_document::<_, WorkQueue>(&self.store, &key).await? {
                queues.push(queue);
            }
        }
        queues.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(queues)
    }

    /// Delete a queue. Returns `true` if it existed.
    pub async fn delete_queue(&self, id: &str) -> Result<bool, QueueError> {
        let existed = self.store.delete(&keys::queue(id)).await?;
        tracing::info!(queue_id = id, existed, "deleted work queue");
        Ok(existed)
    }

    /// Items currently Failed.
    pub async fn retryable_items(&self, id: &str) -> Result<Vec<WorkItem>, QueueError> {
        let queue = self
            .load_queue(id)
            .await?
            .ok_or_else(|| QueueError::QueueNotFound(id.to_string()))?;
        Ok(queue
            .items
            .into_iter()
            .filter(|item| item.status == WorkItemStatus::Failed)
            .collect())
    }

    // -----------------------------------------------------------------------
    // Item status
    // -----------------------------------------------------------------------

    /// Set one item's status with read-modify-write-verify.
    ///
    /// Returns `Ok(true)` when the item ends up in the requested state or is
    /// already Completed, `Ok(false)` when attempts ran out. Callers that need
    /// to tell those apart use `set_item_status`.
    pub async fn update_item_status(
        &self,
        queue_id: &str,
        plugin_id: &str,
        status: WorkItemStatus,
        error: Option<&str>,
        max_retries: u32,
    ) -> Result<bool, QueueError> {
        Ok(self
            .set_item_status(queue_id, plugin_id, status, error, max_retries)
            .await?
            .is_settled())
    }

    /// Set one item's status and report how the request was settled.
    ///
    /// Each attempt loads the queue, applies the change through the reducer,
    /// writes the whole document and reads it back. If the item's persisted
    /// status is not the requested one, another writer interleaved; the loop
    /// sleeps `attempt * backoff` and starts over, up to `max_retries`
    /// attempts. A request to move a Completed item elsewhere writes nothing
    /// and yields `StatusUpdate::AlreadyCompleted`.
    pub async fn set_item_status(
        &self,
        queue_id: &str,
        plugin_id: &str,
        status: WorkItemStatus,
        error: Option<&str>,
        max_retries: u32,
    ) -> Result<StatusUpdate, QueueError> {
        let attempts = max_retries.max(1);
        let mutation = ItemMutation {
            plugin_id: plugin_id.to_string(),
            status,
            error: error.map(str::to_string),
        };
        let key = keys::queue(queue_id);

        for attempt in 1..=attempts {
            let mut queue = self
                .load_queue(queue_id)
                .await?
                .ok_or_else(|| QueueError::QueueNotFound(queue_id.to_string()))?;

            let now = Utc::now();
            let items = match apply_mutation(&queue.items, &mutation, now) {
                Ok(Reduction::Applied(items)) => items,
                Ok(Reduction::AlreadySatisfied) => {
                    tracing::debug!(
                        queue_id,
                        plugin_id,
                        requested = %status,
                        "item already completed, keeping it"
                    );
                    return Ok(StatusUpdate::AlreadyCompleted);
                }
                Err(ReduceError::ItemNotFound(_)) => {
                    return Err(QueueError::ItemNotFound {
                        queue_id: queue_id.to_string(),
                        plugin_id: plugin_id.to_string(),
                    });
                }
            };

            queue.items = items;
            queue.updated_at = now;
            recompute(&mut queue);
            save_document(&self.store, &key, &queue).await?;

            let persisted = self
                .load_queue(queue_id)
                .await?
                .and_then(|q| q.item(plugin_id).map(|item| item.status));

            if persisted == Some(status) {
                tracing::debug!(
                    queue_id,
                    plugin_id,
                    status = %status,
                    attempt,
                    "item status updated"
                );
                return Ok(StatusUpdate::Applied);
            }

            tracing::warn!(
                queue_id,
                plugin_id,
                requested = %status,
                persisted = ?persisted,
                attempt,
                "concurrent write detected on queue, retrying"
            );

            if attempt < attempts {
                tokio::time::sleep(self.retry_delay(attempt)).await;
            }
        }

        tracing::warn!(
            queue_id,
            plugin_id,
            requested = %status,
            attempts,
            "item status update gave up after repeated conflicts"
        );
        Ok(StatusUpdate::Conflicted)
    }

    /// Linear backoff before attempt `attempt + 1`.
    fn retry_delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt)
    }

    async fn unused_queue_id(&self, label: &str, millis: i64) -> Result<String, QueueError> {
        let base = format!("{}-{millis}", slugify(label));
        let mut candidate = base.clone();
        let mut suffix = 2;
        while self.store.read(&keys::queue(&candidate)).await?.is_some() {
            candidate = format!("{base}-{suffix}");
            suffix += 1;
        }
        Ok(candidate)
    }
}

/// Lowercase ASCII slug of a label; "queue" when nothing usable remains.
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let trimmed = slug.trim_end_matches('-');
    if trimmed.is_empty() {
        "queue".to_string()
    } else {
        trimmed.to_string()
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors from queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue store error: {0}")]
    Store(#[from] StoreError),

    #[error("work queue not found: {0}")]
    QueueNotFound(String),

    #[error("queue '{queue_id}' has no item for plugin '{plugin_id}'")]
    ItemNotFound { queue_id: String, plugin_id: String },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
