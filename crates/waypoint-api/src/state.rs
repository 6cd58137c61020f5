//! Application state wiring the engine services together.
//!
//! The managers are generic over `DocumentStore`; AppState pins them to the
//! filesystem store under `<data_dir>/store`.

use std::path::PathBuf;
use std::time::Duration;

use waypoint_core::workflow::checkpoint::CheckpointManager;
use waypoint_core::workflow::queue::QueueManager;
use waypoint_infra::config::load_config;
use waypoint_infra::filesystem::{resolve_data_dir, store_dir};
use waypoint_infra::storage::FileDocumentStore;
use waypoint_types::config::EngineConfig;

pub type ConcreteCheckpointManager = CheckpointManager<FileDocumentStore>;
pub type ConcreteQueueManager = QueueManager<FileDocumentStore>;

/// Shared state for CLI commands.
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: EngineConfig,
    pub checkpoints: ConcreteCheckpointManager,
    pub queues: ConcreteQueueManager,
}

impl AppState {
    /// Resolve the data directory, load configuration, and wire the managers.
    pub async fn init(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(resolve_data_dir);
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;
        let store = FileDocumentStore::new(store_dir(&data_dir));

        let checkpoints = CheckpointManager::new(store.clone(), config.pipeline.clone());
        let queues = QueueManager::new(store)
            .with_defaults(config.queue)
            .with_backoff(Duration::from_millis(config.retry_backoff_ms))
            .with_status_update_retries(config.status_update_retries);

        tracing::debug!(data_dir = %data_dir.display(), "application state initialized");

        Ok(Self {
            data_dir,
            config,
            checkpoints,
            queues,
        })
    }
}
