//! Engine configuration types.
//!
//! `EngineConfig` represents the top-level `config.toml` in the data
//! directory. Every field has a default so an empty file is valid.

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineDefinition;

/// Top-level configuration for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// The step sequence tasks are created with.
    #[serde(default)]
    pub pipeline: PipelineDefinition,

    /// Defaults applied to newly created work queues.
    #[serde(default)]
    pub queue: QueueDefaults,

    /// Attempts for the optimistic status-update loop.
    #[serde(default = "default_status_update_retries")]
    pub status_update_retries: u32,

    /// Backoff unit between optimistic retries, multiplied by the retry count.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Capacity of the progress event broadcast channel.
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

fn default_status_update_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_event_bus_capacity() -> usize {
    1024
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineDefinition::default(),
            queue: QueueDefaults::default(),
            status_update_retries: default_status_update_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

/// Run configuration defaults for new queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDefaults {
    #[serde(default = "default_allow_retry")]
    pub allow_retry: bool,
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
}

fn default_allow_retry() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

impl Default for QueueDefaults {
    fn default() -> Self {
        Self {
            allow_retry: default_allow_retry(),
            default_max_retries: default_max_retries(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.status_update_retries, 3);
        assert_eq!(config.retry_backoff_ms, 100);
        assert_eq!(config.event_bus_capacity, 1024);
        assert!(config.queue.allow_retry);
        assert_eq!(config.queue.default_max_retries, 3);
        assert_eq!(config.pipeline.len(), 5);
    }

    #[test]
    fn test_engine_config_deserialize_empty() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_engine_config_deserialize_with_values() {
        let toml_str = r#"
status_update_retries = 5
retry_backoff_ms = 25

[queue]
allow_retry = false

[pipeline]
name = "two-step"

[[pipeline.steps]]
index = 1
name = "login"

[[pipeline.steps]]
index = 2
name = "export"
produces = ["report_path"]
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.status_update_retries, 5);
        assert_eq!(config.retry_backoff_ms, 25);
        assert!(!config.queue.allow_retry);
        assert_eq!(config.queue.default_max_retries, 3);
        assert_eq!(config.pipeline.name, "two-step");
        assert_eq!(config.pipeline.len(), 2);
        assert_eq!(config.pipeline.steps[1].produces, vec!["report_path"]);
        assert!(config.pipeline.validate().is_ok());
    }

    #[test]
    fn test_engine_config_serde_roundtrip() {
        let config = EngineConfig {
            retry_backoff_ms: 10,
            ..EngineConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
