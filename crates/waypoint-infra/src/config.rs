//! Engine configuration loader for Waypoint.
//!
//! Reads `config.toml` from the data directory (`~/.waypoint/` by default)
//! and deserializes it into [`EngineConfig`]. Falls back to defaults when
//! the file is missing, malformed, or defines an invalid pipeline.

use std::path::Path;

use waypoint_types::config::EngineConfig;

use crate::filesystem::config_path;

/// Load engine configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`EngineConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the parsed pipeline fails validation, logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> EngineConfig {
    let path = config_path(data_dir);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return EngineConfig::default();
        }
    };

    let config = match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            return EngineConfig::default();
        }
    };

    if let Err(err) = config.pipeline.validate() {
        tracing::warn!(
            "Invalid pipeline '{}' in {}: {err}, using defaults",
            config.pipeline.name,
            path.display()
        );
        return EngineConfig::default();
    }

    config
}
