//! CLI configuration subcommands.

use anyhow::Result;
use clap::Subcommand;
use console::style;

use waypoint_infra::filesystem::config_path;

use crate::state::AppState;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (file values merged over defaults).
    Show,

    /// Print the path of the configuration file.
    Path,
}

pub async fn handle_config_command(cmd: ConfigCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            if json {
                println!("{}", serde_json::to_string_pretty(&state.config)?);
                return Ok(());
            }

            let path = config_path(&state.data_dir);
            let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
            println!();
            println!(
                "  {} {}{}",
                style("Config").bold(),
                style(path.display()).dim(),
                if exists { "" } else { " (not found, using defaults)" }
            );
            println!();
            println!("{}", toml::to_string_pretty(&state.config)?);
        }
        ConfigCommand::Path => {
            let path = config_path(&state.data_dir);
            if json {
                let out = serde_json::json!({ "path": path.display().to_string() });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}
