//! CLI command definitions for the `wpt` binary.
//!
//! Uses clap derive macros. Commands are grouped by the document they
//! inspect (e.g., `wpt checkpoint show`, `wpt queue list`).

pub mod checkpoint;
pub mod config;
pub mod queue;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Inspect resumable pipeline checkpoints and work queues.
#[derive(Parser)]
#[command(name = "wpt", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Data directory (defaults to $WAYPOINT_DATA_DIR or ~/.waypoint).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or clear the current pipeline checkpoint.
    #[command(alias = "cp")]
    Checkpoint {
        #[command(subcommand)]
        action: checkpoint::CheckpointCommand,
    },

    /// Inspect and manage work queues.
    Queue {
        #[command(subcommand)]
        action: queue::QueueCommand,
    },

    /// Show configuration.
    Config {
        #[command(subcommand)]
        action: config::ConfigCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Tracing filter for the given verbosity flags. `RUST_LOG` still wins.
pub fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info,waypoint_core=debug,waypoint_infra=debug",
        _ => "trace",
    }
}
