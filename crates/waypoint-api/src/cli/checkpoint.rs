//! CLI checkpoint subcommands.
//!
//! Read-side views over the current task checkpoint and its permanent
//! per-task copies, plus `clear` for abandoning a run.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;
use uuid::Uuid;

use waypoint_types::task::{StepStatus, TaskRecord};

use crate::state::AppState;

/// Checkpoint subcommands.
#[derive(Subcommand)]
pub enum CheckpointCommand {
    /// Show the current checkpoint.
    Show,

    /// Print the step a resume would start from.
    #[command(name = "resume-point")]
    ResumePoint,

    /// Delete the current checkpoint (permanent copies are kept).
    Clear {
        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Show the permanent record of a task by id.
    Audit {
        /// Task UUID.
        task_id: String,
    },
}

/// Handle a checkpoint subcommand.
pub async fn handle_checkpoint_command(
    cmd: CheckpointCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        CheckpointCommand::Show => handle_show(state, json).await,
        CheckpointCommand::ResumePoint => handle_resume_point(state, json).await,
        CheckpointCommand::Clear { force } => handle_clear(state, force, json).await,
        CheckpointCommand::Audit { task_id } => handle_audit(state, &task_id, json).await,
    }
}

async fn handle_show(state: &AppState, json: bool) -> Result<()> {
    let task = state.checkpoints.load_current().await?;

    match task {
        Some(task) => display_task(&task, "Current checkpoint", json),
        None if json => {
            println!("null");
            Ok(())
        }
        None => {
            println!();
            println!("  No checkpoint. Nothing to resume.");
            println!();
            Ok(())
        }
    }
}

async fn handle_resume_point(state: &AppState, json: bool) -> Result<()> {
    let resume_point = state.checkpoints.resume_point().await?;

    if json {
        let out = serde_json::json!({ "resume_point": resume_point });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    match resume_point {
        Some(index) => {
            let name = state
                .checkpoints
                .pipeline()
                .step(index)
                .map(|s| s.name.as_str())
                .unwrap_or("?");
            println!(
                "  Resume from step {} ({})",
                style(index).cyan().bold(),
                style(name).cyan()
            );
        }
        None => println!("  Nothing to resume."),
    }
    println!();

    Ok(())
}

async fn handle_clear(state: &AppState, force: bool, json: bool) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt("Discard the current checkpoint? The next run starts from step 1.")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let removed = state.checkpoints.clear().await?;

    if json {
        let out = serde_json::json!({ "cleared": removed });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if removed {
        println!("  {} Checkpoint cleared.", style("*").green().bold());
    } else {
        println!("  No checkpoint to clear.");
    }

    Ok(())
}

async fn handle_audit(state: &AppState, task_id: &str, json: bool) -> Result<()> {
    let id = Uuid::parse_str(task_id).with_context(|| format!("Invalid task id '{task_id}'"))?;

    let task = state
        .checkpoints
        .load_by_id(id)
        .await?
        .with_context(|| format!("No record for task {id}"))?;

    display_task(&task, "Task record", json)
}

fn display_task(task: &TaskRecord, title: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(task)?);
        return Ok(());
    }

    println!();
    println!("  {} {}", style(title).bold(), style(task.id).dim());
    println!(
        "  Progress: {}/{} steps{}",
        task.completed_count(),
        task.step_count(),
        if task.completed {
            format!(" {}", style("(completed)").green())
        } else {
            String::new()
        }
    );
    println!("  Current step: {}", task.current_step);
    println!("  Created: {}", task.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated: {}", task.updated_at.format("%Y-%m-%d %H:%M:%S"));
    println!();

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(Color::Cyan),
            Cell::new("Step"),
            Cell::new("Status"),
            Cell::new("Message"),
            Cell::new("Updated"),
        ]);

    for step in &task.steps {
        table.add_row(vec![
            Cell::new(step.index),
            Cell::new(&step.name),
            format_step_status(step.status),
            Cell::new(&step.message),
            Cell::new(step.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
        ]);
    }

    println!("{table}");

    if !task.outputs.is_empty() {
        println!();
        println!("  {}", style("── Outputs ──").dim());
        for (name, value) in &task.outputs {
            println!("  {} = {}", style(name).cyan(), value);
        }
    }
    println!();

    Ok(())
}

fn format_step_status(status: StepStatus) -> Cell {
    match status {
        StepStatus::Pending => Cell::new("pending").fg(Color::Yellow),
        StepStatus::Running => Cell::new("running").fg(Color::Blue),
        StepStatus::Completed => Cell::new("completed").fg(Color::Green),
        StepStatus::Failed => Cell::new("failed").fg(Color::Red),
    }
}
