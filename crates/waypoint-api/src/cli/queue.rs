//! CLI work queue subcommands.

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use console::style;
use dialoguer::Confirm;

use waypoint_types::queue::{WorkItem, WorkItemStatus, WorkQueue};

use crate::state::AppState;

/// Work queue subcommands.
#[derive(Subcommand)]
pub enum QueueCommand {
    /// List all work queues, newest first.
    #[command(alias = "ls")]
    List,

    /// Show a work queue and its items.
    Show {
        /// Queue id.
        id: String,
    },

    /// Delete a work queue.
    #[command(alias = "rm")]
    Delete {
        /// Queue id.
        id: String,

        /// Skip confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// List failed items.
    Retryable {
        /// Queue id.
        id: String,
    },
}

/// Handle a queue subcommand.
pub async fn handle_queue_command(cmd: QueueCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        QueueCommand::List => handle_list(state, json).await,
        QueueCommand::Show { id } => handle_show(state, &id, json).await,
        QueueCommand::Delete { id, force } => handle_delete(state, &id, force, json).await,
        QueueCommand::Retryable { id } => handle_retryable(state, &id, json).await,
    }
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

async fn handle_list(state: &AppState, json: bool) -> Result<()> {
    let queues = state.queues.list_queues().await?;

    if json {
        let out: Vec<serde_json::Value> = queues
            .iter()
            .map(|q| {
                serde_json::json!({
                    "id": q.id,
                    "name": q.name,
                    "status": q.status,
                    "progress": q.progress,
                    "created_at": q.created_at.to_rfc3339(),
                    "updated_at": q.updated_at.to_rfc3339(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if queues.is_empty() {
        println!();
        println!("  No work queues.");
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Id").fg(Color::Cyan),
            Cell::new("Name"),
            Cell::new("Status"),
            Cell::new("Done"),
            Cell::new("Failed"),
            Cell::new("Total"),
            Cell::new("Created"),
        ]);

    for q in &queues {
        table.add_row(vec![
            Cell::new(&q.id),
            Cell::new(&q.name),
            format_item_status(q.status),
            Cell::new(q.progress.completed),
            Cell::new(q.progress.failed),
            Cell::new(q.progress.total),
            Cell::new(q.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Show
// ---------------------------------------------------------------------------

async fn handle_show(state: &AppState, id: &str, json: bool) -> Result<()> {
    let queue = load_existing(state, id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&queue)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} {}",
        style(&queue.name).cyan().bold(),
        style(&queue.id).dim()
    );
    println!("  Status: {}", queue.status);
    print_progress(&queue);
    println!(
        "  Retry: {} (max {} attempts)",
        if queue.config.allow_retry { "allowed" } else { "disabled" },
        queue.config.default_max_retries
    );
    if !queue.config.selection.filters.is_empty() {
        let filters: Vec<String> = queue
            .config
            .selection
            .filters
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        println!("  Filters: {}", filters.join(", "));
    }
    println!();
    println!("{}", items_table(&queue.items));
    println!();

    Ok(())
}

fn print_progress(queue: &WorkQueue) {
    let p = &queue.progress;
    println!(
        "  Progress: {} done, {} failed, {} in progress, {} pending ({} total)",
        style(p.completed).green(),
        style(p.failed).red(),
        style(p.in_progress).blue(),
        p.pending,
        p.total
    );
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

async fn handle_delete(state: &AppState, id: &str, force: bool, json: bool) -> Result<()> {
    let queue = load_existing(state, id).await?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete queue '{}' with {} items?",
                style(&queue.name).red().bold(),
                queue.items.len()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let removed = state.queues.delete_queue(&queue.id).await?;

    if json {
        let out = serde_json::json!({ "id": queue.id, "deleted": removed });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "  {} Deleted queue '{}'.",
            style("*").green().bold(),
            style(&queue.id).cyan()
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Retryable
// ---------------------------------------------------------------------------

async fn handle_retryable(state: &AppState, id: &str, json: bool) -> Result<()> {
    let items = state.queues.retryable_items(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }

    println!();
    if items.is_empty() {
        println!("  No retryable items in '{}'.", style(id).cyan());
    } else {
        println!(
            "  {} retryable items in '{}'",
            style(items.len()).bold(),
            style(id).cyan()
        );
        println!();
        println!("{}", items_table(&items));
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn load_existing(state: &AppState, id: &str) -> Result<WorkQueue> {
    state
        .queues
        .load_queue(id)
        .await?
        .with_context(|| format!("Queue '{id}' not found"))
}

fn items_table(items: &[WorkItem]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Plugin").fg(Color::Cyan),
            Cell::new("Name"),
            Cell::new("Status"),
            Cell::new("Ops"),
            Cell::new("Attempts"),
            Cell::new("Error"),
        ]);

    for item in items {
        table.add_row(vec![
            Cell::new(&item.plugin_id),
            Cell::new(&item.display_name),
            format_item_status(item.status),
            Cell::new(item.stats.operations),
            Cell::new(item.attempts),
            Cell::new(item.error.as_deref().unwrap_or("-")),
        ]);
    }

    table
}

fn format_item_status(status: WorkItemStatus) -> Cell {
    match status {
        WorkItemStatus::Pending => Cell::new("pending").fg(Color::Yellow),
        WorkItemStatus::InProgress => Cell::new("in_progress").fg(Color::Blue),
        WorkItemStatus::Completed => Cell::new("completed").fg(Color::Green),
        WorkItemStatus::Failed => Cell::new("failed").fg(Color::Red),
        WorkItemStatus::Skipped => Cell::new("skipped").fg(Color::DarkYellow),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn items_table_has_row_per_item() {
        let mut failed = WorkItem::new("b", "B", vec![], Utc::now());
        failed.status = WorkItemStatus::Failed;
        failed.error = Some("timeout".to_string());
        let items = vec![WorkItem::new("a", "A", vec![], Utc::now()), failed];

        let table = items_table(&items);
        assert_eq!(table.row_count(), 2);
        let rendered = table.to_string();
        assert!(rendered.contains("timeout"));
        assert!(rendered.contains("pending"));
    }

    #[test]
    fn retryable_help_matches_behavior() {
        use clap::CommandFactory;

        let cli = crate::cli::Cli::command();
        let about = cli
            .find_subcommand("queue")
            .and_then(|queue| queue.find_subcommand("retryable"))
            .and_then(|retryable| retryable.get_about())
            .map(|about| about.to_string())
            .unwrap();
        assert_eq!(about.trim_end_matches('.'), "List failed items");
    }
}
