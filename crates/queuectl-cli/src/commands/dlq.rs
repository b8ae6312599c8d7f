//! `queuectl dlq`: list/retry/purge the Dead Letter Queue.

use anyhow::{bail, Result};
use clap::Subcommand;

use crate::bootstrap;

#[derive(Subcommand)]
pub enum DlqCommand {
    /// List jobs in the Dead Letter Queue.
    List {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Retry a job from the Dead Letter Queue.
    Retry {
        job_id: String,
        /// Keep the same job ID when retrying (risky: fails if taken).
        #[arg(long = "same-id")]
        same_id: bool,
    },
    /// Purge jobs from the Dead Letter Queue.
    Purge {
        /// Purge jobs older than N days (all jobs if omitted).
        #[arg(long = "older-than")]
        older_than: Option<i64>,
        /// Confirm the purge operation.
        #[arg(long)]
        force: bool,
    },
}

pub async fn run(command: DlqCommand) -> Result<()> {
    match command {
        DlqCommand::List { limit } => list(limit).await,
        DlqCommand::Retry { job_id, same_id } => retry(job_id, same_id).await,
        DlqCommand::Purge { older_than, force } => purge(older_than, force).await,
    }
}

async fn list(limit: i64) -> Result<()> {
    let (queue, _) = bootstrap().await?;
    let entries = queue.list_dlq(limit).await?;
    if entries.is_empty() {
        println!("No jobs in Dead Letter Queue");
        return Ok(());
    }

    println!(
        "{:<20} {:<20} {:<30} {:<8} {:<20}",
        "DLQ ID", "Original ID", "Command", "Attempts", "Moved At"
    );
    println!("{}", "-".repeat(98));
    for entry in entries {
        let command_preview = if entry.command.chars().count() > 30 {
            format!("{}...", entry.command.chars().take(27).collect::<String>())
        } else {
            entry.command.clone()
        };
        println!(
            "{:<20} {:<20} {:<30} {:<8} {:<20}",
            entry.id,
            entry.original_job_id,
            command_preview,
            entry.attempts,
            entry.moved_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

async fn retry(job_id: String, same_id: bool) -> Result<()> {
    let (queue, config) = bootstrap().await?;
    let new_id = queue.retry_from_dlq(&job_id, same_id, config.max_retries).await?;
    println!("Job retried successfully with ID: {new_id}");
    Ok(())
}

async fn purge(older_than: Option<i64>, force: bool) -> Result<()> {
    if !force {
        bail!("Purge operation requires --force flag for confirmation");
    }
    let (queue, _) = bootstrap().await?;
    match older_than {
        Some(days) => println!("Purging DLQ jobs older than {days} days..."),
        None => println!("Purging all DLQ jobs..."),
    }
    queue.purge_dlq(older_than).await?;
    println!("DLQ purge completed successfully");
    Ok(())
}
