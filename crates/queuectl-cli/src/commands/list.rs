//! `queuectl list`: filter/sort/paginate jobs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use queuectl_core::{JobState, ListFilter, SortKey};

use crate::bootstrap;

#[derive(Args)]
pub struct ListArgs {
    /// Filter by job state (pending, processing, completed, failed).
    #[arg(long)]
    state: Option<String>,
    /// Maximum number of jobs to show.
    #[arg(long, default_value_t = 10)]
    limit: i64,
    /// Show jobs since an ISO datetime (e.g. 2023-01-01T00:00:00Z).
    #[arg(long)]
    since: Option<String>,
    /// Sort by field (created_at, updated_at, priority).
    #[arg(long, default_value = "created_at")]
    sort: String,
}

pub async fn run(args: ListArgs) -> Result<()> {
    let (queue, _) = bootstrap().await?;

    let state = args
        .state
        .as_deref()
        .map(|s| JobState::parse(s).ok_or_else(|| anyhow::anyhow!("unrecognized state '{s}'")))
        .transpose()?;
    let since = args
        .since
        .as_deref()
        .map(|s| s.parse::<DateTime<Utc>>())
        .transpose()?;

    let filter = ListFilter {
        state,
        since,
        limit: args.limit,
        sort: SortKey::parse(&args.sort),
    };

    let jobs = queue.list(filter).await?;
    if jobs.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    println!(
        "{:<20} {:<12} {:<30} {:<8} {:<20}",
        "ID", "State", "Command", "Attempts", "Created"
    );
    println!("{}", "-".repeat(90));
    for job in jobs {
        let command_preview = if job.command.chars().count() > 30 {
            format!("{}...", job.command.chars().take(27).collect::<String>())
        } else {
            job.command.clone()
        };
        println!(
            "{:<20} {:<12} {:<30} {:<8} {:<20}",
            job.id,
            job.state.as_str(),
            command_preview,
            job.attempts,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }

    Ok(())
}
