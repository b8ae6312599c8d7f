//! `queuectl status`: job counts, active workers, recent failures.

use anyhow::Result;

use crate::bootstrap;

pub async fn run() -> Result<()> {
    let (queue, config) = bootstrap().await?;

    let counts = queue.counts().await?;
    let active_workers = queue
        .store()
        .active_workers(config.stale_worker_timeout_seconds)
        .await?;
    let recent_failures = queue.recent_failures(3).await?;

    println!("=== QueueCTL Status ===");
    println!();
    println!("Job Counts:");
    println!("  Pending:    {}", counts.pending);
    println!("  Processing: {}", counts.processing);
    println!("  Completed:  {}", counts.completed);
    println!("  Failed:     {}", counts.failed);
    println!("  DLQ:        {}", counts.dlq);
    println!();
    println!("Active Workers: {}", active_workers.len());
    for worker in &active_workers {
        println!(
            "  {} (PID: {}, Host: {})",
            worker.worker_id, worker.pid, worker.hostname
        );
    }

    if !recent_failures.is_empty() {
        println!();
        println!("Recent Failures:");
        for job in recent_failures {
            let preview = match &job.last_error {
                Some(err) if err.chars().count() > 50 => {
                    format!("{}...", err.chars().take(50).collect::<String>())
                }
                Some(err) => err.clone(),
                None => String::new(),
            };
            println!("  {}: {}", job.id, preview);
        }
    }

    Ok(())
}
