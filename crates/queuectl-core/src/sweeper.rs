//! The recovery sweeper: converts jobs stranded by a crashed or silent
//! worker back into ordinary failures, routed through the same state
//! machine and retry/backoff boundary as any other failure.

use tracing::info;

use crate::error::Result;
use crate::queue::QueueManager;

/// Runs the sweep once and returns how many jobs were recovered. Safe to
/// call repeatedly — with no workers active in between, a second run finds
/// nothing.
pub async fn sweep(
    queue: &QueueManager,
    stale_worker_timeout_seconds: i64,
    backoff_base: i64,
) -> Result<usize> {
    let stale_jobs = queue
        .store()
        .stale_processing_jobs(stale_worker_timeout_seconds)
        .await?;

    let count = stale_jobs.len();
    for job in stale_jobs {
        let worker_id = job.worker_id.clone().unwrap_or_default();
        let message = format!("Job recovered from stale worker {worker_id}");
        queue.handle_failure(job, &message, backoff_base).await?;
    }

    if count > 0 {
        info!(recovered = count, "recovery sweep reclaimed stale jobs");
    }
    Ok(count)
}
