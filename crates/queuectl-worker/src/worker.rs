//! The worker main loop: register, heartbeat, claim, execute, report, and
//! clean up on shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use queuectl_core::{ConfigManager, Job, QueueManager, WorkerRow};
use tokio::signal::unix::{signal, SignalKind};
use uuid::Uuid;

use crate::exec::{self, Outcome};

const WORKER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A cloneable remote control for a [`WorkerRuntime`]'s stop flag. Lets a
/// caller request shutdown from outside the task running `run()`, the same
/// way the signal listener does from inside it.
#[derive(Clone)]
pub struct WorkerHandle {
    stopping: Arc<AtomicBool>,
}

impl WorkerHandle {
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }
}

/// Owns one worker's lifecycle against a [`QueueManager`]. Each OS process
/// supervised by `queuectl worker start` runs exactly one of these.
pub struct WorkerRuntime {
    worker_id: String,
    queue: QueueManager,
    poll_interval_ms: u64,
    stopping: Arc<AtomicBool>,
}

impl WorkerRuntime {
    /// Registers the worker and returns a runtime ready for [`Self::run`].
    pub async fn new(queue: QueueManager, poll_interval_ms: u64) -> anyhow::Result<Self> {
        let worker_id = format!("worker-{}", &Uuid::new_v4().simple().to_string()[..8]);
        let now = Utc::now();
        queue
            .store()
            .register_worker(&WorkerRow {
                worker_id: worker_id.clone(),
                pid: std::process::id() as i64,
                started_at: now,
                last_heartbeat_at: now,
                hostname: gethostname::gethostname().to_string_lossy().into_owned(),
                version: WORKER_VERSION.to_string(),
            })
            .await?;
        tracing::info!(worker_id = %worker_id, "worker registered");

        Ok(Self {
            worker_id,
            queue,
            poll_interval_ms,
            stopping: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// A cloneable handle that can request shutdown from outside whatever
    /// task `run()` ends up spawned onto.
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            stopping: Arc::clone(&self.stopping),
        }
    }

    /// Spawns the SIGINT/SIGTERM listener. The handler only flips a flag:
    /// the actual shutdown work happens back on the main loop, never inside
    /// the signal task itself.
    fn spawn_signal_listener(&self) -> anyhow::Result<()> {
        let stopping = Arc::clone(&self.stopping);
        let worker_id = self.worker_id.clone();
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => {}
                _ = sigterm.recv() => {}
            }
            tracing::info!(worker_id = %worker_id, "received signal, shutting down gracefully");
            stopping.store(true, Ordering::SeqCst);
        });
        Ok(())
    }

    /// Runs the main loop until a shutdown signal arrives, then cleans up.
    ///
    /// A job already claimed runs to completion before the stop flag is
    /// rechecked, so a graceful stop never interrupts an in-flight command.
    /// A worker that dies mid-job without reaching this loop again leaves
    /// that job `processing`; the sweeper, not this runtime, is what
    /// recovers it.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.spawn_signal_listener()?;
        tracing::info!(worker_id = %self.worker_id, "worker starting main loop");

        let mut last_heartbeat = Utc::now();

        let result: anyhow::Result<()> = async {
            while !self.stopping.load(Ordering::SeqCst) {
                let config = ConfigManager::new(self.queue.store()).runtime_config().await?;
                last_heartbeat = self
                    .update_heartbeat_if_needed(last_heartbeat, config.worker_heartbeat_interval_seconds)
                    .await?;

                match self.queue.store().claim_job(&self.worker_id).await? {
                    Some(job) => {
                        self.execute_job(job, config.default_timeout_seconds, config.backoff_base)
                            .await;
                    }
                    None => {
                        tokio::time::sleep(std::time::Duration::from_millis(self.poll_interval_ms))
                            .await;
                    }
                }
            }
            Ok(())
        }
        .await;

        self.cleanup().await;
        result
    }

    async fn update_heartbeat_if_needed(
        &self,
        last_heartbeat: chrono::DateTime<Utc>,
        interval_seconds: i64,
    ) -> anyhow::Result<chrono::DateTime<Utc>> {
        let now = Utc::now();
        if (now - last_heartbeat).num_seconds() >= interval_seconds {
            self.queue.store().update_worker_heartbeat(&self.worker_id).await?;
            return Ok(now);
        }
        Ok(last_heartbeat)
    }

    async fn execute_job(&self, job: Job, default_timeout_seconds: Option<i64>, backoff_base: i64) {
        let job_id = job.id.clone();
        let timeout_seconds = job
            .timeout_seconds
            .or(default_timeout_seconds)
            .map(|secs| secs.max(0) as u64);

        tracing::info!(worker_id = %self.worker_id, job_id = %job_id, command = %job.command, "executing job");
        let start = Instant::now();
        let outcome = exec::execute_command(&job.command, timeout_seconds).await;
        let duration = start.elapsed().as_secs_f64();

        let report = match outcome {
            Outcome::Success => {
                tracing::info!(worker_id = %self.worker_id, job_id = %job_id, duration, "job completed successfully");
                self.queue.handle_success(job).await
            }
            Outcome::Failure(message) => {
                tracing::warn!(worker_id = %self.worker_id, job_id = %job_id, duration, error = %message, "job failed");
                self.queue.handle_failure(job, &message, backoff_base).await
            }
        };
        if let Err(e) = report {
            tracing::error!(worker_id = %self.worker_id, job_id = %job_id, error = %e, "failed to persist job outcome");
        }
    }

    async fn cleanup(&self) {
        tracing::info!(worker_id = %self.worker_id, "worker cleaning up");
        if let Err(e) = self.queue.store().unregister_worker(&self.worker_id).await {
            tracing::error!(worker_id = %self.worker_id, error = %e, "failed to unregister worker");
        }
        tracing::info!(worker_id = %self.worker_id, "worker shutdown complete");
    }
}
