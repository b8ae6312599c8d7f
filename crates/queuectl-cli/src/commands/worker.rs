//! `queuectl worker`: start/stop the worker fleet, plus a hidden `run`
//! subcommand each supervised OS process re-execs into. Each worker is an
//! independent OS process, so the manager spawns copies of this same binary
//! rather than an in-process task pool.

use anyhow::Result;
use clap::Subcommand;
use queuectl_core::{sweeper, QueueManager, Store};
use queuectl_worker::WorkerRuntime;

use crate::{bootstrap, pidfile};

#[derive(Subcommand)]
pub enum WorkerCommand {
    /// Start worker processes to execute jobs.
    Start {
        /// Number of worker processes to start.
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Run workers in the background instead of waiting on them.
        #[arg(long)]
        detach: bool,
        /// Polling interval in milliseconds.
        #[arg(long = "poll-interval-ms", default_value_t = 500)]
        poll_interval_ms: u64,
    },
    /// Stop all running worker processes gracefully.
    Stop,
    /// Run a single worker in this process. Internal: `worker start`
    /// re-execs into this to supervise each child as its own OS process.
    #[command(hide = true)]
    Run {
        #[arg(long)]
        db_path: String,
        #[arg(long = "poll-interval-ms")]
        poll_interval_ms: u64,
    },
}

pub async fn run(command: WorkerCommand) -> Result<()> {
    match command {
        WorkerCommand::Start {
            count,
            detach,
            poll_interval_ms,
        } => start(count, detach, poll_interval_ms).await,
        WorkerCommand::Stop => stop().await,
        WorkerCommand::Run {
            db_path,
            poll_interval_ms,
        } => run_one(db_path, poll_interval_ms).await,
    }
}

async fn start(count: u32, detach: bool, poll_interval_ms: u64) -> Result<()> {
    let (queue, config) = bootstrap().await?;

    let recovered = sweeper::sweep(&queue, config.stale_worker_timeout_seconds, config.backoff_base).await?;
    if recovered > 0 {
        println!("Recovered {recovered} stale jobs from previous workers");
    }

    let exe = std::env::current_exe()?;
    let mut children = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let child = tokio::process::Command::new(&exe)
            .arg("worker")
            .arg("run")
            .arg("--db-path")
            .arg(&config.db_path)
            .arg("--poll-interval-ms")
            .arg(poll_interval_ms.to_string())
            .spawn()?;
        if let Some(pid) = child.id() {
            tracing::info!(pid, "started worker process");
        }
        children.push(child);
    }

    let pids: Vec<u32> = children.iter().filter_map(|c| c.id()).collect();
    pidfile::save(&config.db_path, &pids)?;

    if detach {
        println!("Starting {count} worker processes in background");
        return Ok(());
    }

    println!("Starting {count} worker processes (Press Ctrl+C to stop)");
    for mut child in children {
        child.wait().await?;
    }
    Ok(())
}

async fn stop() -> Result<()> {
    let (_, config) = bootstrap().await?;
    let stopped = pidfile::stop_all(&config.db_path).await?;
    if stopped == 0 {
        println!("No worker PIDs found");
    } else {
        println!("All workers stopped successfully");
    }
    Ok(())
}

async fn run_one(db_path: String, poll_interval_ms: u64) -> Result<()> {
    let store = Store::open(&db_path).await?;
    let queue = QueueManager::new(store);
    let mut runtime = WorkerRuntime::new(queue, poll_interval_ms).await?;
    runtime.run().await
}
