//! Tracks the OS processes started by `worker start` so `worker stop` can
//! find and signal them: a pid file alongside the store
//! (`queuectl_workers.pid`, one pid per line).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

fn pid_file_path(db_path: &str) -> PathBuf {
    let dir = Path::new(db_path).parent().unwrap_or_else(|| Path::new("."));
    dir.join("queuectl_workers.pid")
}

pub fn save(db_path: &str, pids: &[u32]) -> Result<()> {
    let path = pid_file_path(db_path);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let contents = pids.iter().map(|pid| format!("{pid}\n")).collect::<String>();
    std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))
}

fn load(db_path: &str) -> Vec<u32> {
    let path = pid_file_path(db_path);
    let Ok(contents) = std::fs::read_to_string(&path) else {
        return Vec::new();
    };
    contents
        .lines()
        .filter_map(|line| line.trim().parse().ok())
        .collect()
}

/// Sends `SIGTERM` to every recorded worker pid, waits briefly, then
/// `SIGKILL`s survivors. Mirrors `WorkerManager.stop_workers`.
pub async fn stop_all(db_path: &str) -> Result<usize> {
    let pids = load(db_path);
    if pids.is_empty() {
        return Ok(0);
    }

    for &pid in &pids {
        match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => tracing::info!(pid, "sent SIGTERM to worker process"),
            Err(nix::errno::Errno::ESRCH) => tracing::warn!(pid, "worker process not found"),
            Err(e) => tracing::error!(pid, error = %e, "error stopping worker process"),
        }
    }

    tokio::time::sleep(Duration::from_secs(2)).await;

    for &pid in &pids {
        if signal::kill(Pid::from_raw(pid as i32), None).is_ok() {
            tracing::warn!(pid, "worker process still running, sending SIGKILL");
            let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
        }
    }

    let path = pid_file_path(db_path);
    let _ = std::fs::remove_file(&path);
    Ok(pids.len())
}
