//! `worker stop`'s pid-file based process supervision.

use std::process::Stdio;

use tempfile::TempDir;

#[path = "../src/pidfile.rs"]
mod pidfile;

#[tokio::test]
async fn stop_all_with_no_pid_file_is_a_harmless_no_op() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("queuectl.db");
    let stopped = pidfile::stop_all(db_path.to_str().unwrap()).await.unwrap();
    assert_eq!(stopped, 0);
}

#[tokio::test]
async fn stop_all_terminates_every_recorded_pid_and_removes_the_file() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("queuectl.db");

    let mut child = tokio::process::Command::new("sleep")
        .arg("30")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let pid = child.id().unwrap();

    pidfile::save(db_path.to_str().unwrap(), &[pid]).unwrap();
    let pid_file = dir.path().join("queuectl_workers.pid");
    assert!(pid_file.exists());

    let stopped = pidfile::stop_all(db_path.to_str().unwrap()).await.unwrap();
    assert_eq!(stopped, 1);
    assert!(!pid_file.exists());

    let status = child.wait().await.unwrap();
    assert!(!status.success(), "process should have been signaled, not exited cleanly");
}
