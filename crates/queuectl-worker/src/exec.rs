//! Shells out a job's command and maps the result to the outcome vocabulary
//! a worker reports back to the queue.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

/// What happened when a command ran to completion (or didn't).
pub enum Outcome {
    Success,
    Failure(String),
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.trim().chars().take(max_chars).collect()
}

/// Runs `command` through `sh -c`, capped at `timeout_seconds` if given.
/// On timeout the child is killed before reporting. Both stdout and stderr
/// are drained concurrently with the wait (an unread full pipe would
/// otherwise deadlock the child), but only stderr feeds the failure
/// message.
pub async fn execute_command(command: &str, timeout_seconds: Option<u64>) -> Outcome {
    let mut child = match Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return Outcome::Failure(format!("Execution error: {e}")),
    };

    let mut stdout = child.stdout.take().expect("stdout was piped");
    let mut stderr = child.stderr.take().expect("stderr was piped");
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();
    let read_stdout = stdout.read_to_end(&mut stdout_buf);
    let read_stderr = stderr.read_to_end(&mut stderr_buf);

    let run = async {
        let (status, _, _) = tokio::join!(child.wait(), read_stdout, read_stderr);
        status
    };

    let status = match timeout_seconds {
        Some(secs) => match timeout(Duration::from_secs(secs), run).await {
            Ok(status) => status,
            Err(_) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Outcome::Failure(format!("Command timed out after {secs} seconds"));
            }
        },
        None => run.await,
    };

    match status {
        Ok(status) if status.success() => Outcome::Success,
        Ok(status) => {
            let code = status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&stderr_buf);
            let mut message = format!("Command failed with exit code {code}");
            if !stderr.trim().is_empty() {
                message.push_str(": ");
                message.push_str(&truncate(&stderr, 500));
            }
            Outcome::Failure(message)
        }
        Err(e) => Outcome::Failure(format!("Execution error: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_command_reports_success() {
        let outcome = execute_command("exit 0", None).await;
        assert!(matches!(outcome, Outcome::Success));
    }

    #[tokio::test]
    async fn nonzero_exit_reports_code_and_truncated_stderr() {
        let outcome = execute_command("echo oops 1>&2; exit 7", None).await;
        match outcome {
            Outcome::Failure(message) => {
                assert!(message.starts_with("Command failed with exit code 7"));
                assert!(message.contains("oops"));
            }
            Outcome::Success => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn timeout_kills_the_child_and_reports_elapsed_seconds() {
        let outcome = execute_command("sleep 5", Some(1)).await;
        match outcome {
            Outcome::Failure(message) => {
                assert_eq!(message, "Command timed out after 1 seconds");
            }
            Outcome::Success => panic!("expected timeout failure"),
        }
    }

    #[tokio::test]
    async fn exit_code_is_preserved_without_stderr_suffix_when_stderr_is_empty() {
        let outcome = execute_command("exit 3", None).await;
        match outcome {
            Outcome::Failure(message) => assert_eq!(message, "Command failed with exit code 3"),
            Outcome::Success => panic!("expected failure"),
        }
    }
}
