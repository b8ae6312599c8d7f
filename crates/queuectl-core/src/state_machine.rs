//! The retry/backoff/DLQ state machine. Pure functions over a `Job`
//! value — no IO, so the off-by-one retry boundary and the backoff law can
//! be tested without a store.

use chrono::Utc;

use crate::models::{Job, JobState};

const LAST_ERROR_MAX_LEN: usize = 1000;

fn truncate(message: &str, max_len: usize) -> String {
    if message.len() <= max_len {
        message.to_string()
    } else {
        message.chars().take(max_len).collect()
    }
}

/// `processing -> completed`. `attempts` is not incremented — it counts
/// failed tries only.
pub fn apply_success(job: &mut Job) {
    job.state = JobState::Completed;
    job.updated_at = Utc::now();
    job.worker_id = None;
}

/// The outcome of a failed attempt: either the job is rescheduled with
/// backoff, or its retry budget is exhausted and it must be moved to the
/// DLQ by the caller (the DLQ transition itself needs a store transaction,
/// so this function only signals the decision).
pub enum FailureOutcome {
    Retry,
    MoveToDlq,
}

/// Apply a failed attempt to `job` in place. Returns which branch the
/// caller must now take.
pub fn apply_failure(job: &mut Job, message: &str, backoff_base: i64) -> FailureOutcome {
    job.attempts += 1;
    job.last_error = Some(truncate(message, LAST_ERROR_MAX_LEN));
    job.updated_at = Utc::now();
    job.worker_id = None;

    if job.attempts > job.max_retries {
        return FailureOutcome::MoveToDlq;
    }

    let delay_seconds = backoff_base.saturating_pow(job.attempts as u32);
    job.state = JobState::Pending;
    job.next_run_at = job.updated_at + chrono::Duration::seconds(delay_seconds);
    FailureOutcome::Retry
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_job(attempts: i64, max_retries: i64) -> Job {
        let now = Utc::now();
        Job {
            id: "job-1".to_string(),
            command: "echo hi".to_string(),
            state: JobState::Processing,
            attempts,
            max_retries,
            created_at: now,
            updated_at: now,
            next_run_at: now,
            last_error: None,
            priority: 0,
            timeout_seconds: None,
            worker_id: Some("worker-1".to_string()),
        }
    }

    #[test]
    fn success_clears_worker_and_completes() {
        let mut job = sample_job(0, 3);
        apply_success(&mut job);
        assert_eq!(job.state, JobState::Completed);
        assert!(job.worker_id.is_none());
        assert_eq!(job.attempts, 0);
    }

    #[test]
    fn failure_within_budget_retries_with_backoff() {
        let mut job = sample_job(0, 3);
        let before = job.updated_at;
        let outcome = apply_failure(&mut job, "boom", 2);
        assert!(matches!(outcome, FailureOutcome::Retry));
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.attempts, 1);
        assert!(job.worker_id.is_none());
        let delay = job.next_run_at - job.updated_at;
        assert_eq!(delay, Duration::seconds(2));
        assert!(job.updated_at >= before);
    }

    #[test]
    fn failure_exhausting_retries_moves_to_dlq() {
        // max_retries = 0: a single failure already exceeds the budget.
        let mut job = sample_job(0, 0);
        let outcome = apply_failure(&mut job, "boom", 2);
        assert!(matches!(outcome, FailureOutcome::MoveToDlq));
        assert_eq!(job.attempts, 1);
    }

    #[test]
    fn backoff_matches_integer_exponential_law() {
        for (attempts, expected) in [(1, 2), (2, 4), (3, 8), (4, 16)] {
            let mut job = sample_job(attempts - 1, 10);
            apply_failure(&mut job, "boom", 2);
            let delay = job.next_run_at - job.updated_at;
            assert_eq!(delay, Duration::seconds(expected));
        }
    }

    #[test]
    fn error_message_is_truncated() {
        let mut job = sample_job(0, 3);
        let long = "x".repeat(2000);
        apply_failure(&mut job, &long, 2);
        assert_eq!(job.last_error.unwrap().len(), LAST_ERROR_MAX_LEN);
    }
}
