//! The queue manager: the job-lifecycle façade used by enqueuers and
//! workers. Composes the store with the state machine; never bypasses the
//! atomic claim primitive or the single-transaction DLQ move.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{QueueError, Result};
use crate::models::{Counts, DlqEntry, Job, JobSpecInput, JobState, ListFilter};
use crate::state_machine::{self, FailureOutcome};
use crate::store::Store;

#[derive(Clone)]
pub struct QueueManager {
    store: Store,
}

impl QueueManager {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Parse, validate, and persist a job spec.
    pub async fn validate_and_enqueue(
        &self,
        spec_text: &str,
        default_max_retries: i64,
    ) -> Result<String> {
        let value: serde_json::Value = serde_json::from_str(spec_text)
            .map_err(|e| QueueError::BadSpec(format!("invalid JSON: {e}")))?;
        if !value.is_object() {
            return Err(QueueError::BadSpec(
                "job specification must be a JSON object".to_string(),
            ));
        }
        let spec: JobSpecInput = serde_json::from_value(value)
            .map_err(|e| QueueError::BadSpec(e.to_string()))?;
        if spec.command.trim().is_empty() {
            return Err(QueueError::BadSpec(
                "command must be a non-empty string".to_string(),
            ));
        }

        let id = match spec.id {
            Some(id) => {
                if self.store.get_job(&id).await?.is_some() {
                    return Err(QueueError::DuplicateId(id));
                }
                id
            }
            None => Uuid::new_v4().to_string(),
        };

        let now = Utc::now();
        let next_run_at = spec.run_at.unwrap_or(now);
        let job = Job {
            id: id.clone(),
            command: spec.command,
            state: JobState::Pending,
            attempts: 0,
            max_retries: spec.max_retries.unwrap_or(default_max_retries),
            created_at: now,
            updated_at: now,
            next_run_at,
            last_error: None,
            priority: spec.priority,
            timeout_seconds: spec.timeout_seconds,
            worker_id: None,
        };

        self.store.insert_job(&job).await?;
        info!(job_id = %id, "job enqueued");
        Ok(id)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Job>> {
        self.store.get_job(id).await
    }

    pub async fn list(&self, filter: ListFilter) -> Result<Vec<Job>> {
        self.store.list_jobs(&filter).await
    }

    pub async fn counts(&self) -> Result<Counts> {
        self.store.counts().await
    }

    pub async fn recent_failures(&self, limit: i64) -> Result<Vec<Job>> {
        self.store.recent_failures(limit).await
    }

    /// Apply the success transition and persist it.
    pub async fn handle_success(&self, mut job: Job) -> Result<()> {
        state_machine::apply_success(&mut job);
        self.store.update_job(&job).await?;
        Ok(())
    }

    /// Apply the failure transition: either reschedule with backoff or move
    /// to the DLQ, atomically.
    pub async fn handle_failure(
        &self,
        mut job: Job,
        message: &str,
        backoff_base: i64,
    ) -> Result<()> {
        match state_machine::apply_failure(&mut job, message, backoff_base) {
            FailureOutcome::Retry => {
                self.store.update_job(&job).await?;
            }
            FailureOutcome::MoveToDlq => {
                let entry = self.store.move_to_dlq(&job).await?;
                warn!(job_id = %job.id, dlq_id = %entry.id, "job moved to dead letter queue");
            }
        }
        Ok(())
    }

    pub async fn list_dlq(&self, limit: i64) -> Result<Vec<DlqEntry>> {
        self.store.list_dlq(limit).await
    }

    /// Recreate a job from a DLQ entry. If `same_id`, the original
    /// job id is reused (failing with `DuplicateId` if it's taken); else a
    /// fresh id is minted.
    pub async fn retry_from_dlq(
        &self,
        dlq_id: &str,
        same_id: bool,
        default_max_retries: i64,
    ) -> Result<String> {
        let entry = self
            .store
            .get_dlq(dlq_id)
            .await?
            .ok_or_else(|| QueueError::NotFound(format!("DLQ entry '{dlq_id}' not found")))?;

        let new_id = if same_id {
            entry.original_job_id.clone()
        } else {
            Uuid::new_v4().to_string()
        };

        if same_id && self.store.get_job(&new_id).await?.is_some() {
            return Err(QueueError::DuplicateId(new_id));
        }

        let now = Utc::now();
        let new_job = Job {
            id: new_id.clone(),
            command: entry.command.clone(),
            state: JobState::Pending,
            attempts: 0,
            max_retries: default_max_retries,
            created_at: entry.created_at,
            updated_at: now,
            next_run_at: now,
            last_error: None,
            priority: 0,
            timeout_seconds: None,
            worker_id: None,
        };

        self.store.retry_dlq_entry(dlq_id, &new_job).await?;
        info!(job_id = %new_id, dlq_id = %dlq_id, "job retried from dead letter queue");
        Ok(new_id)
    }

    pub async fn purge_dlq(&self, older_than_days: Option<i64>) -> Result<u64> {
        let cutoff = older_than_days.map(|days| Utc::now() - chrono::Duration::days(days));
        self.store.purge_dlq(cutoff).await
    }
}
