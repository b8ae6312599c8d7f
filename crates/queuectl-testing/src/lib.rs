//! Shared test fixtures for the queuectl workspace: a temp-file-backed
//! store and a builder for `Job` values, so each crate's integration tests
//! don't hand-roll the same boilerplate.

use chrono::Utc;
use queuectl_core::{Job, JobState, Store};
use tempfile::TempDir;

/// A `Store` backed by a fresh SQLite file in a temp directory. The
/// directory is held alive for the lifetime of this value; the store is
/// torn down (and the file deleted) when it's dropped.
pub struct TempStore {
    pub store: Store,
    _dir: TempDir,
}

impl TempStore {
    pub async fn new() -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let db_path = dir.path().join("queuectl-test.db");
        let store = Store::open(db_path.to_str().expect("utf8 temp path")).await?;
        Ok(Self { store, _dir: dir })
    }
}

/// A minimal, fully-populated pending `Job`, for tests that need a row to
/// exercise the claim primitive or the state machine against. Use the
/// builder methods to override fields.
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job: Job {
                id: id.into(),
                command: command.into(),
                state: JobState::Pending,
                attempts: 0,
                max_retries: 3,
                created_at: now,
                updated_at: now,
                next_run_at: now,
                last_error: None,
                priority: 0,
                timeout_seconds: None,
                worker_id: None,
            },
        }
    }

    pub fn max_retries(mut self, max_retries: i64) -> Self {
        self.job.max_retries = max_retries;
        self
    }

    pub fn priority(mut self, priority: i64) -> Self {
        self.job.priority = priority;
        self
    }

    pub fn next_run_at(mut self, next_run_at: chrono::DateTime<Utc>) -> Self {
        self.job.next_run_at = next_run_at;
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}
