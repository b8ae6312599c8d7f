//! Row types for the four durable entities: Job, DLQ entry, Worker, Config entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Legal job states. `Failed` is reachable in the enum but no code path in
/// this implementation writes it — see the Open Question resolution in
/// DESIGN.md. It is kept so `recent_failures` and any future terminal-error
/// classification have somewhere to land without a breaking schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobState::Pending),
            "processing" => Some(JobState::Processing),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            _ => None,
        }
    }
}

/// A unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub state: JobState,
    pub attempts: i64,
    pub max_retries: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub next_run_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub priority: i64,
    pub timeout_seconds: Option<i64>,
    pub worker_id: Option<String>,
}

/// A job whose retry budget is exhausted.
#[derive(Debug, Clone, PartialEq)]
pub struct DlqEntry {
    pub id: String,
    pub original_job_id: String,
    pub command: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub moved_at: DateTime<Utc>,
}

/// A live worker registration.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerRow {
    pub worker_id: String,
    pub pid: i64,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub hostname: String,
    pub version: String,
}

/// Aggregate counts returned by `QueueManager::counts`.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Counts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub dlq: i64,
}

/// Sort order accepted by `QueueManager::list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAtDesc,
    UpdatedAtDesc,
    PriorityThenCreatedAt,
    Unordered,
}

impl SortKey {
    pub fn parse(s: &str) -> Self {
        match s {
            "created_at" => SortKey::CreatedAtDesc,
            "updated_at" => SortKey::UpdatedAtDesc,
            "priority" => SortKey::PriorityThenCreatedAt,
            _ => SortKey::Unordered,
        }
    }
}

/// Filters accepted by `QueueManager::list`.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub state: Option<JobState>,
    pub since: Option<DateTime<Utc>>,
    pub limit: i64,
    pub sort: SortKey,
}

/// The JSON job specification accepted by `enqueue`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSpecInput {
    pub command: String,
    pub id: Option<String>,
    pub max_retries: Option<i64>,
    #[serde(default)]
    pub priority: i64,
    pub run_at: Option<DateTime<Utc>>,
    pub timeout_seconds: Option<i64>,
}
