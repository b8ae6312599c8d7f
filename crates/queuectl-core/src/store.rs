//! The durable store: schema, connection management, and the atomic
//! claim primitive. Backed by a single local SQLite file in WAL mode, which
//! gives serializable, single-writer transactions across multiple processes
//! without requiring an external database server.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use crate::error::{QueueError, Result};
use crate::models::{Counts, DlqEntry, Job, JobState, ListFilter, SortKey, WorkerRow};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    command TEXT NOT NULL,
    state TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL DEFAULT 3,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    next_run_at TEXT NOT NULL,
    last_error TEXT,
    priority INTEGER NOT NULL DEFAULT 0,
    timeout_seconds INTEGER,
    worker_id TEXT
);

CREATE INDEX IF NOT EXISTS idx_jobs_state_next_run ON jobs(state, next_run_at);
CREATE INDEX IF NOT EXISTS idx_jobs_priority ON jobs(priority DESC, created_at ASC);
CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);

CREATE TABLE IF NOT EXISTS dlq (
    id TEXT PRIMARY KEY,
    original_job_id TEXT NOT NULL,
    command TEXT NOT NULL,
    attempts INTEGER NOT NULL,
    last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    moved_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_dlq_moved_at ON dlq(moved_at);

CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS workers (
    worker_id TEXT PRIMARY KEY,
    pid INTEGER NOT NULL,
    started_at TEXT NOT NULL,
    last_heartbeat_at TEXT NOT NULL,
    hostname TEXT NOT NULL,
    version TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_workers_heartbeat ON workers(last_heartbeat_at);
"#;

const JOB_COLUMNS: &str = "id, command, state, attempts, max_retries, created_at, updated_at, \
                           next_run_at, last_error, priority, timeout_seconds, worker_id";

/// A handle to the durable store. Cheap to clone (wraps a pool).
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (and, if needed, create) the store file at `db_path`, running
    /// schema migrations idempotently.
    pub async fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    QueueError::StoreUnavailable(sqlx::Error::Io(e))
                })?;
            }
        }

        let connect_options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(QueueError::StoreUnavailable)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_options)
            .await?;

        sqlx::query(SCHEMA).execute(&pool).await?;

        Ok(Self { pool })
    }

    /// An in-memory store, for tests that don't need a file on disk.
    pub async fn open_in_memory() -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(QueueError::StoreUnavailable)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    fn hydrate_job(row: &sqlx::sqlite::SqliteRow) -> Result<Job> {
        let state_str: String = row.get("state");
        let state = JobState::parse(&state_str).ok_or_else(|| {
            QueueError::StoreCorrupted(format!("unknown job state '{state_str}'"))
        })?;
        let worker_id: Option<String> = row.get("worker_id");
        if state == JobState::Processing && worker_id.is_none() {
            return Err(QueueError::StoreCorrupted(
                "processing job has no worker_id".to_string(),
            ));
        }
        if state != JobState::Processing && worker_id.is_some() {
            return Err(QueueError::StoreCorrupted(
                "non-processing job has a worker_id".to_string(),
            ));
        }
        Ok(Job {
            id: row.get("id"),
            command: row.get("command"),
            state,
            attempts: row.get("attempts"),
            max_retries: row.get("max_retries"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            next_run_at: row.get("next_run_at"),
            last_error: row.get("last_error"),
            priority: row.get("priority"),
            timeout_seconds: row.get("timeout_seconds"),
            worker_id,
        })
    }

    /// The atomic claim primitive. Returns `Ok(None)` if no job is
    /// eligible; otherwise the claimed job, already committed as
    /// `processing`.
    pub async fn claim_job(&self, worker_id: &str) -> Result<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let candidate: Option<String> = sqlx::query_scalar(
            "SELECT id FROM jobs \
             WHERE state = 'pending' AND next_run_at <= ? \
             ORDER BY priority DESC, created_at ASC \
             LIMIT 1",
        )
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job_id) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };

        let now = Utc::now();
        let updated = sqlx::query(
            "UPDATE jobs SET state = 'processing', worker_id = ?, updated_at = ? \
             WHERE id = ? AND state = 'pending' AND next_run_at <= ?",
        )
        .bind(worker_id)
        .bind(now)
        .bind(&job_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() != 1 {
            tx.commit().await?;
            return Ok(None);
        }

        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(&job_id)
            .fetch_one(&mut *tx)
            .await?;
        let job = Self::hydrate_job(&row)?;

        tx.commit().await?;
        Ok(Some(job))
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::hydrate_job).transpose()
    }

    pub async fn insert_job(&self, job: &Job) -> Result<()> {
        sqlx::query(
            "INSERT INTO jobs (id, command, state, attempts, max_retries, created_at, \
             updated_at, next_run_at, last_error, priority, timeout_seconds, worker_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.id)
        .bind(&job.command)
        .bind(job.state.as_str())
        .bind(job.attempts)
        .bind(job.max_retries)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.next_run_at)
        .bind(&job.last_error)
        .bind(job.priority)
        .bind(job.timeout_seconds)
        .bind(&job.worker_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Full-row update, used after the state machine computes a new state
    /// for a job (success, retry, or the in-place bookkeeping before a DLQ
    /// transition).
    pub async fn update_job(&self, job: &Job) -> Result<()> {
        sqlx::query(
            "UPDATE jobs SET command = ?, state = ?, attempts = ?, max_retries = ?, \
             updated_at = ?, next_run_at = ?, last_error = ?, priority = ?, \
             timeout_seconds = ?, worker_id = ? WHERE id = ?",
        )
        .bind(&job.command)
        .bind(job.state.as_str())
        .bind(job.attempts)
        .bind(job.max_retries)
        .bind(job.updated_at)
        .bind(job.next_run_at)
        .bind(&job.last_error)
        .bind(job.priority)
        .bind(job.timeout_seconds)
        .bind(&job.worker_id)
        .bind(&job.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_jobs(&self, filter: &ListFilter) -> Result<Vec<Job>> {
        let mut query = format!("SELECT {JOB_COLUMNS} FROM jobs");
        let mut conditions = Vec::new();
        if filter.state.is_some() {
            conditions.push("state = ?");
        }
        if filter.since.is_some() {
            conditions.push("created_at >= ?");
        }
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }
        match filter.sort {
            SortKey::CreatedAtDesc => query.push_str(" ORDER BY created_at DESC"),
            SortKey::UpdatedAtDesc => query.push_str(" ORDER BY updated_at DESC"),
            SortKey::PriorityThenCreatedAt => {
                query.push_str(" ORDER BY priority DESC, created_at ASC")
            }
            SortKey::Unordered => {}
        }
        query.push_str(" LIMIT ?");

        let mut q = sqlx::query(&query);
        if let Some(state) = filter.state {
            q = q.bind(state.as_str());
        }
        if let Some(since) = filter.since {
            q = q.bind(since);
        }
        q = q.bind(filter.limit);

        let rows = q.fetch_all(&self.pool).await?;
        rows.iter().map(Self::hydrate_job).collect()
    }

    pub async fn counts(&self) -> Result<Counts> {
        let rows = sqlx::query("SELECT state, COUNT(*) as n FROM jobs GROUP BY state")
            .fetch_all(&self.pool)
            .await?;
        let mut counts = Counts::default();
        for row in rows {
            let state: String = row.get("state");
            let n: i64 = row.get("n");
            match state.as_str() {
                "pending" => counts.pending = n,
                "processing" => counts.processing = n,
                "completed" => counts.completed = n,
                "failed" => counts.failed = n,
                _ => {}
            }
        }
        counts.dlq = sqlx::query_scalar("SELECT COUNT(*) FROM dlq")
            .fetch_one(&self.pool)
            .await?;
        Ok(counts)
    }

    /// Jobs with a recorded failure, newest first. Queries on
    /// `last_error IS NOT NULL` rather than `state = 'failed'` — see the
    /// Open Question resolution in DESIGN.md (the reference design never
    /// writes `failed`, which would make the literal query vacuous).
    pub async fn recent_failures(&self, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE last_error IS NOT NULL \
             ORDER BY updated_at DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::hydrate_job).collect()
    }

    /// The DLQ transition: insert the DLQ row and delete the job row in one
    /// transaction.
    pub async fn move_to_dlq(&self, job: &Job) -> Result<DlqEntry> {
        let now = Utc::now();
        let entry = DlqEntry {
            id: uuid::Uuid::new_v4().to_string(),
            original_job_id: job.id.clone(),
            command: job.command.clone(),
            attempts: job.attempts,
            last_error: job.last_error.clone(),
            created_at: job.created_at,
            updated_at: now,
            moved_at: now,
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO dlq (id, original_job_id, command, attempts, last_error, \
             created_at, updated_at, moved_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.original_job_id)
        .bind(&entry.command)
        .bind(entry.attempts)
        .bind(&entry.last_error)
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .bind(entry.moved_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(&job.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(entry)
    }

    pub async fn list_dlq(&self, limit: i64) -> Result<Vec<DlqEntry>> {
        let rows = sqlx::query(
            "SELECT id, original_job_id, command, attempts, last_error, created_at, \
             updated_at, moved_at FROM dlq ORDER BY moved_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| DlqEntry {
                id: row.get("id"),
                original_job_id: row.get("original_job_id"),
                command: row.get("command"),
                attempts: row.get("attempts"),
                last_error: row.get("last_error"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
                moved_at: row.get("moved_at"),
            })
            .collect())
    }

    pub async fn get_dlq(&self, id: &str) -> Result<Option<DlqEntry>> {
        let row = sqlx::query(
            "SELECT id, original_job_id, command, attempts, last_error, created_at, \
             updated_at, moved_at FROM dlq WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| DlqEntry {
            id: row.get("id"),
            original_job_id: row.get("original_job_id"),
            command: row.get("command"),
            attempts: row.get("attempts"),
            last_error: row.get("last_error"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            moved_at: row.get("moved_at"),
        }))
    }

    /// Insert the retried job and delete the DLQ row in one transaction.
    pub async fn retry_dlq_entry(&self, dlq_id: &str, new_job: &Job) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO jobs (id, command, state, attempts, max_retries, created_at, \
             updated_at, next_run_at, last_error, priority, timeout_seconds, worker_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_job.id)
        .bind(&new_job.command)
        .bind(new_job.state.as_str())
        .bind(new_job.attempts)
        .bind(new_job.max_retries)
        .bind(new_job.created_at)
        .bind(new_job.updated_at)
        .bind(new_job.next_run_at)
        .bind(&new_job.last_error)
        .bind(new_job.priority)
        .bind(new_job.timeout_seconds)
        .bind(&new_job.worker_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM dlq WHERE id = ?")
            .bind(dlq_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn purge_dlq(&self, cutoff: Option<DateTime<Utc>>) -> Result<u64> {
        let result = match cutoff {
            Some(cutoff) => {
                sqlx::query("DELETE FROM dlq WHERE moved_at < ?")
                    .bind(cutoff)
                    .execute(&self.pool)
                    .await?
            }
            None => sqlx::query("DELETE FROM dlq").execute(&self.pool).await?,
        };
        Ok(result.rows_affected())
    }

    pub async fn register_worker(&self, worker: &WorkerRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO workers (worker_id, pid, started_at, last_heartbeat_at, hostname, \
             version) VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(worker_id) DO UPDATE SET pid = excluded.pid, \
             started_at = excluded.started_at, last_heartbeat_at = excluded.last_heartbeat_at, \
             hostname = excluded.hostname, version = excluded.version",
        )
        .bind(&worker.worker_id)
        .bind(worker.pid)
        .bind(worker.started_at)
        .bind(worker.last_heartbeat_at)
        .bind(&worker.hostname)
        .bind(&worker.version)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_worker_heartbeat(&self, worker_id: &str) -> Result<()> {
        sqlx::query("UPDATE workers SET last_heartbeat_at = ? WHERE worker_id = ?")
            .bind(Utc::now())
            .bind(worker_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn unregister_worker(&self, worker_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM workers WHERE worker_id = ?")
            .bind(worker_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn active_workers(&self, stale_timeout_seconds: i64) -> Result<Vec<WorkerRow>> {
        let cutoff = Utc::now() - chrono::Duration::seconds(stale_timeout_seconds);
        let rows = sqlx::query(
            "SELECT worker_id, pid, started_at, last_heartbeat_at, hostname, version \
             FROM workers WHERE last_heartbeat_at > ?",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| WorkerRow {
                worker_id: row.get("worker_id"),
                pid: row.get("pid"),
                started_at: row.get("started_at"),
                last_heartbeat_at: row.get("last_heartbeat_at"),
                hostname: row.get("hostname"),
                version: row.get("version"),
            })
            .collect())
    }

    /// Jobs stuck `processing` under a dead or silent worker.
    pub async fn stale_processing_jobs(&self, stale_timeout_seconds: i64) -> Result<Vec<Job>> {
        let cutoff = Utc::now() - chrono::Duration::seconds(stale_timeout_seconds);
        let rows = sqlx::query(&format!(
            "SELECT j.id, j.command, j.state, j.attempts, j.max_retries, j.created_at, \
             j.updated_at, j.next_run_at, j.last_error, j.priority, j.timeout_seconds, \
             j.worker_id \
             FROM jobs j LEFT JOIN workers w ON j.worker_id = w.worker_id \
             WHERE j.state = 'processing' \
             AND (w.worker_id IS NULL OR w.last_heartbeat_at < ?)"
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::hydrate_job).collect()
    }

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO config (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT key, value FROM config")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("key"), row.get("value")))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn claim_commits_processing_state_with_worker_id() {
        let store = Store::open_in_memory().await.unwrap();
        let job = Job {
            id: "j1".to_string(),
            command: "echo hi".to_string(),
            state: JobState::Pending,
            attempts: 0,
            max_retries: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            next_run_at: Utc::now(),
            last_error: None,
            priority: 0,
            timeout_seconds: None,
            worker_id: None,
        };
        store.insert_job(&job).await.unwrap();

        let claimed = store.claim_job("worker-1").await.unwrap().unwrap();
        assert_eq!(claimed.state, JobState::Processing);
        assert_eq!(claimed.worker_id.as_deref(), Some("worker-1"));

        // state = processing iff worker_id is set, at every quiescent read,
        // not just right after a claim.
        let refetched = store.get_job("j1").await.unwrap().unwrap();
        assert_eq!(refetched.state, JobState::Processing);
        assert_eq!(refetched.worker_id.as_deref(), Some("worker-1"));
    }

    #[tokio::test]
    async fn corrupted_row_is_detected_on_hydration() {
        let store = Store::open_in_memory().await.unwrap();
        let now = Utc::now();
        // Insert a row that violates the invariant directly, bypassing the
        // ordinary insert_job/update_job paths, to prove reads notice it.
        sqlx::query(
            "INSERT INTO jobs (id, command, state, attempts, max_retries, created_at, \
             updated_at, next_run_at, priority) VALUES ('bad', 'x', 'processing', 0, 3, ?, ?, ?, 0)",
        )
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&store.pool)
        .await
        .unwrap();

        let result = store.get_job("bad").await;
        assert!(matches!(result, Err(QueueError::StoreCorrupted(_))));
    }
}
