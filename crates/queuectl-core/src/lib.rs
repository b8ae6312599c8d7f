//! # queuectl-core
//!
//! The coordination substrate for a durable, multi-process background job
//! queue: the durable store, the atomic job-claim protocol, the
//! retry/backoff/DLQ state machine, and the worker-liveness recovery
//! sweeper. These four concerns read and write the same persistent rows
//! under the same consistency rules, so they are specified — and shipped —
//! together.
//!
//! Everything else (argument parsing, process supervision, log formatting)
//! is an external collaborator that depends on this crate, not the other
//! way around.

mod config;
mod error;
mod models;
mod queue;
mod state_machine;
mod store;
pub mod sweeper;

pub use config::{ConfigManager, RuntimeConfig, DEFAULT_DB_PATH};
pub use error::{QueueError, Result};
pub use models::{
    Counts, DlqEntry, Job, JobSpecInput, JobState, ListFilter, SortKey, WorkerRow,
};
pub use queue::QueueManager;
pub use state_machine::{apply_failure, apply_success, FailureOutcome};
pub use store::Store;
