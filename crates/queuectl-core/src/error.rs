//! Error taxonomy. Each variant names a design-level error kind, not an
//! implementation detail — callers match on the variant, not on message text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    /// Malformed or semantically invalid job spec. Nothing is persisted.
    #[error("invalid job specification: {0}")]
    BadSpec(String),

    /// Id collision on enqueue or same-id DLQ retry. Nothing is persisted.
    #[error("job id '{0}' already exists")]
    DuplicateId(String),

    /// DLQ retry (or other lookup) on a missing id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Durable store busy/locked/IO error. Never corrupts state — every
    /// mutation is transactional.
    #[error("durable store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    /// Invariant violation discovered while hydrating a row (unknown state
    /// value, a `processing` row with no `worker_id`). Fatal for the
    /// current operation.
    #[error("durable store corrupted: {0}")]
    StoreCorrupted(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;
