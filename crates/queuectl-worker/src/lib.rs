//! Worker runtime: registration, the claim/execute/report loop, heartbeats,
//! and graceful shutdown on a signal.

mod exec;
mod worker;

pub use exec::{execute_command, Outcome};
pub use worker::{WorkerHandle, WorkerRuntime};
