//! Error types for scheduler operations.

use thiserror::Error;

use super::job::JobId;
use super::state::State;
use super::worker_pool::PoolError;

/// A state write that the transition table does not permit. The job is left
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal state transition for job {job_id}: {from} -> {to}")]
pub struct IllegalStateTransition {
    /// Job whose state write was rejected.
    pub job_id: JobId,
    /// State the job was in.
    pub from: State,
    /// State that was requested.
    pub to: State,
}

/// Failures reported by the persistence collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not complete the operation.
    #[error("storage backend error: {0}")]
    Backend(String),
    /// A job snapshot could not be encoded or decoded.
    #[error("snapshot codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler has not been started or was stopped.
    #[error("scheduler is not running")]
    NotRunning,
    /// `start` was called on a running scheduler.
    #[error("scheduler is already running")]
    AlreadyRunning,
    /// The scheduler was stopped and can not be started again.
    #[error("scheduler has been stopped")]
    Stopped,
    /// The job is in a state from which it can not be scheduled.
    #[error("can not schedule job {job_id} in state {state}")]
    Unschedulable {
        /// Job that was passed to `schedule`.
        job_id: JobId,
        /// Its state at the time of the call.
        state: State,
    },
    /// Scheduler ids must be non-empty.
    #[error("scheduler id must be a non-empty string")]
    InvalidId,
    /// A scheduler with this id is already registered.
    #[error("scheduler `{0}` is already registered")]
    DuplicateId(String),
    /// A state write was rejected.
    #[error(transparent)]
    Transition(#[from] IllegalStateTransition),
    /// The persistence collaborator failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A scheduler thread or runtime could not be created.
    #[error("failed to spawn scheduler runtime: {0}")]
    Spawn(String),
    /// The worker pool refused an operation.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
