//! Persistence hook consumed by the scheduler.

use std::sync::Arc;

use super::error::StorageError;
use super::job::{Job, JobSnapshot};

/// Where the scheduler saves jobs and finds the ones a previous run left.
///
/// `save_job` is called with the job lock held; implementations must not lock
/// the job.
pub trait JobStorage: Send + Sync {
    /// Persist the current view of a job. Called after it enters `RUNNING`
    /// and after restore decisions.
    ///
    /// # Errors
    ///
    /// Backend or encoding failures. The scheduler logs them and carries on.
    fn save_job(&self, snapshot: &JobSnapshot) -> Result<(), StorageError>;

    /// Live jobs whose ownership stamp names `scheduler_id`.
    ///
    /// # Errors
    ///
    /// Backend or decoding failures; restore is skipped.
    fn jobs_for_scheduler(&self, scheduler_id: &str) -> Result<Vec<Arc<Job>>, StorageError>;
}
