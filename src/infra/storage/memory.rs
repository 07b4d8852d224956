//! In-memory job storage.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::{Job, JobId, JobSnapshot, JobStorage, StorageError};

/// Keeps registered jobs and the latest encoded snapshot saved for each.
///
/// Snapshots are stored as JSON, the same encoding a durable backend would
/// write, so decoding problems surface here too.
#[derive(Debug, Default)]
pub struct InMemoryJobStorage {
    jobs: Mutex<HashMap<JobId, Arc<Job>>>,
    saved: Mutex<HashMap<JobId, String>>,
}

impl InMemoryJobStorage {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `job` so it can be handed back by `jobs_for_scheduler`.
    pub fn register(&self, job: Arc<Job>) {
        self.jobs.lock().insert(job.id(), job);
    }

    /// Forget a job and its saved snapshot.
    pub fn remove(&self, id: JobId) -> Option<Arc<Job>> {
        self.saved.lock().remove(&id);
        self.jobs.lock().remove(&id)
    }

    /// Latest snapshot saved for `id`.
    ///
    /// # Errors
    ///
    /// `StorageError::Codec` if the stored snapshot does not decode.
    pub fn saved_snapshot(&self, id: JobId) -> Result<Option<JobSnapshot>, StorageError> {
        let encoded = self.saved.lock().get(&id).cloned();
        encoded
            .map(|json| serde_json::from_str(&json).map_err(StorageError::from))
            .transpose()
    }

    /// Number of jobs with a saved snapshot.
    #[must_use]
    pub fn saved_count(&self) -> usize {
        self.saved.lock().len()
    }
}

impl JobStorage for InMemoryJobStorage {
    fn save_job(&self, snapshot: &JobSnapshot) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(snapshot)?;
        self.saved.lock().insert(snapshot.id, encoded);
        Ok(())
    }

    fn jobs_for_scheduler(&self, scheduler_id: &str) -> Result<Vec<Arc<Job>>, StorageError> {
        let candidates: Vec<Arc<Job>> = self.jobs.lock().values().cloned().collect();
        let mut owned: Vec<Arc<Job>> = candidates
            .into_iter()
            .filter(|job| job.scheduler_id().as_deref() == Some(scheduler_id))
            .collect();
        owned.sort_by_key(|job| job.id());
        Ok(owned)
    }
}
