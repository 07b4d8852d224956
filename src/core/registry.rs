//! Process-wide lookup of scheduler instances by id.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::error::SchedulerError;
use super::scheduler::Scheduler;

/// Maps scheduler ids to live instances so protocol front-ends can find the
/// scheduler that owns a job.
#[derive(Debug, Default)]
pub struct SchedulerRegistry {
    schedulers: RwLock<HashMap<String, Arc<Scheduler>>>,
}

impl SchedulerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scheduler under its own id.
    ///
    /// # Errors
    ///
    /// `InvalidId` for a blank id, `DuplicateId` if the id is taken.
    pub fn register(&self, scheduler: Arc<Scheduler>) -> Result<(), SchedulerError> {
        let id = scheduler.id().to_owned();
        if id.trim().is_empty() {
            return Err(SchedulerError::InvalidId);
        }
        let mut schedulers = self.schedulers.write();
        if schedulers.contains_key(&id) {
            return Err(SchedulerError::DuplicateId(id));
        }
        info!(scheduler = %id, "scheduler registered");
        schedulers.insert(id, scheduler);
        Ok(())
    }

    /// Look a scheduler up.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Scheduler>> {
        self.schedulers.read().get(id).cloned()
    }

    /// Unregister a scheduler. The instance keeps running until it is stopped
    /// or dropped.
    pub fn remove(&self, id: &str) -> Option<Arc<Scheduler>> {
        self.schedulers.write().remove(id)
    }

    /// Registered ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.schedulers.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered schedulers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schedulers.read().len()
    }

    /// Whether no scheduler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schedulers.read().is_empty()
    }

    /// Stop every registered scheduler.
    pub fn stop_all(&self) {
        let schedulers: Vec<Arc<Scheduler>> = self.schedulers.read().values().cloned().collect();
        for scheduler in schedulers {
            scheduler.stop();
        }
    }
}
