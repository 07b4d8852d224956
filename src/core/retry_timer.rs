//! Cancellable one-shot retry timers keyed by job id.
//!
//! At most one timer is pending per job. Arming a job that already has a
//! pending timer replaces it. A generation number guards against a timer that
//! was replaced or cancelled after its sleep finished but before it fired.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use super::error::SchedulerError;
use super::job::JobId;
use crate::runtime::TokioSpawner;

struct PendingTimer {
    generation: u64,
    abort: AbortHandle,
}

/// Timer registry backed by a small dedicated tokio runtime.
pub struct RetryTimers {
    spawner: TokioSpawner,
    pending: Arc<Mutex<HashMap<JobId, PendingTimer>>>,
    next_generation: AtomicU64,
}

impl RetryTimers {
    /// Create a registry whose timers run on a one-thread runtime named
    /// `thread_name`.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Spawn` if the runtime can not be built.
    pub fn new(thread_name: &str) -> Result<Self, SchedulerError> {
        let spawner = TokioSpawner::with_worker_threads(1, thread_name)
            .map_err(|e| SchedulerError::Spawn(e.to_string()))?;
        Ok(Self::with_spawner(spawner))
    }

    /// Create a registry on an existing spawner.
    #[must_use]
    pub fn with_spawner(spawner: TokioSpawner) -> Self {
        Self {
            spawner,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Run `on_fire` after `delay` unless the timer for `job_id` is cancelled
    /// or replaced first. `on_fire` runs on the timer runtime without any
    /// registry lock held.
    pub fn arm<F>(&self, job_id: JobId, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let pending = Arc::clone(&self.pending);

        // Hold the map lock across spawn so the task can not look itself up
        // before it is registered.
        let mut map = self.pending.lock();
        let task = self.spawner.spawn(async move {
            tokio::time::sleep(delay).await;
            let current = {
                let mut map = pending.lock();
                if map.get(&job_id).is_some_and(|t| t.generation == generation) {
                    map.remove(&job_id);
                    true
                } else {
                    false
                }
            };
            if current {
                trace!(job_id, "retry timer fired");
                on_fire();
            }
        });
        let replaced = map.insert(
            job_id,
            PendingTimer {
                generation,
                abort: task.abort_handle(),
            },
        );
        if let Some(old) = replaced {
            old.abort.abort();
        }
        debug!(job_id, delay_ms = delay.as_millis(), "retry timer armed");
    }

    /// Cancel the pending timer for `job_id`. Returns whether one was pending.
    pub fn cancel(&self, job_id: JobId) -> bool {
        let removed = self.pending.lock().remove(&job_id);
        removed.is_some_and(|t| {
            t.abort.abort();
            debug!(job_id, "retry timer cancelled");
            true
        })
    }

    /// Whether a timer is pending for `job_id`.
    #[must_use]
    pub fn is_armed(&self, job_id: JobId) -> bool {
        self.pending.lock().contains_key(&job_id)
    }

    /// Number of pending timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Cancel every pending timer and stop the runtime.
    pub fn shutdown(&self) {
        let drained: Vec<_> = self.pending.lock().drain().collect();
        for (_, timer) in drained {
            timer.abort.abort();
        }
        self.spawner.shutdown();
    }
}

impl std::fmt::Debug for RetryTimers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryTimers")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}
