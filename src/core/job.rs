//! The job record, its per-job lock, and the payload contract.
//!
//! A [`Job`] is shared as `Arc<Job>` between the producer, the scheduler
//! queues, the worker that runs it and any retry timer. Everything mutable
//! lives behind the job's own mutex; state writes go through
//! [`JobGuard::set_state`], which validates against the transition table and
//! notifies the attached [`StateListener`] while the lock is still held.

use std::fmt;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::IllegalStateTransition;
use super::state::State;
use crate::util::clock::now_ms;

/// Numeric job identifier.
pub type JobId = u64;

/// Result of running a job payload once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The payload finished its step without error.
    Success,
    /// The payload failed but may succeed if run again later.
    RetryableFailure(String),
    /// The payload failed and must not be retried.
    FatalFailure(String),
}

/// The unit of work a job carries.
///
/// `run` is invoked on a pool worker thread, outside the job lock. The payload
/// may lock the job itself to move it on (for example straight to `DONE`, or to
/// `ASYNCWAIT` while it waits for an external event).
#[async_trait]
pub trait JobPayload: Send + Sync + 'static {
    /// Execute one step of the job.
    async fn run(&self, job: &Arc<Job>) -> JobOutcome;
}

/// A state write observed by a [`StateListener`].
#[derive(Debug, Clone, Copy)]
pub struct StateChange<'a> {
    /// Job whose state changed. Its lock is held by the writer.
    pub job: &'a Job,
    /// State before the write.
    pub old: State,
    /// State after the write.
    pub new: State,
}

/// Observer invoked synchronously on every successful state write.
///
/// Called with the job lock held, so implementations must not lock the job.
pub trait StateListener: Send + Sync {
    /// React to a state change.
    fn state_changed(&self, change: &StateChange<'_>);
}

/// Ownership stamp written when a scheduler accepts a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStamp {
    /// Id of the owning scheduler.
    pub scheduler_id: String,
    /// Run timestamp of the owning scheduler instance.
    pub acquired_at_ms: u128,
}

/// One entry of a job's transition history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// State entered.
    pub state: State,
    /// Why the state was entered.
    pub description: String,
    /// When the state was entered (ms since epoch).
    pub at_ms: u128,
}

/// Serializable view of a job, used by persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Job id.
    pub id: JobId,
    /// Owner the job is accounted against.
    pub owner: String,
    /// Current state.
    pub state: State,
    /// Retries consumed so far.
    pub retries: u32,
    /// Per-job retry limit.
    pub max_retries: u32,
    /// Ownership stamp, if a scheduler accepted the job.
    pub scheduler: Option<SchedulerStamp>,
    /// Creation time (ms since epoch).
    pub created_at_ms: u128,
    /// Transition history, oldest first.
    pub history: Vec<HistoryEntry>,
}

struct JobInner {
    state: State,
    retries: u32,
    max_retries: u32,
    scheduler: Option<SchedulerStamp>,
    history: Vec<HistoryEntry>,
    listener: Option<Weak<dyn StateListener>>,
}

/// A unit of scheduled work with an owner and a lifecycle state.
pub struct Job {
    id: JobId,
    owner: String,
    created_at_ms: u128,
    payload: Arc<dyn JobPayload>,
    inner: Mutex<JobInner>,
}

impl Job {
    /// Create a fresh job in `PENDING`.
    pub fn new(
        id: JobId,
        owner: impl Into<String>,
        max_retries: u32,
        payload: Arc<dyn JobPayload>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            owner: owner.into(),
            created_at_ms: now_ms(),
            payload,
            inner: Mutex::new(JobInner {
                state: State::Pending,
                retries: 0,
                max_retries,
                scheduler: None,
                history: Vec::new(),
                listener: None,
            }),
        })
    }

    /// Rebuild a job recovered from storage. The recorded state is taken as-is;
    /// no listener is attached until a scheduler adopts the job.
    pub fn from_snapshot(snapshot: JobSnapshot, payload: Arc<dyn JobPayload>) -> Arc<Self> {
        Arc::new(Self {
            id: snapshot.id,
            owner: snapshot.owner,
            created_at_ms: snapshot.created_at_ms,
            payload,
            inner: Mutex::new(JobInner {
                state: snapshot.state,
                retries: snapshot.retries,
                max_retries: snapshot.max_retries,
                scheduler: snapshot.scheduler,
                history: snapshot.history,
                listener: None,
            }),
        })
    }

    /// Job id.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Owner the job is accounted against.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Creation time (ms since epoch).
    #[must_use]
    pub const fn created_at_ms(&self) -> u128 {
        self.created_at_ms
    }

    /// The payload operation.
    #[must_use]
    pub fn payload(&self) -> &Arc<dyn JobPayload> {
        &self.payload
    }

    /// Acquire the job lock.
    pub fn lock(&self) -> JobGuard<'_> {
        JobGuard {
            job: self,
            inner: self.inner.lock(),
        }
    }

    /// Current state (takes the lock briefly).
    #[must_use]
    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    /// Retries consumed so far.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.inner.lock().retries
    }

    /// Id of the scheduler that accepted the job, if any.
    #[must_use]
    pub fn scheduler_id(&self) -> Option<String> {
        self.inner
            .lock()
            .scheduler
            .as_ref()
            .map(|s| s.scheduler_id.clone())
    }

    /// Copy of the transition history.
    #[must_use]
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.lock().history.clone()
    }

    /// Description of the latest transition, or an empty string for a job that
    /// never transitioned.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.inner
            .lock()
            .history
            .last()
            .map(|h| format!("at {} state {} : {}", h.at_ms, h.state, h.description))
            .unwrap_or_default()
    }

    /// Serializable view of the job.
    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        self.lock().snapshot()
    }

    /// Cancel the job. Returns `Ok(false)` if it had already reached a
    /// terminal state.
    ///
    /// # Errors
    ///
    /// Never fails for a live job; the error is kept for symmetry with the
    /// other state writes.
    pub fn cancel(&self, reason: impl Into<String>) -> Result<bool, IllegalStateTransition> {
        let mut guard = self.lock();
        if guard.state().is_final() {
            return Ok(false);
        }
        guard.set_state(State::Canceled, reason)?;
        Ok(true)
    }

    /// Lifetime expiry: a job holding a result is completed, any other live
    /// job is failed. Terminal jobs are left alone.
    ///
    /// # Errors
    ///
    /// Propagates a rejected state write.
    pub fn expire(&self) -> Result<(), IllegalStateTransition> {
        let mut guard = self.lock();
        match guard.state() {
            State::Ready | State::Transferring => guard.set_state(State::Done, "lifetime expired"),
            s if s.is_final() => Ok(()),
            _ => guard.set_state(State::Failed, "lifetime expired"),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("created_at_ms", &self.created_at_ms)
            .finish_non_exhaustive()
    }
}

/// Exclusive access to a job's mutable record.
pub struct JobGuard<'a> {
    job: &'a Job,
    inner: MutexGuard<'a, JobInner>,
}

impl JobGuard<'_> {
    /// The locked job.
    #[must_use]
    pub const fn job(&self) -> &Job {
        self.job
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> State {
        self.inner.state
    }

    /// Retries consumed so far.
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.inner.retries
    }

    /// Per-job retry limit.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.inner.max_retries
    }

    /// Change the per-job retry limit.
    pub fn set_max_retries(&mut self, max_retries: u32) {
        self.inner.max_retries = max_retries;
    }

    /// Ownership stamp, if a scheduler accepted the job.
    #[must_use]
    pub fn scheduler_stamp(&self) -> Option<&SchedulerStamp> {
        self.inner.scheduler.as_ref()
    }

    /// Stamp the job as owned by a scheduler run.
    pub fn set_scheduler(&mut self, scheduler_id: &str, acquired_at_ms: u128) {
        self.inner.scheduler = Some(SchedulerStamp {
            scheduler_id: scheduler_id.to_owned(),
            acquired_at_ms,
        });
    }

    /// Whether a live listener is attached.
    #[must_use]
    pub fn has_listener(&self) -> bool {
        self.inner
            .listener
            .as_ref()
            .is_some_and(|l| l.strong_count() > 0)
    }

    /// Attach the observer notified on every state write, replacing any
    /// previous one.
    pub fn attach_listener(&mut self, listener: Weak<dyn StateListener>) {
        self.inner.listener = Some(listener);
    }

    /// Write a new state.
    ///
    /// Writing the current state again is a no-op. On success a history entry
    /// is recorded, entering `RETRYWAIT` consumes one retry, and the attached
    /// listener is notified before the lock is released.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalStateTransition`] if the table forbids the write; the
    /// job is left unchanged.
    pub fn set_state(
        &mut self,
        next: State,
        description: impl Into<String>,
    ) -> Result<(), IllegalStateTransition> {
        let old = self.inner.state;
        if old == next {
            return Ok(());
        }
        if !old.can_transition_to(next) {
            return Err(IllegalStateTransition {
                job_id: self.job.id,
                from: old,
                to: next,
            });
        }

        let description = description.into();
        debug!(job_id = self.job.id, owner = %self.job.owner, from = %old, to = %next, %description, "job state changed");

        self.inner.state = next;
        if next == State::RetryWait {
            self.inner.retries += 1;
        }
        self.inner.history.push(HistoryEntry {
            state: next,
            description,
            at_ms: now_ms(),
        });

        let listener = self.inner.listener.as_ref().and_then(Weak::upgrade);
        if let Some(listener) = listener {
            listener.state_changed(&StateChange {
                job: self.job,
                old,
                new: next,
            });
        }
        Ok(())
    }

    /// Serializable view of the job.
    #[must_use]
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.job.id,
            owner: self.job.owner.clone(),
            state: self.inner.state,
            retries: self.inner.retries,
            max_retries: self.inner.max_retries,
            scheduler: self.inner.scheduler.clone(),
            created_at_ms: self.job.created_at_ms,
            history: self.inner.history.clone(),
        }
    }
}
