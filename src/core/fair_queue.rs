//! Bounded, ordered job queue with FIFO peek and best-score selection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::job::{Job, JobId};

/// Which of the scheduler's queues a job sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// Jobs re-entering execution (retries, async wake-ups).
    Priority,
    /// Freshly scheduled jobs.
    Plain,
    /// Executed jobs waiting to be promoted to `READY`.
    Ready,
}

impl QueueKind {
    /// Human-readable queue name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Priority => "PriorityThreadQueue",
            Self::Plain => "ThreadQueue",
            Self::Ready => "ReadyQueue",
        }
    }
}

/// Capacity-limited queue of jobs.
///
/// Insertion never blocks: a full queue rejects the job and the caller decides
/// what that means for the job. Removal is idempotent so that the state-change
/// observer and the dispatch loop can both drop the same entry.
#[derive(Debug)]
pub struct FairQueue {
    kind: QueueKind,
    capacity: AtomicUsize,
    jobs: Mutex<VecDeque<Arc<Job>>>,
}

impl FairQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new(kind: QueueKind, capacity: usize) -> Self {
        Self {
            kind,
            capacity: AtomicUsize::new(capacity),
            jobs: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Which queue this is.
    #[must_use]
    pub const fn kind(&self) -> QueueKind {
        self.kind
    }

    /// Maximum number of queued jobs.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Acquire)
    }

    /// Change the capacity. Jobs already queued beyond a lowered capacity stay
    /// queued; only new insertions are affected.
    pub fn set_capacity(&self, capacity: usize) {
        self.capacity.store(capacity, Ordering::Release);
    }

    /// Append `job` unless the queue is full. Returns `false` when rejected.
    /// A job already present is not inserted twice.
    pub fn try_enqueue(&self, job: Arc<Job>) -> bool {
        let mut jobs = self.jobs.lock();
        if jobs.iter().any(|j| j.id() == job.id()) {
            return true;
        }
        if jobs.len() >= self.capacity() {
            return false;
        }
        jobs.push_back(job);
        true
    }

    /// Remove the job with `id`. Returns whether it was present.
    pub fn remove(&self, id: JobId) -> bool {
        let mut jobs = self.jobs.lock();
        match jobs.iter().position(|j| j.id() == id) {
            Some(pos) => {
                jobs.remove(pos);
                true
            }
            None => false,
        }
    }

    /// The oldest queued job.
    #[must_use]
    pub fn peek(&self) -> Option<Arc<Job>> {
        self.jobs.lock().front().cloned()
    }

    /// Pick the job maximizing `score(queue_length, position, job)`.
    ///
    /// With `fairness` off this is the FIFO head. Ties go to the earlier job.
    /// `score` runs under the queue lock and must not lock any job.
    pub fn select_best<F>(&self, fairness: bool, mut score: F) -> Option<Arc<Job>>
    where
        F: FnMut(usize, usize, &Job) -> i64,
    {
        let jobs = self.jobs.lock();
        if !fairness {
            return jobs.front().cloned();
        }
        let len = jobs.len();
        let mut best: Option<(i64, &Arc<Job>)> = None;
        for (position, job) in jobs.iter().enumerate() {
            let value = score(len, position, job);
            if best.map_or(true, |(top, _)| value > top) {
                best = Some((value, job));
            }
        }
        best.map(|(_, job)| Arc::clone(job))
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Whether a job with `id` is queued.
    #[must_use]
    pub fn contains(&self, id: JobId) -> bool {
        self.jobs.lock().iter().any(|j| j.id() == id)
    }

    /// Copy of the queue contents in order.
    #[must_use]
    pub fn jobs(&self) -> Vec<Arc<Job>> {
        self.jobs.lock().iter().cloned().collect()
    }

    /// Drop every queued job, returning them in order.
    pub fn drain(&self) -> Vec<Arc<Job>> {
        self.jobs.lock().drain(..).collect()
    }
}
