//! Per-owner counters used for quotas and fairness input.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

use super::state::State;

/// Counts keyed by owner with a lock-free global total.
#[derive(Debug, Default)]
pub struct CountByOwner {
    by_owner: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl CountByOwner {
    /// Create an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one for `owner`.
    pub fn increment(&self, owner: &str) {
        let mut by_owner = self.by_owner.lock();
        *by_owner.entry(owner.to_owned()).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::AcqRel);
    }

    /// Remove one for `owner`. Decrementing an owner already at zero is a
    /// no-op, so neither the owner count nor the total can underflow.
    pub fn decrement(&self, owner: &str) {
        let mut by_owner = self.by_owner.lock();
        let Some(count) = by_owner.get_mut(owner) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            by_owner.remove(owner);
        }
        self.total.fetch_sub(1, Ordering::AcqRel);
    }

    /// Current count for `owner`.
    #[must_use]
    pub fn value(&self, owner: &str) -> usize {
        self.by_owner.lock().get(owner).copied().unwrap_or(0)
    }

    /// Sum over all owners.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    /// Copy of the per-owner counts.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, usize> {
        self.by_owner.lock().clone()
    }
}

/// One counter set per tracked dimension.
#[derive(Debug, Default)]
pub struct SchedulerCounters {
    /// Jobs in `TQUEUED`.
    pub tqueued: CountByOwner,
    /// Jobs in `PRIORITYTQUEUED`.
    pub priority_tqueued: CountByOwner,
    /// Jobs in `RUNNING`.
    pub running: CountByOwner,
    /// Jobs in `RUNNINGWITHOUTTHREAD`.
    pub running_without_thread: CountByOwner,
    /// Jobs in `RQUEUED`.
    pub rqueued: CountByOwner,
    /// Jobs in `READY` or `TRANSFERRING`.
    pub ready: CountByOwner,
    /// Jobs in `ASYNCWAIT`.
    pub async_wait: CountByOwner,
    /// Jobs in `RETRYWAIT`.
    pub retry_wait: CountByOwner,
    /// Jobs in `RESTORED`.
    pub restored: CountByOwner,
    /// Pool workers currently occupied by an execution wrapper.
    pub running_threads: CountByOwner,
}

impl SchedulerCounters {
    /// The counter tracking jobs in `state`, if that state is counted.
    #[must_use]
    pub const fn for_state(&self, state: State) -> Option<&CountByOwner> {
        match state {
            State::TQueued => Some(&self.tqueued),
            State::PriorityTQueued => Some(&self.priority_tqueued),
            State::Running => Some(&self.running),
            State::RunningWithoutThread => Some(&self.running_without_thread),
            State::RQueued => Some(&self.rqueued),
            State::Ready | State::Transferring => Some(&self.ready),
            State::AsyncWait => Some(&self.async_wait),
            State::RetryWait => Some(&self.retry_wait),
            State::Restored => Some(&self.restored),
            State::Pending | State::Done | State::Canceled | State::Failed => None,
        }
    }

    /// Running jobs for `owner` as seen by the fairness policy.
    #[must_use]
    pub fn running_for_owner(&self, owner: &str) -> usize {
        self.running.value(owner) + self.running_without_thread.value(owner)
    }

    /// Global totals for every dimension.
    #[must_use]
    pub fn totals(&self) -> CounterTotals {
        CounterTotals {
            tqueued: self.tqueued.total(),
            priority_tqueued: self.priority_tqueued.total(),
            running: self.running.total(),
            running_without_thread: self.running_without_thread.total(),
            rqueued: self.rqueued.total(),
            ready: self.ready.total(),
            async_wait: self.async_wait.total(),
            retry_wait: self.retry_wait.total(),
            restored: self.restored.total(),
            running_threads: self.running_threads.total(),
        }
    }
}

/// Point-in-time global totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterTotals {
    /// Jobs in `TQUEUED`.
    pub tqueued: usize,
    /// Jobs in `PRIORITYTQUEUED`.
    pub priority_tqueued: usize,
    /// Jobs in `RUNNING`.
    pub running: usize,
    /// Jobs in `RUNNINGWITHOUTTHREAD`.
    pub running_without_thread: usize,
    /// Jobs in `RQUEUED`.
    pub rqueued: usize,
    /// Jobs in `READY` or `TRANSFERRING`.
    pub ready: usize,
    /// Jobs in `ASYNCWAIT`.
    pub async_wait: usize,
    /// Jobs in `RETRYWAIT`.
    pub retry_wait: usize,
    /// Jobs in `RESTORED`.
    pub restored: usize,
    /// Occupied pool workers.
    pub running_threads: usize,
}
