//! Execution wrapper: runs one dequeued job on a pool worker.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::runtime::Runtime;
use tracing::{debug, error, warn};

use super::job::{Job, JobOutcome};
use super::scheduler::SchedulerShared;
use super::state::State;
use super::worker_pool::PoolTask;

/// How a dispatched wrapper answered the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartOutcome {
    /// The job entered `RUNNING`.
    Started,
    /// The job was no longer runnable and was left alone.
    Skipped,
    /// No answer within the timeout.
    TimedOut,
}

/// One-shot start acknowledgement between the coordinator and a wrapper.
#[derive(Debug, Default)]
pub(crate) struct StartSignal {
    answer: Mutex<Option<bool>>,
    condvar: Condvar,
}

impl StartSignal {
    fn answer(&self, started: bool) {
        let mut answer = self.answer.lock();
        if answer.is_none() {
            *answer = Some(started);
            self.condvar.notify_all();
        }
    }

    pub(crate) fn started(&self) {
        self.answer(true);
    }

    /// No-op once the job was acknowledged as started.
    pub(crate) fn skipped(&self) {
        self.answer(false);
    }

    pub(crate) fn wait(&self, timeout: Duration) -> StartOutcome {
        let deadline = Instant::now() + timeout;
        let mut answer = self.answer.lock();
        while answer.is_none() {
            if self.condvar.wait_until(&mut answer, deadline).timed_out() {
                break;
            }
        }
        match *answer {
            Some(true) => StartOutcome::Started,
            Some(false) => StartOutcome::Skipped,
            None => StartOutcome::TimedOut,
        }
    }
}

/// Holds a worker slot for the job's owner. Dropping it frees the slot,
/// answers the coordinator if nobody did, and wakes it.
struct WorkerSlot<'a> {
    shared: &'a SchedulerShared,
    owner: &'a str,
    signal: &'a StartSignal,
}

impl<'a> WorkerSlot<'a> {
    fn occupy(shared: &'a SchedulerShared, owner: &'a str, signal: &'a StartSignal) -> Self {
        shared.counters.running_threads.increment(owner);
        Self {
            shared,
            owner,
            signal,
        }
    }
}

impl Drop for WorkerSlot<'_> {
    fn drop(&mut self) {
        self.shared.counters.running_threads.decrement(self.owner);
        self.signal.skipped();
        self.shared.wake();
    }
}

/// Package a job for the worker pool.
pub(crate) fn execution_task(
    shared: Arc<SchedulerShared>,
    job: Arc<Job>,
    signal: Arc<StartSignal>,
) -> PoolTask {
    Box::new(move |rt: &Runtime| run_job(&shared, &job, &signal, rt))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "payload panicked".to_owned())
}

fn run_job(shared: &SchedulerShared, job: &Arc<Job>, signal: &StartSignal, rt: &Runtime) {
    let _slot = WorkerSlot::occupy(shared, job.owner(), signal);

    {
        let mut guard = job.lock();
        let state = guard.state();
        if !matches!(state, State::TQueued | State::PriorityTQueued) {
            debug!(scheduler = %shared.id, job_id = job.id(), %state, "job is no longer runnable");
            return;
        }
        if let Err(e) = guard.set_state(State::Running, "execution started") {
            error!(scheduler = %shared.id, error = %e, "could not start job");
            return;
        }
        if let Some(storage) = &shared.storage {
            if let Err(e) = storage.save_job(&guard.snapshot()) {
                warn!(scheduler = %shared.id, job_id = job.id(), error = %e, "failed to save running job");
            }
        }
        signal.started();
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| rt.block_on(job.payload().run(job))));

    let mut guard = job.lock();
    let state = guard.state();
    let result = match outcome {
        Ok(JobOutcome::Success) => match state {
            State::Running => shared.enqueue_ready(&mut guard, job),
            State::Done => Ok(()),
            other => {
                debug!(scheduler = %shared.id, job_id = job.id(), state = %other, "payload moved the job on");
                Ok(())
            }
        },
        _ if state.is_final() => {
            debug!(scheduler = %shared.id, job_id = job.id(), %state, "job finished elsewhere, ignoring outcome");
            Ok(())
        }
        Ok(JobOutcome::RetryableFailure(reason)) => {
            let budget = shared.retry_budget(guard.max_retries());
            if guard.retries() < budget {
                debug!(
                    scheduler = %shared.id,
                    job_id = job.id(),
                    retries = guard.retries(),
                    budget,
                    %reason,
                    "retryable failure"
                );
                guard.set_state(State::RetryWait, reason).map(|()| shared.arm_retry(job))
            } else {
                guard.set_state(
                    State::Failed,
                    format!("number of retries exceeded: {reason}"),
                )
            }
        }
        Ok(JobOutcome::FatalFailure(reason)) => {
            guard.set_state(State::Failed, format!("non retriable error: {reason}"))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(scheduler = %shared.id, job_id = job.id(), %message, "payload panicked");
            guard.set_state(State::Failed, format!("unexpected error: {message}"))
        }
    };
    if let Err(e) = result {
        error!(scheduler = %shared.id, error = %e, "could not record job outcome");
    }
}
