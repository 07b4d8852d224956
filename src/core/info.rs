//! Read-only views of a scheduler for administrative surfaces.

use std::fmt;

use serde::Serialize;

use super::counters::CounterTotals;
use super::job::JobId;
use super::state::State;
use super::worker_pool::PoolStats;
use crate::config::SchedulerConfig;

/// One queued job as shown by [`queue_contents`](super::Scheduler::queue_contents).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    /// Job id.
    pub id: JobId,
    /// Owner.
    pub owner: String,
    /// State at the time of the snapshot.
    pub state: State,
    /// Retries consumed.
    pub retries: u32,
    /// Creation time (ms since epoch).
    pub created_at_ms: u128,
}

/// Point-in-time scheduler snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerInfo {
    /// Scheduler id.
    pub id: String,
    /// Whether the coordinator is running.
    pub running: bool,
    /// Name of the active appraiser.
    pub appraiser: String,
    /// Global counter totals.
    pub totals: CounterTotals,
    /// Jobs in the plain queue.
    pub thread_queue_len: usize,
    /// Jobs in the priority queue.
    pub priority_queue_len: usize,
    /// Jobs in the ready queue.
    pub ready_queue_len: usize,
    /// Armed retry timers.
    pub pending_retry_timers: usize,
    /// Worker pool statistics.
    pub pool: PoolStats,
    /// Current tunables.
    pub config: SchedulerConfig,
}

impl fmt::Display for SchedulerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.config;
        let t = &self.totals;
        writeln!(f, "Scheduler id={}", self.id)?;
        writeln!(f, "          running={}", self.running)?;
        writeln!(f, "          useFairness={}", c.use_fairness)?;
        writeln!(f, "          jobAppraiser={}", self.appraiser)?;
        writeln!(f, "          asyncWaitJobsNum={}", t.async_wait)?;
        writeln!(f, "          maxAsyncWaitJobsNum={}", c.max_async_wait_jobs)?;
        writeln!(f, "          retryWaitJobsNum={}", t.retry_wait)?;
        writeln!(f, "          maxRetryWaitJobsNum={}", c.max_retry_wait_jobs)?;
        writeln!(f, "          pendingRetryTimers={}", self.pending_retry_timers)?;
        writeln!(f, "          readyJobsNum={}", t.ready)?;
        writeln!(f, "          maxReadyJobs={}", c.max_ready_jobs)?;
        writeln!(f, "          maxRunningByOwner={}", c.max_running_by_owner)?;
        writeln!(
            f,
            "          maxRunningWithoutThreadByOwner={}",
            c.max_running_without_thread_by_owner
        )?;
        writeln!(f, "          runningJobsNum={}", t.running)?;
        writeln!(f, "          runningWithoutThreadJobsNum={}", t.running_without_thread)?;
        writeln!(f, "          threadPoolSize={}", c.thread_pool_size)?;
        writeln!(f, "          runningThreadsNum={}", t.running_threads)?;
        writeln!(f, "          liveWorkers={}", self.pool.live_workers)?;
        writeln!(f, "          retryTimeout={}ms", c.retry_timeout_ms)?;
        writeln!(f, "          maxNumberOfRetries={}", c.max_number_of_retries)?;
        writeln!(f, "          maxThreadQueueSize={}", c.max_thread_queue_size)?;
        writeln!(f, "          threadQueue size={}", self.thread_queue_len)?;
        writeln!(f, "          threadQueued={}", t.tqueued)?;
        writeln!(f, "          priorityThreadQueue size={}", self.priority_queue_len)?;
        writeln!(f, "          priorityThreadQueued={}", t.priority_tqueued)?;
        writeln!(f, "          maxReadyQueueSize={}", c.max_ready_queue_size)?;
        writeln!(f, "          readyQueue size={}", self.ready_queue_len)?;
        writeln!(f, "          readyQueued={}", t.rqueued)?;
        writeln!(f, "          restoredJobsNum={}", t.restored)?;
        writeln!(f, "          restorePolicy={}", c.restore_policy)?;
        writeln!(f, "          queuesUpdateMaxWait={}ms", c.queues_update_max_wait_ms)
    }
}
