//! Core scheduling: job state machine, fair queues, accounting and dispatch.

pub mod appraisal;
pub mod counters;
pub mod error;
pub mod fair_queue;
pub mod info;
pub mod job;
pub mod registry;
pub mod retry_timer;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod worker_pool;

mod accounting;
mod dispatch;
mod restore;
mod wrapper;

pub use appraisal::{AppraiserRegistry, DefaultAppraiser, FifoAppraiser, JobAppraiser, DEFAULT_APPRAISER};
pub use counters::{CountByOwner, CounterTotals, SchedulerCounters};
pub use error::{AppResult, IllegalStateTransition, SchedulerError, StorageError};
pub use fair_queue::{FairQueue, QueueKind};
pub use info::{JobSummary, SchedulerInfo};
pub use job::{
    HistoryEntry, Job, JobGuard, JobId, JobOutcome, JobPayload, JobSnapshot, SchedulerStamp,
    StateChange, StateListener,
};
pub use registry::SchedulerRegistry;
pub use retry_timer::RetryTimers;
pub use scheduler::Scheduler;
pub use state::State;
pub use storage::JobStorage;
pub use worker_pool::{PoolError, PoolStats, PoolTask, WorkerPool};
