//! Fixed-capacity worker pool on dedicated OS threads.
//!
//! Each worker owns a single-threaded tokio runtime, so job payloads (which
//! are async) run to completion on the worker without touching any other
//! runtime. Submission never blocks: when every worker is busy and the
//! hand-off queue is full the task is rejected with [`PoolError::QueueFull`].

mod native;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;

pub use native::WorkerPool;

/// Work item executed on a pool worker with access to the worker's runtime.
pub type PoolTask = Box<dyn FnOnce(&tokio::runtime::Runtime) + Send + 'static>;

/// Errors that can occur when using a [`WorkerPool`].
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every worker is busy and the hand-off queue is full.
    #[error("task queue is full")]
    QueueFull,
    /// The pool has been shut down.
    #[error("pool has been shut down")]
    PoolShutdown,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A worker thread could not be created.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Statistics about pool utilization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Worker threads the pool is sized for.
    pub worker_count: usize,
    /// Worker threads currently alive.
    pub live_workers: usize,
    /// Tasks currently executing.
    pub active_tasks: u64,
    /// Tasks waiting for a worker.
    pub queued_tasks: u64,
    /// Tasks that finished.
    pub completed_tasks: u64,
    /// Tasks that panicked.
    pub failed_tasks: u64,
    /// Tasks accepted by `submit`.
    pub submitted_tasks: u64,
}

/// Internal counters for pool statistics.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_tasks: AtomicU64,
    pub queued_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize, live_workers: usize) -> PoolStats {
        PoolStats {
            worker_count,
            live_workers,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
        }
    }
}
