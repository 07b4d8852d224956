//! Native implementation of `WorkerPool` using OS threads.
//!
//! Workers block on a bounded crossbeam channel and run each task against
//! their own current-thread tokio runtime.
//!
//! # Design Principles
//!
//! - **No polling**: idle workers sleep in `recv`
//! - **Live resizing**: growing spawns workers at once; shrinking retires
//!   surplus workers as they come back for more work
//! - **Clean shutdown**: dropping the sender unblocks every idle worker

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::WorkerPoolConfig;

use super::{PoolCounters, PoolError, PoolStats, PoolTask};

/// State shared between the pool handle and its workers.
struct Shared {
    counters: PoolCounters,
    shutdown: AtomicBool,
    target_workers: AtomicUsize,
    live_workers: AtomicUsize,
}

impl Shared {
    /// Claim one surplus slot so the calling worker can exit.
    fn retire_if_surplus(&self) -> bool {
        let mut live = self.live_workers.load(Ordering::Acquire);
        while live > self.target_workers.load(Ordering::Acquire) {
            match self.live_workers.compare_exchange(
                live,
                live - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(current) => live = current,
            }
        }
        false
    }
}

/// Worker pool with dedicated OS threads.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    task_tx: Mutex<Option<Sender<PoolTask>>>,
    task_rx: Receiver<PoolTask>,
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next_worker_id: AtomicUsize,
}

impl WorkerPool {
    /// Create a pool and spawn `config.worker_count` workers.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the configuration is invalid and
    /// `PoolError::Internal` if a worker thread can not be spawned.
    pub fn new(config: WorkerPoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (task_tx, task_rx) = bounded::<PoolTask>(config.max_queue_depth);
        let pool = Self {
            task_tx: Mutex::new(Some(task_tx)),
            task_rx,
            shared: Arc::new(Shared {
                counters: PoolCounters::default(),
                shutdown: AtomicBool::new(false),
                target_workers: AtomicUsize::new(config.worker_count),
                live_workers: AtomicUsize::new(0),
            }),
            workers: Mutex::new(Vec::with_capacity(config.worker_count)),
            next_worker_id: AtomicUsize::new(0),
            config,
        };
        pool.spawn_missing_workers()?;

        info!(
            worker_count = pool.config.worker_count,
            max_queue_depth = pool.config.max_queue_depth,
            prefix = %pool.config.thread_name_prefix,
            "worker pool initialized"
        );
        Ok(pool)
    }

    /// Hand `task` to a worker without blocking.
    ///
    /// # Errors
    ///
    /// - `PoolError::QueueFull` if every worker is busy and the queue is full
    /// - `PoolError::PoolShutdown` if the pool has been shut down
    pub fn submit(&self, task: PoolTask) -> Result<(), PoolError> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }
        let task_tx = self.task_tx.lock();
        let Some(task_tx) = task_tx.as_ref() else {
            return Err(PoolError::PoolShutdown);
        };

        // Count before sending so a fast worker never sees the counter at zero.
        self.shared.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);
        match task_tx.try_send(task) {
            Ok(()) => {
                self.shared.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.shared.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                warn!("worker pool queue is full");
                Err(PoolError::QueueFull)
            }
            Err(TrySendError::Disconnected(_)) => {
                self.shared.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                Err(PoolError::PoolShutdown)
            }
        }
    }

    /// Change the number of workers.
    ///
    /// # Errors
    ///
    /// `PoolError::InvalidConfig` for zero, `PoolError::PoolShutdown` after
    /// shutdown, `PoolError::Internal` if a new worker can not be spawned.
    pub fn set_worker_count(&self, worker_count: usize) -> Result<(), PoolError> {
        if worker_count == 0 {
            return Err(PoolError::InvalidConfig(
                "worker_count must be greater than 0".into(),
            ));
        }
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::PoolShutdown);
        }
        let previous = self
            .shared
            .target_workers
            .swap(worker_count, Ordering::AcqRel);
        info!(from = previous, to = worker_count, "resizing worker pool");
        self.spawn_missing_workers()
    }

    /// Number of workers the pool is sized for.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.shared.target_workers.load(Ordering::Acquire)
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.shared.counters.snapshot(
            self.worker_count(),
            self.shared.live_workers.load(Ordering::Acquire),
        )
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Shut down the pool gracefully.
    ///
    /// Drops the task sender to unblock idle workers, then joins each worker
    /// with a 2 second timeout. Workers that do not exit in time are detached.
    pub fn shutdown(&self) {
        if self.shared.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("shutting down worker pool");
        self.task_tx.lock().take();

        let mut workers = self.workers.lock();
        let worker_count = workers.len();
        for (idx, worker) in workers.drain(..).enumerate() {
            let (tx, rx) = std::sync::mpsc::channel();
            let join_thread = thread::spawn(move || {
                let result = worker.join();
                let _ = tx.send(result.is_ok());
            });
            match rx.recv_timeout(Duration::from_secs(2)) {
                Ok(true) => debug!(worker_id = idx, "worker joined"),
                Ok(false) => warn!(worker_id = idx, "worker panicked"),
                Err(_) => {
                    warn!(worker_id = idx, "worker did not exit within timeout, detaching");
                    continue;
                }
            }
            let _ = join_thread.join();
        }
        info!(worker_count, "worker pool shut down");
    }

    fn spawn_missing_workers(&self) -> Result<(), PoolError> {
        let mut workers = self.workers.lock();
        // Workers retired by a shrink have exited on their own.
        workers.retain(|handle| !handle.is_finished());
        loop {
            let live = self.shared.live_workers.load(Ordering::Acquire);
            if live >= self.shared.target_workers.load(Ordering::Acquire) {
                return Ok(());
            }
            if self
                .shared
                .live_workers
                .compare_exchange(live, live + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                continue;
            }
            let worker_id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
            match spawn_worker(
                worker_id,
                &self.config,
                self.task_rx.clone(),
                Arc::clone(&self.shared),
            ) {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    self.shared.live_workers.fetch_sub(1, Ordering::AcqRel);
                    return Err(e);
                }
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal shutdown but don't join: explicit shutdown() is required for
        // a graceful stop.
        if !self.shared.shutdown.swap(true, Ordering::AcqRel) {
            self.task_tx.lock().take();
            debug!("worker pool dropped without explicit shutdown, workers detached");
        }
    }
}

fn spawn_worker(
    worker_id: usize,
    config: &WorkerPoolConfig,
    task_rx: Receiver<PoolTask>,
    shared: Arc<Shared>,
) -> Result<JoinHandle<()>, PoolError> {
    thread::Builder::new()
        .name(format!("{}-{worker_id}", config.thread_name_prefix))
        .stack_size(config.thread_stack_size)
        .spawn(move || {
            debug!(worker_id, "worker thread started");

            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(worker_id, error = %e, "failed to create worker runtime");
                    shared.live_workers.fetch_sub(1, Ordering::AcqRel);
                    return;
                }
            };

            loop {
                if shared.retire_if_surplus() {
                    debug!(worker_id, "worker retired by resize");
                    return;
                }
                let Ok(task) = task_rx.recv() else {
                    debug!(worker_id, "worker channel closed, exiting");
                    break;
                };
                shared.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                shared.counters.active_tasks.fetch_add(1, Ordering::Relaxed);

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(&rt)));

                shared.counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
                if outcome.is_err() {
                    shared.counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                    error!(worker_id, "worker task panicked");
                } else {
                    shared.counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
                }
            }
            shared.live_workers.fetch_sub(1, Ordering::AcqRel);
        })
        .map_err(|e| PoolError::Internal(format!("failed to spawn worker thread: {e}")))
}
