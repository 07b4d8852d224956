//! A scheduler instance and its public operations.
//!
//! A [`Scheduler`] owns three bounded queues, the per-owner counters, a
//! worker pool, the retry timers and a coordinator thread. Producers hand jobs
//! to [`Scheduler::schedule`]; the coordinator drains the priority queue and
//! then the plain queue whenever a job changes state (or the wake interval
//! elapses), admitting one job at a time while pool capacity allows.
//!
//! Lock order is job, then queue, then counter. Nothing locks a job while
//! holding a queue or counter lock.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, info, warn};

use super::appraisal::{AppraiserRegistry, JobAppraiser};
use super::counters::SchedulerCounters;
use super::error::{IllegalStateTransition, SchedulerError};
use super::fair_queue::{FairQueue, QueueKind};
use super::info::{JobSummary, SchedulerInfo};
use super::job::{Job, JobGuard, StateListener};
use super::retry_timer::RetryTimers;
use super::state::State;
use super::storage::JobStorage;
use super::worker_pool::WorkerPool;
use crate::config::{RestorePolicy, SchedulerConfig, WorkerPoolConfig};
use crate::util::clock::now_ms;

/// Coordinator wake-up flags, guarded by `SchedulerShared::wake_state`.
#[derive(Debug, Default)]
pub(crate) struct WakeState {
    /// A job changed state since the coordinator last looked.
    pub signalled: bool,
    /// The coordinator must exit.
    pub shutdown: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Created,
    Running,
    Stopped,
}

/// State shared by the scheduler handle, the coordinator, pool workers and
/// retry timers.
pub(crate) struct SchedulerShared {
    pub(crate) id: String,
    pub(crate) run_timestamp_ms: u128,
    pub(crate) config: RwLock<SchedulerConfig>,
    pub(crate) counters: SchedulerCounters,
    pub(crate) priority_queue: FairQueue,
    pub(crate) plain_queue: FairQueue,
    pub(crate) ready_queue: FairQueue,
    appraisers: AppraiserRegistry,
    appraiser: RwLock<Arc<dyn JobAppraiser>>,
    pub(crate) pool: WorkerPool,
    pub(crate) timers: RetryTimers,
    pub(crate) storage: Option<Arc<dyn JobStorage>>,
    wake_state: Mutex<WakeState>,
    wake_condvar: Condvar,
    accepting: AtomicBool,
    self_ref: Weak<SchedulerShared>,
}

impl SchedulerShared {
    /// Observer handle attached to every job this scheduler accepts.
    pub(crate) fn listener(&self) -> Weak<dyn StateListener> {
        self.self_ref.clone()
    }

    /// Ask the coordinator for another pass.
    pub(crate) fn wake(&self) {
        self.wake_state.lock().signalled = true;
        self.wake_condvar.notify_one();
    }

    /// Block until woken, or until `timeout` passes. Returns `false` once the
    /// coordinator must exit.
    pub(crate) fn wait_for_wake(&self, timeout: Duration) -> bool {
        let mut wake = self.wake_state.lock();
        if !wake.signalled && !wake.shutdown {
            let _ = self.wake_condvar.wait_for(&mut wake, timeout);
        }
        if wake.shutdown {
            return false;
        }
        wake.signalled = false;
        true
    }

    fn signal_shutdown(&self) {
        self.wake_state.lock().shutdown = true;
        self.wake_condvar.notify_all();
    }

    pub(crate) fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    pub(crate) fn appraiser(&self) -> Arc<dyn JobAppraiser> {
        Arc::clone(&self.appraiser.read())
    }

    pub(crate) fn queue(&self, kind: QueueKind) -> &FairQueue {
        match kind {
            QueueKind::Priority => &self.priority_queue,
            QueueKind::Plain => &self.plain_queue,
            QueueKind::Ready => &self.ready_queue,
        }
    }

    /// Attach this scheduler's observer and ownership stamp to a locked job.
    pub(crate) fn adopt(&self, guard: &mut JobGuard<'_>) {
        guard.attach_listener(self.listener());
        let stamped = guard
            .scheduler_stamp()
            .is_some_and(|s| s.scheduler_id == self.id && s.acquired_at_ms == self.run_timestamp_ms);
        if !stamped {
            guard.set_scheduler(&self.id, self.run_timestamp_ms);
        }
    }

    fn schedule(&self, job: &Arc<Job>) -> Result<(), SchedulerError> {
        if !self.is_accepting() {
            return Err(SchedulerError::NotRunning);
        }
        let mut guard = job.lock();
        match guard.state() {
            State::Pending | State::Restored => {
                self.adopt(&mut guard);
                self.enqueue_plain(&mut guard, job)?;
            }
            State::AsyncWait | State::RetryWait | State::RunningWithoutThread => {
                self.adopt(&mut guard);
                self.timers.cancel(job.id());
                self.enqueue_priority(&mut guard, job)?;
            }
            state => {
                return Err(SchedulerError::Unschedulable {
                    job_id: job.id(),
                    state,
                })
            }
        }
        Ok(())
    }

    /// `TQUEUED` plus insertion into the plain queue, or `FAILED` when the
    /// queue is full.
    pub(crate) fn enqueue_plain(
        &self,
        guard: &mut JobGuard<'_>,
        job: &Arc<Job>,
    ) -> Result<(), IllegalStateTransition> {
        let capacity = self.config.read().max_thread_queue_size;
        if self.counters.tqueued.total() >= capacity {
            warn!(scheduler = %self.id, job_id = job.id(), capacity, "thread queue limit reached");
            return guard.set_state(State::Failed, "too many jobs in the queue");
        }
        guard.set_state(State::TQueued, "put in the thread queue")?;
        if self.plain_queue.try_enqueue(Arc::clone(job)) {
            self.wake();
        } else {
            warn!(scheduler = %self.id, job_id = job.id(), "thread queue is full");
            guard.set_state(State::Failed, "thread queue is full")?;
        }
        Ok(())
    }

    /// `PRIORITYTQUEUED` plus insertion into the priority queue, or `FAILED`
    /// when the queue is full.
    pub(crate) fn enqueue_priority(
        &self,
        guard: &mut JobGuard<'_>,
        job: &Arc<Job>,
    ) -> Result<(), IllegalStateTransition> {
        guard.set_state(State::PriorityTQueued, "put in the priority thread queue")?;
        self.reinsert(guard, job, QueueKind::Priority)
    }

    /// `RQUEUED` plus insertion into the ready queue, or `FAILED` when the
    /// queue is full.
    pub(crate) fn enqueue_ready(
        &self,
        guard: &mut JobGuard<'_>,
        job: &Arc<Job>,
    ) -> Result<(), IllegalStateTransition> {
        guard.set_state(State::RQueued, "execution succeeded, put in the ready queue")?;
        self.reinsert(guard, job, QueueKind::Ready)
    }

    /// Insert a job whose state already matches `kind` into that queue.
    pub(crate) fn reinsert(
        &self,
        guard: &mut JobGuard<'_>,
        job: &Arc<Job>,
        kind: QueueKind,
    ) -> Result<(), IllegalStateTransition> {
        if self.queue(kind).try_enqueue(Arc::clone(job)) {
            self.wake();
            return Ok(());
        }
        let reason = match kind {
            QueueKind::Priority => "priority thread queue is full",
            QueueKind::Plain => "thread queue is full",
            QueueKind::Ready => "all ready slots are taken and ready queue is full",
        };
        warn!(scheduler = %self.id, job_id = job.id(), queue = kind.name(), "queue is full");
        guard.set_state(State::Failed, reason)
    }

    /// Arm the retry timer for a job that just entered `RETRYWAIT`.
    pub(crate) fn arm_retry(&self, job: &Arc<Job>) {
        let delay = self.config.read().retry_timeout();
        let shared = self.self_ref.clone();
        let target = Arc::clone(job);
        self.timers.arm(job.id(), delay, move || {
            if let Some(shared) = shared.upgrade() {
                shared.retry_timer_fired(&target);
            }
        });
    }

    fn retry_timer_fired(&self, job: &Arc<Job>) {
        let mut guard = job.lock();
        if guard.state() != State::RetryWait {
            warn!(
                scheduler = %self.id,
                job_id = job.id(),
                state = %guard.state(),
                "retry timer fired for a job that is no longer in RETRYWAIT"
            );
            return;
        }
        if let Err(e) = self.enqueue_priority(&mut guard, job) {
            warn!(scheduler = %self.id, error = %e, "retry re-queue rejected");
        }
    }

    /// Retry budget for a job whose own limit is `job_max`.
    pub(crate) fn retry_budget(&self, job_max: u32) -> u32 {
        self.config.read().max_number_of_retries.min(job_max)
    }

    fn try_to_ready(&self, job: &Job) -> Result<bool, IllegalStateTransition> {
        let mut guard = job.lock();
        if guard.state() != State::RQueued {
            return Ok(false);
        }
        if self.counters.ready.total() >= self.config.read().max_ready_jobs {
            return Ok(false);
        }
        guard.set_state(State::Ready, "execution succeeded")?;
        Ok(true)
    }

    fn drain_ready_queue(&self) -> usize {
        let mut promoted = 0;
        loop {
            let (max_ready, fairness) = {
                let cfg = self.config.read();
                (cfg.max_ready_jobs, cfg.use_fairness)
            };
            if self.counters.ready.total() >= max_ready {
                break;
            }
            let appraiser = self.appraiser();
            let candidate = self
                .ready_queue
                .select_best(fairness, |len, pos, job| {
                    let ready = self.counters.ready.value(job.owner());
                    appraiser.score(len, pos, ready, max_ready, job)
                })
                .or_else(|| self.ready_queue.peek());
            let Some(job) = candidate else {
                break;
            };
            match self.try_to_ready(&job) {
                Ok(true) => promoted += 1,
                Ok(false) if job.state() != State::RQueued => {
                    debug!(scheduler = %self.id, job_id = job.id(), "dropping stale ready queue entry");
                    self.ready_queue.remove(job.id());
                }
                Ok(false) => break,
                Err(e) => {
                    warn!(scheduler = %self.id, error = %e, "could not promote job");
                    self.ready_queue.remove(job.id());
                }
            }
        }
        promoted
    }
}

/// Snapshot row of a queued job.
fn summarize(job: &Job) -> JobSummary {
    let guard = job.lock();
    JobSummary {
        id: job.id(),
        owner: job.owner().to_owned(),
        state: guard.state(),
        retries: guard.retries(),
        created_at_ms: job.created_at_ms(),
    }
}

/// A scheduler instance.
pub struct Scheduler {
    pub(crate) shared: Arc<SchedulerShared>,
    lifecycle: Mutex<Lifecycle>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a stopped scheduler with the built-in appraisers and no
    /// storage.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::with_parts`].
    pub fn new(id: impl Into<String>, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        Self::with_parts(id, config, None, AppraiserRegistry::with_builtins())
    }

    /// Create a stopped scheduler that saves jobs to `storage` and restores
    /// from it on start.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::with_parts`].
    pub fn with_storage(
        id: impl Into<String>,
        config: SchedulerConfig,
        storage: Arc<dyn JobStorage>,
    ) -> Result<Self, SchedulerError> {
        Self::with_parts(id, config, Some(storage), AppraiserRegistry::with_builtins())
    }

    /// Create a stopped scheduler from all of its collaborators.
    ///
    /// # Errors
    ///
    /// `InvalidId` for an empty id, `Config` if `config` does not validate,
    /// `Pool`/`Spawn` if the worker pool or timer runtime can not start.
    pub fn with_parts(
        id: impl Into<String>,
        config: SchedulerConfig,
        storage: Option<Arc<dyn JobStorage>>,
        appraisers: AppraiserRegistry,
    ) -> Result<Self, SchedulerError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SchedulerError::InvalidId);
        }
        config.validate().map_err(SchedulerError::Config)?;

        let pool = WorkerPool::new(
            WorkerPoolConfig::new()
                .with_worker_count(config.thread_pool_size)
                .with_max_queue_depth(config.thread_pool_size)
                .with_thread_name_prefix(format!("{id}-worker")),
        )?;
        let timers = RetryTimers::new(&format!("{id}-retry"))?;
        let appraiser = appraisers.resolve(&config.priority_policy_plugin);

        let shared = Arc::new_cyclic(|self_ref| SchedulerShared {
            run_timestamp_ms: now_ms(),
            counters: SchedulerCounters::default(),
            priority_queue: FairQueue::new(QueueKind::Priority, config.max_thread_queue_size),
            plain_queue: FairQueue::new(QueueKind::Plain, config.max_thread_queue_size),
            ready_queue: FairQueue::new(QueueKind::Ready, config.max_ready_queue_size),
            appraisers,
            appraiser: RwLock::new(appraiser),
            pool,
            timers,
            storage,
            wake_state: Mutex::new(WakeState::default()),
            wake_condvar: Condvar::new(),
            accepting: AtomicBool::new(false),
            self_ref: self_ref.clone(),
            config: RwLock::new(config),
            id,
        });
        debug!(scheduler = %shared.id, "scheduler created");
        Ok(Self {
            shared,
            lifecycle: Mutex::new(Lifecycle::Created),
            coordinator: Mutex::new(None),
        })
    }

    /// Scheduler id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Timestamp written into the ownership stamp of accepted jobs.
    #[must_use]
    pub fn run_timestamp_ms(&self) -> u128 {
        self.shared.run_timestamp_ms
    }

    /// Whether the coordinator is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        *self.lifecycle.lock() == Lifecycle::Running
    }

    /// Start the coordinator, restoring leftover jobs first when a storage is
    /// attached and `restore_on_startup` is set.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` on a second call, `Stopped` after [`stop`](Self::stop),
    /// `Spawn` if the coordinator thread can not be created.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Running => return Err(SchedulerError::AlreadyRunning),
            Lifecycle::Stopped => return Err(SchedulerError::Stopped),
            Lifecycle::Created => {}
        }
        self.shared.accepting.store(true, Ordering::Release);

        if self.shared.config.read().restore_on_startup {
            self.shared.restore_jobs();
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("scheduler-{}", self.shared.id))
            .spawn(move || shared.coordinator_loop())
            .map_err(|e| {
                self.shared.accepting.store(false, Ordering::Release);
                SchedulerError::Spawn(e.to_string())
            })?;
        *self.coordinator.lock() = Some(handle);
        *lifecycle = Lifecycle::Running;
        info!(scheduler = %self.shared.id, "scheduler started");
        Ok(())
    }

    /// Stop accepting jobs, join the coordinator, shut the worker pool down
    /// and cancel every retry timer. Queued jobs keep their state.
    pub fn stop(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if *lifecycle == Lifecycle::Stopped {
                return;
            }
            *lifecycle = Lifecycle::Stopped;
        }
        self.shared.accepting.store(false, Ordering::Release);
        self.shared.signal_shutdown();

        if let Some(handle) = self.coordinator.lock().take() {
            if handle.thread().id() == thread::current().id() {
                warn!(scheduler = %self.shared.id, "stop called from the coordinator, not joining");
            } else if handle.join().is_err() {
                warn!(scheduler = %self.shared.id, "coordinator thread panicked");
            }
        }
        self.shared.pool.shutdown();
        self.shared.timers.shutdown();
        info!(scheduler = %self.shared.id, "scheduler stopped");
    }

    /// Queue a job.
    ///
    /// `PENDING`/`RESTORED` jobs go to the plain queue; `ASYNCWAIT`,
    /// `RETRYWAIT` and `RUNNINGWITHOUTTHREAD` jobs go to the priority queue.
    /// A full queue fails the job instead of blocking; that is not an error
    /// of this call.
    ///
    /// # Errors
    ///
    /// `NotRunning` before `start` or after `stop`, `Unschedulable` for a job
    /// in any other state, `Transition` if a state write is rejected.
    pub fn schedule(&self, job: &Arc<Job>) -> Result<(), SchedulerError> {
        self.shared.schedule(job)
    }

    /// Move an `RQUEUED` job to `READY` if a ready slot is free. Returns
    /// whether the job was promoted.
    ///
    /// # Errors
    ///
    /// `Transition` if the state write is rejected.
    pub fn promote_to_ready(&self, job: &Job) -> Result<bool, SchedulerError> {
        Ok(self.shared.try_to_ready(job)?)
    }

    /// Promote the best `RQUEUED` jobs to `READY` until the ready slots or the
    /// ready queue run out. Returns the number promoted.
    pub fn drain_ready_queue(&self) -> usize {
        self.shared.drain_ready_queue()
    }

    /// Run the restore path now. Returns the number of jobs adopted.
    pub fn restore(&self) -> usize {
        self.shared.restore_jobs()
    }

    /// Ask the coordinator for a dispatch pass.
    pub fn wake(&self) {
        self.shared.wake();
    }

    /// Per-owner counters.
    #[must_use]
    pub fn counters(&self) -> &SchedulerCounters {
        &self.shared.counters
    }

    /// Copy of the current tunables.
    #[must_use]
    pub fn config(&self) -> SchedulerConfig {
        self.shared.config.read().clone()
    }

    /// Whether a retry timer is pending for `job`.
    #[must_use]
    pub fn has_retry_timer(&self, job: &Job) -> bool {
        self.shared.timers.is_armed(job.id())
    }

    /// Jobs currently in one of the queues, in queue order.
    #[must_use]
    pub fn queue_contents(&self, kind: QueueKind) -> Vec<JobSummary> {
        self.shared
            .queue(kind)
            .jobs()
            .iter()
            .map(|job| summarize(job))
            .collect()
    }

    /// Counters, queue sizes and tunables.
    #[must_use]
    pub fn info(&self) -> SchedulerInfo {
        let shared = &self.shared;
        let cfg = shared.config.read().clone();
        SchedulerInfo {
            id: shared.id.clone(),
            running: self.is_running(),
            appraiser: shared.appraiser().name().to_owned(),
            totals: shared.counters.totals(),
            thread_queue_len: shared.plain_queue.len(),
            priority_queue_len: shared.priority_queue.len(),
            ready_queue_len: shared.ready_queue.len(),
            pending_retry_timers: shared.timers.pending(),
            pool: shared.pool.stats(),
            config: cfg,
        }
    }

    /// Resize the worker pool; also the cap on jobs holding a worker.
    ///
    /// # Errors
    ///
    /// `Config` for zero, `Pool` if the pool can not grow.
    pub fn set_thread_pool_size(&self, size: usize) -> Result<(), SchedulerError> {
        if size == 0 {
            return Err(SchedulerError::Config(
                "thread_pool_size must be greater than 0".into(),
            ));
        }
        self.shared.pool.set_worker_count(size)?;
        self.shared.config.write().thread_pool_size = size;
        self.shared.wake();
        Ok(())
    }

    /// Capacity of the plain and priority queues. Zero is raised to one.
    pub fn set_max_thread_queue_size(&self, size: usize) {
        let size = size.max(1);
        self.shared.config.write().max_thread_queue_size = size;
        self.shared.plain_queue.set_capacity(size);
        self.shared.priority_queue.set_capacity(size);
    }

    /// Capacity of the ready queue. Zero is raised to one.
    pub fn set_max_ready_queue_size(&self, size: usize) {
        let size = size.max(1);
        self.shared.config.write().max_ready_queue_size = size;
        self.shared.ready_queue.set_capacity(size);
    }

    /// Jobs allowed in `READY`/`TRANSFERRING` at once.
    pub fn set_max_ready_jobs(&self, max: usize) {
        self.shared.config.write().max_ready_jobs = max;
    }

    /// Per-owner running cap fed to the appraiser.
    pub fn set_max_running_by_owner(&self, max: usize) {
        self.shared.config.write().max_running_by_owner = max;
        self.shared.wake();
    }

    /// Per-owner cap on jobs running without a worker.
    pub fn set_max_running_without_thread_by_owner(&self, max: usize) {
        self.shared.config.write().max_running_without_thread_by_owner = max;
    }

    /// Limit reported for jobs in `ASYNCWAIT`.
    pub fn set_max_async_wait_jobs(&self, max: usize) {
        self.shared.config.write().max_async_wait_jobs = max;
    }

    /// Limit reported for jobs in `RETRYWAIT`.
    pub fn set_max_retry_wait_jobs(&self, max: usize) {
        self.shared.config.write().max_retry_wait_jobs = max;
    }

    /// Scheduler-wide retry budget.
    pub fn set_max_number_of_retries(&self, max: u32) {
        self.shared.config.write().max_number_of_retries = max;
    }

    /// Delay before a job in `RETRYWAIT` is re-queued. Applies to timers
    /// armed from now on.
    pub fn set_retry_timeout(&self, timeout: Duration) {
        self.shared.config.write().retry_timeout_ms =
            u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    }

    /// Coordinator wake interval.
    pub fn set_queues_update_max_wait(&self, wait: Duration) {
        self.shared.config.write().queues_update_max_wait_ms =
            u64::try_from(wait.as_millis()).unwrap_or(u64::MAX).max(1);
        self.shared.wake();
    }

    /// Score queued jobs (`true`) or serve them in FIFO order.
    pub fn set_use_fairness(&self, use_fairness: bool) {
        self.shared.config.write().use_fairness = use_fairness;
    }

    /// Policy for the next restore.
    pub fn set_restore_policy(&self, policy: RestorePolicy) {
        self.shared.config.write().restore_policy = policy;
    }

    /// Select the appraiser registered as `name`, falling back to the
    /// default one.
    pub fn set_priority_policy_plugin(&self, name: &str) {
        let appraiser = self.shared.appraisers.resolve(name);
        self.shared.config.write().priority_policy_plugin = name.to_owned();
        *self.shared.appraiser.write() = appraiser;
    }

    /// Install a custom appraiser.
    pub fn set_job_appraiser(&self, appraiser: Arc<dyn JobAppraiser>) {
        self.shared.config.write().priority_policy_plugin = appraiser.name().to_owned();
        *self.shared.appraiser.write() = appraiser;
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("id", &self.shared.id)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.info().fmt(f)
    }
}
