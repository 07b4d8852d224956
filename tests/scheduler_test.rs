//! Integration tests for the scheduler
//!
//! These drive real schedulers end to end:
//! - dispatch bounded by the worker pool size
//! - queue limits failing jobs instead of blocking
//! - priority queue resumption and retry timers
//! - owner fairness in the dispatch order
//! - cancellation and counter bookkeeping
//! - ready slots
//! - restore on startup
//! - lifecycle errors

use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use grid_scheduler::config::{RestorePolicy, SchedulerConfig};
use grid_scheduler::core::{
    Job, JobId, JobOutcome, JobPayload, JobSnapshot, JobStorage, QueueKind, Scheduler, SchedulerError,
    SchedulerStamp, State,
};
use grid_scheduler::infra::InMemoryJobStorage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ============================================================================
// HELPERS
// ============================================================================

fn config(pool_size: usize) -> SchedulerConfig {
    SchedulerConfig {
        thread_pool_size: pool_size,
        queues_update_max_wait_ms: 50,
        start_ack_timeout_ms: 2_000,
        retry_timeout_ms: 60_000,
        ..SchedulerConfig::default()
    }
}

fn started(id: &str, cfg: SchedulerConfig) -> Scheduler {
    grid_scheduler::util::init_tracing();
    let scheduler = Scheduler::new(id, cfg).unwrap();
    scheduler.start().unwrap();
    scheduler
}

fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(5));
    }
}

fn wait_for_state(job: &Job, state: State) {
    wait_until(&format!("job {} to reach {state}", job.id()), || {
        job.state() == state
    });
}

fn last_description(job: &Job) -> String {
    job.history()
        .last()
        .map(|h| h.description.clone())
        .unwrap_or_default()
}

// ============================================================================
// TEST PAYLOADS
// ============================================================================

struct Succeed;

#[async_trait]
impl JobPayload for Succeed {
    async fn run(&self, _job: &Arc<Job>) -> JobOutcome {
        JobOutcome::Success
    }
}

/// Reports when it starts, then holds its worker until released.
struct Blocker {
    started: Sender<JobId>,
    release: Receiver<()>,
}

#[async_trait]
impl JobPayload for Blocker {
    async fn run(&self, job: &Arc<Job>) -> JobOutcome {
        let _ = self.started.send(job.id());
        let _ = self.release.recv_timeout(Duration::from_secs(10));
        JobOutcome::Success
    }
}

struct Gate {
    started: Receiver<JobId>,
    release: Sender<()>,
    payload: Arc<Blocker>,
}

impl Gate {
    fn new() -> Self {
        let (started_tx, started_rx) = unbounded();
        let (release_tx, release_rx) = unbounded();
        Self {
            started: started_rx,
            release: release_tx,
            payload: Arc::new(Blocker {
                started: started_tx,
                release: release_rx,
            }),
        }
    }

    fn job(&self, id: JobId, owner: &str) -> Arc<Job> {
        Job::new(id, owner, 3, Arc::clone(&self.payload) as Arc<dyn JobPayload>)
    }

    fn wait_started(&self) -> JobId {
        self.started
            .recv_timeout(Duration::from_secs(10))
            .expect("blocker did not start")
    }

    fn release(&self, n: usize) {
        for _ in 0..n {
            self.release.send(()).unwrap();
        }
    }
}

/// Fails with a retryable error on every run.
#[derive(Default)]
struct AlwaysRetry {
    runs: AtomicUsize,
}

#[async_trait]
impl JobPayload for AlwaysRetry {
    async fn run(&self, _job: &Arc<Job>) -> JobOutcome {
        self.runs.fetch_add(1, Ordering::SeqCst);
        JobOutcome::RetryableFailure("transient".into())
    }
}

/// Retryable failure on the first run, success afterwards.
#[derive(Default)]
struct FailOnce {
    runs: AtomicUsize,
}

#[async_trait]
impl JobPayload for FailOnce {
    async fn run(&self, _job: &Arc<Job>) -> JobOutcome {
        if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
            JobOutcome::RetryableFailure("pool offline".into())
        } else {
            JobOutcome::Success
        }
    }
}

/// Parks itself in ASYNCWAIT on the first run, succeeds afterwards.
#[derive(Default)]
struct WaitsOnce {
    runs: AtomicUsize,
}

#[async_trait]
impl JobPayload for WaitsOnce {
    async fn run(&self, job: &Arc<Job>) -> JobOutcome {
        if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
            job.lock()
                .set_state(State::AsyncWait, "waiting for pool reply")
                .unwrap();
        }
        JobOutcome::Success
    }
}

struct Fatal;

#[async_trait]
impl JobPayload for Fatal {
    async fn run(&self, _job: &Arc<Job>) -> JobOutcome {
        JobOutcome::FatalFailure("file does not exist".into())
    }
}

struct Panics;

#[async_trait]
impl JobPayload for Panics {
    async fn run(&self, _job: &Arc<Job>) -> JobOutcome {
        panic!("boom")
    }
}

fn succeed(id: JobId, owner: &str) -> Arc<Job> {
    Job::new(id, owner, 3, Arc::new(Succeed))
}

// ============================================================================
// DISPATCH AND CAPACITY
// ============================================================================

#[test]
fn test_successful_job_lands_in_ready_queue() {
    let scheduler = started("get", config(2));
    let job = succeed(1, "alice");
    scheduler.schedule(&job).unwrap();

    wait_for_state(&job, State::RQueued);
    assert_eq!(scheduler.counters().rqueued.value("alice"), 1);
    assert_eq!(scheduler.queue_contents(QueueKind::Ready)[0].id, 1);

    let states: Vec<State> = job.history().iter().map(|h| h.state).collect();
    assert_eq!(states, vec![State::TQueued, State::Running, State::RQueued]);
}

#[test]
fn test_running_jobs_never_exceed_pool_size() {
    let scheduler = started("get", config(2));
    let gate = Gate::new();
    let jobs: Vec<_> = (1..=6).map(|id| gate.job(id, "alice")).collect();
    for job in &jobs {
        scheduler.schedule(job).unwrap();
    }

    gate.wait_started();
    gate.wait_started();
    thread::sleep(Duration::from_millis(200));
    assert_eq!(scheduler.counters().running.total(), 2);
    assert_eq!(scheduler.counters().tqueued.total(), 4);
    assert!(gate.started.try_recv().is_err());

    gate.release(6);
    for job in &jobs {
        wait_for_state(job, State::RQueued);
    }
    assert_eq!(scheduler.counters().running.total(), 0);
}

#[test]
fn test_full_thread_queue_fails_the_job() {
    let mut cfg = config(1);
    cfg.max_thread_queue_size = 2;
    let scheduler = started("get", cfg);
    let gate = Gate::new();

    let blocker = gate.job(1, "alice");
    scheduler.schedule(&blocker).unwrap();
    gate.wait_started();

    let queued: Vec<_> = (2..=3).map(|id| succeed(id, "bob")).collect();
    for job in &queued {
        scheduler.schedule(job).unwrap();
        assert_eq!(job.state(), State::TQueued);
    }
    let rejected = succeed(4, "bob");
    scheduler.schedule(&rejected).unwrap();
    assert_eq!(rejected.state(), State::Failed);
    assert_eq!(last_description(&rejected), "too many jobs in the queue");
    assert_eq!(scheduler.counters().tqueued.total(), 2);

    gate.release(1);
    for job in &queued {
        wait_for_state(job, State::RQueued);
    }
}

#[test]
fn test_full_ready_queue_fails_the_finished_job() {
    let mut cfg = config(1);
    cfg.max_ready_queue_size = 1;
    let scheduler = started("get", cfg);

    let first = succeed(1, "alice");
    scheduler.schedule(&first).unwrap();
    wait_for_state(&first, State::RQueued);

    let second = succeed(2, "alice");
    scheduler.schedule(&second).unwrap();
    wait_for_state(&second, State::Failed);
    assert_eq!(
        last_description(&second),
        "all ready slots are taken and ready queue is full"
    );
    assert_eq!(scheduler.counters().rqueued.total(), 1);
    assert_eq!(scheduler.counters().running.total(), 0);
    assert_eq!(scheduler.queue_contents(QueueKind::Ready).len(), 1);
}

#[test]
fn test_zero_queue_sizes_are_raised_to_one() {
    let scheduler = started("get", config(1));
    scheduler.set_max_thread_queue_size(0);
    scheduler.set_max_ready_queue_size(0);

    let info = scheduler.info();
    assert_eq!(info.config.max_thread_queue_size, 1);
    assert_eq!(info.config.max_ready_queue_size, 1);

    let job = succeed(1, "alice");
    scheduler.schedule(&job).unwrap();
    wait_for_state(&job, State::RQueued);
}

#[test]
fn test_priority_job_waits_for_capacity() {
    let scheduler = started("get", config(1));
    let gate = Gate::new();
    let payload = Arc::new(FailOnce::default());
    let job = Job::new(1, "alice", 3, Arc::clone(&payload) as Arc<dyn JobPayload>);

    scheduler.schedule(&job).unwrap();
    wait_for_state(&job, State::RetryWait);
    assert!(scheduler.has_retry_timer(&job));

    let blocker = gate.job(2, "bob");
    scheduler.schedule(&blocker).unwrap();
    gate.wait_started();

    // Resuming a RETRYWAIT job cancels its timer and uses the priority queue.
    scheduler.schedule(&job).unwrap();
    assert!(!scheduler.has_retry_timer(&job));
    assert_eq!(job.state(), State::PriorityTQueued);
    thread::sleep(Duration::from_millis(200));
    assert_eq!(job.state(), State::PriorityTQueued);
    assert_eq!(payload.runs.load(Ordering::SeqCst), 1);

    gate.release(1);
    wait_for_state(&job, State::RQueued);
    assert_eq!(payload.runs.load(Ordering::SeqCst), 2);
    assert_eq!(job.retries(), 1);
}

#[test]
fn test_async_wait_job_resumes_through_priority_queue() {
    let scheduler = started("get", config(2));
    let payload = Arc::new(WaitsOnce::default());
    let job = Job::new(1, "alice", 3, Arc::clone(&payload) as Arc<dyn JobPayload>);

    scheduler.schedule(&job).unwrap();
    wait_for_state(&job, State::AsyncWait);
    assert_eq!(scheduler.counters().async_wait.value("alice"), 1);

    scheduler.schedule(&job).unwrap();
    wait_for_state(&job, State::RQueued);
    assert_eq!(scheduler.counters().async_wait.total(), 0);
    assert!(job
        .history()
        .iter()
        .any(|h| h.state == State::PriorityTQueued));
}

// ============================================================================
// FAILURES AND RETRIES
// ============================================================================

#[test]
fn test_retries_exhaust_into_a_single_failure() {
    let mut cfg = config(1);
    cfg.retry_timeout_ms = 20;
    cfg.max_number_of_retries = 2;
    let scheduler = started("get", cfg);
    let payload = Arc::new(AlwaysRetry::default());
    let job = Job::new(1, "alice", 5, Arc::clone(&payload) as Arc<dyn JobPayload>);

    scheduler.schedule(&job).unwrap();
    wait_for_state(&job, State::Failed);

    assert_eq!(payload.runs.load(Ordering::SeqCst), 3);
    assert_eq!(job.retries(), 2);
    assert_eq!(last_description(&job), "number of retries exceeded: transient");
    let failures = job.history().iter().filter(|h| h.state == State::Failed).count();
    assert_eq!(failures, 1);
    assert!(!scheduler.has_retry_timer(&job));
    assert_eq!(scheduler.counters().retry_wait.total(), 0);
    assert_eq!(scheduler.counters().priority_tqueued.total(), 0);
}

#[test]
fn test_job_retry_limit_caps_scheduler_limit() {
    let mut cfg = config(1);
    cfg.retry_timeout_ms = 10;
    let scheduler = started("get", cfg);
    let payload = Arc::new(AlwaysRetry::default());
    let job = Job::new(1, "alice", 0, Arc::clone(&payload) as Arc<dyn JobPayload>);

    scheduler.schedule(&job).unwrap();
    wait_for_state(&job, State::Failed);
    assert_eq!(payload.runs.load(Ordering::SeqCst), 1);
    assert_eq!(job.retries(), 0);
}

#[test]
fn test_fatal_failure() {
    let scheduler = started("get", config(1));
    let job = Job::new(1, "alice", 3, Arc::new(Fatal));
    scheduler.schedule(&job).unwrap();
    wait_for_state(&job, State::Failed);
    assert_eq!(last_description(&job), "non retriable error: file does not exist");
}

#[test]
fn test_panicking_payload_fails_job_and_keeps_worker() {
    let scheduler = started("get", config(1));
    let job = Job::new(1, "alice", 3, Arc::new(Panics));
    scheduler.schedule(&job).unwrap();
    wait_for_state(&job, State::Failed);
    assert_eq!(last_description(&job), "unexpected error: boom");

    let next = succeed(2, "alice");
    scheduler.schedule(&next).unwrap();
    wait_for_state(&next, State::RQueued);
    assert_eq!(scheduler.counters().running_threads.total(), 0);
}

// ============================================================================
// CANCELLATION
// ============================================================================

#[test]
fn test_cancel_queued_jobs_updates_counts_and_queue() {
    let scheduler = started("get", config(1));
    let gate = Gate::new();
    let blocker = gate.job(1, "alice");
    scheduler.schedule(&blocker).unwrap();
    gate.wait_started();

    let jobs: Vec<_> = (2..=6).map(|id| succeed(id, "bob")).collect();
    for job in &jobs {
        scheduler.schedule(job).unwrap();
    }
    assert_eq!(scheduler.counters().tqueued.value("bob"), 5);

    assert!(jobs[0].cancel("user request").unwrap());
    assert!(jobs[3].cancel("user request").unwrap());
    assert!(!jobs[3].cancel("again").unwrap());

    assert_eq!(scheduler.counters().tqueued.value("bob"), 3);
    let queued: Vec<JobId> = scheduler
        .queue_contents(QueueKind::Plain)
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(queued, vec![3, 4, 6]);

    gate.release(1);
    for i in [1, 2, 4] {
        wait_for_state(&jobs[i], State::RQueued);
    }
    assert_eq!(jobs[0].state(), State::Canceled);
}

#[test]
fn test_cancel_in_retry_wait_disarms_timer() {
    let scheduler = started("get", config(1));
    let job = Job::new(1, "alice", 3, Arc::new(AlwaysRetry::default()));
    scheduler.schedule(&job).unwrap();
    wait_for_state(&job, State::RetryWait);
    assert!(scheduler.has_retry_timer(&job));

    job.cancel("user request").unwrap();
    assert!(!scheduler.has_retry_timer(&job));
    assert_eq!(scheduler.counters().retry_wait.total(), 0);
}

#[test]
fn test_cancel_while_running_discards_the_outcome() {
    let scheduler = started("get", config(1));
    let gate = Gate::new();
    let job = gate.job(1, "alice");
    scheduler.schedule(&job).unwrap();
    gate.wait_started();

    job.cancel("user request").unwrap();
    gate.release(1);
    wait_until("worker slot to free up", || {
        scheduler.counters().running_threads.total() == 0
    });
    assert_eq!(job.state(), State::Canceled);
    assert!(scheduler.queue_contents(QueueKind::Ready).is_empty());
}

// ============================================================================
// FAIRNESS
// ============================================================================

fn dispatch_order_with(use_fairness: bool) -> (State, State) {
    let mut cfg = config(1);
    cfg.use_fairness = use_fairness;
    let scheduler = started("get", cfg);
    let gate = Gate::new();

    let heavy_running = gate.job(1, "heavy");
    scheduler.schedule(&heavy_running).unwrap();
    gate.wait_started();

    let heavy = gate.job(2, "heavy");
    let light = gate.job(3, "light");
    scheduler.schedule(&heavy).unwrap();
    scheduler.schedule(&light).unwrap();

    scheduler.set_thread_pool_size(2).unwrap();
    gate.wait_started();
    thread::sleep(Duration::from_millis(100));
    let states = (heavy.state(), light.state());

    gate.release(3);
    for job in [&heavy_running, &heavy, &light] {
        wait_for_state(job, State::RQueued);
    }
    states
}

#[test]
fn test_fairness_prefers_owner_with_fewer_running_jobs() {
    assert_eq!(dispatch_order_with(true), (State::TQueued, State::Running));
}

#[test]
fn test_without_fairness_queue_order_wins() {
    assert_eq!(dispatch_order_with(false), (State::Running, State::TQueued));
}

// ============================================================================
// READY SLOTS
// ============================================================================

#[test]
fn test_ready_slots_limit_promotion() {
    let mut cfg = config(2);
    cfg.max_ready_jobs = 1;
    let scheduler = started("get", cfg);
    let jobs: Vec<_> = (1..=3).map(|id| succeed(id, "alice")).collect();
    for job in &jobs {
        scheduler.schedule(job).unwrap();
    }
    for job in &jobs {
        wait_for_state(job, State::RQueued);
    }

    assert_eq!(scheduler.drain_ready_queue(), 1);
    assert_eq!(scheduler.counters().ready.total(), 1);
    assert_eq!(scheduler.queue_contents(QueueKind::Ready).len(), 2);

    let waiting = jobs.iter().find(|j| j.state() == State::RQueued).unwrap();
    assert!(!scheduler.promote_to_ready(waiting).unwrap());

    let ready = jobs.iter().find(|j| j.state() == State::Ready).unwrap();
    ready.expire().unwrap();
    assert_eq!(ready.state(), State::Done);
    assert_eq!(scheduler.drain_ready_queue(), 1);
    assert_eq!(scheduler.queue_contents(QueueKind::Ready).len(), 1);
}

// ============================================================================
// RESTORE
// ============================================================================

fn stored_job(id: JobId, state: State, scheduler_id: &str) -> Arc<Job> {
    stored_job_with_retries(id, state, scheduler_id, 0)
}

fn stored_job_with_retries(id: JobId, state: State, scheduler_id: &str, retries: u32) -> Arc<Job> {
    Job::from_snapshot(
        JobSnapshot {
            id,
            owner: "alice".into(),
            state,
            retries,
            max_retries: 3,
            scheduler: Some(SchedulerStamp {
                scheduler_id: scheduler_id.into(),
                acquired_at_ms: 1,
            }),
            created_at_ms: 1,
            history: Vec::new(),
        },
        Arc::new(Succeed),
    )
}

fn restoring(policy: RestorePolicy, storage: &Arc<InMemoryJobStorage>) -> Scheduler {
    let mut cfg = config(2);
    cfg.restore_policy = policy;
    let scheduler = Scheduler::with_storage("get", cfg, Arc::clone(storage) as Arc<dyn JobStorage>).unwrap();
    scheduler.start().unwrap();
    scheduler
}

#[test]
fn test_restore_running_job_goes_to_retry_wait() {
    let storage = Arc::new(InMemoryJobStorage::new());
    let running = stored_job(1, State::Running, "get");
    let done = stored_job(2, State::Done, "get");
    let foreign = stored_job(3, State::Running, "put");
    for job in [&running, &done, &foreign] {
        storage.register(Arc::clone(job));
    }

    let scheduler = restoring(RestorePolicy::RestoreRequest, &storage);

    assert_eq!(running.state(), State::RetryWait);
    assert!(scheduler.has_retry_timer(&running));
    assert_eq!(scheduler.counters().retry_wait.value("alice"), 1);
    assert_eq!(scheduler.counters().running.total(), 0);
    assert_eq!(
        storage.saved_snapshot(1).unwrap().unwrap().state,
        State::RetryWait
    );
    assert_eq!(done.state(), State::Done);
    assert_eq!(foreign.state(), State::Running);
    assert_eq!(scheduler.restore(), 0);
}

#[test]
fn test_restore_fails_running_job_without_retries_left() {
    let storage = Arc::new(InMemoryJobStorage::new());
    let spent = stored_job_with_retries(1, State::Running, "get", 3);
    let fresh = stored_job_with_retries(2, State::AsyncWait, "get", 2);
    storage.register(Arc::clone(&spent));
    storage.register(Arc::clone(&fresh));

    let scheduler = restoring(RestorePolicy::RestoreRequest, &storage);

    assert_eq!(spent.state(), State::Failed);
    assert_eq!(
        last_description(&spent),
        "number of retries exceeded: restored, in-flight work lost"
    );
    assert!(!scheduler.has_retry_timer(&spent));
    assert_eq!(fresh.state(), State::RetryWait);
    assert!(scheduler.has_retry_timer(&fresh));
    assert_eq!(scheduler.counters().running.total(), 0);
    assert_eq!(scheduler.counters().async_wait.total(), 0);
    assert_eq!(scheduler.counters().retry_wait.value("alice"), 1);
}

#[test]
fn test_retry_into_full_priority_queue_fails_the_job() {
    let storage = Arc::new(InMemoryJobStorage::new());
    let waiting: Vec<_> = (1..=2)
        .map(|id| stored_job(id, State::RetryWait, "get"))
        .collect();
    for job in &waiting {
        storage.register(Arc::clone(job));
    }

    let mut cfg = config(1);
    cfg.max_thread_queue_size = 1;
    cfg.retry_timeout_ms = 300;
    cfg.restore_policy = RestorePolicy::RestoreRequest;
    let scheduler =
        Scheduler::with_storage("get", cfg, Arc::clone(&storage) as Arc<dyn JobStorage>).unwrap();
    scheduler.start().unwrap();
    assert!(waiting.iter().all(|j| scheduler.has_retry_timer(j)));

    // Hold the only worker so a re-queued job stays in the priority queue.
    let gate = Gate::new();
    let blocker = gate.job(10, "bob");
    scheduler.schedule(&blocker).unwrap();
    gate.wait_started();

    wait_until("both retry timers to fire", || {
        waiting.iter().all(|j| j.state() != State::RetryWait)
    });
    let queued = waiting
        .iter()
        .find(|j| j.state() == State::PriorityTQueued)
        .unwrap();
    let failed = waiting.iter().find(|j| j.state() == State::Failed).unwrap();
    assert_eq!(last_description(failed), "priority thread queue is full");
    assert_eq!(scheduler.counters().priority_tqueued.total(), 1);
    assert_eq!(scheduler.counters().retry_wait.total(), 0);

    gate.release(1);
    wait_for_state(queued, State::RQueued);
    assert_eq!(scheduler.counters().priority_tqueued.total(), 0);
}

#[test]
fn test_restore_requeues_queued_jobs() {
    let storage = Arc::new(InMemoryJobStorage::new());
    let queued = stored_job(1, State::TQueued, "get");
    storage.register(Arc::clone(&queued));

    let _scheduler = restoring(RestorePolicy::RestoreRequest, &storage);
    wait_for_state(&queued, State::RQueued);
}

#[test]
fn test_restore_wait_for_update_parks_jobs() {
    let storage = Arc::new(InMemoryJobStorage::new());
    let queued = stored_job(1, State::TQueued, "get");
    storage.register(Arc::clone(&queued));

    let scheduler = restoring(RestorePolicy::WaitForUpdateRequest, &storage);
    assert_eq!(queued.state(), State::Restored);
    assert_eq!(scheduler.counters().restored.value("alice"), 1);
    assert_eq!(scheduler.counters().tqueued.total(), 0);

    scheduler.schedule(&queued).unwrap();
    wait_for_state(&queued, State::RQueued);
    assert_eq!(scheduler.counters().restored.total(), 0);
}

#[test]
fn test_restore_fail_request_fails_jobs() {
    let storage = Arc::new(InMemoryJobStorage::new());
    let waiting = stored_job(1, State::AsyncWait, "get");
    storage.register(Arc::clone(&waiting));

    let scheduler = restoring(RestorePolicy::FailRequest, &storage);
    assert_eq!(waiting.state(), State::Failed);
    assert_eq!(scheduler.counters().async_wait.total(), 0);
}

#[test]
fn test_restore_can_be_disabled() {
    let storage = Arc::new(InMemoryJobStorage::new());
    let running = stored_job(1, State::Running, "get");
    storage.register(Arc::clone(&running));

    let mut cfg = config(1);
    cfg.restore_on_startup = false;
    let scheduler = Scheduler::with_storage("get", cfg, Arc::clone(&storage) as Arc<dyn JobStorage>).unwrap();
    scheduler.start().unwrap();
    assert_eq!(running.state(), State::Running);
    assert_eq!(storage.saved_count(), 0);
}

// ============================================================================
// LIFECYCLE
// ============================================================================

#[test]
fn test_lifecycle_errors() {
    let scheduler = Scheduler::new("get", config(1)).unwrap();
    let job = succeed(1, "alice");
    assert!(matches!(
        scheduler.schedule(&job),
        Err(SchedulerError::NotRunning)
    ));

    scheduler.start().unwrap();
    assert!(scheduler.is_running());
    assert!(matches!(
        scheduler.start(),
        Err(SchedulerError::AlreadyRunning)
    ));

    scheduler.stop();
    scheduler.stop();
    assert!(!scheduler.is_running());
    assert!(matches!(scheduler.start(), Err(SchedulerError::Stopped)));
    assert!(matches!(
        scheduler.schedule(&job),
        Err(SchedulerError::NotRunning)
    ));
    assert_eq!(job.state(), State::Pending);
}

#[test]
fn test_terminal_job_is_unschedulable() {
    let scheduler = started("get", config(1));
    let job = succeed(1, "alice");
    job.cancel("never mind").unwrap();
    assert!(matches!(
        scheduler.schedule(&job),
        Err(SchedulerError::Unschedulable {
            job_id: 1,
            state: State::Canceled
        })
    ));
}

#[test]
fn test_invalid_construction() {
    assert!(matches!(
        Scheduler::new("  ", config(1)),
        Err(SchedulerError::InvalidId)
    ));
    assert!(matches!(
        Scheduler::new("get", config(0)),
        Err(SchedulerError::Config(_))
    ));
}

#[test]
fn test_info_reports_counters_and_tunables() {
    let scheduler = started("get", config(3));
    scheduler.set_priority_policy_plugin("fifo");
    let job = succeed(1, "alice");
    scheduler.schedule(&job).unwrap();
    wait_for_state(&job, State::RQueued);

    let info = scheduler.info();
    assert!(info.running);
    assert_eq!(info.appraiser, "fifo");
    assert_eq!(info.ready_queue_len, 1);
    assert_eq!(info.totals.rqueued, 1);
    assert_eq!(info.config.thread_pool_size, 3);

    let text = scheduler.to_string();
    assert!(text.starts_with("Scheduler id=get"));
    assert!(text.contains("threadPoolSize=3"));
    assert!(text.contains("jobAppraiser=fifo"));

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["totals"]["rqueued"], 1);
}
