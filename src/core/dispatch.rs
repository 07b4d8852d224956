//! Coordinator loop: moves queued jobs onto the worker pool.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::fair_queue::QueueKind;
use super::job::Job;
use super::scheduler::SchedulerShared;
use super::state::State;
use super::wrapper::{execution_task, StartOutcome, StartSignal};

impl SchedulerShared {
    /// Body of the `scheduler-<id>` thread.
    pub(crate) fn coordinator_loop(self: Arc<Self>) {
        info!(scheduler = %self.id, "coordinator started");
        loop {
            let wait = self.config.read().queues_update_max_wait();
            if !self.wait_for_wake(wait) {
                break;
            }
            self.drain_queue(QueueKind::Priority);
            self.drain_queue(QueueKind::Plain);
        }
        info!(scheduler = %self.id, "coordinator stopped");
    }

    /// Jobs holding a worker plus jobs running without one, against the
    /// pool size.
    pub(crate) fn has_capacity(&self) -> bool {
        let pool_size = self.config.read().thread_pool_size;
        let busy = self.counters.running_threads.total()
            + self.counters.running_without_thread.total();
        busy < pool_size
    }

    fn select_candidate(&self, kind: QueueKind) -> Option<Arc<Job>> {
        let queue = self.queue(kind);
        let (fairness, cap) = {
            let cfg = self.config.read();
            (cfg.use_fairness, cfg.max_running_by_owner)
        };
        let appraiser = self.appraiser();
        queue
            .select_best(fairness, |len, pos, job| {
                let running = self.counters.running_for_owner(job.owner());
                appraiser.score(len, pos, running, cap, job)
            })
            .or_else(|| queue.peek())
    }

    /// One dispatch pass over the priority or plain queue.
    ///
    /// Stops when the queue is empty, the pool is at capacity, the pool
    /// rejects a task, or a worker does not acknowledge in time. Jobs that
    /// were not dispatched stay queued for the next pass.
    pub(crate) fn drain_queue(self: &Arc<Self>, kind: QueueKind) {
        let expected = match kind {
            QueueKind::Priority => State::PriorityTQueued,
            QueueKind::Plain => State::TQueued,
            QueueKind::Ready => return,
        };
        while self.is_accepting() {
            let Some(job) = self.select_candidate(kind) else {
                return;
            };
            if !self.has_capacity() {
                debug!(scheduler = %self.id, queue = kind.name(), "no free workers");
                return;
            }

            let state = job.state();
            if state != expected {
                warn!(
                    scheduler = %self.id,
                    job_id = job.id(),
                    %state,
                    queue = kind.name(),
                    "removing job in unexpected state from queue"
                );
                self.queue(kind).remove(job.id());
                continue;
            }

            let signal = Arc::new(StartSignal::default());
            let task = execution_task(Arc::clone(self), Arc::clone(&job), Arc::clone(&signal));
            if let Err(e) = self.pool.submit(task) {
                warn!(scheduler = %self.id, job_id = job.id(), error = %e, "worker pool rejected job");
                return;
            }

            let timeout = self.config.read().start_ack_timeout();
            match signal.wait(timeout) {
                StartOutcome::Started => {
                    debug!(scheduler = %self.id, job_id = job.id(), queue = kind.name(), "job started");
                }
                StartOutcome::Skipped => {
                    debug!(scheduler = %self.id, job_id = job.id(), "job was not runnable when picked up");
                }
                StartOutcome::TimedOut => {
                    warn!(
                        scheduler = %self.id,
                        job_id = job.id(),
                        timeout_ms = timeout.as_millis(),
                        "job did not start in time, ending dispatch pass"
                    );
                    return;
                }
            }
        }
    }
}
