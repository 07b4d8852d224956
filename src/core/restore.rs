//! Recovery of jobs a previous run of this scheduler left behind.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::error::IllegalStateTransition;
use super::fair_queue::QueueKind;
use super::job::{Job, JobGuard};
use super::scheduler::SchedulerShared;
use super::state::State;
use crate::config::RestorePolicy;

impl SchedulerShared {
    /// Adopt every live job the storage reports for this scheduler id and
    /// apply the restore policy to it. Returns the number adopted.
    ///
    /// Jobs already stamped with this run's timestamp were accepted by this
    /// instance and are left alone.
    pub(crate) fn restore_jobs(&self) -> usize {
        let Some(storage) = &self.storage else {
            debug!(scheduler = %self.id, "no storage attached, nothing to restore");
            return 0;
        };
        let jobs = match storage.jobs_for_scheduler(&self.id) {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(scheduler = %self.id, error = %e, "failed to load jobs for restore");
                return 0;
            }
        };
        let policy = self.config.read().restore_policy;

        let mut restored = 0;
        for job in &jobs {
            let mut guard = job.lock();
            let state = guard.state();
            if state.is_final() {
                continue;
            }
            let this_run = guard
                .scheduler_stamp()
                .is_some_and(|s| s.acquired_at_ms == self.run_timestamp_ms);
            if this_run {
                continue;
            }

            guard.attach_listener(self.listener());
            if let Some(counter) = self.counters.for_state(state) {
                counter.increment(job.owner());
            }
            guard.set_scheduler(&self.id, self.run_timestamp_ms);

            if let Err(e) = self.apply_policy(policy, &mut guard, job) {
                warn!(scheduler = %self.id, error = %e, "restore transition rejected");
            }
            if let Err(e) = storage.save_job(&guard.snapshot()) {
                warn!(scheduler = %self.id, job_id = job.id(), error = %e, "failed to save restored job");
            }
            restored += 1;
        }

        let totals = self.counters.totals();
        info!(
            scheduler = %self.id,
            %policy,
            restored,
            tqueued = totals.tqueued,
            priority_tqueued = totals.priority_tqueued,
            retry_wait = totals.retry_wait,
            restored_state = totals.restored,
            ready = totals.ready,
            "restore finished"
        );
        restored
    }

    fn apply_policy(
        &self,
        policy: RestorePolicy,
        guard: &mut JobGuard<'_>,
        job: &Arc<Job>,
    ) -> Result<(), IllegalStateTransition> {
        match policy {
            RestorePolicy::FailRequest => {
                guard.set_state(State::Failed, "scheduler restarted, request failed")
            }
            RestorePolicy::WaitForUpdateRequest => {
                guard.set_state(State::Restored, "restored, waiting for update")
            }
            RestorePolicy::RestoreRequest => match guard.state() {
                State::Pending | State::Restored => self.enqueue_plain(guard, job),
                State::TQueued => self.reinsert(guard, job, QueueKind::Plain),
                State::PriorityTQueued => self.reinsert(guard, job, QueueKind::Priority),
                State::RQueued => self.reinsert(guard, job, QueueKind::Ready),
                State::Running | State::AsyncWait | State::RunningWithoutThread => {
                    let reason = "restored, in-flight work lost";
                    if guard.retries() < self.retry_budget(guard.max_retries()) {
                        guard.set_state(State::RetryWait, reason)?;
                        self.arm_retry(job);
                        Ok(())
                    } else {
                        guard.set_state(
                            State::Failed,
                            format!("number of retries exceeded: {reason}"),
                        )
                    }
                }
                State::RetryWait => {
                    self.arm_retry(job);
                    Ok(())
                }
                State::Ready | State::Transferring | State::Done | State::Canceled | State::Failed => {
                    Ok(())
                }
            },
        }
    }
}
