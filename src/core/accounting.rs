//! Counter and queue bookkeeping driven by job state writes.

use super::job::{StateChange, StateListener};
use super::scheduler::SchedulerShared;
use super::state::State;

impl StateListener for SchedulerShared {
    /// Runs under the job lock; takes only queue, counter and timer locks.
    fn state_changed(&self, change: &StateChange<'_>) {
        let owner = change.job.owner();
        if let Some(counter) = self.counters.for_state(change.old) {
            counter.decrement(owner);
        }
        if let Some(counter) = self.counters.for_state(change.new) {
            counter.increment(owner);
        }

        match change.old {
            State::TQueued => {
                self.plain_queue.remove(change.job.id());
            }
            State::PriorityTQueued => {
                self.priority_queue.remove(change.job.id());
            }
            State::RQueued => {
                self.ready_queue.remove(change.job.id());
            }
            State::RetryWait if change.new.is_final() => {
                self.timers.cancel(change.job.id());
            }
            _ => {}
        }

        self.wake();
    }
}
