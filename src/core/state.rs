//! Job lifecycle states and the transition table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a job.
///
/// `Done`, `Canceled` and `Failed` are terminal: no transition ever leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// Freshly created, not yet scheduled.
    Pending,
    /// Recovered from storage, waiting for an update before continuing.
    Restored,
    /// Waiting in the plain thread queue.
    #[serde(rename = "TQUEUED")]
    TQueued,
    /// Waiting in the priority thread queue.
    #[serde(rename = "PRIORITYTQUEUED")]
    PriorityTQueued,
    /// Payload is executing on a pool worker.
    Running,
    /// Work in progress that does not occupy a pool worker.
    #[serde(rename = "RUNNINGWITHOUTTHREAD")]
    RunningWithoutThread,
    /// Execution finished, waiting in the ready queue.
    #[serde(rename = "RQUEUED")]
    RQueued,
    /// Result is ready for the client.
    Ready,
    /// Client is transferring data.
    Transferring,
    /// Waiting for an asynchronous external event.
    #[serde(rename = "ASYNCWAIT")]
    AsyncWait,
    /// Waiting for the retry timer after a retryable failure.
    #[serde(rename = "RETRYWAIT")]
    RetryWait,
    /// Completed successfully.
    Done,
    /// Canceled by an external actor.
    Canceled,
    /// Failed permanently.
    Failed,
}

impl State {
    /// Every state, ordered by numeric id.
    pub const ALL: [Self; 14] = [
        Self::Pending,
        Self::Restored,
        Self::TQueued,
        Self::PriorityTQueued,
        Self::Running,
        Self::RunningWithoutThread,
        Self::RQueued,
        Self::Ready,
        Self::Transferring,
        Self::AsyncWait,
        Self::RetryWait,
        Self::Done,
        Self::Canceled,
        Self::Failed,
    ];

    /// Stable numeric id used by persistence.
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Restored => 1,
            Self::TQueued => 2,
            Self::PriorityTQueued => 3,
            Self::Running => 4,
            Self::RunningWithoutThread => 5,
            Self::RQueued => 6,
            Self::Ready => 7,
            Self::Transferring => 8,
            Self::AsyncWait => 9,
            Self::RetryWait => 10,
            Self::Done => 11,
            Self::Canceled => 12,
            Self::Failed => 13,
        }
    }

    /// Look a state up by its numeric id.
    #[must_use]
    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    /// Whether this state is terminal.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Done | Self::Canceled | Self::Failed)
    }

    /// Whether a job in this state sits in one of the scheduler's queues.
    #[must_use]
    pub const fn is_queued(self) -> bool {
        matches!(self, Self::TQueued | Self::PriorityTQueued | Self::RQueued)
    }

    /// Whether `self -> next` is permitted by the transition table.
    ///
    /// Same-state writes are not transitions and are not covered here.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use State::{
            AsyncWait, Canceled, Done, Failed, Pending, PriorityTQueued, RQueued, Ready,
            Restored, RetryWait, Running, RunningWithoutThread, TQueued, Transferring,
        };

        if self.is_final() {
            return false;
        }
        if matches!(next, Canceled | Failed | Restored) {
            // Any live job may be canceled, failed or parked for restore.
            return !matches!((self, next), (Restored, Restored));
        }
        match self {
            Pending | Restored => matches!(next, TQueued),
            AsyncWait | RunningWithoutThread => {
                matches!(next, PriorityTQueued | RetryWait | Done)
            }
            RetryWait => matches!(next, PriorityTQueued),
            TQueued | PriorityTQueued => matches!(next, Running),
            Running => matches!(
                next,
                RQueued | RetryWait | Done | AsyncWait | RunningWithoutThread | Ready
            ),
            RQueued => matches!(next, Ready),
            Ready => matches!(next, Transferring | Done),
            Transferring => matches!(next, Done),
            Done | Canceled | Failed => false,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Restored => "RESTORED",
            Self::TQueued => "TQUEUED",
            Self::PriorityTQueued => "PRIORITYTQUEUED",
            Self::Running => "RUNNING",
            Self::RunningWithoutThread => "RUNNINGWITHOUTTHREAD",
            Self::RQueued => "RQUEUED",
            Self::Ready => "READY",
            Self::Transferring => "TRANSFERRING",
            Self::AsyncWait => "ASYNCWAIT",
            Self::RetryWait => "RETRYWAIT",
            Self::Done => "DONE",
            Self::Canceled => "CANCELED",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
