//! Tests for error types

use grid_scheduler::core::{IllegalStateTransition, PoolError, SchedulerError, State, StorageError};

#[test]
fn test_illegal_transition_message() {
    let err = IllegalStateTransition {
        job_id: 7,
        from: State::Pending,
        to: State::Running,
    };
    assert_eq!(
        format!("{}", err),
        "illegal state transition for job 7: PENDING -> RUNNING"
    );
}

#[test]
fn test_transition_error_is_transparent() {
    let err = SchedulerError::from(IllegalStateTransition {
        job_id: 1,
        from: State::Done,
        to: State::TQueued,
    });
    assert_eq!(
        format!("{}", err),
        "illegal state transition for job 1: DONE -> TQUEUED"
    );
}

#[test]
fn test_unschedulable_error() {
    let err = SchedulerError::Unschedulable {
        job_id: 3,
        state: State::Ready,
    };
    assert_eq!(format!("{}", err), "can not schedule job 3 in state READY");
}

#[test]
fn test_lifecycle_errors() {
    assert_eq!(format!("{}", SchedulerError::NotRunning), "scheduler is not running");
    assert_eq!(
        format!("{}", SchedulerError::AlreadyRunning),
        "scheduler is already running"
    );
    assert_eq!(
        format!("{}", SchedulerError::Stopped),
        "scheduler has been stopped"
    );
}

#[test]
fn test_registry_errors() {
    assert_eq!(
        format!("{}", SchedulerError::DuplicateId("get".into())),
        "scheduler `get` is already registered"
    );
    assert_eq!(
        format!("{}", SchedulerError::InvalidId),
        "scheduler id must be a non-empty string"
    );
}

#[test]
fn test_pool_and_storage_errors() {
    let err = SchedulerError::from(PoolError::QueueFull);
    assert_eq!(format!("{}", err), "task queue is full");

    let err = SchedulerError::from(StorageError::Backend("disk offline".into()));
    assert_eq!(format!("{}", err), "storage backend error: disk offline");
}
