//! Tests for the job state machine

use grid_scheduler::core::State;

#[test]
fn test_any_live_state_can_fail_or_cancel() {
    for state in State::ALL.iter().filter(|s| !s.is_final()) {
        assert!(state.can_transition_to(State::Failed), "{state} -> FAILED");
        assert!(state.can_transition_to(State::Canceled), "{state} -> CANCELED");
    }
}

#[test]
fn test_restore_transitions() {
    assert!(State::Running.can_transition_to(State::RetryWait));
    assert!(State::AsyncWait.can_transition_to(State::RetryWait));
    assert!(State::RunningWithoutThread.can_transition_to(State::RetryWait));
    assert!(State::TQueued.can_transition_to(State::Restored));
    assert!(State::Restored.can_transition_to(State::TQueued));
}

#[test]
fn test_queues_are_not_skipped() {
    assert!(!State::Pending.can_transition_to(State::Running));
    assert!(!State::RetryWait.can_transition_to(State::Running));
    assert!(!State::Running.can_transition_to(State::TQueued));
    assert!(!State::RQueued.can_transition_to(State::Done));
}

#[test]
fn test_display_names() {
    assert_eq!(State::PriorityTQueued.to_string(), "PRIORITYTQUEUED");
    assert_eq!(State::RunningWithoutThread.to_string(), "RUNNINGWITHOUTTHREAD");
    assert!(State::RQueued.is_queued());
    assert!(!State::Ready.is_queued());
}
