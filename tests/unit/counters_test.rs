//! Tests for per-owner counters

use grid_scheduler::core::{CountByOwner, SchedulerCounters, State};
use std::sync::Arc;
use std::thread;

#[test]
fn test_count_by_owner() {
    let counter = CountByOwner::new();
    counter.increment("alice");
    counter.increment("alice");
    counter.increment("bob");
    assert_eq!(counter.value("alice"), 2);
    assert_eq!(counter.value("carol"), 0);
    assert_eq!(counter.total(), 3);

    counter.decrement("alice");
    counter.decrement("carol");
    assert_eq!(counter.value("alice"), 1);
    assert_eq!(counter.total(), 2);
}

#[test]
fn test_concurrent_updates_balance_out() {
    let counter = Arc::new(CountByOwner::new());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                let owner = format!("owner-{}", i % 3);
                for _ in 0..1000 {
                    counter.increment(&owner);
                }
                for _ in 0..500 {
                    counter.decrement(&owner);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(counter.total(), 8 * 500);
    let per_owner: usize = counter.snapshot().values().sum();
    assert_eq!(per_owner, counter.total());
}

#[test]
fn test_state_to_counter_mapping() {
    let counters = SchedulerCounters::default();
    assert!(counters.for_state(State::Pending).is_none());
    assert!(counters.for_state(State::Done).is_none());
    assert!(std::ptr::eq(
        counters.for_state(State::Ready).unwrap(),
        counters.for_state(State::Transferring).unwrap()
    ));

    counters.for_state(State::Running).unwrap().increment("alice");
    counters
        .for_state(State::RunningWithoutThread)
        .unwrap()
        .increment("alice");
    assert_eq!(counters.running_for_owner("alice"), 2);
    assert_eq!(counters.totals().running, 1);
}
