//! Tests for the scheduler registry

use grid_scheduler::config::SchedulerConfig;
use grid_scheduler::core::{Scheduler, SchedulerError, SchedulerRegistry};
use std::sync::Arc;

fn scheduler(id: &str) -> Arc<Scheduler> {
    let cfg = SchedulerConfig {
        thread_pool_size: 1,
        ..SchedulerConfig::default()
    };
    Arc::new(Scheduler::new(id, cfg).unwrap())
}

#[test]
fn test_register_and_lookup() {
    let registry = SchedulerRegistry::new();
    assert!(registry.is_empty());
    registry.register(scheduler("put")).unwrap();
    registry.register(scheduler("get")).unwrap();

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.ids(), vec!["get".to_owned(), "put".to_owned()]);
    assert_eq!(registry.get("get").unwrap().id(), "get");
    assert!(registry.get("ls").is_none());
}

#[test]
fn test_duplicate_id_is_rejected() {
    let registry = SchedulerRegistry::new();
    registry.register(scheduler("get")).unwrap();
    let err = registry.register(scheduler("get")).unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateId(id) if id == "get"));
}

#[test]
fn test_remove_and_stop_all() {
    let registry = SchedulerRegistry::new();
    let get = scheduler("get");
    let put = scheduler("put");
    get.start().unwrap();
    put.start().unwrap();
    registry.register(Arc::clone(&get)).unwrap();
    registry.register(Arc::clone(&put)).unwrap();

    assert!(registry.remove("put").is_some());
    assert!(registry.remove("put").is_none());
    registry.stop_all();
    assert!(!get.is_running());
    assert!(put.is_running());
    put.stop();
}
