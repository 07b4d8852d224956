//! Tests for builder modules

use grid_scheduler::builders::build_schedulers;
use grid_scheduler::config::{EngineConfig, SchedulerConfig};
use grid_scheduler::core::{SchedulerError, SchedulerRegistry};

#[test]
fn test_build_schedulers_applies_config() {
    let cfg = EngineConfig::from_json_str(
        r#"{"schedulers": {"get": {"thread_pool_size": 2, "max_ready_jobs": 5}}}"#,
    )
    .unwrap();
    let registry = SchedulerRegistry::new();
    build_schedulers(&cfg, &registry, |_, _| Ok(None)).unwrap();

    let get = registry.get("get").unwrap();
    assert_eq!(get.config().thread_pool_size, 2);
    assert_eq!(get.config().max_ready_jobs, 5);
    assert_eq!(get.info().pool.worker_count, 2);
}

#[test]
fn test_build_schedulers_rejects_invalid_config() {
    let registry = SchedulerRegistry::new();
    let err = build_schedulers(&EngineConfig::default(), &registry, |_, _| Ok(None)).unwrap_err();
    assert!(matches!(err, SchedulerError::Config(_)));
    assert!(registry.is_empty());
}

#[test]
fn test_build_schedulers_rejects_already_registered_id() {
    let mut cfg = EngineConfig::default();
    cfg.schedulers.insert("get".into(), SchedulerConfig::default());
    let registry = SchedulerRegistry::new();
    build_schedulers(&cfg, &registry, |_, _| Ok(None)).unwrap();
    let err = build_schedulers(&cfg, &registry, |_, _| Ok(None)).unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateId(_)));
}
