//! Tests for configuration validation

use grid_scheduler::config::{EngineConfig, RestorePolicy, SchedulerConfig, WorkerPoolConfig};

#[test]
fn test_scheduler_config_defaults_are_valid() {
    let cfg = SchedulerConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.max_thread_queue_size, 1000);
    assert_eq!(cfg.max_ready_jobs, 60);
    assert_eq!(cfg.priority_policy_plugin, "default");
    assert!(cfg.restore_on_startup);
}

#[test]
fn test_scheduler_config_invalid_pool_size() {
    let invalid = SchedulerConfig {
        thread_pool_size: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_queue_size() {
    let invalid = SchedulerConfig {
        max_thread_queue_size: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_wake_interval() {
    let invalid = SchedulerConfig {
        queues_update_max_wait_ms: 0,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_rejects_unknown_restore_policy() {
    let err = SchedulerConfig::from_json_str(r#"{"restore_policy": "resurrect"}"#).unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_engine_config_requires_a_scheduler() {
    assert!(EngineConfig::default().validate().is_err());
}

#[test]
fn test_engine_config_from_json() {
    let cfg = EngineConfig::from_json_str(
        r#"{
            "schedulers": {
                "get": { "thread_pool_size": 8, "use_fairness": false },
                "put": { "restore_policy": "fail_request" }
            }
        }"#,
    )
    .unwrap();
    assert_eq!(cfg.schedulers["get"].thread_pool_size, 8);
    assert!(!cfg.schedulers["get"].use_fairness);
    assert_eq!(cfg.schedulers["put"].restore_policy, RestorePolicy::FailRequest);
}

#[test]
fn test_engine_config_names_the_invalid_scheduler() {
    let err = EngineConfig::from_json_str(r#"{"schedulers": {"ls": {"thread_pool_size": 0}}}"#)
        .unwrap_err();
    assert!(err.contains("`ls`"));
}

#[test]
fn test_engine_config_from_missing_file() {
    let err = EngineConfig::from_json_file("/nonexistent/scheduler.json").unwrap_err();
    assert!(format!("{err:#}").contains("reading /nonexistent/scheduler.json"));
}

#[test]
fn test_worker_pool_config_builder() {
    let cfg = WorkerPoolConfig::new()
        .with_worker_count(3)
        .with_max_queue_depth(9)
        .with_thread_name_prefix("get-worker");
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.worker_count, 3);
    assert_eq!(cfg.max_queue_depth, 9);
    assert_eq!(cfg.thread_name_prefix, "get-worker");
    assert!(WorkerPoolConfig::new().with_worker_count(0).validate().is_err());
}
