//! Scheduler and engine configuration.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::appraisal::DEFAULT_APPRAISER;
use crate::core::AppResult;

/// Prefix of the environment variables read by [`SchedulerConfig::from_env`].
pub const ENV_PREFIX: &str = "GRID_SCHEDULER_";

/// What to do with jobs a previous run of the same scheduler left behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestorePolicy {
    /// Fail every recovered job.
    FailRequest,
    /// Park recovered jobs in `RESTORED` until the client updates them.
    #[default]
    WaitForUpdateRequest,
    /// Re-enqueue recovered jobs according to their recorded state.
    RestoreRequest,
}

impl fmt::Display for RestorePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FailRequest => "FAIL_REQUEST",
            Self::WaitForUpdateRequest => "WAIT_FOR_UPDATE_REQUEST",
            Self::RestoreRequest => "RESTORE_REQUEST",
        })
    }
}

impl FromStr for RestorePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail_request" | "fail" => Ok(Self::FailRequest),
            "wait_for_update_request" | "wait" => Ok(Self::WaitForUpdateRequest),
            "restore_request" | "restore" => Ok(Self::RestoreRequest),
            other => Err(format!("unknown restore policy `{other}`")),
        }
    }
}

/// Every tunable of one scheduler instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker threads, and the cap on jobs holding a worker or running
    /// without one.
    pub thread_pool_size: usize,
    /// Capacity of the plain and the priority thread queues.
    pub max_thread_queue_size: usize,
    /// Capacity of the ready queue.
    pub max_ready_queue_size: usize,
    /// Jobs allowed in `READY`/`TRANSFERRING` at once.
    pub max_ready_jobs: usize,
    /// Per-owner running cap fed to the appraiser.
    pub max_running_by_owner: usize,
    /// Per-owner cap on jobs running without a worker.
    pub max_running_without_thread_by_owner: usize,
    /// Informational limit on jobs in `ASYNCWAIT`.
    pub max_async_wait_jobs: usize,
    /// Informational limit on jobs in `RETRYWAIT`.
    pub max_retry_wait_jobs: usize,
    /// Scheduler-wide retry budget.
    pub max_number_of_retries: u32,
    /// Delay before a job in `RETRYWAIT` is re-queued.
    pub retry_timeout_ms: u64,
    /// Longest the coordinator sleeps without a state-change signal.
    pub queues_update_max_wait_ms: u64,
    /// How long a dispatch pass waits for a worker to pick a job up.
    pub start_ack_timeout_ms: u64,
    /// Score queued jobs instead of serving them in FIFO order.
    pub use_fairness: bool,
    /// Handling of jobs left over from a previous run.
    pub restore_policy: RestorePolicy,
    /// Run the restore path when the scheduler starts.
    pub restore_on_startup: bool,
    /// Name of the appraiser used for fair selection.
    pub priority_policy_plugin: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 30,
            max_thread_queue_size: 1000,
            max_ready_queue_size: 1000,
            max_ready_jobs: 60,
            max_running_by_owner: 10,
            max_running_without_thread_by_owner: 10,
            max_async_wait_jobs: 1000,
            max_retry_wait_jobs: 1000,
            max_number_of_retries: 20,
            retry_timeout_ms: 60_000,
            queues_update_max_wait_ms: 60_000,
            start_ack_timeout_ms: 10_000,
            use_fairness: true,
            restore_policy: RestorePolicy::default(),
            restore_on_startup: true,
            priority_policy_plugin: DEFAULT_APPRAISER.into(),
        }
    }
}

impl SchedulerConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_pool_size == 0 {
            return Err("thread_pool_size must be greater than 0".into());
        }
        if self.max_thread_queue_size == 0 {
            return Err("max_thread_queue_size must be greater than 0".into());
        }
        if self.max_ready_queue_size == 0 {
            return Err("max_ready_queue_size must be greater than 0".into());
        }
        if self.queues_update_max_wait_ms == 0 {
            return Err("queues_update_max_wait_ms must be greater than 0".into());
        }
        if self.start_ack_timeout_ms == 0 {
            return Err("start_ack_timeout_ms must be greater than 0".into());
        }
        if self.priority_policy_plugin.trim().is_empty() {
            return Err("priority_policy_plugin must not be empty".into());
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message for malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults overridden by `GRID_SCHEDULER_*` environment variables, after
    /// loading a `.env` file if one exists.
    ///
    /// # Errors
    ///
    /// Fails if a variable does not parse or the result does not validate.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();
        override_from_env("THREAD_POOL_SIZE", &mut cfg.thread_pool_size)?;
        override_from_env("MAX_THREAD_QUEUE_SIZE", &mut cfg.max_thread_queue_size)?;
        override_from_env("MAX_READY_QUEUE_SIZE", &mut cfg.max_ready_queue_size)?;
        override_from_env("MAX_READY_JOBS", &mut cfg.max_ready_jobs)?;
        override_from_env("MAX_RUNNING_BY_OWNER", &mut cfg.max_running_by_owner)?;
        override_from_env(
            "MAX_RUNNING_WITHOUT_THREAD_BY_OWNER",
            &mut cfg.max_running_without_thread_by_owner,
        )?;
        override_from_env("MAX_ASYNC_WAIT_JOBS", &mut cfg.max_async_wait_jobs)?;
        override_from_env("MAX_RETRY_WAIT_JOBS", &mut cfg.max_retry_wait_jobs)?;
        override_from_env("MAX_NUMBER_OF_RETRIES", &mut cfg.max_number_of_retries)?;
        override_from_env("RETRY_TIMEOUT_MS", &mut cfg.retry_timeout_ms)?;
        override_from_env("QUEUES_UPDATE_MAX_WAIT_MS", &mut cfg.queues_update_max_wait_ms)?;
        override_from_env("START_ACK_TIMEOUT_MS", &mut cfg.start_ack_timeout_ms)?;
        override_from_env("USE_FAIRNESS", &mut cfg.use_fairness)?;
        override_from_env("RESTORE_POLICY", &mut cfg.restore_policy)?;
        override_from_env("RESTORE_ON_STARTUP", &mut cfg.restore_on_startup)?;
        override_from_env("PRIORITY_POLICY_PLUGIN", &mut cfg.priority_policy_plugin)?;
        cfg.validate().map_err(anyhow::Error::msg)?;
        Ok(cfg)
    }

    /// Retry delay.
    #[must_use]
    pub const fn retry_timeout(&self) -> Duration {
        Duration::from_millis(self.retry_timeout_ms)
    }

    /// Coordinator wake interval.
    #[must_use]
    pub const fn queues_update_max_wait(&self) -> Duration {
        Duration::from_millis(self.queues_update_max_wait_ms)
    }

    /// Start acknowledgement timeout.
    #[must_use]
    pub const fn start_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.start_ack_timeout_ms)
    }
}

fn override_from_env<T>(suffix: &str, slot: &mut T) -> AppResult<()>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let key = format!("{ENV_PREFIX}{suffix}");
    if let Ok(raw) = std::env::var(&key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value `{raw}` for {key}: {e}"))?;
    }
    Ok(())
}

/// A process running several named schedulers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scheduler id to configuration.
    pub schedulers: HashMap<String, SchedulerConfig>,
}

impl EngineConfig {
    /// Validate all schedulers and ensure at least one exists.
    ///
    /// # Errors
    ///
    /// Returns a description naming the first invalid scheduler.
    pub fn validate(&self) -> Result<(), String> {
        if self.schedulers.is_empty() {
            return Err("at least one scheduler must be defined".into());
        }
        for (id, cfg) in &self.schedulers {
            if id.trim().is_empty() {
                return Err("scheduler ids must not be empty".into());
            }
            cfg.validate()
                .map_err(|e| format!("scheduler `{id}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse engine configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message for malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Fails if the file can not be read or does not hold a valid config.
    pub fn from_json_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json_str(&input).map_err(anyhow::Error::msg)
    }
}
