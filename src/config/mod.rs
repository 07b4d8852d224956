//! Configuration models for schedulers and their worker pools.

pub mod pool;
pub mod scheduler;

pub use pool::WorkerPoolConfig;
pub use scheduler::{EngineConfig, RestorePolicy, SchedulerConfig, ENV_PREFIX};
