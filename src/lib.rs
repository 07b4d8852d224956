//! # Grid Scheduler
//!
//! A fair, capacity-bounded job scheduler for storage-management services.
//!
//! Requests from many users arrive as [`Job`](core::Job)s. Each job moves
//! through a fixed state machine (`PENDING`, `TQUEUED`, `RUNNING`, `RQUEUED`,
//! `READY`, ...). A [`Scheduler`](core::Scheduler) keeps them in three
//! bounded queues and runs their payloads on a fixed-size worker pool:
//!
//! - the **thread queue** holds fresh jobs waiting for a worker,
//! - the **priority thread queue** holds jobs resuming after an asynchronous
//!   wait or a retry delay, and is always drained first,
//! - the **ready queue** holds jobs whose result is computed but which wait
//!   for a free ready slot.
//!
//! A pluggable [`JobAppraiser`](core::JobAppraiser) scores queued jobs so that
//! owners with fewer running jobs go first. Retryable failures park the job in
//! `RETRYWAIT` and re-queue it on a timer until its retry budget runs out.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use grid_scheduler::config::SchedulerConfig;
//! use grid_scheduler::core::{Job, Scheduler};
//!
//! let scheduler = Scheduler::new("get", SchedulerConfig::default())?;
//! scheduler.start()?;
//!
//! let job = Job::new(1, "alice", 3, Arc::new(MyPayload));
//! scheduler.schedule(&job)?;
//! // ... later, when the client asks for results
//! scheduler.drain_ready_queue();
//! ```
//!
//! Several schedulers (one per request type) are usually built from one
//! [`EngineConfig`](config::EngineConfig) with
//! [`build_schedulers`](builders::build_schedulers) and looked up through a
//! [`SchedulerRegistry`](core::SchedulerRegistry).

/// Core scheduling: job state machine, fair queues, accounting and dispatch.
pub mod core;
/// Configuration models for schedulers and worker pools.
pub mod config;
/// Builders to construct schedulers from configuration.
pub mod builders;
/// Infrastructure adapters for persistence backends.
pub mod infra;
/// Runtime adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;
