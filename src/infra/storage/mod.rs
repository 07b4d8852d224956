//! Persistence backends for the scheduler's storage hook.

pub mod memory;

pub use memory::InMemoryJobStorage;
