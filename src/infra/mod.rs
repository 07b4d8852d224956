//! Infrastructure adapters for persistence backends.

pub mod storage;

pub use storage::InMemoryJobStorage;
