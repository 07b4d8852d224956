//! Unit tests for individual components

mod builders_test;
mod config_test;
mod counters_test;
mod error_test;
mod registry_test;
mod state_test;
