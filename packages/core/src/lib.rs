// Library root: exposes the pipeline modules for integration tests in `tests/`.
// The command-line entry point is `src/main.rs`.

pub mod adapters;
pub mod cache;
pub mod error;
pub mod metrics;
pub mod paths;
pub mod pipeline;
pub mod scheduler;
pub mod services;
pub mod session;
pub mod store;

// Only the binary needs these; they stay public so it can reach them through
// the library crate.
pub mod cli;
pub mod config;
pub mod logging;
