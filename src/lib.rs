// Library root — exposes internals for integration tests and future crate consumers.
// The binary entry point is src/main.rs.

pub mod config;
pub mod error;
pub mod facade;
pub mod harness;
pub mod loader;
pub mod logger;
pub mod units;
