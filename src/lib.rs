//! dbtest - database connectivity and query performance testing.
//!
//! This library exposes the core modules for use in integration tests.

pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod output;
pub mod report;
