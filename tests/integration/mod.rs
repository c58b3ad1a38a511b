//! Integration tests for dbtest.
//!
//! Live tests require a running SQL Server.
//! Set DBTEST_SQLSERVER environment variable to run them.

pub mod cli_test;
pub mod connection_test;
pub mod session_test;
