//! Database provider abstraction for dbtest.
//!
//! Every backend family implements the same small capability set: open a
//! connection, create a command, and execute it as a non-query, a
//! forward-only reader, or a fully buffered fill. The test engine only ever
//! talks to these traits.

pub mod connection_string;
mod mock;
mod odbc;
mod oledb;
mod sqlclient;
mod types;

pub use mock::{MockProvider, MockStats};
pub use odbc::OdbcProvider;
pub use oledb::OleDbProvider;
pub use sqlclient::SqlClientProvider;
pub use types::{BufferedResult, ResultSet, Row, Value};

use crate::config::ProviderKind;
use crate::error::{DbTestError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

const COMMAND_TIMEOUT_MESSAGE: &str =
    "Execution Timeout Expired. The timeout period elapsed prior to completion of the operation.";

/// A command ready to run on an open connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// SQL text sent to the server.
    pub text: String,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Command {
    /// Creates a command from text and a timeout in seconds (0 = infinite).
    pub fn new(text: impl Into<String>, timeout_secs: u32) -> Self {
        Self {
            text: text.into(),
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs.into())),
        }
    }

    /// Instant by which the command and every row it yields must finish,
    /// counted from now.
    pub fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|limit| Instant::now() + limit)
    }
}

/// Opens connections for one backend family.
#[async_trait(?Send)]
pub trait ProviderAdapter {
    /// Returns the backend family this adapter serves.
    fn kind(&self) -> ProviderKind;

    /// Opens a connection.
    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>>;
}

/// An open, exclusively owned connection.
///
/// Callers must finish with [`Connection::close`], exactly once, on every
/// path.
#[async_trait(?Send)]
pub trait Connection {
    /// Prepares a command for this connection.
    fn create_command(&self, text: &str, timeout_secs: u32) -> Result<Command> {
        if text.trim().is_empty() {
            return Err(DbTestError::command("CommandText property has not been initialized."));
        }
        Ok(Command::new(text, timeout_secs))
    }

    /// Executes a command that returns no rows.
    async fn execute_non_query(&mut self, command: &Command) -> Result<()>;

    /// Starts a forward-only read of the first result set.
    async fn execute_reader<'a>(&'a mut self, command: &Command) -> Result<Box<dyn RowCursor + 'a>>;

    /// Executes a command and buffers every result set in memory.
    async fn fill_buffered(&mut self, command: &Command) -> Result<BufferedResult>;

    /// Releases the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// A forward-only cursor that advances one row at a time without
/// retaining row data.
#[async_trait(?Send)]
pub trait RowCursor {
    /// Advances to the next row. Returns false once the rows are exhausted.
    async fn advance(&mut self) -> Result<bool>;
}

/// Creates the adapter for a backend family.
pub fn adapter_for(kind: ProviderKind) -> Box<dyn ProviderAdapter> {
    match kind {
        ProviderKind::SqlClient => Box::new(SqlClientProvider::new()),
        ProviderKind::Odbc => Box::new(OdbcProvider::new()),
        ProviderKind::OleDb => Box::new(OleDbProvider::new()),
    }
}

/// Runs `operation` under a command timeout.
pub(crate) async fn with_command_timeout<T, F>(timeout: Option<Duration>, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    before_deadline(timeout.map(|limit| Instant::now() + limit), operation).await
}

/// Runs `operation`, failing with the command timeout error once `deadline`
/// passes. Cursors use this so a stalled row fetch counts against the time
/// left on the command that opened them.
pub(crate) async fn before_deadline<T, F>(deadline: Option<Instant>, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(at) => tokio::time::timeout_at(at, operation)
            .await
            .map_err(|_| DbTestError::command(COMMAND_TIMEOUT_MESSAGE))?,
        None => operation.await,
    }
}

/// Runs `operation` under a connect timeout.
pub(crate) async fn with_connect_timeout<T, F>(timeout: Option<Duration>, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, operation).await.map_err(|_| {
            DbTestError::connection(format!(
                "Connection Timeout Expired. The timeout period of {} seconds elapsed while attempting to connect.",
                limit.as_secs()
            ))
        })?,
        None => operation.await,
    }
}
