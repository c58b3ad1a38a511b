//! One full connection test.

use super::cursor::strategy_for;
use super::outcome::{ExecutionStats, Timed, TestOutcome};
use crate::config::TestConfiguration;
use crate::db::{Connection, ProviderAdapter};
use crate::error::Result;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Opens a connection, optionally runs the command, and releases the
/// connection.
///
/// Failures never escape [`ConnectionTestRunner::run`]; they come back as a
/// failed [`TestOutcome`].
pub struct ConnectionTestRunner<'a> {
    adapter: &'a dyn ProviderAdapter,
}

impl<'a> ConnectionTestRunner<'a> {
    /// Creates a runner over the given adapter.
    pub fn new(adapter: &'a dyn ProviderAdapter) -> Self {
        Self { adapter }
    }

    /// Runs one test.
    pub async fn run(&self, config: &TestConfiguration) -> TestOutcome {
        let start = Instant::now();
        let mut connection = match self.adapter.open(&config.connection_string).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!("{} provider failed to connect: {}", self.adapter.kind(), e);
                return TestOutcome::failed(None, &e);
            }
        };
        let connect = Timed::since(start);
        debug!("Connected in {:?}", connect.elapsed);

        if !config.has_command() {
            release(connection).await;
            return TestOutcome::succeeded(connect, None);
        }

        let result = execute(connection.as_mut(), config).await;
        release(connection).await;

        match result {
            Ok(stats) => TestOutcome::succeeded(connect, Some(stats)),
            Err(e) => {
                warn!("Command failed: {}", e);
                TestOutcome::failed(Some(connect), &e)
            }
        }
    }
}

async fn execute(connection: &mut dyn Connection, config: &TestConfiguration) -> Result<ExecutionStats> {
    let command = connection.create_command(&config.command_text, config.command_timeout_secs)?;
    strategy_for(config).execute(connection, &command).await
}

/// Closes the connection. A failure here does not change the outcome.
async fn release(connection: Box<dyn Connection>) {
    if let Err(e) = connection.close().await {
        warn!("Failed to close connection: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CursorMode, ProviderKind, RowLimit};
    use crate::db::MockProvider;
    use crate::error::DbTestError;

    fn config() -> TestConfiguration {
        TestConfiguration::new(ProviderKind::SqlClient, "Server=mock;Database=Northwind")
    }

    #[tokio::test]
    async fn test_connection_only() {
        let provider = MockProvider::new();
        let outcome = ConnectionTestRunner::new(&provider).run(&config()).await;

        assert!(outcome.success);
        assert!(outcome.connect.is_some());
        assert!(outcome.execution.is_none());
        let stats = provider.stats();
        assert_eq!(stats.opens, 1);
        assert_eq!(stats.closes, 1);
        assert_eq!(stats.readers + stats.fills + stats.non_queries, 0);
    }

    #[tokio::test]
    async fn test_open_failure_is_failed_outcome() {
        let provider = MockProvider::new().fail_open_always();
        let outcome = ConnectionTestRunner::new(&provider)
            .run(&config().with_command("select 1"))
            .await;

        assert!(!outcome.success);
        assert!(outcome.connect.is_none());
        assert_eq!(outcome.failure.unwrap().category, "Connection Error");
        // Nothing was opened, so nothing is closed
        assert_eq!(provider.stats().closes, 0);
        assert_eq!(provider.stats().readers, 0);
    }

    #[tokio::test]
    async fn test_command_failure_still_closes() {
        let provider = MockProvider::new().fail_command_always();
        let outcome = ConnectionTestRunner::new(&provider)
            .run(&config().with_command("select * from custmers"))
            .await;

        assert!(!outcome.success);
        assert!(outcome.connect.is_some());
        assert!(outcome.execution.is_none());
        assert_eq!(outcome.failure.unwrap().category, "Command Error");
        assert_eq!(provider.stats().closes, 1);
    }

    #[tokio::test]
    async fn test_close_failure_keeps_success() {
        let provider = MockProvider::new()
            .with_result(MockProvider::numbered_rows(3))
            .fail_close();
        let outcome = ConnectionTestRunner::new(&provider)
            .run(&config().with_command("select * from orders"))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.rows_read(), Some(3));
        assert_eq!(provider.stats().closes, 1);
    }

    #[tokio::test]
    async fn test_dataset_run() {
        let provider = MockProvider::new().with_result(MockProvider::numbered_rows(25));
        let config = config()
            .with_command("select * from orders")
            .with_cursor(CursorMode::Dataset)
            .with_rows_to_display(RowLimit::All);
        let outcome = ConnectionTestRunner::new(&provider).run(&config).await;

        assert!(outcome.success);
        assert_eq!(outcome.rows_read(), Some(25));
        assert_eq!(outcome.report().unwrap().row_count(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_timeout_fails_run() {
        let provider = MockProvider::new()
            .with_result(MockProvider::numbered_rows(1))
            .with_execute_delay(std::time::Duration::from_secs(60));
        let outcome = ConnectionTestRunner::new(&provider)
            .run(&config().with_command("waitfor delay '00:01'").with_timeout(5))
            .await;

        assert!(!outcome.success);
        let failure = outcome.failure.unwrap();
        assert!(failure.message.contains("Execution Timeout Expired"));
        assert_eq!(provider.stats().closes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_firehose_stalled_mid_drain_times_out() {
        let provider = MockProvider::new()
            .with_result(MockProvider::numbered_rows(1000))
            .with_row_delay(std::time::Duration::from_millis(10));
        let outcome = ConnectionTestRunner::new(&provider)
            .run(&config().with_command("select * from orders").with_timeout(2))
            .await;

        assert!(!outcome.success);
        assert!(outcome.connect.is_some());
        let failure = outcome.failure.unwrap();
        assert_eq!(failure.category, "Command Error");
        assert!(failure.message.contains("Execution Timeout Expired"));
        assert!(provider.stats().rows_streamed < 1000);
        assert_eq!(provider.stats().closes, 1);
    }

    #[tokio::test]
    async fn test_blank_command_text_is_connection_only() {
        let provider = MockProvider::new();
        let outcome = ConnectionTestRunner::new(&provider)
            .run(&config().with_command(""))
            .await;
        assert!(outcome.success);
        assert!(outcome.execution.is_none());
    }

    #[tokio::test]
    async fn test_whitespace_command_fails_creation() {
        let provider = MockProvider::new();
        let outcome = ConnectionTestRunner::new(&provider)
            .run(&config().with_command("   "))
            .await;

        assert!(!outcome.success);
        let failure = outcome.failure.unwrap();
        assert_eq!(
            failure.message,
            DbTestError::command("CommandText property has not been initialized.").to_string()
        );
        assert_eq!(provider.stats().closes, 1);
    }
}
