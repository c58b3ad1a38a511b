//! Connection integration tests.
//!
//! Tests real provider connectivity and error handling.

use dbtest::config::{CursorMode, ProviderKind, RowLimit, TestConfiguration};
use dbtest::db::{adapter_for, Connection, OleDbProvider, ProviderAdapter, SqlClientProvider};
use dbtest::engine::ConnectionTestRunner;
use dbtest::error::DbTestError;

/// Helper to get the test connection string from environment.
fn get_test_connection_string() -> Option<String> {
    std::env::var("DBTEST_SQLSERVER").ok()
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_valid_credentials() {
    let Some(connect) = get_test_connection_string() else {
        eprintln!("Skipping test: DBTEST_SQLSERVER not set");
        return;
    };

    let connection = SqlClientProvider::new().open(&connect).await.unwrap();
    connection.close().await.unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn test_firehose_counts_server_rows() {
    let Some(connect) = get_test_connection_string() else {
        eprintln!("Skipping test: DBTEST_SQLSERVER not set");
        return;
    };

    let config = TestConfiguration::new(ProviderKind::SqlClient, connect)
        .with_command("select top (25) name from sys.all_objects");
    let adapter = adapter_for(config.provider);
    let outcome = ConnectionTestRunner::new(adapter.as_ref()).run(&config).await;

    assert!(outcome.success, "{:?}", outcome.failure);
    assert_eq!(outcome.rows_read(), Some(25));
}

#[tokio::test(flavor = "current_thread")]
async fn test_dataset_samples_server_rows() {
    let Some(connect) = get_test_connection_string() else {
        eprintln!("Skipping test: DBTEST_SQLSERVER not set");
        return;
    };

    let config = TestConfiguration::new(ProviderKind::SqlClient, connect)
        .with_command("select top (12) object_id, name, null as empty from sys.all_objects")
        .with_cursor(CursorMode::Dataset)
        .with_rows_to_display(RowLimit::Top(5));
    let adapter = adapter_for(config.provider);
    let outcome = ConnectionTestRunner::new(adapter.as_ref()).run(&config).await;

    assert!(outcome.success, "{:?}", outcome.failure);
    assert_eq!(outcome.rows_read(), Some(12));
    let report = outcome.report().unwrap();
    assert_eq!(report.row_count(), 5);
    assert_eq!(report.column_widths().len(), 3);
}

#[tokio::test(flavor = "current_thread")]
async fn test_server_error_is_command_failure() {
    let Some(connect) = get_test_connection_string() else {
        eprintln!("Skipping test: DBTEST_SQLSERVER not set");
        return;
    };

    let config = TestConfiguration::new(ProviderKind::SqlClient, connect)
        .with_command("select * from dbo.table_that_does_not_exist");
    let adapter = adapter_for(config.provider);
    let outcome = ConnectionTestRunner::new(adapter.as_ref()).run(&config).await;

    assert!(!outcome.success);
    assert!(outcome.connect.is_some());
    let failure = outcome.failure.unwrap();
    assert_eq!(failure.category, "Command Error");
    assert!(failure.message.contains("table_that_does_not_exist"));
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_host() {
    let result = SqlClientProvider::new()
        .open("Server=tcp:invalid.host.that.does.not.exist.local,1433;User Id=sa;Password=x;Connect Timeout=5")
        .await;
    let Err(error) = result else {
        panic!("expected a connection failure");
    };

    // The specific error message varies by system
    assert!(matches!(error, DbTestError::Connection { .. }));
    let error_msg = error.to_string().to_lowercase();
    assert!(
        error_msg.contains("connect") || error_msg.contains("timeout"),
        "Expected connection error, got: {}",
        error_msg
    );
}

#[tokio::test(flavor = "current_thread")]
async fn test_runner_reports_open_failure() {
    let config = TestConfiguration::new(
        ProviderKind::OleDb,
        "Provider=Microsoft.Jet.OLEDB.4.0;Data Source=orders.mdb",
    )
    .with_command("select * from orders");
    let provider = OleDbProvider::new();
    let outcome = ConnectionTestRunner::new(&provider).run(&config).await;

    assert!(!outcome.success);
    assert!(outcome.connect.is_none());
    assert!(outcome.failure.unwrap().message.contains("Microsoft.Jet.OLEDB.4.0"));
}

#[tokio::test(flavor = "current_thread")]
async fn test_malformed_connection_string() {
    let result = SqlClientProvider::new().open("Server='unterminated").await;
    assert!(matches!(result, Err(DbTestError::Connection { .. })));
}
