//! Command line and config file tests.

use dbtest::cli::Cli;
use dbtest::config::{CursorMode, FileConfig, ProviderKind, RowLimit};
use dbtest::error::DbTestError;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_file_defaults_and_named_connection() {
    let file = write_config(
        r#"
[defaults]
cursor = "dataset"
top = 20
delay = 3

[connections.accounting]
type = "odbc"
connect = "Driver={ODBC Driver 18 for SQL Server};Server=acct01;Database=Ledger"
"#,
    );
    let path = file.path().to_str().unwrap();

    let cli = Cli::try_parse_normalized([
        "dbtest",
        "/Config",
        path,
        "-CONNECT",
        "accounting",
        "-Command",
        "select * from journal",
        "-Repeat",
        "5",
    ])
    .unwrap();
    let file_config = FileConfig::load_from_file(&cli.config_path()).unwrap();
    let config = cli.resolve(&file_config).unwrap();

    assert_eq!(config.provider, ProviderKind::Odbc);
    assert_eq!(
        config.connection_string,
        "Driver={ODBC Driver 18 for SQL Server};Server=acct01;Database=Ledger"
    );
    assert_eq!(config.cursor_mode, CursorMode::Dataset);
    assert_eq!(config.rows_to_display, RowLimit::Top(20));
    assert_eq!(config.repeat_count, 5);
    assert_eq!(config.delay_secs, 3);
    assert!(!config.stop_on_error);
}

#[test]
fn test_cli_flags_override_file() {
    let file = write_config(
        r#"
[defaults]
type = "oledb"
cursor = "none"
stop_on_error = true
"#,
    );
    let file_config = FileConfig::load_from_file(file.path()).unwrap();

    let cli = Cli::try_parse_normalized([
        "dbtest",
        "-type",
        "sqlclient",
        "-cursor",
        "firehose",
        "-connect",
        "Server=db01;Database=Northwind",
    ])
    .unwrap();
    let config = cli.resolve(&file_config).unwrap();

    assert_eq!(config.provider, ProviderKind::SqlClient);
    assert_eq!(config.cursor_mode, CursorMode::Firehose);
    // A presence-only flag cannot be switched off from the command line
    assert!(config.stop_on_error);
}

#[test]
fn test_unknown_connection_name_is_used_verbatim() {
    let cli = Cli::try_parse_normalized(["dbtest", "-connect", "staging"]).unwrap();
    let config = cli.resolve(&FileConfig::default()).unwrap();
    assert_eq!(config.connection_string, "staging");
}

#[test]
fn test_malformed_config_file_is_rejected() {
    let file = write_config("[defaults\ntimeout = 5");
    let err = FileConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, DbTestError::Config(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_missing_connect_is_fatal() {
    let cli = Cli::try_parse_normalized(["dbtest", "-cursor", "dataset"]).unwrap();
    let err = cli.resolve(&FileConfig::default()).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.to_string(), "Argument error: The connect argument is required.");
}
