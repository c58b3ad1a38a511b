//! Configuration management for dbtest.
//!
//! Holds the immutable [`TestConfiguration`] every component reads, and the
//! optional TOML file that supplies default values and named connections.

use crate::error::{DbTestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default command timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u32 = 30;

/// Default number of rows displayed in Dataset mode.
pub const DEFAULT_ROWS_TO_DISPLAY: i64 = 10;

/// Default number of test runs.
pub const DEFAULT_REPEAT_COUNT: u32 = 1;

/// Default delay between runs in seconds.
pub const DEFAULT_DELAY_SECS: u32 = 1;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "DBTEST_CONFIG";

/// Database access backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    #[default]
    SqlClient,
    Odbc,
    OleDb,
}

impl ProviderKind {
    /// Parses a provider kind, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlclient" => Some(Self::SqlClient),
            "odbc" => Some(Self::Odbc),
            "oledb" => Some(Self::OleDb),
            _ => None,
        }
    }

    /// Returns the canonical name of the provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SqlClient => "SqlClient",
            Self::Odbc => "Odbc",
            Self::OleDb => "OleDb",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row-handling strategy for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorMode {
    /// No results expected; the command is executed as a non-query.
    None,
    /// Buffer the entire result in memory.
    Dataset,
    /// Stream rows forward-only and discard them.
    #[default]
    Firehose,
}

impl CursorMode {
    /// Parses a cursor mode, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "dataset" => Some(Self::Dataset),
            "firehose" => Some(Self::Firehose),
            _ => None,
        }
    }

    /// Returns the canonical name of the cursor mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Dataset => "DataSet",
            Self::Firehose => "Firehose",
        }
    }
}

impl fmt::Display for CursorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many buffered rows are shown in Dataset mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLimit {
    /// Show every row (`-top -1`).
    All,
    /// Show no table at all (`-top 0`).
    Suppressed,
    /// Show at most this many rows.
    Top(usize),
}

impl RowLimit {
    /// Converts the `-top` integer form into a limit.
    pub fn from_count(count: i64) -> Result<Self> {
        match count {
            -1 => Ok(Self::All),
            0 => Ok(Self::Suppressed),
            n if n > 0 => Ok(Self::Top(n as usize)),
            n => Err(DbTestError::argument(format!(
                "The top value must be -1 or higher, got {n}."
            ))),
        }
    }

    /// Number of rows to display out of `total` fetched rows.
    pub fn rows_to_show(&self, total: usize) -> usize {
        match self {
            Self::All => total,
            Self::Suppressed => 0,
            Self::Top(n) => (*n).min(total),
        }
    }

    /// Returns true when a table should be produced.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Suppressed)
    }
}

impl Default for RowLimit {
    fn default() -> Self {
        Self::Top(DEFAULT_ROWS_TO_DISPLAY as usize)
    }
}

impl fmt::Display for RowLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::Suppressed => f.write_str("0"),
            Self::Top(n) => write!(f, "{n}"),
        }
    }
}

/// The validated settings for a test session.
///
/// Built once at startup and passed by reference into every component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfiguration {
    pub provider: ProviderKind,
    pub connection_string: String,
    /// Empty means a connection-only test.
    pub command_text: String,
    /// Zero means no timeout.
    pub command_timeout_secs: u32,
    pub cursor_mode: CursorMode,
    pub rows_to_display: RowLimit,
    pub repeat_count: u32,
    pub delay_secs: u32,
    pub stop_on_error: bool,
}

impl TestConfiguration {
    /// Creates a configuration with default settings for the given connection.
    pub fn new(provider: ProviderKind, connection_string: impl Into<String>) -> Self {
        Self {
            provider,
            connection_string: connection_string.into(),
            command_text: String::new(),
            command_timeout_secs: DEFAULT_TIMEOUT_SECS,
            cursor_mode: CursorMode::default(),
            rows_to_display: RowLimit::default(),
            repeat_count: DEFAULT_REPEAT_COUNT,
            delay_secs: DEFAULT_DELAY_SECS,
            stop_on_error: false,
        }
    }

    /// Sets the command text.
    pub fn with_command(mut self, text: impl Into<String>) -> Self {
        self.command_text = text.into();
        self
    }

    /// Sets the cursor mode.
    pub fn with_cursor(mut self, mode: CursorMode) -> Self {
        self.cursor_mode = mode;
        self
    }

    /// Sets the number of rows to display.
    pub fn with_rows_to_display(mut self, limit: RowLimit) -> Self {
        self.rows_to_display = limit;
        self
    }

    /// Sets the repeat count, delay, and stop-on-error policy.
    pub fn with_repeat(mut self, count: u32, delay_secs: u32, stop_on_error: bool) -> Self {
        self.repeat_count = count;
        self.delay_secs = delay_secs;
        self.stop_on_error = stop_on_error;
        self
    }

    /// Sets the command timeout in seconds.
    pub fn with_timeout(mut self, secs: u32) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    /// Returns true when a command should be executed after connecting.
    pub fn has_command(&self) -> bool {
        !self.command_text.is_empty()
    }

    /// Returns the pause between consecutive runs.
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs.into())
    }
}

/// Contents of the optional config file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Defaults for flags not given on the command line.
    #[serde(default)]
    pub defaults: FileDefaults,

    /// Named connections, selectable with `-connect <name>`.
    #[serde(default)]
    pub connections: HashMap<String, NamedConnection>,
}

/// Default values for optional flags.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileDefaults {
    #[serde(rename = "type")]
    pub provider: Option<String>,
    pub timeout: Option<u32>,
    pub cursor: Option<String>,
    pub top: Option<i64>,
    pub repeat: Option<u32>,
    pub delay: Option<u32>,
    pub stop_on_error: Option<bool>,
}

/// A connection string stored under a name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedConnection {
    #[serde(rename = "type")]
    pub provider: Option<String>,
    pub connect: String,
}

impl FileConfig {
    /// Returns the default config file path for the current platform.
    ///
    /// `DBTEST_CONFIG` takes precedence over the platform config directory.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dbtest")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| DbTestError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            DbTestError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Looks up a named connection.
    ///
    /// Connection strings always contain `=`, so a value containing one is
    /// never treated as a name.
    pub fn get_connection(&self, name: &str) -> Option<&NamedConnection> {
        if name.contains('=') {
            return None;
        }
        self.connections.get(name)
    }
}
