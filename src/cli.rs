//! Command-line argument parsing for dbtest.
//!
//! Flags are accepted with `-`, `--` or `/` and in any case
//! (`-Connect`, `/TOP`, `--stoponerror`). [`normalize_args`] rewrites them
//! to clap's `--lowercase` form before parsing; [`Cli::resolve`] then merges
//! the config file and validates everything into a [`TestConfiguration`].

use crate::config::{
    CursorMode, FileConfig, ProviderKind, RowLimit, TestConfiguration, CONFIG_ENV_VAR,
    DEFAULT_DELAY_SECS, DEFAULT_REPEAT_COUNT, DEFAULT_ROWS_TO_DISPLAY, DEFAULT_TIMEOUT_SECS,
};
use crate::error::{DbTestError, Result};
use clap::Parser;
use std::path::PathBuf;

/// Flags that take a value.
const VALUE_FLAGS: &[&str] = &[
    "type", "connect", "command", "timeout", "cursor", "top", "repeat", "delay", "config",
];

/// Flags that stand alone.
const SWITCH_FLAGS: &[&str] = &["stoponerror", "help", "version"];

/// Usage text printed after an argument error.
pub const USAGE: &str = r#"Database Connection Test - Invalid command line arguments

USAGE:

     dbtest [-type SqlClient|ODBC|OLEDB] -connect "connectionstring"
            [-command "command"] [-timeout seconds] [-cursor Firehose|DataSet|None] [-top rows-to-display]
            [-repeat n] [-delay seconds] [-stopOnError] [-config path]

     Default type    = SqlClient
     Default timeout = 30 seconds (0 = infinite CommandTimeout)
     Default cursor  = Firehose
     Default top     = 10 (all rows = -1) - applies to DataSet cursor only
     Default repeat  =  1
     Default delay   =  1

     -stopOnError terminates repeated commands after the first error
     -connect also accepts the name of a [connections.<name>] entry in the config file

EXAMPLES:

     dbtest -connect "server=SQLProd01;database=NorthWind;integrated security=sspi" -command "select * from customers"
     dbtest -type ODBC -connect "DSN=Accounting;trusted_connection=yes" -command "select * from customers" -top 20
     dbtest -type OLEDB -connect "Provider=SQLNCLI11;Data Source=SQLProd01;Initial Catalog=NorthWind;Integrated Security=SSPI;OLE DB Services=-4" -repeat 100 -stoponerror
"#;

/// Database connectivity and query performance test.
#[derive(Parser, Debug)]
#[command(name = "dbtest")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Provider type: SqlClient, Odbc, or OleDb
    #[arg(long = "type", value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Connection string, or the name of a connection in the config file
    #[arg(long, value_name = "CONNECTION_STRING")]
    pub connect: Option<String>,

    /// Command to execute after connecting
    #[arg(long = "command", value_name = "SQL")]
    pub command_text: Option<String>,

    /// Command timeout in seconds (0 = infinite)
    #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
    pub timeout: Option<i64>,

    /// Cursor type: Firehose, DataSet, or None
    #[arg(long, value_name = "CURSOR")]
    pub cursor: Option<String>,

    /// Rows to display in DataSet mode (-1 = all)
    #[arg(long, value_name = "ROWS", allow_negative_numbers = true)]
    pub top: Option<i64>,

    /// Number of test runs
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub repeat: Option<i64>,

    /// Delay between runs in seconds
    #[arg(long, value_name = "SECONDS", allow_negative_numbers = true)]
    pub delay: Option<i64>,

    /// Stop repeating after the first failed run
    #[arg(long = "stoponerror")]
    pub stop_on_error: bool,

    /// Config file path
    #[arg(long, value_name = "PATH", env = CONFIG_ENV_VAR)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parses arguments in any of the accepted flag spellings.
    pub fn try_parse_normalized<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::try_parse_from(normalize_args(args))
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(FileConfig::default_path)
    }

    /// Validates the arguments and merges in config file values.
    ///
    /// Precedence: command line, then the named connection's type, then the
    /// file's `[defaults]`, then built-in defaults.
    pub fn resolve(&self, file: &FileConfig) -> Result<TestConfiguration> {
        let connect = self
            .connect
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DbTestError::argument("The connect argument is required."))?;

        let named = file.get_connection(connect);
        let connection_string = named.map_or(connect, |n| n.connect.as_str());
        if connection_string.trim().is_empty() {
            return Err(DbTestError::argument(format!(
                "The connection '{connect}' has an empty connect value."
            )));
        }

        let defaults = &file.defaults;

        let provider_name = self
            .provider
            .as_deref()
            .or_else(|| named.and_then(|n| n.provider.as_deref()))
            .or(defaults.provider.as_deref());
        let provider = match provider_name {
            Some(name) => ProviderKind::parse(name).ok_or_else(|| {
                DbTestError::argument("The provider type must be SqlClient, ODBC, or OLEDB.")
            })?,
            None => ProviderKind::default(),
        };

        let timeout = self
            .timeout
            .or(defaults.timeout.map(i64::from))
            .unwrap_or(DEFAULT_TIMEOUT_SECS.into());
        let timeout = u32::try_from(timeout).map_err(|_| {
            DbTestError::argument("The timeout value must be numeric and 0 or higher.")
        })?;

        let cursor = match self.cursor.as_deref().or(defaults.cursor.as_deref()) {
            Some(name) => CursorMode::parse(name).ok_or_else(|| {
                DbTestError::argument("The cursor type must be FireHose, DataSet, or None.")
            })?,
            None => CursorMode::default(),
        };

        let top = self.top.or(defaults.top).unwrap_or(DEFAULT_ROWS_TO_DISPLAY);
        let rows_to_display = RowLimit::from_count(top).map_err(|_| {
            DbTestError::argument("The top value must be numeric and -1 or higher.")
        })?;

        let repeat = positive(
            self.repeat.or(defaults.repeat.map(i64::from)),
            DEFAULT_REPEAT_COUNT,
            "The repeat value must be numeric and 1 or higher.",
        )?;
        let delay = positive(
            self.delay.or(defaults.delay.map(i64::from)),
            DEFAULT_DELAY_SECS,
            "The delay value must be numeric and 1 or higher.",
        )?;
        let stop_on_error = self.stop_on_error || defaults.stop_on_error.unwrap_or(false);

        let command = self.command_text.clone().unwrap_or_default();

        Ok(TestConfiguration::new(provider, connection_string)
            .with_command(command)
            .with_timeout(timeout)
            .with_cursor(cursor)
            .with_rows_to_display(rows_to_display)
            .with_repeat(repeat, delay, stop_on_error))
    }
}

fn positive(value: Option<i64>, default: u32, message: &str) -> Result<u32> {
    let value = value.unwrap_or(default.into());
    match u32::try_from(value) {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(DbTestError::argument(message)),
    }
}

/// Rewrites flag spellings to `--lowercase`.
///
/// Tokens in value position are left alone, so `-top -1` and
/// `-command "-- comment"` keep their values.
pub fn normalize_args<I, T>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let mut iter = args.into_iter().map(Into::into);
    let mut normalized: Vec<String> = iter.next().into_iter().collect();
    let mut expecting_value = false;

    for arg in iter {
        if expecting_value {
            expecting_value = false;
            normalized.push(arg);
            continue;
        }

        let Some(body) = flag_body(&arg) else {
            normalized.push(arg);
            continue;
        };
        let (name, inline_value) = match body.split_once('=') {
            Some((name, value)) => (name.to_lowercase(), Some(value)),
            None => (body.to_lowercase(), None),
        };
        let name = match name.as_str() {
            "?" | "h" => "help".to_string(),
            _ => name,
        };

        if VALUE_FLAGS.contains(&name.as_str()) {
            match inline_value {
                Some(value) => normalized.push(format!("--{name}={value}")),
                None => {
                    normalized.push(format!("--{name}"));
                    expecting_value = true;
                }
            }
        } else if SWITCH_FLAGS.contains(&name.as_str()) && inline_value.is_none() {
            normalized.push(format!("--{name}"));
        } else {
            normalized.push(arg);
        }
    }
    normalized
}

fn flag_body(arg: &str) -> Option<&str> {
    arg.strip_prefix("--")
        .or_else(|| arg.strip_prefix('-'))
        .or_else(|| arg.strip_prefix('/'))
        .filter(|body| !body.is_empty())
}

/// Extracts the one-line reason from a clap error.
pub fn clap_reason(error: &clap::Error) -> String {
    let rendered = error.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}
