//! Console output for dbtest.
//!
//! Product output goes to stdout as timestamped lines; diagnostics go through
//! `tracing` to stderr. [`ConsoleLog`] is generic over the writer so tests can
//! capture what a run printed.

use crate::config::{CursorMode, TestConfiguration};
use crate::engine::TestOutcome;
use crate::error::{DbTestError, Result};
use chrono::{DateTime, Local};
use std::io::{self, Write};

/// Date and time part of the timestamp prefix; the seven fraction digits
/// and the AM/PM marker are appended by [`format_timestamp`].
const TIMESTAMP_DATE_TIME: &str = "%m/%d/%Y %I:%M:%S";

/// Writes product output lines.
pub struct ConsoleLog<W: Write> {
    out: W,
}

impl ConsoleLog<io::Stdout> {
    /// Creates a console log on stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleLog<W> {
    /// Creates a console log on any writer.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Writes `message` stamped with the current local time.
    pub fn log(&mut self, message: &str) -> Result<()> {
        self.log_at(Local::now(), message)
    }

    /// Writes `message` stamped with `time`.
    pub fn log_at(&mut self, time: DateTime<Local>, message: &str) -> Result<()> {
        let line = format!("{}  {}", format_timestamp(time), message);
        self.line(&line)
    }

    /// Writes a line without a timestamp.
    pub fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}").map_err(write_error)
    }

    /// Writes an empty line.
    pub fn blank(&mut self) -> Result<()> {
        writeln!(self.out).map_err(write_error)
    }

    /// Writes everything a finished run produced.
    pub fn outcome(&mut self, outcome: &TestOutcome) -> Result<()> {
        if let Some(connect) = &outcome.connect {
            self.log_at(
                connect.completed_at,
                &format!(
                    "Connected successfully in {} milliseconds.",
                    connect.elapsed.as_millis()
                ),
            )?;
        }

        if let Some(execution) = &outcome.execution {
            let ms = execution.timing.elapsed.as_millis();
            let message = match execution.mode {
                CursorMode::None => {
                    format!("Executed command successfully in {ms} milliseconds. No rows read.")
                }
                CursorMode::Dataset => format!(
                    "Executed command and filled DataSet successfully in {ms} milliseconds. {} rows read.",
                    execution.rows_read
                ),
                CursorMode::Firehose => format!(
                    "Executed command and streamed the rows in {ms} milliseconds. {} rows read.",
                    execution.rows_read
                ),
            };
            self.log_at(execution.timing.completed_at, &message)?;

            if let Some(bytes) = execution.memory_estimate {
                self.log_at(
                    execution.timing.completed_at,
                    &format!("Approximate memory usage: {} bytes", thousands(bytes)),
                )?;
            }

            if let Some(report) = &execution.report {
                self.blank()?;
                for line in report.lines() {
                    self.line(&line)?;
                }
                self.blank()?;
            }
        }

        match &outcome.failure {
            None => {
                self.line("Test Completed.")?;
                self.blank()
            }
            Some(failure) => {
                self.log("***** There was an exception thrown during the test *****")?;
                self.log(&failure.message)?;
                for line in &failure.trace {
                    self.log(line)?;
                }
                self.blank()
            }
        }
    }

    /// Writes the startup banner.
    pub fn banner(&mut self, banner: &Banner<'_>) -> Result<()> {
        for line in banner.lines() {
            self.line(&line)?;
        }
        self.flush()
    }

    /// Flushes the writer.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush().map_err(write_error)
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Startup details printed once before the first run.
#[derive(Debug, Clone)]
pub struct Banner<'a> {
    pub run_on: DateTime<Local>,
    pub run_by: &'a str,
    /// Command-line arguments, without the program name.
    pub arguments: &'a [String],
    pub config: &'a TestConfiguration,
}

impl Banner<'_> {
    /// Renders the banner, ending with a blank line.
    pub fn lines(&self) -> Vec<String> {
        let config = self.config;
        let mut lines = vec![
            format!("Database Test v{}", env!("CARGO_PKG_VERSION")),
            format!("Run on: {}", self.run_on.format("%m/%d/%Y %I:%M:%S %p")),
            format!("Run by: {}", self.run_by),
            String::new(),
            format!("Command Line Arguments: {}", self.arguments.join(" ")),
            format!("Provider Type:          {}", config.provider),
        ];

        if config.has_command() {
            let timeout = match config.command_timeout_secs {
                0 => "Infinite".to_string(),
                n => format!("{n} seconds"),
            };
            let rows = match config.cursor_mode {
                CursorMode::None => "N/A".to_string(),
                CursorMode::Dataset => config.rows_to_display.to_string(),
                CursorMode::Firehose => "None".to_string(),
            };
            lines.push(format!("Command Timeout:        {timeout}"));
            lines.push(format!("Cursor Type:            {}", config.cursor_mode));
            lines.push(format!("Rows to Display:        {rows}"));
        }

        if config.repeat_count > 1 {
            let delay = match config.delay_secs {
                1 => "1 second".to_string(),
                n => format!("{n} seconds"),
            };
            lines.push(format!("Test Runs:              {}", config.repeat_count));
            lines.push(format!("Delay Between Runs:     {delay}"));
            lines.push(format!(
                "Stop if Errors:         {}",
                if config.stop_on_error { "Yes" } else { "No" }
            ));
        }

        lines.push(String::new());
        lines
    }
}

/// Formats a console timestamp: `MM/DD/YYYY hh:mm:ss.fffffff AM/PM`.
///
/// chrono only offers 3, 6 or 9 fraction digits, so the 100ns ticks are
/// written separately.
pub fn format_timestamp(time: DateTime<Local>) -> String {
    // Leap seconds report nanos past 1e9
    let ticks = time.timestamp_subsec_nanos() % 1_000_000_000 / 100;
    format!(
        "{}.{:07} {}",
        time.format(TIMESTAMP_DATE_TIME),
        ticks,
        time.format("%p")
    )
}

/// Groups digits in threes: `1234567` becomes `1,234,567`.
pub fn thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

fn write_error(e: io::Error) -> DbTestError {
    DbTestError::internal(format!("Failed to write console output: {e}"))
}
