//! Per-run results.

use crate::config::CursorMode;
use crate::error::DbTestError;
use crate::report::TabularReport;
use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::time::Instant;

/// A timed step: how long it took and when it finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timed {
    pub elapsed: Duration,
    pub completed_at: DateTime<Local>,
}

impl Timed {
    pub fn new(elapsed: Duration, completed_at: DateTime<Local>) -> Self {
        Self {
            elapsed,
            completed_at,
        }
    }

    /// Measures from `start` to now.
    pub fn since(start: Instant) -> Self {
        Self::new(start.elapsed(), Local::now())
    }
}

/// What executing the command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionStats {
    pub mode: CursorMode,
    pub timing: Timed,
    /// Always zero in None mode.
    pub rows_read: usize,
    /// Approximate bytes held by a buffered result (Dataset only).
    pub memory_estimate: Option<usize>,
    /// Sampled rows (Dataset with display enabled only).
    pub report: Option<TabularReport>,
}

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDetail {
    pub category: &'static str,
    pub message: String,
    pub trace: Vec<String>,
}

impl From<&DbTestError> for FailureDetail {
    fn from(error: &DbTestError) -> Self {
        Self {
            category: error.category(),
            message: error.to_string(),
            trace: error.trace(),
        }
    }
}

/// The result of one connection test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub success: bool,
    /// Absent when the connection could not be opened.
    pub connect: Option<Timed>,
    /// Present only when a command ran to completion.
    pub execution: Option<ExecutionStats>,
    pub failure: Option<FailureDetail>,
}

impl TestOutcome {
    /// A run that connected and, if there was a command, executed it.
    pub fn succeeded(connect: Timed, execution: Option<ExecutionStats>) -> Self {
        Self {
            success: true,
            connect: Some(connect),
            execution,
            failure: None,
        }
    }

    /// A run that failed, keeping the connect timing when the open succeeded.
    pub fn failed(connect: Option<Timed>, error: &DbTestError) -> Self {
        Self {
            success: false,
            connect,
            execution: None,
            failure: Some(error.into()),
        }
    }

    /// Rows read by the command. `None` when no rows could be read.
    pub fn rows_read(&self) -> Option<usize> {
        self.execution
            .as_ref()
            .filter(|stats| stats.mode != CursorMode::None)
            .map(|stats| stats.rows_read)
    }

    /// The sampled row table, if one was built.
    pub fn report(&self) -> Option<&TabularReport> {
        self.execution.as_ref().and_then(|stats| stats.report.as_ref())
    }
}
