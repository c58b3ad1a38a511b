//! Cursor strategies: how a command's rows are consumed.
//!
//! The strategy is picked from configuration before the command runs, never
//! from the shape of the result:
//!
//! - [`NonQuery`] executes and reads nothing.
//! - [`Dataset`] buffers every row, then samples some of them into a table.
//! - [`Firehose`] streams and counts rows without keeping them.

use super::outcome::{ExecutionStats, Timed};
use crate::config::{CursorMode, RowLimit, TestConfiguration};
use crate::db::{Command, Connection, ResultSet};
use crate::error::Result;
use crate::report::TabularReport;
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

/// Executes a command on an open connection in one cursor mode.
#[async_trait(?Send)]
pub trait CursorStrategy {
    /// The mode this strategy implements.
    fn mode(&self) -> CursorMode;

    /// Runs the command and reports timing and row accounting.
    async fn execute(&self, connection: &mut dyn Connection, command: &Command)
        -> Result<ExecutionStats>;
}

/// Returns the strategy selected by `config`.
pub fn strategy_for(config: &TestConfiguration) -> Box<dyn CursorStrategy> {
    match config.cursor_mode {
        CursorMode::None => Box::new(NonQuery),
        CursorMode::Dataset => Box::new(Dataset::new(config.rows_to_display)),
        CursorMode::Firehose => Box::new(Firehose),
    }
}

/// Executes the command for its side effects only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonQuery;

#[async_trait(?Send)]
impl CursorStrategy for NonQuery {
    fn mode(&self) -> CursorMode {
        CursorMode::None
    }

    async fn execute(
        &self,
        connection: &mut dyn Connection,
        command: &Command,
    ) -> Result<ExecutionStats> {
        let start = Instant::now();
        connection.execute_non_query(command).await?;
        let timing = Timed::since(start);

        Ok(ExecutionStats {
            mode: self.mode(),
            timing,
            rows_read: 0,
            memory_estimate: None,
            report: None,
        })
    }
}

/// Buffers the whole result in memory.
#[derive(Debug, Clone, Copy)]
pub struct Dataset {
    rows_to_display: RowLimit,
}

impl Dataset {
    pub fn new(rows_to_display: RowLimit) -> Self {
        Self { rows_to_display }
    }
}

#[async_trait(?Send)]
impl CursorStrategy for Dataset {
    fn mode(&self) -> CursorMode {
        CursorMode::Dataset
    }

    async fn execute(
        &self,
        connection: &mut dyn Connection,
        command: &Command,
    ) -> Result<ExecutionStats> {
        let start = Instant::now();
        let buffered = connection.fill_buffered(command).await?;
        let timing = Timed::since(start);

        // Formatting happens outside the timed interval
        let first = buffered.first();
        let rows_read = first.map_or(0, ResultSet::row_count);
        let memory_estimate = buffered.approximate_size();
        debug!(
            result_sets = buffered.result_sets.len(),
            rows_read, memory_estimate, "Filled buffered result"
        );

        let report = match first {
            Some(set) if self.rows_to_display.is_enabled() => {
                Some(sample_rows(set, self.rows_to_display)?)
            }
            _ => None,
        };

        Ok(ExecutionStats {
            mode: self.mode(),
            timing,
            rows_read,
            memory_estimate: Some(memory_estimate),
            report,
        })
    }
}

/// Builds a left-aligned table from the first rows of `set`.
pub fn sample_rows(set: &ResultSet, limit: RowLimit) -> Result<TabularReport> {
    let specs: Vec<String> = set.columns.iter().map(|name| format!("{name}:L")).collect();
    let mut report = TabularReport::from_specs(specs.as_slice())?;
    for row in set.rows.iter().take(limit.rows_to_show(set.row_count())) {
        report.add_row(row.iter().map(|value| value.to_display_string()).collect())?;
    }
    Ok(report)
}

/// Streams rows forward-only and discards them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Firehose;

#[async_trait(?Send)]
impl CursorStrategy for Firehose {
    fn mode(&self) -> CursorMode {
        CursorMode::Firehose
    }

    async fn execute(
        &self,
        connection: &mut dyn Connection,
        command: &Command,
    ) -> Result<ExecutionStats> {
        let start = Instant::now();
        let mut rows_read = 0;
        {
            let mut cursor = connection.execute_reader(command).await?;
            while cursor.advance().await? {
                rows_read += 1;
            }
        }
        let timing = Timed::since(start);

        Ok(ExecutionStats {
            mode: self.mode(),
            timing,
            rows_read,
            memory_estimate: None,
            report: None,
        })
    }
}
