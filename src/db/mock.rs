//! Mock provider for testing.
//!
//! Serves a scripted result from memory, fails on chosen attempts, and counts
//! every call so tests can check how the engine drove it.

use super::{
    before_deadline, with_command_timeout, BufferedResult, Command, Connection, ProviderAdapter, ResultSet,
    RowCursor, Value,
};
use crate::config::ProviderKind;
use crate::error::{DbTestError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Snapshot of the calls a [`MockProvider`] has received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    pub opens: usize,
    pub closes: usize,
    pub non_queries: usize,
    pub readers: usize,
    pub fills: usize,
    pub rows_streamed: usize,
}

#[derive(Debug, Default)]
struct Counters {
    opens: AtomicUsize,
    closes: AtomicUsize,
    non_queries: AtomicUsize,
    readers: AtomicUsize,
    fills: AtomicUsize,
    rows_streamed: AtomicUsize,
}

impl Counters {
    fn bump(counter: &AtomicUsize) -> usize {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Which attempts (1-based) fail.
#[derive(Debug, Clone, Default)]
enum FailurePlan {
    #[default]
    Never,
    Always,
    On(HashSet<usize>),
}

impl FailurePlan {
    fn fails(&self, attempt: usize) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::On(attempts) => attempts.contains(&attempt),
        }
    }
}

/// A provider that returns predefined results.
#[derive(Debug, Clone)]
pub struct MockProvider {
    result_sets: Arc<Vec<ResultSet>>,
    open_failures: FailurePlan,
    command_failures: FailurePlan,
    execute_delay: Option<Duration>,
    row_delay: Option<Duration>,
    fail_close: bool,
    counters: Arc<Counters>,
}

impl MockProvider {
    /// Creates a mock provider whose commands return no result sets.
    pub fn new() -> Self {
        Self {
            result_sets: Arc::new(Vec::new()),
            open_failures: FailurePlan::Never,
            command_failures: FailurePlan::Never,
            execute_delay: None,
            row_delay: None,
            fail_close: false,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Returns `result` from every command.
    pub fn with_result(self, result: ResultSet) -> Self {
        self.with_result_sets(vec![result])
    }

    /// Returns several result sets from every command.
    pub fn with_result_sets(mut self, sets: Vec<ResultSet>) -> Self {
        self.result_sets = Arc::new(sets);
        self
    }

    /// Fails every open.
    pub fn fail_open_always(mut self) -> Self {
        self.open_failures = FailurePlan::Always;
        self
    }

    /// Fails the opens with these 1-based attempt numbers.
    pub fn fail_open_on(mut self, attempts: impl IntoIterator<Item = usize>) -> Self {
        self.open_failures = FailurePlan::On(attempts.into_iter().collect());
        self
    }

    /// Fails every command.
    pub fn fail_command_always(mut self) -> Self {
        self.command_failures = FailurePlan::Always;
        self
    }

    /// Fails commands on the connections opened by these attempts.
    pub fn fail_command_on(mut self, attempts: impl IntoIterator<Item = usize>) -> Self {
        self.command_failures = FailurePlan::On(attempts.into_iter().collect());
        self
    }

    /// Makes every command take this long before producing results.
    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = Some(delay);
        self
    }

    /// Makes every streamed row take this long to arrive.
    pub fn with_row_delay(mut self, delay: Duration) -> Self {
        self.row_delay = Some(delay);
        self
    }

    /// Makes closing a connection report an error.
    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Returns the calls received so far.
    pub fn stats(&self) -> MockStats {
        let c = &self.counters;
        MockStats {
            opens: c.opens.load(Ordering::SeqCst),
            closes: c.closes.load(Ordering::SeqCst),
            non_queries: c.non_queries.load(Ordering::SeqCst),
            readers: c.readers.load(Ordering::SeqCst),
            fills: c.fills.load(Ordering::SeqCst),
            rows_streamed: c.rows_streamed.load(Ordering::SeqCst),
        }
    }

    /// Builds an `id`, `name` result set with `rows` rows.
    pub fn numbered_rows(rows: usize) -> ResultSet {
        ResultSet::with_rows(
            vec!["id".to_string(), "name".to_string()],
            (1..=rows)
                .map(|i| vec![Value::Int(i as i64), Value::String(format!("row {i}"))])
                .collect(),
        )
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl ProviderAdapter for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::SqlClient
    }

    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>> {
        let attempt = Counters::bump(&self.counters.opens);
        if self.open_failures.fails(attempt) {
            return Err(DbTestError::connection_with(
                format!("Mock server refused attempt {attempt}."),
                std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    format!("connection refused: {connection_string}"),
                ),
            ));
        }
        Ok(Box::new(MockConnection {
            attempt,
            fail_commands: self.command_failures.fails(attempt),
            provider: self.clone(),
        }))
    }
}

struct MockConnection {
    attempt: usize,
    fail_commands: bool,
    provider: MockProvider,
}

impl MockConnection {
    async fn run(&self, command: &Command) -> Result<()> {
        let delay = self.provider.execute_delay;
        with_command_timeout(command.timeout, async {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        })
        .await?;

        if self.fail_commands {
            return Err(DbTestError::command(format!(
                "Mock command failed on attempt {}: {}",
                self.attempt, command.text
            )));
        }
        Ok(())
    }
}

#[async_trait(?Send)]
impl Connection for MockConnection {
    async fn execute_non_query(&mut self, command: &Command) -> Result<()> {
        Counters::bump(&self.provider.counters.non_queries);
        self.run(command).await
    }

    async fn execute_reader<'a>(&'a mut self, command: &Command) -> Result<Box<dyn RowCursor + 'a>> {
        Counters::bump(&self.provider.counters.readers);
        let deadline = command.deadline();
        self.run(command).await?;
        let remaining = self
            .provider
            .result_sets
            .first()
            .map(ResultSet::row_count)
            .unwrap_or(0);
        Ok(Box::new(MockCursor {
            remaining,
            deadline,
            row_delay: self.provider.row_delay,
            counters: &self.provider.counters,
        }))
    }

    async fn fill_buffered(&mut self, command: &Command) -> Result<BufferedResult> {
        Counters::bump(&self.provider.counters.fills);
        self.run(command).await?;
        Ok(BufferedResult::new(self.provider.result_sets.as_ref().clone()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Counters::bump(&self.provider.counters.closes);
        if self.provider.fail_close {
            return Err(DbTestError::connection("Mock connection reset during close."));
        }
        Ok(())
    }
}

/// Counts down rows without holding any row data.
struct MockCursor<'a> {
    remaining: usize,
    deadline: Option<Instant>,
    row_delay: Option<Duration>,
    counters: &'a Counters,
}

#[async_trait(?Send)]
impl RowCursor for MockCursor<'_> {
    async fn advance(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            return Ok(false);
        }
        if let Some(delay) = self.row_delay {
            before_deadline(self.deadline, async {
                tokio::time::sleep(delay).await;
                Ok(())
            })
            .await?;
        }
        self.remaining -= 1;
        Counters::bump(&self.counters.rows_streamed);
        Ok(true)
    }
}
