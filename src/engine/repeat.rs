//! The repeat / delay / stop-on-error loop.

use super::runner::ConnectionTestRunner;
use crate::config::TestConfiguration;
use crate::db::ProviderAdapter;
use crate::error::Result;
use crate::output::ConsoleLog;
use std::io::Write;
use tracing::info;

/// Counts of runs attempted and succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepeatSummary {
    pub attempted: u32,
    pub succeeded: u32,
}

impl RepeatSummary {
    /// Number of runs that failed.
    pub fn failed(&self) -> u32 {
        self.attempted - self.succeeded
    }

    /// Returns true when every attempted run succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

/// Runs the same test repeatedly with a fixed pause between runs.
pub struct RepeatController<'a> {
    runner: ConnectionTestRunner<'a>,
    config: &'a TestConfiguration,
}

impl<'a> RepeatController<'a> {
    pub fn new(adapter: &'a dyn ProviderAdapter, config: &'a TestConfiguration) -> Self {
        Self {
            runner: ConnectionTestRunner::new(adapter),
            config,
        }
    }

    /// Runs up to `repeat_count` tests, writing each run's output to `log`.
    ///
    /// Only console write failures are returned as errors.
    pub async fn run<W: Write>(&self, log: &mut ConsoleLog<W>) -> Result<RepeatSummary> {
        let mut summary = RepeatSummary::default();

        for run in 1..=self.config.repeat_count {
            if run > 1 {
                tokio::time::sleep(self.config.delay()).await;
            }

            log.log("Beginning Test ...")?;
            let outcome = self.runner.run(self.config).await;
            log.outcome(&outcome)?;
            log.flush()?;

            summary.attempted += 1;
            if outcome.success {
                summary.succeeded += 1;
            } else if self.config.stop_on_error {
                info!("Stopping after failed run {} of {}", run, self.config.repeat_count);
                break;
            }
        }

        log.line(&format!(
            "{} of {} test runs succeeded.",
            summary.succeeded, summary.attempted
        ))?;
        log.line("All Tests Complete.")?;
        log.flush()?;
        Ok(summary)
    }
}
