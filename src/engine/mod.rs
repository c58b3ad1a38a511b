//! Test execution engine.
//!
//! [`RepeatController`] drives [`ConnectionTestRunner`], which opens a
//! connection and hands the command to a [`CursorStrategy`].

mod cursor;
mod outcome;
mod repeat;
mod runner;

pub use cursor::{sample_rows, strategy_for, CursorStrategy, Dataset, Firehose, NonQuery};
pub use outcome::{ExecutionStats, FailureDetail, TestOutcome, Timed};
pub use repeat::{RepeatController, RepeatSummary};
pub use runner::ConnectionTestRunner;
