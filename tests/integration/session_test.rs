//! Full test session tests.
//!
//! Drives the repeat loop against the mock provider and checks the console
//! output an operator would see.

use dbtest::config::{CursorMode, ProviderKind, RowLimit, TestConfiguration};
use dbtest::db::MockProvider;
use dbtest::engine::{RepeatController, RepeatSummary};
use dbtest::output::ConsoleLog;
use pretty_assertions::assert_eq;

/// Strips the timestamp from a console line.
fn message(line: &str) -> &str {
    line.split_once("M  ").map_or(line, |(_, message)| message)
}

async fn run_session(provider: &MockProvider, config: &TestConfiguration) -> (RepeatSummary, Vec<String>) {
    let mut log = ConsoleLog::new(Vec::new());
    let summary = RepeatController::new(provider, config)
        .run(&mut log)
        .await
        .unwrap();
    let text = String::from_utf8(log.into_inner()).unwrap();
    let lines = text.lines().map(|line| message(line).to_string()).collect();
    (summary, lines)
}

fn ms_prefix(line: &str) -> String {
    // "... in 12 milliseconds. ..." -> "... in N milliseconds. ..."
    let mut words: Vec<&str> = line.split(' ').collect();
    if let Some(i) = words.iter().position(|w| *w == "milliseconds.") {
        words[i - 1] = "N";
    }
    words.join(" ")
}

#[tokio::test(start_paused = true)]
async fn test_dataset_all_rows_session() {
    let provider = MockProvider::new().with_result(MockProvider::numbered_rows(25));
    let config = TestConfiguration::new(ProviderKind::SqlClient, "Server=mock")
        .with_command("select * from orders")
        .with_cursor(CursorMode::Dataset)
        .with_rows_to_display(RowLimit::All);

    let (summary, lines) = run_session(&provider, &config).await;
    assert_eq!(summary, RepeatSummary { attempted: 1, succeeded: 1 });

    assert_eq!(lines[0], "Beginning Test ...");
    assert_eq!(ms_prefix(&lines[1]), "Connected successfully in N milliseconds.");
    assert_eq!(
        ms_prefix(&lines[2]),
        "Executed command and filled DataSet successfully in N milliseconds. 25 rows read."
    );
    assert!(lines[3].starts_with("Approximate memory usage: "));
    assert_eq!(lines[4], "");
    assert_eq!(lines[5], "id  name  ");
    assert_eq!(lines[6], "----------");
    assert_eq!(lines[7], "1   row 1 ");
    assert_eq!(lines[31], "25  row 25");
    assert_eq!(lines[32], "");
    assert_eq!(
        lines[33..],
        [
            "Test Completed.",
            "",
            "1 of 1 test runs succeeded.",
            "All Tests Complete."
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dataset_suppressed_table() {
    let provider = MockProvider::new().with_result(MockProvider::numbered_rows(25));
    let config = TestConfiguration::new(ProviderKind::SqlClient, "Server=mock")
        .with_command("select * from orders")
        .with_cursor(CursorMode::Dataset)
        .with_rows_to_display(RowLimit::Suppressed);

    let (_, lines) = run_session(&provider, &config).await;
    assert!(lines[2].ends_with("25 rows read."));
    assert!(lines[3].starts_with("Approximate memory usage: "));
    assert_eq!(lines[4], "Test Completed.");
    assert!(!lines.iter().any(|line| line.starts_with("---")));
}

#[tokio::test(start_paused = true)]
async fn test_firehose_session_never_buffers() {
    let provider = MockProvider::new().with_result(MockProvider::numbered_rows(500));
    let config = TestConfiguration::new(ProviderKind::SqlClient, "Server=mock")
        .with_command("select * from orders")
        .with_repeat(3, 1, false);

    let (summary, lines) = run_session(&provider, &config).await;
    assert_eq!(summary.succeeded, 3);

    let streamed: Vec<&String> = lines
        .iter()
        .filter(|line| line.starts_with("Executed command and streamed"))
        .collect();
    assert_eq!(streamed.len(), 3);
    assert!(streamed.iter().all(|line| line.ends_with("500 rows read.")));

    let stats = provider.stats();
    assert_eq!(stats.rows_streamed, 1500);
    assert_eq!(stats.fills, 0);
    assert_eq!(stats.opens, stats.closes);
}

#[tokio::test(start_paused = true)]
async fn test_none_mode_session() {
    let provider = MockProvider::new();
    let config = TestConfiguration::new(ProviderKind::SqlClient, "Server=mock")
        .with_command("update orders set shipped = 1")
        .with_cursor(CursorMode::None);

    let (_, lines) = run_session(&provider, &config).await;
    assert_eq!(
        ms_prefix(&lines[2]),
        "Executed command successfully in N milliseconds. No rows read."
    );
    assert_eq!(lines[3], "Test Completed.");
    assert_eq!(provider.stats().non_queries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failures_without_stop_run_every_iteration() {
    let provider = MockProvider::new().fail_open_on([1, 3]);
    let config = TestConfiguration::new(ProviderKind::SqlClient, "Server=mock")
        .with_repeat(4, 1, false);

    let (summary, lines) = run_session(&provider, &config).await;
    assert_eq!(summary, RepeatSummary { attempted: 4, succeeded: 2 });
    assert_eq!(
        lines
            .iter()
            .filter(|line| *line == "***** There was an exception thrown during the test *****")
            .count(),
        2
    );
    assert_eq!(lines[lines.len() - 2], "2 of 4 test runs succeeded.");
    assert_eq!(lines[lines.len() - 1], "All Tests Complete.");
}

#[tokio::test(start_paused = true)]
async fn test_stop_on_error_session() {
    let provider = MockProvider::new().fail_command_on([2]);
    let config = TestConfiguration::new(ProviderKind::SqlClient, "Server=mock")
        .with_command("select * from orders")
        .with_repeat(50, 1, true);

    let (summary, lines) = run_session(&provider, &config).await;
    assert_eq!(summary, RepeatSummary { attempted: 2, succeeded: 1 });
    assert_eq!(lines.iter().filter(|l| *l == "Beginning Test ...").count(), 2);

    // The failed run still reports its connection before the exception
    let failure = lines
        .iter()
        .position(|l| l == "***** There was an exception thrown during the test *****")
        .unwrap();
    assert!(lines[failure - 1].starts_with("Connected successfully in "));
    assert!(lines[failure + 1].starts_with("Command error: Mock command failed on attempt 2"));
    assert_eq!(lines.last().unwrap(), "All Tests Complete.");
}
