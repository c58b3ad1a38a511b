//! dbtest - database connectivity and query performance testing.

use chrono::Local;
use clap::error::ErrorKind;
use dbtest::cli::{self, Cli};
use dbtest::config::FileConfig;
use dbtest::db::adapter_for;
use dbtest::engine::RepeatController;
use dbtest::error::{DbTestError, Result};
use dbtest::logging;
use dbtest::output::{Banner, ConsoleLog};
use tracing::{error, info};

/// Every attempted run succeeded.
const EXIT_SUCCESS: i32 = 0;
/// At least one run failed.
const EXIT_TEST_FAILED: i32 = 1;
/// The arguments or config file were rejected; nothing ran.
const EXIT_BAD_ARGUMENTS: i32 = 2;

fn main() {
    logging::init_stderr_logging();

    let code = match run() {
        Ok(code) => code,
        Err(e) if e.is_fatal() => bad_arguments(&e.reason()),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            EXIT_TEST_FAILED
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let args: Vec<String> = std::env::args().collect();

    let cli = match Cli::try_parse_normalized(args.iter().cloned()) {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{e}");
            return Ok(EXIT_SUCCESS);
        }
        Err(e) => return Err(DbTestError::argument(cli::clap_reason(&e))),
    };

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let file = FileConfig::load_from_file(&config_path)?;
    let config = cli.resolve(&file)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| DbTestError::internal(format!("Failed to start the async runtime: {e}")))?;

    let mut log = ConsoleLog::stdout();
    let run_by = current_user();
    log.banner(&Banner {
        run_on: Local::now(),
        run_by: &run_by,
        arguments: args.get(1..).unwrap_or_default(),
        config: &config,
    })?;

    let adapter = adapter_for(config.provider);
    let summary = runtime.block_on(RepeatController::new(adapter.as_ref(), &config).run(&mut log))?;
    info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        "Test session finished"
    );

    Ok(if summary.all_succeeded() {
        EXIT_SUCCESS
    } else {
        EXIT_TEST_FAILED
    })
}

fn bad_arguments(reason: &str) -> i32 {
    println!("Bad arguments: {reason}");
    print!("{}", cli::USAGE);
    EXIT_BAD_ARGUMENTS
}

fn current_user() -> String {
    let user = std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_else(|_| "unknown".to_string());
    match std::env::var("USERDOMAIN") {
        Ok(domain) => format!("{domain}\\{user}"),
        Err(_) => user,
    }
}
