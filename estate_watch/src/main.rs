//! `estate_watch`: the rental-listing ingestion and lifecycle engine (§1).
//! Thin entry point: parsing happens here, everything else is dispatched
//! to `commands::*`.
#![warn(missing_debug_implementations, clippy::use_self)]

mod cli;
mod commands;
mod extractor;

use cli::{Cli, Command};
use observability_deps::tracing::error;
use std::sync::Arc;

/// Process exit codes. `1` is the generic fatal-error code (§7 "process
/// aborts with a non-zero exit"); `2` mirrors `clap`'s own usage-error
/// convention for a malformed CLI invocation caught before `main` runs.
const EXIT_FATAL: i32 = 1;

#[tokio::main]
async fn main() {
    let cli = Cli::load();

    if let Err(e) = trogging::install(&cli.config.logging) {
        eprintln!("failed to install logging: {e}");
        std::process::exit(EXIT_FATAL);
    }
    let metrics = Arc::new(metric::Registry::new());
    let _panic_log = panic_logging::PanicLogHandle::new(Arc::clone(&metrics));

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => commands::run::command(cli.config).await.map_err(commands::Error::from),
        Command::TriggerScrapeNow => commands::trigger_scrape_now::command(cli.config)
            .await
            .map_err(commands::Error::from),
        Command::RunCleanup(args) => commands::run_cleanup::command(cli.config, args)
            .await
            .map_err(commands::Error::from),
        Command::GetStats => commands::get_stats::command(cli.config).await.map_err(commands::Error::from),
        Command::GetQueueStats => commands::get_queue_stats::command(cli.config)
            .await
            .map_err(commands::Error::from),
    };

    if let Err(e) = result {
        error!(error = %e, "command failed");
        std::process::exit(EXIT_FATAL);
    }
}
