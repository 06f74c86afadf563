//! Top-level CLI shape: `watch_config::Config`'s flags plus an optional
//! administrative subcommand (§6 "Administrative commands") — all-in-one
//! flags flattened, subcommand optional and defaulting to the main server
//! mode.

use observability_deps::tracing::warn;
use watch_config::Config;

#[derive(Debug, clap::Parser)]
#[clap(name = "estate_watch", about = "Rental listing ingestion and lifecycle engine")]
pub struct Cli {
    #[clap(flatten)]
    pub config: Config,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Parses from `std::env::args`, first loading a `.env` file the same
    /// way `watch_config::Config::load` does, so `Config`'s own `env`
    /// attributes see those values regardless of which binding loads it.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => warn!(?path, "loaded .env file"),
            Err(dotenvy::Error::Io(_)) => {}
            Err(e) => warn!(error=%e, "failed to parse .env file"),
        }
        <Self as clap::Parser>::parse()
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Run the engine continuously: Scheduler, Worker and Cleaner as three
    /// cooperating tasks sharing the process (§5). The default when no
    /// subcommand is given.
    Run,

    /// Fire one daily differential reconciliation immediately instead of
    /// waiting for `scraper.daily-run-time` (§6 "trigger-scrape-now").
    TriggerScrapeNow,

    /// Run one retention-based physical purge immediately (§6
    /// "run-cleanup", §4.10). Flags default to the `cleaner.*` config
    /// section's own defaults.
    RunCleanup(crate::commands::run_cleanup::Args),

    /// Print catalog + scraping-state + breaker summary statistics (§6
    /// "get-stats", §B.6).
    GetStats,

    /// Print per-status retry-queue counts (§6 "get-queue-stats", §B.6).
    GetQueueStats,
}
