//! Administrative surface of §6: one module per subcommand, dispatched from
//! `main.rs`, each wrapping its collaborator's error in its own `thiserror`
//! variant.

pub mod get_queue_stats;
pub mod get_stats;
pub mod run;
pub mod run_cleanup;
pub mod trigger_scrape_now;
pub mod wiring;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("run: {0}")]
    Run(#[from] run::Error),

    #[error("trigger-scrape-now: {0}")]
    TriggerScrapeNow(#[from] trigger_scrape_now::Error),

    #[error("run-cleanup: {0}")]
    RunCleanup(#[from] run_cleanup::Error),

    #[error("get-stats: {0}")]
    GetStats(#[from] get_stats::Error),

    #[error("get-queue-stats: {0}")]
    GetQueueStats(#[from] get_queue_stats::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
