use cleaner::{Cleaner, CleanerConfig};
use std::time::Duration;
use tracker::JobToken;
use watch_config::Config;

use crate::commands::wiring::{self, Error as WiringError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to wire up collaborators: {0}")]
    Wiring(#[from] WiringError),

    #[error("cleaner run failed: {0}")]
    Cleaner(#[from] cleaner::Error),

    #[error("failed to render purge outcome as JSON: {0}")]
    Render(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// `run-cleanup` admin command flags (§6). Each defaults to the `cleaner.*`
/// config section's own value when omitted, so `estate_watch run-cleanup`
/// with no flags behaves exactly like the always-on weekly loop's next
/// scheduled run fired early.
#[derive(Debug, Clone, clap::Parser)]
pub struct Args {
    /// Overrides `cleaner.retention-days` (§4.10 default 90).
    #[clap(long = "retention-days")]
    pub retention_days: Option<u32>,

    /// Overrides `cleaner.max-delete-count` (§4.10 default 10000).
    #[clap(long = "max-deletion-count")]
    pub max_deletion_count: Option<u32>,

    /// Overrides `cleaner.dry-run`. Pass `--dry-run=false` to force a live
    /// purge; omitted, the configured default (true) applies.
    #[clap(long = "dry-run")]
    pub dry_run: Option<bool>,
}

pub async fn command(config: Config, args: Args) -> Result<()> {
    let handles = wiring::connect(&config).await?;

    let retention_days = args.retention_days.unwrap_or(config.cleaner.retention_days);
    let max_delete_count = args.max_deletion_count.unwrap_or(config.cleaner.max_delete_count);
    let dry_run = args.dry_run.unwrap_or(config.cleaner.dry_run);

    let cleaner = Cleaner::new(
        handles.store,
        handles.time.clone(),
        CleanerConfig {
            retention: Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60),
            max_delete_count,
            dry_run,
            interval: config.cleaner.interval,
        },
        JobToken::new(),
        &handles.metrics,
    );

    let outcome = cleaner
        .run_once(
            Duration::from_secs(u64::from(retention_days) * 24 * 60 * 60),
            max_delete_count,
            dry_run,
            handles.time.now(),
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&PurgeOutcomeJson::from(&outcome))?);
    Ok(())
}

/// `PurgeOutcome` (`watch_store`) carries `DeleteLog` rows that don't derive
/// `Serialize`; the admin surface only needs the counts plus `dry_run`, not
/// the full log (§6 "Administrative calls surface the error verbatim to
/// the caller" — the error, not necessarily every internal row).
#[derive(Debug, serde::Serialize)]
struct PurgeOutcomeJson {
    target_count: u64,
    deleted_count: u64,
    dry_run: bool,
}

impl From<&watch_store::PurgeOutcome> for PurgeOutcomeJson {
    fn from(outcome: &watch_store::PurgeOutcome) -> Self {
        Self {
            target_count: outcome.target_count,
            deleted_count: outcome.deleted_count,
            dry_run: outcome.dry_run,
        }
    }
}
