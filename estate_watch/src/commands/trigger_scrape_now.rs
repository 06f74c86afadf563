use std::sync::Arc;

use scheduler::{DefaultPaginator, Scheduler};
use tracker::JobToken;
use watch_config::Config;

use crate::commands::wiring::{self, Error as WiringError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to wire up collaborators: {0}")]
    Wiring(#[from] WiringError),

    #[error("failed to render run outcome as JSON: {0}")]
    Render(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fires one daily differential reconciliation immediately (§4.8, §6
/// "trigger-scrape-now"), bypassing the `scraper.daily-run-time` trigger
/// check entirely — this calls [`Scheduler::run_once`] directly, the exact
/// operation the cron loop calls once a day.
pub async fn command(config: Config) -> Result<()> {
    let handles = wiring::connect(&config).await?;
    let timezone = wiring::parse_timezone(&config)?;
    let daily_run_time = wiring::parse_daily_run_time(&config)?;
    let scopes = wiring::scopes(&config);

    let scheduler = Scheduler::new(
        Arc::clone(&handles.store),
        Arc::clone(&handles.fetcher),
        Arc::clone(&handles.extractor),
        Arc::new(DefaultPaginator),
        Arc::clone(&handles.time),
        scheduler::SchedulerConfig {
            scopes,
            daily_run_time,
            timezone,
            check_interval: std::time::Duration::from_secs(60),
            max_pages_per_scope: 200,
            new_item_priority: 0,
        },
        JobToken::new(),
        &handles.metrics,
    );

    let outcome = scheduler.run_once(handles.time.now()).await;
    println!("{}", serde_json::to_string_pretty(&RunOutcomeJson::from(&outcome))?);
    Ok(())
}

#[derive(Debug, serde::Serialize)]
struct RunOutcomeJson {
    enqueued: u64,
    touched: u64,
    deactivated: u64,
    complete: bool,
    aborted: bool,
    failed_scopes: Vec<String>,
}

impl From<&scheduler::RunOutcome> for RunOutcomeJson {
    fn from(outcome: &scheduler::RunOutcome) -> Self {
        Self {
            enqueued: outcome.enqueued,
            touched: outcome.touched,
            deactivated: outcome.deactivated,
            complete: outcome.complete,
            aborted: outcome.aborted,
            failed_scopes: outcome.failed_scopes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_outcome_projects_every_field() {
        let outcome = scheduler::RunOutcome {
            enqueued: 2,
            touched: 5,
            deactivated: 1,
            complete: false,
            aborted: true,
            failed_scopes: vec!["https://x/a".to_string()],
        };
        let json = RunOutcomeJson::from(&outcome);
        assert_eq!(json.enqueued, 2);
        assert_eq!(json.touched, 5);
        assert_eq!(json.deactivated, 1);
        assert!(!json.complete);
        assert!(json.aborted);
        assert_eq!(json.failed_scopes, vec!["https://x/a".to_string()]);
    }
}
