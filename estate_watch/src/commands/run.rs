use std::sync::Arc;
use std::time::Duration;

use cleaner::{Cleaner, CleanerConfig};
use observability_deps::tracing::info;
use scheduler::{DefaultPaginator, Scheduler, SchedulerConfig};
use tracker::TaskRegistry;
use watch_config::Config;
use worker::{Worker, WorkerConfig};

use crate::commands::wiring::{self, Error as WiringError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to wire up collaborators: {0}")]
    Wiring(#[from] WiringError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Runs the engine continuously (§5): one Scheduler timer task, one Worker
/// loop task, one Cleaner timer task, sharing the process. A Ctrl-C/SIGTERM
/// cancels them in Scheduler -> Worker -> Cleaner -> Store order (§5, §9
/// Design Notes).
pub async fn command(config: Config) -> Result<()> {
    let handles = wiring::connect(&config).await?;
    let timezone = wiring::parse_timezone(&config)?;
    let daily_run_time = wiring::parse_daily_run_time(&config)?;
    let scopes = wiring::scopes(&config);

    let mut registry = TaskRegistry::new();
    let scheduler_token = registry.register("scheduler");
    let worker_token = registry.register("worker");
    let cleaner_token = registry.register("cleaner");

    let worker = Arc::new(Worker::new(
        Arc::clone(&handles.store),
        Arc::clone(&handles.fetcher),
        Arc::clone(&handles.extractor),
        Arc::clone(&handles.pacer),
        Arc::clone(&handles.time),
        WorkerConfig {
            poll_interval: config.scraper.poll_interval,
            stale_processing_threshold: config.scraper.stale_processing_threshold,
            health_probe_url: config.scraper.health_probe_url.clone(),
        },
        worker_token,
        &handles.metrics,
    ));

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&handles.store),
        Arc::clone(&handles.fetcher),
        Arc::clone(&handles.extractor),
        Arc::new(DefaultPaginator),
        Arc::clone(&handles.time),
        SchedulerConfig {
            scopes,
            daily_run_time,
            timezone,
            check_interval: Duration::from_secs(60),
            max_pages_per_scope: 200,
            new_item_priority: 0,
        },
        scheduler_token,
        &handles.metrics,
    ));

    let cleaner = Arc::new(Cleaner::new(
        Arc::clone(&handles.store),
        Arc::clone(&handles.time),
        CleanerConfig {
            retention: Duration::from_secs(u64::from(config.cleaner.retention_days) * 24 * 60 * 60),
            max_delete_count: config.cleaner.max_delete_count,
            dry_run: config.cleaner.dry_run,
            interval: config.cleaner.interval,
        },
        cleaner_token,
        &handles.metrics,
    ));

    let worker_handle = tokio::spawn({
        let worker = Arc::clone(&worker);
        async move { worker.run().await }
    });
    let scheduler_handle = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move {
            if config.scraper.daily_run_enabled {
                scheduler.run().await
            }
        }
    });
    let cleaner_handle = tokio::spawn({
        let cleaner = Arc::clone(&cleaner);
        async move { cleaner.run().await }
    });

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => info!(error=%e, "failed to listen for shutdown signal, shutting down anyway"),
    }

    registry.shutdown();
    let _ = tokio::join!(worker_handle, scheduler_handle, cleaner_handle);
    info!("all components stopped");

    Ok(())
}
