use std::sync::Arc;
use std::time::Duration;

use metric::{Attributes, Metric, Registry, U64Counter};
use observability_deps::tracing::{error, info, warn};
use snafu::ResultExt;
use tracker::JobToken;
use watch_store::{PurgeOutcome, Store};
use watch_time::{Time, TimeProvider};

use crate::config::CleanerConfig;
use crate::error::{Result, StoreSnafu};

/// C11 Cleaner (§4.10): the retention-based physical purge, run on its own
/// cadence independent of Worker/Scheduler's main loops (§5 "one Cleaner
/// timer task"). The cap-exceeded policy violation (§7) is enforced by
/// `Store::purge_removed` itself; this crate's own job is driving the
/// cadence, translating configuration into a cutoff, and logging/metering
/// the outcome.
#[derive(Debug)]
pub struct Cleaner {
    store: Arc<dyn Store>,
    time: Arc<dyn TimeProvider>,
    config: CleanerConfig,
    token: JobToken,
    targeted_total: Metric<U64Counter>,
    deleted_total: Metric<U64Counter>,
}

impl Cleaner {
    pub fn new(
        store: Arc<dyn Store>,
        time: Arc<dyn TimeProvider>,
        config: CleanerConfig,
        token: JobToken,
        metrics: &Registry,
    ) -> Self {
        let targeted_total = metrics.register_metric("cleaner_targeted_total", "removed listings targeted by a purge");
        let deleted_total = metrics.register_metric("cleaner_deleted_total", "removed listings physically deleted by a purge");
        Self {
            store,
            time,
            config,
            token,
            targeted_total,
            deleted_total,
        }
    }

    async fn race_cancel<F, T>(&self, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            result = fut => Some(result),
            _ = self.token.cancelled() => None,
        }
    }

    async fn sleep_or_cancel(&self, duration: Duration) {
        let _ = self.race_cancel(tokio::time::sleep(duration)).await;
    }

    /// Drives the weekly cadence forever (until cancelled): sleeps
    /// `interval`, then runs one purge with the configured defaults.
    pub async fn run(&self) {
        loop {
            self.sleep_or_cancel(self.config.interval).await;
            if self.token.is_cancelled() {
                info!("cleaner cancelled, exiting");
                return;
            }

            let now = self.time.now();
            match self
                .race_cancel(self.run_once(self.config.retention, self.config.max_delete_count, self.config.dry_run, now))
                .await
            {
                None => return,
                Some(Ok(outcome)) => info!(?outcome, "cleaner run finished"),
                Some(Err(e)) => error!(error=%e, "cleaner run failed"),
            }
        }
    }

    /// Performs one purge immediately with the given parameters,
    /// regardless of the cadence clock — the operation behind both the
    /// weekly loop and the `run-cleanup` admin command (§6, §4.10).
    pub async fn run_once(&self, retention: Duration, max_delete_count: u32, dry_run: bool, now: Time) -> Result<PurgeOutcome> {
        let cutoff = Time::from_timestamp_nanos(now.timestamp_nanos() - retention.as_nanos() as i64);

        let outcome = self
            .store
            .purge_removed(cutoff, max_delete_count, dry_run, now)
            .await
            .context(StoreSnafu)?;

        self.targeted_total.recorder(Attributes::new()).inc(outcome.target_count);
        self.deleted_total.recorder(Attributes::new()).inc(outcome.deleted_count);

        if dry_run {
            info!(target_count = outcome.target_count, "dry-run purge: no rows deleted");
        } else {
            warn!(
                target_count = outcome.target_count,
                deleted_count = outcome.deleted_count,
                "purge deleted removed listings past retention"
            );
        }

        Ok(outcome)
    }
}
