use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use extract::Extractor;
use fetcher::{Classification, FetchKind, Fetcher};
use metric::{Metric, Registry, U64Counter};
use observability_deps::tracing::{error, info, warn};
use pacer::Pacer;
use snafu::ResultExt;
use tracker::JobToken;
use watch_store::Store;
use watch_time::{Time, TimeProvider};
use watch_types::{diff_listing, listing_id, QueueItem, QueueOutcome, MAX_ATTEMPTS};

use crate::config::WorkerConfig;
use crate::error::{Result, StoreSnafu};
use crate::health::run_health_probe;

/// How long Worker sleeps locally after a `blocked` classification, to let
/// the Breaker's rolling window progress before trying again (§4.6).
const BLOCKED_LOCAL_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// `blocked`'s retry delay: a fixed hour rather than the queue's own
/// backoff table, since a block is a site-wide condition, not a
/// per-listing one (§4.6).
const BLOCKED_RETRY_DELAY: Duration = Duration::from_secs(60 * 60);

/// The number of consecutive `ok` fetches that triggers a preventive
/// cooldown (§4.6) — distinct from the Breaker's failure-driven cooldown,
/// this one mimics a human browsing session taking a pause.
const PREVENTIVE_COOLDOWN_STREAK: u32 = 3;
const PREVENTIVE_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Worker (§4.6, "the hardest component"): the single logical consumer of
/// the retry queue. Concurrency is 1 by policy — the whole pacing model
/// assumes a single in-flight detail fetch at a time, so `run` is meant to
/// be driven by exactly one task.
#[derive(Debug)]
pub struct Worker {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    pacer: Arc<Pacer>,
    time: Arc<dyn TimeProvider>,
    config: WorkerConfig,
    token: JobToken,
    consecutive_success: AtomicU32,
    fetches_total: Metric<U64Counter>,
}

impl Worker {
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        pacer: Arc<Pacer>,
        time: Arc<dyn TimeProvider>,
        config: WorkerConfig,
        token: JobToken,
        metrics: &Registry,
    ) -> Self {
        let fetches_total = metrics.register_metric("worker_fetches_total", "detail fetches by classification");
        Self {
            store,
            fetcher,
            extractor,
            pacer,
            time,
            config,
            token,
            consecutive_success: AtomicU32::new(0),
            fetches_total,
        }
    }

    /// Races `fut` against cancellation, returning `None` if the token
    /// fires first — the suspension-point pattern §5 requires at every
    /// pacer acquisition, HTTP call and sleep.
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

    /// Runs Worker forever (until cancelled): the crash-recovery sweep,
    /// the startup health probe, then the main loop (§4.6).
    pub async fn run(&self) {
        let now = self.time.now();
        match self.store.reap_stale_processing(self.config.stale_processing_threshold, now).await {
            Ok(0) => {}
            Ok(reset) => info!(reset, "crash-recovery sweep reset stale processing items to pending"),
            Err(e) => error!(error=%e, "crash-recovery sweep failed"),
        }

        run_health_probe(self.fetcher.as_ref(), &self.config.health_probe_url, &self.token).await;

        loop {
            if self.token.is_cancelled() {
                info!("worker cancelled, exiting main loop");
                return;
            }

            let now = self.time.now();
            let item = match self.race_cancel(self.store.queue_next_runnable(now)).await {
                None => return,
                Some(Err(e)) => {
                    error!(error=%e, "failed to dequeue next runnable queue item");
                    self.sleep_or_cancel(self.config.poll_interval).await;
                    continue;
                }
                Some(Ok(None)) => {
                    self.sleep_or_cancel(self.config.poll_interval).await;
                    continue;
                }
                Some(Ok(Some(item))) => item,
            };

            if self.race_cancel(self.process_item(item)).await.is_none() {
                return;
            }

            if self.consecutive_success.load(Ordering::Relaxed) >= PREVENTIVE_COOLDOWN_STREAK {
                info!("preventive cooldown: resetting after a streak of successful fetches");
                self.consecutive_success.store(0, Ordering::Relaxed);
                self.sleep_or_cancel(PREVENTIVE_COOLDOWN).await;
            }
        }
    }

    /// One iteration of the main loop's body past dequeue (§4.6 steps 2-6).
    async fn process_item(&self, item: QueueItem) {
        self.pacer.tier3.acquire("worker").await;

        let resp = self.fetcher.fetch(&item.url, FetchKind::Detail).await;
        self.fetches_total
            .recorder(&[("classification", classification_label(resp.classification))][..])
            .inc(1);

        let now = self.time.now();
        match resp.classification {
            Classification::Ok => match self.handle_ok(&item, &resp.body, now).await {
                Ok(true) => {
                    self.consecutive_success.fetch_add(1, Ordering::Relaxed);
                }
                Ok(false) => {
                    self.consecutive_success.store(0, Ordering::Relaxed);
                }
                Err(e) => {
                    error!(error=%e, queue_id = item.id, "failed to persist a successful fetch, leaving item for retry");
                    return;
                }
            },
            Classification::PermanentNotFound => {
                self.complete(item.id, QueueOutcome::PermanentFail, None, None, now).await;
                self.consecutive_success.store(0, Ordering::Relaxed);
            }
            Classification::ClientError => {
                self.complete(item.id, QueueOutcome::PermanentFail, None, None, now).await;
                self.consecutive_success.store(0, Ordering::Relaxed);
            }
            Classification::Blocked => {
                let retry_at = now.checked_add(BLOCKED_RETRY_DELAY);
                self.complete(item.id, QueueOutcome::Failed, Some("blocked"), retry_at, now).await;
                self.consecutive_success.store(0, Ordering::Relaxed);
                warn!("blocked response, sleeping locally to let the breaker window progress");
                self.sleep_or_cancel(BLOCKED_LOCAL_COOLDOWN).await;
            }
            Classification::Transient | Classification::NetworkError => {
                self.complete_transient(&item, now).await;
                self.consecutive_success.store(0, Ordering::Relaxed);
            }
        }

        self.pacer.tier3.observe(resp.classification == Classification::Ok);
    }

    /// The `ok` branch: extract, merge the caller-known natural key,
    /// upsert, diff against the prior record, write the snapshot, and mark
    /// the queue item done (§4.6, §4.7, §4.9).
    async fn handle_ok(&self, item: &QueueItem, body: &[u8], now: Time) -> Result<bool> {
        let mut record = match self.extractor.parse_detail(body, &item.source, &item.source_id) {
            Ok(record) => record,
            Err(e) => {
                warn!(error=%e, queue_id = item.id, "extraction failed on an ok response");
                self.complete_transient(item, now).await;
                return Ok(false);
            }
        };
        // Merge upstream id/URL (§4.6): the queue item, not the parser, is
        // authoritative for identity.
        record.source = item.source.clone();
        record.source_id = item.source_id.clone();
        record.detail_url = item.url.clone();

        let id = listing_id(&record.natural_key());
        let prior = self.store.get_listing(id).await.context(StoreSnafu)?;
        let changes = diff_listing(prior.as_ref(), &record);

        self.store.upsert_listing(&record, now).await.context(StoreSnafu)?;
        self.store
            .append_snapshot(id, now.calendar_day(), changes, now)
            .await
            .context(StoreSnafu)?;
        self.complete(item.id, QueueOutcome::Done, None, None, now).await;
        Ok(true)
    }

    /// `transient`: terminal once `attempts >= MaxAttempts`, otherwise
    /// retried after the queue's own backoff table (§4.5, §4.6).
    async fn complete_transient(&self, item: &QueueItem, now: Time) {
        if item.attempts >= MAX_ATTEMPTS {
            self.complete(item.id, QueueOutcome::FailedTerminal, Some("transient, attempts exhausted"), None, now)
                .await;
        } else {
            let retry_at = now.checked_add(watch_types::retry_backoff_for_attempt(item.attempts));
            self.complete(item.id, QueueOutcome::Failed, Some("transient"), retry_at, now).await;
        }
    }

    async fn complete(
        &self,
        id: i64,
        outcome: QueueOutcome,
        error: Option<&str>,
        next_retry_at: Option<Time>,
        now: Time,
    ) {
        if let Err(e) = self.store.queue_complete(id, outcome, error, next_retry_at, now).await {
            error!(error=%e, queue_id = id, "failed to record queue completion");
        }
    }
}

fn classification_label(classification: Classification) -> &'static str {
    match classification {
        Classification::Ok => "ok",
        Classification::Transient => "transient",
        Classification::PermanentNotFound => "permanent_not_found",
        Classification::Blocked => "blocked",
        Classification::ClientError => "client_error",
        Classification::NetworkError => "network_error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use extract::FixedExtractor;
    use fetcher::{FetchResponse, ScriptedFetcher};
    use pacer::{PacerConfig, Tier3Config};
    use test_helpers::FutureTimeout;
    use watch_store::{MemStore, NewQueueItem};
    use watch_time::{MockProvider, SeededJitter};
    use watch_types::NewListing;

    fn sample_record() -> NewListing {
        NewListing {
            source: "yahoo".into(),
            source_id: "A1".into(),
            title: Some("a room".into()),
            detail_url: "https://x/rent/detail/A1".into(),
            rent_minor_units: Some(80_000),
            area_sqm: Some(18.0),
            floor_plan: Some("1K".into()),
            walk_minutes: Some(6),
            building_age_years: Some(5),
            floor: Some(2),
            address: None,
            building_type: None,
            facilities: vec![],
            stations: vec![],
            images: vec![],
        }
    }

    fn test_worker(
        fetcher: ScriptedFetcher,
        extractor: FixedExtractor,
    ) -> (Arc<Worker>, Arc<MemStore>, Arc<MockProvider>) {
        let store = Arc::new(MemStore::default());
        let time = Arc::new(MockProvider::new(Time::from_timestamp_nanos(0)));
        let pacer = Arc::new(Pacer::new(
            PacerConfig {
                concurrency: 1,
                list_base_delay: Duration::ZERO,
                list_jitter: Duration::ZERO,
                tier3: Tier3Config::default(),
            },
            time.clone() as Arc<dyn TimeProvider>,
            Arc::new(SeededJitter::zero()),
        ));
        let config = WorkerConfig {
            poll_interval: Duration::from_millis(5),
            stale_processing_threshold: Duration::from_secs(600),
            health_probe_url: String::new(),
        };
        let worker = Arc::new(Worker::new(
            store.clone() as Arc<dyn Store>,
            Arc::new(fetcher) as Arc<dyn Fetcher>,
            Arc::new(extractor) as Arc<dyn Extractor>,
            pacer,
            time.clone() as Arc<dyn TimeProvider>,
            config,
            JobToken::new(),
            &Registry::new(),
        ));
        (worker, store, time)
    }

    async fn run_until_idle(worker: Arc<Worker>) {
        let w = worker.clone();
        let handle = tokio::spawn(async move { w.run().await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        worker.token.cancel();
        handle.with_timeout(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn ok_response_upserts_and_completes_the_item_done() {
        let fetcher = ScriptedFetcher::new([FetchResponse {
            status: 200,
            body: Bytes::from_static(b"<html></html>"),
            classification: Classification::Ok,
        }]);
        let extractor = FixedExtractor::new(sample_record(), vec![]);
        let (worker, store, time) = test_worker(fetcher, extractor);

        store
            .queue_enqueue(
                &[NewQueueItem {
                    source: "yahoo".into(),
                    source_id: "A1".into(),
                    url: "https://x/rent/detail/A1".into(),
                    priority: 0,
                }],
                time.now(),
            )
            .await
            .unwrap();

        run_until_idle(worker).await;

        let id = listing_id(&watch_types::NaturalKey::new("yahoo", "A1"));
        let listing = store.get_listing(id).await.unwrap().expect("listing persisted");
        assert_eq!(listing.title.as_deref(), Some("a room"));

        let stats = store.queue_stats(time.now()).await.unwrap();
        assert_eq!(stats.done, 1);
        assert_eq!(stats.pending, 0);
    }

    #[tokio::test]
    async fn not_found_marks_the_item_permanently_failed() {
        let fetcher = ScriptedFetcher::new([FetchResponse {
            status: 404,
            body: Bytes::new(),
            classification: Classification::PermanentNotFound,
        }]);
        let extractor = FixedExtractor::default();
        let (worker, store, time) = test_worker(fetcher, extractor);

        store
            .queue_enqueue(
                &[NewQueueItem {
                    source: "yahoo".into(),
                    source_id: "A1".into(),
                    url: "https://x/rent/detail/A1".into(),
                    priority: 0,
                }],
                time.now(),
            )
            .await
            .unwrap();

        run_until_idle(worker).await;

        let stats = store.queue_stats(time.now()).await.unwrap();
        assert_eq!(stats.permanent_fail, 1);
    }

    #[tokio::test]
    async fn transient_error_schedules_a_retry_with_backoff() {
        let fetcher = ScriptedFetcher::new([FetchResponse {
            status: 503,
            body: Bytes::new(),
            classification: Classification::Transient,
        }]);
        let extractor = FixedExtractor::default();
        let (worker, store, time) = test_worker(fetcher, extractor);

        store
            .queue_enqueue(
                &[NewQueueItem {
                    source: "yahoo".into(),
                    source_id: "A1".into(),
                    url: "https://x/rent/detail/A1".into(),
                    priority: 0,
                }],
                time.now(),
            )
            .await
            .unwrap();

        run_until_idle(worker).await;

        let stats = store.queue_stats(time.now()).await.unwrap();
        assert_eq!(stats.failed, 1);
    }
}
