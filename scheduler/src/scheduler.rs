use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use extract::Extractor;
use fetcher::{Classification, FetchKind, Fetcher};
use metric::{Metric, Registry, U64Counter};
use observability_deps::tracing::{error, info, warn};
use parking_lot::Mutex;
use tracker::JobToken;
use watch_store::{NewQueueItem, Store};
use watch_time::{Time, TimeProvider};
use watch_types::{status_removed_change, ListingId, NaturalKey};

use crate::config::SchedulerConfig;
use crate::paginator::ScopePaginator;
use crate::trigger::is_due;

/// Outcome of one daily differential reconciliation run (§4.8, §8
/// properties 4/5), returned by [`Scheduler::run_once`] for the
/// `trigger-scrape-now` admin command and for tests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOutcome {
    pub enqueued: u64,
    pub touched: u64,
    pub deactivated: u64,
    /// Whether the crawl was *complete* — no scope failed (§4.8 step 2).
    /// Only meaningful when `aborted` is false.
    pub complete: bool,
    /// Set when a `blocked` classification was seen mid-walk: the run was
    /// abandoned outright, no enqueue and no deactivation happened at all
    /// (§4.8 step 5), distinct from a merely *partial* (but not aborted)
    /// crawl.
    pub aborted: bool,
    pub failed_scopes: Vec<String>,
}

/// C9 Scheduler (§4.8): the daily job that walks every enabled scope's list
/// pages, reconciles the discovered set of property URLs against the
/// catalog's active listings, enqueues new detail-page work, and
/// deactivates listings that disappeared from the index — but only when
/// every scope's walk came back complete (the completeness gate, §8
/// property 4/5).
#[derive(Debug)]
pub struct Scheduler {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    paginator: Arc<dyn ScopePaginator>,
    time: Arc<dyn TimeProvider>,
    config: SchedulerConfig,
    token: JobToken,
    last_fired: Mutex<Option<chrono::NaiveDate>>,
    runs_total: Metric<U64Counter>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        paginator: Arc<dyn ScopePaginator>,
        time: Arc<dyn TimeProvider>,
        config: SchedulerConfig,
        token: JobToken,
        metrics: &Registry,
    ) -> Self {
        let runs_total = metrics.register_metric("scheduler_runs_total", "daily reconciliation runs by outcome");
        Self {
            store,
            fetcher,
            extractor,
            paginator,
            time,
            config,
            token,
            last_fired: Mutex::new(None),
            runs_total,
        }
    }

    /// Races `fut` against cancellation, mirroring Worker's suspension-point
    /// pattern (§5) so a cancelled Scheduler never blocks shutdown on an
    /// in-flight fetch or store call.
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

    /// Drives the cron loop forever (until cancelled): wakes every
    /// `check_interval`, fires [`Scheduler::run_once`] at most once per
    /// calendar day once the configured local wall-clock time has passed
    /// (§4.8 "Triggered by cron at a configured wall-clock time").
    pub async fn run(&self) {
        loop {
            if self.token.is_cancelled() {
                info!("scheduler cancelled, exiting");
                return;
            }

            let now = self.time.now();
            let local = self.config.timezone.from_utc_datetime(&now.date_time().naive_utc());
            let due = {
                let last_fired = *self.last_fired.lock();
                is_due(local.time(), local.date_naive(), self.config.daily_run_time, last_fired)
            };

            if due {
                info!("daily run triggered");
                let outcome = self.run_once(now).await;
                *self.last_fired.lock() = Some(local.date_naive());
                info!(?outcome, "daily run finished");
            }

            self.sleep_or_cancel(self.config.check_interval).await;
        }
    }

    async fn record_run(&self, label: &'static str) {
        self.runs_total.recorder(&[("outcome", label)][..]).inc(1);

        let mut state = self.store.get_scraping_state().await.unwrap_or_default();
        let now = self.time.now();
        state.last_attempt = Some(now);
        match label {
            "aborted" => {
                state.failure_count += 1;
                state.is_blocked = true;
                state.blocked_reason = Some("blocked mid-walk".to_string());
            }
            "partial" => {
                state.failure_count += 1;
                state.is_blocked = false;
            }
            _ => {
                state.last_success = Some(now);
                state.success_count += 1;
                state.is_blocked = false;
                state.blocked_reason = None;
            }
        }
        if let Err(e) = self.store.set_scraping_state(state).await {
            error!(error=%e, "failed to persist scraping state after a run");
        }
    }

    /// Walks every page of one scope, accumulating discovered natural keys
    /// into `union`/`detail_urls`. Returns `Err(())` on a `blocked`
    /// classification, which aborts the entire run; any other failure ends
    /// this scope's walk and marks it failed without touching the others.
    async fn walk_scope(
        &self,
        scope: &crate::config::Scope,
        union: &mut HashSet<NaturalKey>,
        detail_urls: &mut HashMap<NaturalKey, String>,
    ) -> Result<bool, ()> {
        let mut page = 1u32;
        loop {
            if page > self.config.max_pages_per_scope {
                warn!(scope = %scope.source, page, "hit the per-scope page cap, stopping this scope's walk");
                return Ok(false);
            }

            let url = self.paginator.page_url(&scope.url, page);
            let resp = match self.race_cancel(self.fetcher.fetch(&url, FetchKind::List)).await {
                Some(resp) => resp,
                None => return Err(()),
            };

            match resp.classification {
                Classification::Ok => {
                    let links = match self.extractor.parse_list(&resp.body) {
                        Ok(links) => links,
                        Err(e) => {
                            warn!(scope = %scope.source, error=%e, "failed to extract links from a list page");
                            return Ok(false);
                        }
                    };
                    if links.is_empty() {
                        return Ok(true);
                    }
                    for url in &links {
                        match self.extractor.source_id_from_url(url) {
                            Ok(source_id) => {
                                let key = NaturalKey::new(scope.source.clone(), source_id);
                                detail_urls.entry(key.clone()).or_insert_with(|| url.to_string());
                                union.insert(key);
                            }
                            Err(e) => warn!(url = %url, error=%e, "could not recover a natural key from a list link"),
                        }
                    }
                    page += 1;
                }
                Classification::Blocked => {
                    warn!(scope = %scope.source, "blocked mid-walk, aborting the entire daily run (§4.8 step 5)");
                    return Err(());
                }
                other => {
                    warn!(scope = %scope.source, classification = ?other, "list page fetch failed, marking this scope failed");
                    return Ok(false);
                }
            }
        }
    }

    /// Performs one daily differential reconciliation immediately,
    /// regardless of the clock — the operation behind both the cron loop
    /// and the `trigger-scrape-now` admin command (§6, §4.8).
    pub async fn run_once(&self, now: Time) -> RunOutcome {
        let mut failed_scopes = Vec::new();
        let mut union: HashSet<NaturalKey> = HashSet::new();
        let mut detail_urls: HashMap<NaturalKey, String> = HashMap::new();

        for scope in &self.config.scopes {
            match self.walk_scope(scope, &mut union, &mut detail_urls).await {
                Ok(true) => {}
                Ok(false) => failed_scopes.push(scope.source.clone()),
                Err(()) => {
                    self.record_run("aborted").await;
                    return RunOutcome {
                        aborted: true,
                        ..Default::default()
                    };
                }
            }
        }

        let complete = failed_scopes.is_empty();

        let active = match self.store.active_listing_refs().await {
            Ok(refs) => refs,
            Err(e) => {
                error!(error=%e, "failed to read active listings for reconciliation");
                self.record_run("aborted").await;
                return RunOutcome {
                    aborted: true,
                    failed_scopes,
                    ..Default::default()
                };
            }
        };
        let active_by_key: HashMap<NaturalKey, ListingId> =
            active.into_iter().map(|r| (r.natural_key, r.id)).collect();

        let new_keys: Vec<&NaturalKey> = union.iter().filter(|k| !active_by_key.contains_key(*k)).collect();
        let continuing_ids: Vec<ListingId> = union.iter().filter_map(|k| active_by_key.get(k).copied()).collect();
        let missing_ids: Vec<ListingId> = active_by_key
            .iter()
            .filter(|(k, _)| !union.contains(*k))
            .map(|(_, id)| *id)
            .collect();

        let mut enqueued = 0u64;
        for key in new_keys {
            match self.store.queue_has_runnable_for(&key.source, &key.source_id).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    error!(error=%e, source = %key.source, source_id = %key.source_id, "failed to check for an existing queue item");
                    continue;
                }
            }
            let url = detail_urls.get(key).cloned().unwrap_or_default();
            let item = NewQueueItem {
                source: key.source.clone(),
                source_id: key.source_id.clone(),
                url,
                priority: self.config.new_item_priority,
            };
            match self.store.queue_enqueue(std::slice::from_ref(&item), now).await {
                Ok(_) => enqueued += 1,
                Err(e) => error!(error=%e, source = %key.source, source_id = %key.source_id, "failed to enqueue new listing"),
            }
        }

        let touched = if continuing_ids.is_empty() {
            0
        } else {
            match self.store.touch_last_seen(&continuing_ids, now).await {
                Ok(n) => n,
                Err(e) => {
                    error!(error=%e, "failed to touch last_seen_at for continuing listings");
                    0
                }
            }
        };

        let mut deactivated = 0u64;
        if !missing_ids.is_empty() {
            if complete {
                match self.store.mark_removed(&missing_ids, "absent_from_index", now).await {
                    Ok(n) => {
                        deactivated = n;
                        for id in &missing_ids {
                            if let Err(e) = self
                                .store
                                .append_snapshot(*id, now.calendar_day(), vec![status_removed_change()], now)
                                .await
                            {
                                error!(error=%e, listing_id = %id, "failed to append a removal snapshot");
                            }
                        }
                    }
                    Err(e) => error!(error=%e, "failed to mark missing listings removed"),
                }
            } else {
                info!(
                    skipped = missing_ids.len(),
                    failed_scopes = ?failed_scopes,
                    "partial crawl: skipping deactivation (§4.8 completeness gate)"
                );
            }
        }

        self.record_run(if complete { "complete" } else { "partial" }).await;

        RunOutcome {
            enqueued,
            touched,
            deactivated,
            complete,
            aborted: false,
            failed_scopes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use fetcher::{FetchResponse, ScriptedFetcher};
    use url::Url;
    use watch_store::MemStore;
    use watch_time::MockProvider;
    use watch_types::NewListing;

    use crate::config::Scope;
    use crate::paginator::DefaultPaginator;

    /// Reads `parse_list`'s links straight from the scripted body (one URL
    /// per line) instead of returning a fixed set, so these tests can drive
    /// pagination termination ("empty page ends the walk") for real.
    #[derive(Debug, Default)]
    struct LineExtractor;

    impl Extractor for LineExtractor {
        fn parse_detail(&self, _body: &[u8], _source: &str, _source_id: &str) -> extract::Result<NewListing> {
            unimplemented!("scheduler tests never call parse_detail")
        }

        fn parse_list(&self, body: &[u8]) -> extract::Result<Vec<Url>> {
            let text = std::str::from_utf8(body).unwrap_or("");
            Ok(text
                .lines()
                .filter(|l| !l.is_empty())
                .map(|l| Url::parse(l).unwrap())
                .collect())
        }
    }

    fn list_page(links: &[&str]) -> FetchResponse {
        FetchResponse {
            status: 200,
            body: Bytes::from(links.join("\n")),
            classification: Classification::Ok,
        }
    }

    fn empty_page() -> FetchResponse {
        FetchResponse {
            status: 200,
            body: Bytes::new(),
            classification: Classification::Ok,
        }
    }

    async fn seed_active(store: &MemStore, time: &MockProvider, source_ids: &[&str]) {
        for source_id in source_ids {
            let listing = NewListing {
                source: "yahoo".into(),
                source_id: source_id.to_string(),
                title: None,
                detail_url: format!("https://x/rent/detail/{source_id}"),
                rent_minor_units: None,
                area_sqm: None,
                floor_plan: None,
                walk_minutes: None,
                building_age_years: None,
                floor: None,
                address: None,
                building_type: None,
                facilities: vec![],
                stations: vec![],
                images: vec![],
            };
            store.upsert_listing(&listing, time.now()).await.unwrap();
        }
    }

    fn harness(
        fetcher: ScriptedFetcher,
        extractor: impl Extractor + 'static,
    ) -> (Scheduler, Arc<MemStore>, Arc<MockProvider>) {
        let store = Arc::new(MemStore::default());
        let time = Arc::new(MockProvider::new(Time::from_timestamp_nanos(0)));
        let scopes = vec![Scope {
            source: "yahoo".into(),
            url: "https://x/rent/list".into(),
        }];
        let config = SchedulerConfig {
            scopes,
            ..SchedulerConfig::default()
        };
        let scheduler = Scheduler::new(
            store.clone() as Arc<dyn Store>,
            Arc::new(fetcher) as Arc<dyn Fetcher>,
            Arc::new(extractor) as Arc<dyn Extractor>,
            Arc::new(DefaultPaginator) as Arc<dyn ScopePaginator>,
            time.clone() as Arc<dyn TimeProvider>,
            config,
            JobToken::new(),
            &Registry::new(),
        );
        (scheduler, store, time)
    }

    #[tokio::test]
    async fn complete_crawl_enqueues_new_touches_continuing_deactivates_missing() {
        // active = {A, B, C}; this run's index has {A, B, D}.
        let fetcher = ScriptedFetcher::new([
            list_page(&["https://x/rent/detail/A", "https://x/rent/detail/B", "https://x/rent/detail/D"]),
            empty_page(),
        ]);
        let (scheduler, store, time) = harness(fetcher, LineExtractor);
        seed_active(&store, &time, &["A", "B", "C"]).await;

        let outcome = scheduler.run_once(time.now()).await;

        assert!(outcome.complete);
        assert!(!outcome.aborted);
        assert_eq!(outcome.enqueued, 1); // D is new
        assert_eq!(outcome.touched, 2); // A and B are continuing
        assert_eq!(outcome.deactivated, 1); // C is missing

        let c_id = watch_types::listing_id(&NaturalKey::new("yahoo", "C"));
        let c = store.get_listing(c_id).await.unwrap().unwrap();
        assert_eq!(c.status, watch_types::ListingStatus::Removed);
    }

    #[tokio::test]
    async fn partial_crawl_skips_deactivation_but_still_enqueues_and_touches() {
        // scope's second page fails; A and B were seen, C was not but the
        // crawl is incomplete so C must survive.
        let fetcher = ScriptedFetcher::new([
            list_page(&["https://x/rent/detail/A", "https://x/rent/detail/B"]),
            FetchResponse {
                status: 503,
                body: Bytes::new(),
                classification: Classification::Transient,
            },
        ]);
        let (scheduler, store, time) = harness(fetcher, LineExtractor);
        seed_active(&store, &time, &["A", "B", "C"]).await;

        let outcome = scheduler.run_once(time.now()).await;

        assert!(!outcome.complete);
        assert!(!outcome.aborted);
        assert_eq!(outcome.deactivated, 0);
        assert_eq!(outcome.touched, 2);

        let c_id = watch_types::listing_id(&NaturalKey::new("yahoo", "C"));
        let c = store.get_listing(c_id).await.unwrap().unwrap();
        assert_eq!(c.status, watch_types::ListingStatus::Active);
    }

    #[tokio::test]
    async fn blocked_mid_walk_aborts_with_no_side_effects() {
        let fetcher = ScriptedFetcher::new([FetchResponse {
            status: 403,
            body: Bytes::new(),
            classification: Classification::Blocked,
        }]);
        let (scheduler, store, time) = harness(fetcher, LineExtractor);
        seed_active(&store, &time, &["A"]).await;

        let outcome = scheduler.run_once(time.now()).await;

        assert!(outcome.aborted);
        assert_eq!(outcome.enqueued, 0);
        assert_eq!(outcome.deactivated, 0);

        let a_id = watch_types::listing_id(&NaturalKey::new("yahoo", "A"));
        let a = store.get_listing(a_id).await.unwrap().unwrap();
        assert_eq!(a.status, watch_types::ListingStatus::Active);
    }

    #[tokio::test]
    async fn does_not_double_enqueue_when_a_runnable_item_already_exists() {
        let fetcher = ScriptedFetcher::new([list_page(&["https://x/rent/detail/A"]), empty_page()]);
        let (scheduler, store, time) = harness(fetcher, LineExtractor);
        store
            .queue_enqueue(
                &[NewQueueItem {
                    source: "yahoo".into(),
                    source_id: "A".into(),
                    url: "https://x/rent/detail/A".into(),
                    priority: 0,
                }],
                time.now(),
            )
            .await
            .unwrap();

        let outcome = scheduler.run_once(time.now()).await;

        assert_eq!(outcome.enqueued, 0);
    }
}
