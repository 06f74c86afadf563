use std::time::Duration;

use async_trait::async_trait;
use watch_time::Time;
use watch_types::{Listing, ListingId, NewListing, QueueItem, QueueOutcome, ScrapingState, StationAccess, ListingImage};

use crate::{
    filter::ListingFilter,
    types::{ActiveListingRef, CatalogStats, NewQueueItem, Page, PurgeOutcome, QueueStats, UpsertOutcome},
    Result,
};

/// C2 Store (§4.1): the single-writer persistent catalog, queue and logs.
/// Object-safe so every caller (Worker, Scheduler, Cleaner, the admin
/// surface) holds an `Arc<dyn Store>` rather than a concrete backend type.
///
/// Every method here corresponds 1:1 to a bullet in §4.1; the invariants it
/// enforces (natural-key uniqueness, child-row referential integrity,
/// monotone `status`) are documented at each call site that depends on
/// them rather than repeated on every method.
#[async_trait]
pub trait Store: std::fmt::Debug + Send + Sync + 'static {
    /// Atomic upsert by natural key. Preserves `id`, `created_at`, `status`,
    /// `removed_at` on an existing row; overwrites scalar fields;
    /// replaces `stations`/`images` only if the provided slice is
    /// non-empty (§4.1). Sets `fetched_at = last_seen_at = now`.
    async fn upsert_listing(
        &self,
        record: &NewListing,
        now: Time,
    ) -> Result<UpsertOutcome>;

    /// Idempotently transitions each `active` id to `removed` (§4.1).
    async fn mark_removed(&self, ids: &[ListingId], reason: &str, now: Time) -> Result<u64>;

    /// Updates `last_seen_at = now` for ids still present in this cycle's
    /// crawl (§4.8 `Continuing`).
    async fn touch_last_seen(&self, ids: &[ListingId], now: Time) -> Result<u64>;

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>>;
    async fn list_active(&self, filter: &ListingFilter) -> Result<Page>;
    async fn list_stations(&self, id: ListingId) -> Result<Vec<StationAccess>>;
    async fn list_images(&self, id: ListingId) -> Result<Vec<ListingImage>>;

    /// Every currently-`active` listing's natural key, for the Scheduler's
    /// `A = {active listings in Store}` set (§4.8).
    async fn active_listing_refs(&self) -> Result<Vec<ActiveListingRef>>;

    async fn queue_enqueue(&self, items: &[NewQueueItem], now: Time) -> Result<Vec<QueueItem>>;

    /// Whether a `pending`/`processing` item already exists for this
    /// natural key, so the Scheduler doesn't double-enqueue (§4.8 step 3).
    async fn queue_has_runnable_for(&self, source: &str, source_id: &str) -> Result<bool>;

    /// Atomically dequeues the highest-priority `pending` item, or the
    /// oldest `failed` item whose `next_retry_at <= now`, transitioning it
    /// to `processing` and incrementing `attempts` (§4.1, §4.5).
    async fn queue_next_runnable(&self, now: Time) -> Result<Option<QueueItem>>;

    /// Transitions a `processing` item to a terminal or retryable state
    /// (§4.1, §4.5). `error`/`next_retry_at` are ignored for outcomes that
    /// don't carry them.
    async fn queue_complete(
        &self,
        id: i64,
        outcome: QueueOutcome,
        error: Option<&str>,
        next_retry_at: Option<Time>,
        now: Time,
    ) -> Result<()>;

    /// Crash-recovery sweep (§B.6): resets any `processing` item whose
    /// dequeue predates `older_than` back to `pending`, incrementing
    /// `attempts`. Idempotent — a second call with no stale items is a
    /// no-op.
    async fn reap_stale_processing(&self, older_than: Duration, now: Time) -> Result<u64>;

    async fn queue_stats(&self, now: Time) -> Result<QueueStats>;

    /// One snapshot row per (listing, day); a same-day rewrite updates the
    /// existing row rather than inserting a second one (§4.1, §4.9).
    async fn append_snapshot(
        &self,
        listing_id: ListingId,
        day: chrono::NaiveDate,
        changes: Vec<watch_types::Change>,
        now: Time,
    ) -> Result<()>;

    /// Retention-based physical purge (§4.1, §4.10). `dry=true` never
    /// writes.
    async fn purge_removed(
        &self,
        cutoff: Time,
        limit: u32,
        dry_run: bool,
        now: Time,
    ) -> Result<PurgeOutcome>;

    async fn get_scraping_state(&self) -> Result<ScrapingState>;
    async fn set_scraping_state(&self, state: ScrapingState) -> Result<()>;

    async fn catalog_stats(&self) -> Result<CatalogStats>;
}
