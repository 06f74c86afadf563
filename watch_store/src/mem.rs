use std::{
    cmp::Ordering,
    collections::BTreeMap,
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use watch_time::Time;
use watch_types::{
    listing_id, Change, DeleteLog, Listing, ListingId, ListingImage, ListingStatus, NaturalKey,
    NewListing, QueueItem, QueueOutcome, QueueStatus, ScrapingState, Snapshot, StationAccess,
};

use crate::{
    error::Error,
    filter::{Cursor, ListingFilter, SortOrder, WalkMode},
    store::Store,
    types::{ActiveListingRef, CatalogStats, NewQueueItem, Page, PurgeOutcome, QueueStats, UpsertOutcome},
    Result,
};

struct StoredQueueItem {
    item: QueueItem,
    /// When this item was last transitioned into `processing`, for the
    /// crash-recovery sweep (§B.6).
    dequeued_at: Option<Time>,
}

#[derive(Default)]
struct MemState {
    listings: BTreeMap<ListingId, Listing>,
    queue: BTreeMap<i64, StoredQueueItem>,
    next_queue_id: i64,
    snapshots: BTreeMap<(ListingId, chrono::NaiveDate), Snapshot>,
    delete_logs: Vec<DeleteLog>,
    scraping_state: ScrapingState,
}

/// An in-memory `Store` (§4.1), used by every other crate's unit tests —
/// the `MemCatalog` of this system.
#[derive(Debug, Default)]
pub struct MemStore {
    state: Mutex<MemState>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for MemState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemState")
            .field("listings", &self.listings.len())
            .field("queue", &self.queue.len())
            .finish()
    }
}

fn cmp_nullable_asc<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn cmp_nullable_desc<T: PartialOrd>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn matches_filter(listing: &Listing, filter: &ListingFilter) -> bool {
    if listing.status != ListingStatus::Active {
        return false;
    }
    if let Some(station) = &filter.station {
        if !listing.stations.iter().any(|s| s.station.contains(station.as_str())) {
            return false;
        }
    }
    if let Some(line) = &filter.line {
        if !listing.stations.iter().any(|s| s.line.contains(line.as_str())) {
            return false;
        }
    }
    if let Some(max_walk) = filter.max_walk {
        let ok = match filter.walk_mode {
            WalkMode::Nearest => listing.walk_minutes.map(|w| w <= max_walk).unwrap_or(false),
            WalkMode::Any => listing
                .stations
                .iter()
                .any(|s| s.walk_minutes.map(|w| w <= max_walk).unwrap_or(false)),
        };
        if !ok {
            return false;
        }
    }
    if !in_range(listing.rent_minor_units, filter.min_rent, filter.max_rent) {
        return false;
    }
    if !in_range(listing.area_sqm, filter.min_area, filter.max_area) {
        return false;
    }
    if !in_range(listing.building_age_years, filter.min_age, filter.max_age) {
        return false;
    }
    if !in_range(listing.floor, filter.min_floor, filter.max_floor) {
        return false;
    }
    if !filter.floor_plans.is_empty() {
        let matches = listing
            .floor_plan
            .as_ref()
            .map(|fp| filter.floor_plans.iter().any(|f| f == fp))
            .unwrap_or(false);
        if !matches {
            return false;
        }
    }
    if !filter.building_types.is_empty() {
        let matches = listing
            .building_type
            .as_ref()
            .map(|bt| filter.building_types.iter().any(|f| f == bt))
            .unwrap_or(false);
        if !matches {
            return false;
        }
    }
    if !filter.facilities.is_empty() {
        let encoded = serde_json::to_string(&listing.facilities).unwrap_or_default();
        if !filter.facilities.iter().all(|f| encoded.contains(f.as_str())) {
            return false;
        }
    }
    if filter.exclude_ids.contains(&listing.id) {
        return false;
    }
    true
}

fn in_range<T: PartialOrd + Copy>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    if let Some(min) = min {
        if value < min {
            return false;
        }
    }
    if let Some(max) = max {
        if value > max {
            return false;
        }
    }
    true
}

fn sort_key(order: SortOrder) -> impl Fn(&Listing, &Listing) -> Ordering {
    move |a, b| match order {
        SortOrder::Newest => b.fetched_at.cmp(&a.fetched_at).then(b.id.cmp(&a.id)),
        SortOrder::FetchedAtAsc => a.fetched_at.cmp(&b.fetched_at).then(a.id.cmp(&b.id)),
        SortOrder::RentAsc => cmp_nullable_asc(a.rent_minor_units, b.rent_minor_units),
        SortOrder::RentDesc => cmp_nullable_desc(a.rent_minor_units, b.rent_minor_units),
        SortOrder::AreaDesc => cmp_nullable_desc(a.area_sqm, b.area_sqm),
        SortOrder::WalkTimeAsc => cmp_nullable_asc(a.walk_minutes, b.walk_minutes),
        SortOrder::BuildingAgeAsc => cmp_nullable_asc(a.building_age_years, b.building_age_years),
    }
}

fn cursor_passes(listing: &Listing, cursor: &Cursor, ascending: bool) -> bool {
    if ascending {
        listing.fetched_at > cursor.fetched_at
            || (listing.fetched_at == cursor.fetched_at && listing.id > cursor.id)
    } else {
        listing.fetched_at < cursor.fetched_at
            || (listing.fetched_at == cursor.fetched_at && listing.id < cursor.id)
    }
}

#[async_trait]
impl Store for MemStore {
    async fn upsert_listing(&self, record: &NewListing, now: Time) -> Result<UpsertOutcome> {
        let natural_key = NaturalKey::new(record.source.clone(), record.source_id.clone());
        let id = listing_id(&natural_key);
        let mut state = self.state.lock();

        let created = !state.listings.contains_key(&id);
        let entry = state.listings.entry(id).or_insert_with(|| Listing {
            id,
            source: record.source.clone(),
            source_id: record.source_id.clone(),
            title: None,
            detail_url: record.detail_url.clone(),
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
            status: ListingStatus::Active,
            removed_at: None,
            fetched_at: now,
            last_seen_at: now,
            created_at: now,
            updated_at: now,
        });

        entry.title = record.title.clone();
        entry.detail_url = record.detail_url.clone();
        entry.rent_minor_units = record.rent_minor_units;
        entry.area_sqm = record.area_sqm;
        entry.floor_plan = record.floor_plan.clone();
        entry.walk_minutes = record.walk_minutes;
        entry.building_age_years = record.building_age_years;
        entry.floor = record.floor;
        entry.address = record.address.clone();
        entry.building_type = record.building_type.clone();
        entry.facilities = record.facilities.clone();
        if !record.stations.is_empty() {
            entry.stations = record.stations.clone();
        }
        if !record.images.is_empty() {
            entry.images = record.images.clone();
        }
        entry.fetched_at = now;
        entry.last_seen_at = now;
        entry.updated_at = now;

        Ok(UpsertOutcome { created })
    }

    async fn mark_removed(&self, ids: &[ListingId], reason: &str, now: Time) -> Result<u64> {
        let _ = reason;
        let mut state = self.state.lock();
        let mut n = 0;
        for id in ids {
            if let Some(listing) = state.listings.get_mut(id) {
                if listing.status == ListingStatus::Active {
                    listing.status = ListingStatus::Removed;
                    listing.removed_at = Some(now);
                    listing.updated_at = now;
                    n += 1;
                }
            }
        }
        Ok(n)
    }

    async fn touch_last_seen(&self, ids: &[ListingId], now: Time) -> Result<u64> {
        let mut state = self.state.lock();
        let mut n = 0;
        for id in ids {
            if let Some(listing) = state.listings.get_mut(id) {
                listing.last_seen_at = now;
                n += 1;
            }
        }
        Ok(n)
    }

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>> {
        Ok(self.state.lock().listings.get(&id).cloned())
    }

    async fn list_active(&self, filter: &ListingFilter) -> Result<Page> {
        filter.validate().map_err(|_| Error::InvalidCursor)?;
        let state = self.state.lock();
        let mut matching: Vec<Listing> = state
            .listings
            .values()
            .filter(|l| matches_filter(l, filter))
            .cloned()
            .collect();

        matching.sort_by(sort_key(filter.sort));
        let total_count = matching.len() as u64;

        let ascending = matches!(filter.sort, SortOrder::FetchedAtAsc);
        if let Some(cursor) = &filter.cursor {
            matching.retain(|l| cursor_passes(l, cursor, ascending));
        }

        let limit = filter.effective_limit() as usize;
        let has_more = matching.len() > limit;
        matching.truncate(limit);

        let next_cursor = if has_more {
            matching.last().map(|l| Cursor {
                fetched_at: l.fetched_at,
                id: l.id,
            })
        } else {
            None
        };

        Ok(Page {
            items: matching,
            total_count,
            next_cursor,
        })
    }

    async fn list_stations(&self, id: ListingId) -> Result<Vec<StationAccess>> {
        Ok(self
            .state
            .lock()
            .listings
            .get(&id)
            .map(|l| l.stations.clone())
            .unwrap_or_default())
    }

    async fn list_images(&self, id: ListingId) -> Result<Vec<ListingImage>> {
        Ok(self
            .state
            .lock()
            .listings
            .get(&id)
            .map(|l| l.images.clone())
            .unwrap_or_default())
    }

    async fn active_listing_refs(&self) -> Result<Vec<ActiveListingRef>> {
        Ok(self
            .state
            .lock()
            .listings
            .values()
            .filter(|l| l.status == ListingStatus::Active)
            .map(|l| ActiveListingRef {
                id: l.id,
                natural_key: NaturalKey::new(l.source.clone(), l.source_id.clone()),
            })
            .collect())
    }

    async fn queue_enqueue(&self, items: &[NewQueueItem], now: Time) -> Result<Vec<QueueItem>> {
        let mut state = self.state.lock();
        let mut created = Vec::with_capacity(items.len());
        for item in items {
            state.next_queue_id += 1;
            let id = state.next_queue_id;
            let queue_item = QueueItem {
                id,
                source: item.source.clone(),
                source_id: item.source_id.clone(),
                url: item.url.clone(),
                priority: item.priority,
                status: QueueStatus::Pending,
                attempts: 0,
                last_error: None,
                next_retry_at: None,
                completed_at: None,
                created_at: now,
            };
            created.push(queue_item.clone());
            state.queue.insert(
                id,
                StoredQueueItem {
                    item: queue_item,
                    dequeued_at: None,
                },
            );
        }
        Ok(created)
    }

    async fn queue_has_runnable_for(&self, source: &str, source_id: &str) -> Result<bool> {
        Ok(self.state.lock().queue.values().any(|q| {
            q.item.source == source
                && q.item.source_id == source_id
                && matches!(q.item.status, QueueStatus::Pending | QueueStatus::Processing)
        }))
    }

    async fn queue_next_runnable(&self, now: Time) -> Result<Option<QueueItem>> {
        let mut state = self.state.lock();

        // Pending and ready-to-retry failed items are runnable together,
        // ranked by (priority DESC, created_at ASC), matching postgres.rs's
        // single `WHERE status = 'pending' OR (status = 'failed' AND
        // next_retry_at <= now) ORDER BY priority DESC, created_at ASC`
        // (§4.5, S6) -- a ready `failed` item must be able to outrank a
        // lower-priority `pending` one, not just be picked up once no
        // pending item remains at all.
        let candidate_id = state
            .queue
            .values()
            .filter(|q| {
                q.item.status == QueueStatus::Pending
                    || (q.item.status == QueueStatus::Failed
                        && q.item.next_retry_at.map(|t| t <= now).unwrap_or(false))
            })
            .min_by(|a, b| {
                b.item
                    .priority
                    .cmp(&a.item.priority)
                    .then(a.item.created_at.cmp(&b.item.created_at))
            })
            .map(|q| q.item.id);

        let Some(id) = candidate_id else {
            return Ok(None);
        };

        let stored = state.queue.get_mut(&id).expect("candidate id came from this map");
        stored.item.status = QueueStatus::Processing;
        stored.item.attempts += 1;
        stored.dequeued_at = Some(now);
        Ok(Some(stored.item.clone()))
    }

    async fn queue_complete(
        &self,
        id: i64,
        outcome: QueueOutcome,
        error: Option<&str>,
        next_retry_at: Option<Time>,
        now: Time,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let stored = state.queue.get_mut(&id).ok_or(Error::NotProcessing { id })?;
        if stored.item.status != QueueStatus::Processing {
            return Err(Error::NotProcessing { id });
        }

        match outcome {
            QueueOutcome::Done => {
                stored.item.status = QueueStatus::Done;
                stored.item.completed_at = Some(now);
                stored.item.last_error = None;
            }
            QueueOutcome::Failed => {
                stored.item.status = QueueStatus::Failed;
                stored.item.next_retry_at = next_retry_at;
                stored.item.last_error = error.map(str::to_string);
            }
            QueueOutcome::FailedTerminal => {
                stored.item.status = QueueStatus::Failed;
                stored.item.next_retry_at = None;
                stored.item.last_error = error.map(str::to_string);
            }
            QueueOutcome::PermanentFail => {
                stored.item.status = QueueStatus::PermanentFail;
                stored.item.completed_at = Some(now);
                stored.item.last_error = error.map(str::to_string);
            }
        }
        stored.dequeued_at = None;
        Ok(())
    }

    async fn reap_stale_processing(&self, older_than: Duration, now: Time) -> Result<u64> {
        let mut state = self.state.lock();
        let mut n = 0;
        for stored in state.queue.values_mut() {
            if stored.item.status != QueueStatus::Processing {
                continue;
            }
            let Some(dequeued_at) = stored.dequeued_at else {
                continue;
            };
            let stale = now
                .checked_duration_since(dequeued_at)
                .map(|elapsed| elapsed >= older_than)
                .unwrap_or(false);
            if stale {
                stored.item.status = QueueStatus::Pending;
                stored.item.attempts += 1;
                stored.dequeued_at = None;
                n += 1;
            }
        }
        Ok(n)
    }

    async fn queue_stats(&self, now: Time) -> Result<QueueStats> {
        let state = self.state.lock();
        let mut stats = QueueStats::default();
        let mut oldest_pending: Option<Time> = None;
        for stored in state.queue.values() {
            match stored.item.status {
                QueueStatus::Pending => {
                    stats.pending += 1;
                    oldest_pending = Some(match oldest_pending {
                        Some(current) if current <= stored.item.created_at => current,
                        _ => stored.item.created_at,
                    });
                }
                QueueStatus::Processing => stats.processing += 1,
                QueueStatus::Failed => stats.failed += 1,
                QueueStatus::PermanentFail => stats.permanent_fail += 1,
                QueueStatus::Done => stats.done += 1,
            }
        }
        stats.oldest_pending_age_seconds = oldest_pending
            .and_then(|oldest| now.checked_duration_since(oldest))
            .map(|d| d.as_secs() as i64);
        Ok(stats)
    }

    async fn append_snapshot(
        &self,
        listing_id: ListingId,
        day: chrono::NaiveDate,
        changes: Vec<Change>,
        now: Time,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let snapshot = Snapshot::new(listing_id, day, changes, now);
        state.snapshots.insert((listing_id, day), snapshot);
        Ok(())
    }

    async fn purge_removed(&self, cutoff: Time, limit: u32, dry_run: bool, now: Time) -> Result<PurgeOutcome> {
        let mut state = self.state.lock();
        let eligible: Vec<ListingId> = state
            .listings
            .values()
            .filter(|l| {
                l.status == ListingStatus::Removed
                    && l.removed_at.map(|r| r < cutoff).unwrap_or(false)
            })
            .map(|l| l.id)
            .collect();

        let target_count = eligible.len() as u64;

        if !dry_run && target_count > limit as u64 {
            return Err(Error::PurgeCapExceeded {
                target: target_count as i64,
                max: limit as i64,
            });
        }

        if dry_run {
            return Ok(PurgeOutcome {
                target_count,
                deleted_count: 0,
                dry_run: true,
                log: Vec::new(),
            });
        }

        let mut log = Vec::with_capacity(eligible.len());
        for id in &eligible {
            if let Some(listing) = state.listings.remove(id) {
                log.push(DeleteLog {
                    listing_id: listing.id,
                    title: listing.title,
                    url: listing.detail_url,
                    removed_at: listing.removed_at.unwrap_or(now),
                    deleted_at: now,
                    reason: "retention_expired".to_string(),
                });
            }
            state.snapshots.retain(|(sid, _), _| sid != id);
        }
        let deleted_count = log.len() as u64;
        state.delete_logs.extend(log.clone());

        Ok(PurgeOutcome {
            target_count,
            deleted_count,
            dry_run: false,
            log,
        })
    }

    async fn get_scraping_state(&self) -> Result<ScrapingState> {
        Ok(self.state.lock().scraping_state.clone())
    }

    async fn set_scraping_state(&self, state: ScrapingState) -> Result<()> {
        self.state.lock().scraping_state = state;
        Ok(())
    }

    async fn catalog_stats(&self) -> Result<CatalogStats> {
        let state = self.state.lock();
        let mut stats = CatalogStats::default();
        for listing in state.listings.values() {
            match listing.status {
                ListingStatus::Active => stats.active_listings += 1,
                ListingStatus::Removed => stats.removed_listings += 1,
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_types::ListingImage as Img;

    fn new_listing(source_id: &str) -> NewListing {
        NewListing {
            source: "yahoo".into(),
            source_id: source_id.into(),
            title: Some("T".into()),
            detail_url: format!("https://x/rent/detail/{source_id}"),
            rent_minor_units: Some(100_000),
            area_sqm: Some(20.0),
            floor_plan: Some("1K".into()),
            walk_minutes: Some(5),
            building_age_years: Some(10),
            floor: Some(3),
            address: None,
            building_type: None,
            facilities: vec![],
            stations: vec![StationAccess {
                station: "Shibuya".into(),
                line: "Yamanote".into(),
                walk_minutes: Some(5),
                rank: 1,
            }],
            images: vec![Img {
                url: "https://x/a.jpg".into(),
                position: 0,
            }],
        }
    }

    #[tokio::test]
    async fn upsert_then_upsert_is_idempotent_on_scalar_fields() {
        let store = MemStore::new();
        let now = Time::from_timestamp_nanos(1_000);
        let record = new_listing("A1");

        let first = store.upsert_listing(&record, now).await.unwrap();
        assert!(first.created);
        let second = store.upsert_listing(&record, now).await.unwrap();
        assert!(!second.created);

        let id = listing_id(&NaturalKey::new("yahoo", "A1"));
        let listing = store.get_listing(id).await.unwrap().unwrap();
        assert_eq!(listing.rent_minor_units, Some(100_000));
    }

    #[tokio::test]
    async fn upsert_preserves_created_at_and_status_across_updates() {
        let store = MemStore::new();
        let t0 = Time::from_timestamp_nanos(1_000);
        let t1 = Time::from_timestamp_nanos(2_000);
        let record = new_listing("A1");
        store.upsert_listing(&record, t0).await.unwrap();
        let id = listing_id(&NaturalKey::new("yahoo", "A1"));
        store.mark_removed(&[id], "test", t0).await.unwrap();

        let mut updated = record.clone();
        updated.rent_minor_units = Some(120_000);
        store.upsert_listing(&updated, t1).await.unwrap();

        let listing = store.get_listing(id).await.unwrap().unwrap();
        assert_eq!(listing.created_at, t0);
        assert_eq!(listing.status, ListingStatus::Removed);
        assert_eq!(listing.rent_minor_units, Some(120_000));
    }

    #[tokio::test]
    async fn empty_child_collections_do_not_overwrite_prior_data() {
        let store = MemStore::new();
        let now = Time::from_timestamp_nanos(1_000);
        let record = new_listing("A1");
        store.upsert_listing(&record, now).await.unwrap();

        let mut update = record.clone();
        update.stations = vec![];
        update.images = vec![];
        store.upsert_listing(&update, now).await.unwrap();

        let id = listing_id(&NaturalKey::new("yahoo", "A1"));
        let stations = store.list_stations(id).await.unwrap();
        assert_eq!(stations.len(), 1);
    }

    #[tokio::test]
    async fn mark_removed_is_idempotent() {
        let store = MemStore::new();
        let now = Time::from_timestamp_nanos(1_000);
        store.upsert_listing(&new_listing("A1"), now).await.unwrap();
        let id = listing_id(&NaturalKey::new("yahoo", "A1"));

        let first = store.mark_removed(&[id], "absent", now).await.unwrap();
        assert_eq!(first, 1);
        let second = store.mark_removed(&[id], "absent", now).await.unwrap();
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn removed_listings_never_appear_in_list_active() {
        let store = MemStore::new();
        let now = Time::from_timestamp_nanos(1_000);
        store.upsert_listing(&new_listing("A1"), now).await.unwrap();
        let id = listing_id(&NaturalKey::new("yahoo", "A1"));
        store.mark_removed(&[id], "absent", now).await.unwrap();

        let page = store.list_active(&ListingFilter::default()).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn queue_next_runnable_orders_by_priority_then_age() {
        let store = MemStore::new();
        let now = Time::from_timestamp_nanos(1_000);
        store
            .queue_enqueue(
                &[
                    NewQueueItem {
                        source: "yahoo".into(),
                        source_id: "low".into(),
                        url: "https://x/low".into(),
                        priority: 0,
                    },
                    NewQueueItem {
                        source: "yahoo".into(),
                        source_id: "high".into(),
                        url: "https://x/high".into(),
                        priority: 10,
                    },
                ],
                now,
            )
            .await
            .unwrap();

        let item = store.queue_next_runnable(now).await.unwrap().unwrap();
        assert_eq!(item.source_id, "high");
        assert_eq!(item.attempts, 1);
        assert_eq!(item.status, QueueStatus::Processing);
    }

    #[tokio::test]
    async fn failed_item_is_invisible_until_next_retry_at() {
        let store = MemStore::new();
        let now = Time::from_timestamp_nanos(0);
        let created = store
            .queue_enqueue(
                &[NewQueueItem {
                    source: "yahoo".into(),
                    source_id: "A1".into(),
                    url: "https://x/A1".into(),
                    priority: 0,
                }],
                now,
            )
            .await
            .unwrap();
        let id = created[0].id;
        store.queue_next_runnable(now).await.unwrap();
        store
            .queue_complete(
                id,
                QueueOutcome::Failed,
                Some("503"),
                Some(Time::from_timestamp_nanos(5_000_000_000_000)),
                now,
            )
            .await
            .unwrap();

        assert!(store.queue_next_runnable(now).await.unwrap().is_none());
        let later = Time::from_timestamp_nanos(5_000_000_000_001);
        let item = store.queue_next_runnable(later).await.unwrap().unwrap();
        assert_eq!(item.attempts, 2);
    }

    #[tokio::test]
    async fn ready_failed_item_outranks_a_lower_priority_pending_item() {
        // S6: "the same item is returned by QueueNextRunnable ahead of
        // newly-pending items with lower priority."
        let store = MemStore::new();
        let t0 = Time::from_timestamp_nanos(0);
        let created = store
            .queue_enqueue(
                &[NewQueueItem {
                    source: "yahoo".into(),
                    source_id: "high".into(),
                    url: "https://x/high".into(),
                    priority: 10,
                }],
                t0,
            )
            .await
            .unwrap();
        let high_id = created[0].id;
        store.queue_next_runnable(t0).await.unwrap();
        let retry_at = Time::from_timestamp_nanos(5_000_000_000_000);
        store
            .queue_complete(high_id, QueueOutcome::Failed, Some("503"), Some(retry_at), t0)
            .await
            .unwrap();

        // A lower-priority item becomes pending after the failed item's
        // retry time is already due.
        store
            .queue_enqueue(
                &[NewQueueItem {
                    source: "yahoo".into(),
                    source_id: "low".into(),
                    url: "https://x/low".into(),
                    priority: 0,
                }],
                retry_at,
            )
            .await
            .unwrap();

        let item = store.queue_next_runnable(retry_at).await.unwrap().unwrap();
        assert_eq!(item.source_id, "high");
        assert_eq!(item.attempts, 2);
    }

    #[tokio::test]
    async fn queue_complete_on_non_processing_item_errors() {
        let store = MemStore::new();
        let now = Time::from_timestamp_nanos(0);
        let created = store
            .queue_enqueue(
                &[NewQueueItem {
                    source: "yahoo".into(),
                    source_id: "A1".into(),
                    url: "https://x/A1".into(),
                    priority: 0,
                }],
                now,
            )
            .await
            .unwrap();

        let err = store
            .queue_complete(created[0].id, QueueOutcome::Done, None, None, now)
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn purge_removed_dry_run_reports_without_deleting() {
        let store = MemStore::new();
        let now = Time::from_timestamp_nanos(200 * 86_400 * 1_000_000_000);
        for i in 0..5 {
            let record = new_listing(&format!("A{i}"));
            store.upsert_listing(&record, Time::from_timestamp_nanos(0)).await.unwrap();
            let id = listing_id(&NaturalKey::new("yahoo", &format!("A{i}")));
            store
                .mark_removed(&[id], "absent", Time::from_timestamp_nanos(0))
                .await
                .unwrap();
        }

        let cutoff = Time::from_timestamp_nanos(100 * 86_400 * 1_000_000_000);
        let outcome = store.purge_removed(cutoff, 10_000, true, now).await.unwrap();
        assert_eq!(outcome.target_count, 5);
        assert_eq!(outcome.deleted_count, 0);
        assert!(store.catalog_stats().await.unwrap().removed_listings == 5);
    }

    #[tokio::test]
    async fn purge_removed_aborts_over_cap_when_not_dry() {
        let store = MemStore::new();
        let now = Time::from_timestamp_nanos(200 * 86_400 * 1_000_000_000);
        for i in 0..5 {
            let record = new_listing(&format!("A{i}"));
            store.upsert_listing(&record, Time::from_timestamp_nanos(0)).await.unwrap();
            let id = listing_id(&NaturalKey::new("yahoo", &format!("A{i}")));
            store
                .mark_removed(&[id], "absent", Time::from_timestamp_nanos(0))
                .await
                .unwrap();
        }
        let cutoff = Time::from_timestamp_nanos(100 * 86_400 * 1_000_000_000);
        let result = store.purge_removed(cutoff, 2, false, now).await;
        assert!(result.is_err());
        assert_eq!(store.catalog_stats().await.unwrap().removed_listings, 5);
    }

    #[tokio::test]
    async fn reap_stale_processing_resets_old_items_only() {
        let store = MemStore::new();
        let t0 = Time::from_timestamp_nanos(0);
        store
            .queue_enqueue(
                &[NewQueueItem {
                    source: "yahoo".into(),
                    source_id: "A1".into(),
                    url: "https://x/A1".into(),
                    priority: 0,
                }],
                t0,
            )
            .await
            .unwrap();
        store.queue_next_runnable(t0).await.unwrap();

        let too_soon = Time::from_timestamp_nanos(Duration::from_secs(60).as_nanos() as i64);
        assert_eq!(store.reap_stale_processing(Duration::from_secs(600), too_soon).await.unwrap(), 0);

        let later = Time::from_timestamp_nanos(Duration::from_secs(601).as_nanos() as i64);
        assert_eq!(store.reap_stale_processing(Duration::from_secs(600), later).await.unwrap(), 1);

        let item = store.queue_next_runnable(later).await.unwrap().unwrap();
        assert_eq!(item.attempts, 2);
    }
}
