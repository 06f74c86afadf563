//! The production `Store` backend (§4.1): raw `sqlx` queries against a
//! [`HotSwapPool<Postgres>`] rather than an ORM, matching the catalog's own
//! posture elsewhere in this workspace of keeping the SQL visible at the
//! call site.
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use snafu::ResultExt;
use sqlx::{postgres::Postgres, types::Json, QueryBuilder, Row};
use sqlx_hotswap_pool::HotSwapPool;
use watch_time::Time;
use watch_types::{
    Change, DeleteLog, Listing, ListingId, ListingImage, ListingStatus, NaturalKey, NewListing,
    QueueItem, QueueOutcome, QueueStatus, ScrapingState, StationAccess,
};

use crate::{
    error::{ConnectSnafu, MigrationSnafu, QuerySnafu},
    filter::{Cursor, ListingFilter, SortOrder, WalkMode},
    store::Store,
    types::{ActiveListingRef, CatalogStats, NewQueueItem, Page, PurgeOutcome, QueueStats, UpsertOutcome},
    Error, Result,
};

fn to_raw(id: ListingId) -> i64 {
    id.get() as i64
}

fn from_raw(raw: i64) -> ListingId {
    ListingId::from_raw(raw as u64)
}

/// Raw columns of one `listings` row, before its child collections are
/// joined in.
#[derive(sqlx::FromRow)]
struct ListingRow {
    id: i64,
    source: String,
    source_id: String,
    title: Option<String>,
    detail_url: String,
    rent_minor_units: Option<i64>,
    area_sqm: Option<f64>,
    floor_plan: Option<String>,
    walk_minutes: Option<i32>,
    building_age_years: Option<i32>,
    floor: Option<i32>,
    address: Option<String>,
    building_type: Option<String>,
    facilities: Json<Vec<String>>,
    status: ListingStatus,
    removed_at: Option<DateTime<Utc>>,
    fetched_at: DateTime<Utc>,
    last_seen_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ListingRow {
    fn into_listing(self, stations: Vec<StationAccess>, images: Vec<ListingImage>) -> Listing {
        Listing {
            id: from_raw(self.id),
            source: self.source,
            source_id: self.source_id,
            title: self.title,
            detail_url: self.detail_url,
            rent_minor_units: self.rent_minor_units,
            area_sqm: self.area_sqm,
            floor_plan: self.floor_plan,
            walk_minutes: self.walk_minutes,
            building_age_years: self.building_age_years,
            floor: self.floor,
            address: self.address,
            building_type: self.building_type,
            facilities: self.facilities.0,
            stations,
            images,
            status: self.status,
            removed_at: self.removed_at.map(Time::from),
            fetched_at: Time::from(self.fetched_at),
            last_seen_at: Time::from(self.last_seen_at),
            created_at: Time::from(self.created_at),
            updated_at: Time::from(self.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct StationRow {
    station: String,
    line: String,
    walk_minutes: Option<i32>,
    rank: i32,
}

impl From<StationRow> for StationAccess {
    fn from(row: StationRow) -> Self {
        Self {
            station: row.station,
            line: row.line,
            walk_minutes: row.walk_minutes,
            rank: row.rank,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ImageRow {
    url: String,
    position: i32,
}

impl From<ImageRow> for ListingImage {
    fn from(row: ImageRow) -> Self {
        Self {
            url: row.url,
            position: row.position,
        }
    }
}

#[derive(sqlx::FromRow)]
struct QueueRow {
    id: i64,
    source: String,
    source_id: String,
    url: String,
    priority: i32,
    status: QueueStatus,
    attempts: i32,
    last_error: Option<String>,
    next_retry_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<QueueRow> for QueueItem {
    fn from(row: QueueRow) -> Self {
        Self {
            id: row.id,
            source: row.source,
            source_id: row.source_id,
            url: row.url,
            priority: row.priority,
            status: row.status,
            attempts: row.attempts,
            last_error: row.last_error,
            next_retry_at: row.next_retry_at.map(Time::from),
            completed_at: row.completed_at.map(Time::from),
            created_at: Time::from(row.created_at),
        }
    }
}

/// Postgres-backed `Store` (§4.1). Holds a [`HotSwapPool`] so credential
/// rotation (via `watch_config::DatabaseConfig::hotswap_credentials_file`)
/// never requires callers to re-fetch a pool handle.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: HotSwapPool<Postgres>,
}

impl PostgresStore {
    /// Connects and runs pending migrations. Mirrors the embedded-migration
    /// idiom used across this workspace's other Postgres-backed crates.
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(dsn)
            .await
            .context(ConnectSnafu)?;
        sqlx::migrate!("./migrations").run(&pool).await.context(MigrationSnafu)?;
        Ok(Self {
            pool: HotSwapPool::new(pool),
        })
    }

    pub fn from_pool(pool: HotSwapPool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_stations(&self, id: ListingId) -> Result<Vec<StationAccess>> {
        let rows: Vec<StationRow> = sqlx::query_as(
            "SELECT station, line, walk_minutes, rank FROM listing_stations WHERE listing_id = $1 ORDER BY rank ASC",
        )
        .bind(to_raw(id))
        .fetch_all(&self.pool.current())
        .await
        .context(QuerySnafu)?;
        Ok(rows.into_iter().map(StationAccess::from).collect())
    }

    async fn fetch_images(&self, id: ListingId) -> Result<Vec<ListingImage>> {
        let rows: Vec<ImageRow> = sqlx::query_as(
            "SELECT url, position FROM listing_images WHERE listing_id = $1 ORDER BY position ASC",
        )
        .bind(to_raw(id))
        .fetch_all(&self.pool.current())
        .await
        .context(QuerySnafu)?;
        Ok(rows.into_iter().map(ListingImage::from).collect())
    }
}

const LISTING_COLUMNS: &str = "id, source, source_id, title, detail_url, rent_minor_units, \
    area_sqm, floor_plan, walk_minutes, building_age_years, floor, address, building_type, \
    facilities, status, removed_at, fetched_at, last_seen_at, created_at, updated_at";

fn push_common_filters<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a ListingFilter) {
    if let Some(station) = &filter.station {
        qb.push(" AND EXISTS (SELECT 1 FROM listing_stations ls WHERE ls.listing_id = listings.id AND ls.station ILIKE ");
        qb.push_bind(format!("%{station}%"));
        qb.push(")");
    }
    if let Some(line) = &filter.line {
        qb.push(" AND EXISTS (SELECT 1 FROM listing_stations ls WHERE ls.listing_id = listings.id AND ls.line ILIKE ");
        qb.push_bind(format!("%{line}%"));
        qb.push(")");
    }
    if let Some(max_walk) = filter.max_walk {
        match filter.walk_mode {
            WalkMode::Nearest => {
                qb.push(" AND listings.walk_minutes IS NOT NULL AND listings.walk_minutes <= ");
                qb.push_bind(max_walk);
            }
            WalkMode::Any => {
                qb.push(" AND EXISTS (SELECT 1 FROM listing_stations ls WHERE ls.listing_id = listings.id AND ls.walk_minutes <= ");
                qb.push_bind(max_walk);
                qb.push(")");
            }
        }
    }
    if let Some(min_rent) = filter.min_rent {
        qb.push(" AND listings.rent_minor_units >= ").push_bind(min_rent);
    }
    if let Some(max_rent) = filter.max_rent {
        qb.push(" AND listings.rent_minor_units <= ").push_bind(max_rent);
    }
    if let Some(min_area) = filter.min_area {
        qb.push(" AND listings.area_sqm >= ").push_bind(min_area);
    }
    if let Some(max_area) = filter.max_area {
        qb.push(" AND listings.area_sqm <= ").push_bind(max_area);
    }
    if let Some(min_age) = filter.min_age {
        qb.push(" AND listings.building_age_years >= ").push_bind(min_age);
    }
    if let Some(max_age) = filter.max_age {
        qb.push(" AND listings.building_age_years <= ").push_bind(max_age);
    }
    if let Some(min_floor) = filter.min_floor {
        qb.push(" AND listings.floor >= ").push_bind(min_floor);
    }
    if let Some(max_floor) = filter.max_floor {
        qb.push(" AND listings.floor <= ").push_bind(max_floor);
    }
    if !filter.floor_plans.is_empty() {
        qb.push(" AND listings.floor_plan = ANY(").push_bind(filter.floor_plans.clone()).push(")");
    }
    if !filter.building_types.is_empty() {
        qb.push(" AND listings.building_type = ANY(").push_bind(filter.building_types.clone()).push(")");
    }
    for facility in &filter.facilities {
        qb.push(" AND listings.facilities::text ILIKE ");
        qb.push_bind(format!("%{facility}%"));
    }
    if !filter.exclude_ids.is_empty() {
        let raw: Vec<i64> = filter.exclude_ids.iter().map(|id| to_raw(*id)).collect();
        qb.push(" AND NOT (listings.id = ANY(").push_bind(raw).push("))");
    }
}

fn sort_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Newest => " ORDER BY listings.fetched_at DESC, listings.id DESC",
        SortOrder::FetchedAtAsc => " ORDER BY listings.fetched_at ASC, listings.id ASC",
        SortOrder::RentAsc => " ORDER BY listings.rent_minor_units ASC NULLS LAST",
        SortOrder::RentDesc => " ORDER BY listings.rent_minor_units DESC NULLS FIRST",
        SortOrder::AreaDesc => " ORDER BY listings.area_sqm DESC NULLS FIRST",
        SortOrder::WalkTimeAsc => " ORDER BY listings.walk_minutes ASC NULLS LAST",
        SortOrder::BuildingAgeAsc => " ORDER BY listings.building_age_years ASC NULLS LAST",
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_listing(&self, record: &NewListing, now: Time) -> Result<UpsertOutcome> {
        let pool = self.pool.current();
        let mut tx = pool.begin().await.context(QuerySnafu)?;
        let natural_key = NaturalKey::new(record.source.clone(), record.source_id.clone());
        let id = watch_types::listing_id(&natural_key);

        let row = sqlx::query(
            r#"
            INSERT INTO listings (
                id, source, source_id, title, detail_url, rent_minor_units, area_sqm,
                floor_plan, walk_minutes, building_age_years, floor, address, building_type,
                facilities, status, removed_at, fetched_at, last_seen_at, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,'active',NULL,$15,$15,$15,$15)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                detail_url = EXCLUDED.detail_url,
                rent_minor_units = EXCLUDED.rent_minor_units,
                area_sqm = EXCLUDED.area_sqm,
                floor_plan = EXCLUDED.floor_plan,
                walk_minutes = EXCLUDED.walk_minutes,
                building_age_years = EXCLUDED.building_age_years,
                floor = EXCLUDED.floor,
                address = EXCLUDED.address,
                building_type = EXCLUDED.building_type,
                facilities = EXCLUDED.facilities,
                fetched_at = EXCLUDED.fetched_at,
                last_seen_at = EXCLUDED.last_seen_at,
                updated_at = EXCLUDED.updated_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(to_raw(id))
        .bind(&record.source)
        .bind(&record.source_id)
        .bind(&record.title)
        .bind(&record.detail_url)
        .bind(record.rent_minor_units)
        .bind(record.area_sqm)
        .bind(&record.floor_plan)
        .bind(record.walk_minutes)
        .bind(record.building_age_years)
        .bind(record.floor)
        .bind(&record.address)
        .bind(&record.building_type)
        .bind(Json(&record.facilities))
        .bind(now.date_time())
        .fetch_one(&mut *tx)
        .await
        .context(QuerySnafu)?;
        let created: bool = row.try_get("inserted").context(QuerySnafu)?;

        if !record.stations.is_empty() {
            sqlx::query("DELETE FROM listing_stations WHERE listing_id = $1")
                .bind(to_raw(id))
                .execute(&mut *tx)
                .await
                .context(QuerySnafu)?;
            for station in &record.stations {
                sqlx::query(
                    "INSERT INTO listing_stations (listing_id, station, line, walk_minutes, rank) VALUES ($1,$2,$3,$4,$5)",
                )
                .bind(to_raw(id))
                .bind(&station.station)
                .bind(&station.line)
                .bind(station.walk_minutes)
                .bind(station.rank)
                .execute(&mut *tx)
                .await
                .context(QuerySnafu)?;
            }
        }

        if !record.images.is_empty() {
            sqlx::query("DELETE FROM listing_images WHERE listing_id = $1")
                .bind(to_raw(id))
                .execute(&mut *tx)
                .await
                .context(QuerySnafu)?;
            for image in &record.images {
                sqlx::query("INSERT INTO listing_images (listing_id, url, position) VALUES ($1,$2,$3)")
                    .bind(to_raw(id))
                    .bind(&image.url)
                    .bind(image.position)
                    .execute(&mut *tx)
                    .await
                    .context(QuerySnafu)?;
            }
        }

        tx.commit().await.context(QuerySnafu)?;
        Ok(UpsertOutcome { created })
    }

    async fn mark_removed(&self, ids: &[ListingId], _reason: &str, now: Time) -> Result<u64> {
        let raw: Vec<i64> = ids.iter().map(|id| to_raw(*id)).collect();
        let result = sqlx::query(
            "UPDATE listings SET status = 'removed', removed_at = $2, updated_at = $2 \
             WHERE id = ANY($1) AND status = 'active'",
        )
        .bind(raw)
        .bind(now.date_time())
        .execute(&self.pool.current())
        .await
        .context(QuerySnafu)?;
        Ok(result.rows_affected())
    }

    async fn touch_last_seen(&self, ids: &[ListingId], now: Time) -> Result<u64> {
        let raw: Vec<i64> = ids.iter().map(|id| to_raw(*id)).collect();
        let result = sqlx::query("UPDATE listings SET last_seen_at = $2 WHERE id = ANY($1)")
            .bind(raw)
            .bind(now.date_time())
            .execute(&self.pool.current())
            .await
            .context(QuerySnafu)?;
        Ok(result.rows_affected())
    }

    async fn get_listing(&self, id: ListingId) -> Result<Option<Listing>> {
        let row: Option<ListingRow> =
            sqlx::query_as(&format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1"))
                .bind(to_raw(id))
                .fetch_optional(&self.pool.current())
                .await
                .context(QuerySnafu)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let stations = self.fetch_stations(id).await?;
        let images = self.fetch_images(id).await?;
        Ok(Some(row.into_listing(stations, images)))
    }

    async fn list_active(&self, filter: &ListingFilter) -> Result<Page> {
        filter.validate().map_err(|_| Error::InvalidCursor)?;

        let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM listings WHERE status = 'active'");
        push_common_filters(&mut count_qb, filter);
        let total_count: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool.current())
            .await
            .context(QuerySnafu)?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {LISTING_COLUMNS} FROM listings WHERE status = 'active'"));
        push_common_filters(&mut qb, filter);

        let ascending = matches!(filter.sort, SortOrder::FetchedAtAsc);
        if let Some(cursor) = &filter.cursor {
            if ascending {
                qb.push(" AND (listings.fetched_at > ")
                    .push_bind(cursor.fetched_at.date_time())
                    .push(" OR (listings.fetched_at = ")
                    .push_bind(cursor.fetched_at.date_time())
                    .push(" AND listings.id > ")
                    .push_bind(to_raw(cursor.id))
                    .push("))");
            } else {
                qb.push(" AND (listings.fetched_at < ")
                    .push_bind(cursor.fetched_at.date_time())
                    .push(" OR (listings.fetched_at = ")
                    .push_bind(cursor.fetched_at.date_time())
                    .push(" AND listings.id < ")
                    .push_bind(to_raw(cursor.id))
                    .push("))");
            }
        }

        qb.push(sort_clause(filter.sort));
        let limit = filter.effective_limit();
        qb.push(" LIMIT ").push_bind(limit as i64 + 1);

        let rows: Vec<ListingRow> = qb.build_query_as().fetch_all(&self.pool.current()).await.context(QuerySnafu)?;

        let has_more = rows.len() as u32 > limit;
        let mut rows = rows;
        rows.truncate(limit as usize);

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let id = from_raw(row.id);
            let stations = self.fetch_stations(id).await?;
            let images = self.fetch_images(id).await?;
            items.push(row.into_listing(stations, images));
        }

        let next_cursor = if has_more {
            items.last().map(|l| Cursor {
                fetched_at: l.fetched_at,
                id: l.id,
            })
        } else {
            None
        };

        Ok(Page {
            items,
            total_count: total_count as u64,
            next_cursor,
        })
    }

    async fn list_stations(&self, id: ListingId) -> Result<Vec<StationAccess>> {
        self.fetch_stations(id).await
    }

    async fn list_images(&self, id: ListingId) -> Result<Vec<ListingImage>> {
        self.fetch_images(id).await
    }

    async fn active_listing_refs(&self) -> Result<Vec<ActiveListingRef>> {
        let rows = sqlx::query("SELECT id, source, source_id FROM listings WHERE status = 'active'")
            .fetch_all(&self.pool.current())
            .await
            .context(QuerySnafu)?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let id: i64 = row.get("id");
                let source: String = row.get("source");
                let source_id: String = row.get("source_id");
                ActiveListingRef {
                    id: from_raw(id),
                    natural_key: NaturalKey::new(source, source_id),
                }
            })
            .collect())
    }

    async fn queue_enqueue(&self, items: &[NewQueueItem], now: Time) -> Result<Vec<QueueItem>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }
        let sources: Vec<&str> = items.iter().map(|i| i.source.as_str()).collect();
        let source_ids: Vec<&str> = items.iter().map(|i| i.source_id.as_str()).collect();
        let urls: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
        let priorities: Vec<i32> = items.iter().map(|i| i.priority).collect();

        let rows: Vec<QueueRow> = sqlx::query_as(
            r#"
            INSERT INTO queue (source, source_id, url, priority, created_at)
            SELECT v.source, v.source_id, v.url, v.priority, $5::timestamptz
            FROM UNNEST($1::text[], $2::text[], $3::text[], $4::int[]) AS v(source, source_id, url, priority)
            RETURNING id, source, source_id, url, priority, status, attempts, last_error, next_retry_at, completed_at, created_at
            "#,
        )
        .bind(sources)
        .bind(source_ids)
        .bind(urls)
        .bind(priorities)
        .bind(now.date_time())
        .fetch_all(&self.pool.current())
        .await
        .context(QuerySnafu)?;

        Ok(rows.into_iter().map(QueueItem::from).collect())
    }

    async fn queue_has_runnable_for(&self, source: &str, source_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM queue WHERE source = $1 AND source_id = $2 AND status IN ('pending','processing'))",
        )
        .bind(source)
        .bind(source_id)
        .fetch_one(&self.pool.current())
        .await
        .context(QuerySnafu)?;
        Ok(exists)
    }

    async fn queue_next_runnable(&self, now: Time) -> Result<Option<QueueItem>> {
        let row: Option<QueueRow> = sqlx::query_as(
            r#"
            WITH candidate AS (
                SELECT id FROM queue
                WHERE status = 'pending' OR (status = 'failed' AND next_retry_at <= $1)
                ORDER BY priority DESC, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE queue SET status = 'processing', attempts = attempts + 1, dequeued_at = $1
            FROM candidate WHERE queue.id = candidate.id
            RETURNING queue.id, queue.source, queue.source_id, queue.url, queue.priority,
                      queue.status, queue.attempts, queue.last_error, queue.next_retry_at,
                      queue.completed_at, queue.created_at
            "#,
        )
        .bind(now.date_time())
        .fetch_optional(&self.pool.current())
        .await
        .context(QuerySnafu)?;
        Ok(row.map(QueueItem::from))
    }

    async fn queue_complete(
        &self,
        id: i64,
        outcome: QueueOutcome,
        error: Option<&str>,
        next_retry_at: Option<Time>,
        now: Time,
    ) -> Result<()> {
        let (status, completed_at, retry_at): (QueueStatus, Option<DateTime<Utc>>, Option<DateTime<Utc>>) =
            match outcome {
                QueueOutcome::Done => (QueueStatus::Done, Some(now.date_time()), None),
                QueueOutcome::Failed => (QueueStatus::Failed, None, next_retry_at.map(|t| t.date_time())),
                QueueOutcome::FailedTerminal => (QueueStatus::Failed, None, None),
                QueueOutcome::PermanentFail => (QueueStatus::PermanentFail, Some(now.date_time()), None),
            };

        let result = sqlx::query(
            "UPDATE queue SET status = $2, last_error = $3, next_retry_at = $4, completed_at = $5, dequeued_at = NULL \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .bind(status)
        .bind(error)
        .bind(retry_at)
        .bind(completed_at)
        .execute(&self.pool.current())
        .await
        .context(QuerySnafu)?;

        if result.rows_affected() == 0 {
            return Err(Error::NotProcessing { id });
        }
        Ok(())
    }

    async fn reap_stale_processing(&self, older_than: Duration, now: Time) -> Result<u64> {
        let cutoff = Time::from(now.date_time() - chrono::Duration::from_std(older_than).unwrap_or_default());
        let result = sqlx::query(
            "UPDATE queue SET status = 'pending', attempts = attempts + 1, dequeued_at = NULL \
             WHERE status = 'processing' AND dequeued_at < $1",
        )
        .bind(cutoff.date_time())
        .execute(&self.pool.current())
        .await
        .context(QuerySnafu)?;
        Ok(result.rows_affected())
    }

    async fn queue_stats(&self, now: Time) -> Result<QueueStats> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM queue GROUP BY status")
            .fetch_all(&self.pool.current())
            .await
            .context(QuerySnafu)?;

        let mut stats = QueueStats::default();
        for row in rows {
            let status: QueueStatus = row.get("status");
            let n: i64 = row.get("n");
            match status {
                QueueStatus::Pending => stats.pending = n as u64,
                QueueStatus::Processing => stats.processing = n as u64,
                QueueStatus::Failed => stats.failed = n as u64,
                QueueStatus::PermanentFail => stats.permanent_fail = n as u64,
                QueueStatus::Done => stats.done = n as u64,
            }
        }

        let oldest: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MIN(created_at) FROM queue WHERE status = 'pending'")
                .fetch_one(&self.pool.current())
                .await
                .context(QuerySnafu)?;
        stats.oldest_pending_age_seconds = oldest
            .map(Time::from)
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
        let has_changed = !changes.is_empty();
        sqlx::query(
            r#"
            INSERT INTO snapshots (listing_id, day, has_changed, change_note, changes, created_at)
            VALUES ($1, $2, $3, NULL, $4, $5)
            ON CONFLICT (listing_id, day) DO UPDATE SET
                has_changed = EXCLUDED.has_changed,
                changes = EXCLUDED.changes,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(to_raw(listing_id))
        .bind(day)
        .bind(has_changed)
        .bind(Json(&changes))
        .bind(now.date_time())
        .execute(&self.pool.current())
        .await
        .context(QuerySnafu)?;
        Ok(())
    }

    async fn purge_removed(&self, cutoff: Time, limit: u32, dry_run: bool, now: Time) -> Result<PurgeOutcome> {
        let target_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM listings WHERE status = 'removed' AND removed_at < $1",
        )
        .bind(cutoff.date_time())
        .fetch_one(&self.pool.current())
        .await
        .context(QuerySnafu)?;
        let target_count = target_count as u64;

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

        let pool = self.pool.current();
        let mut tx = pool.begin().await.context(QuerySnafu)?;

        let rows = sqlx::query(
            "SELECT id, title, detail_url, removed_at FROM listings WHERE status = 'removed' AND removed_at < $1",
        )
        .bind(cutoff.date_time())
        .fetch_all(&mut *tx)
        .await
        .context(QuerySnafu)?;

        let mut log = Vec::with_capacity(rows.len());
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = row.get("id");
            ids.push(id);
            log.push(DeleteLog {
                listing_id: from_raw(id),
                title: row.get("title"),
                url: row.get("detail_url"),
                removed_at: Time::from(row.get::<DateTime<Utc>, _>("removed_at")),
                deleted_at: now,
                reason: "retention_expired".to_string(),
            });
        }

        for entry in &log {
            sqlx::query(
                "INSERT INTO delete_logs (listing_id, title, url, removed_at, deleted_at, reason) \
                 VALUES ($1,$2,$3,$4,$5,$6)",
            )
            .bind(to_raw(entry.listing_id))
            .bind(&entry.title)
            .bind(&entry.url)
            .bind(entry.removed_at.date_time())
            .bind(entry.deleted_at.date_time())
            .bind(&entry.reason)
            .execute(&mut *tx)
            .await
            .context(QuerySnafu)?;
        }

        sqlx::query("DELETE FROM listings WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&mut *tx)
            .await
            .context(QuerySnafu)?;

        tx.commit().await.context(QuerySnafu)?;

        Ok(PurgeOutcome {
            target_count,
            deleted_count: ids.len() as u64,
            dry_run: false,
            log,
        })
    }

    async fn get_scraping_state(&self) -> Result<ScrapingState> {
        let row = sqlx::query(
            "SELECT is_blocked, blocked_until, blocked_reason, last_attempt, last_success, failure_count, success_count \
             FROM scraping_state WHERE id = TRUE",
        )
        .fetch_one(&self.pool.current())
        .await
        .context(QuerySnafu)?;

        Ok(ScrapingState {
            is_blocked: row.get("is_blocked"),
            blocked_until: row.get::<Option<DateTime<Utc>>, _>("blocked_until").map(Time::from),
            blocked_reason: row.get("blocked_reason"),
            last_attempt: row.get::<Option<DateTime<Utc>>, _>("last_attempt").map(Time::from),
            last_success: row.get::<Option<DateTime<Utc>>, _>("last_success").map(Time::from),
            failure_count: row.get("failure_count"),
            success_count: row.get("success_count"),
        })
    }

    async fn set_scraping_state(&self, state: ScrapingState) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE scraping_state SET
                is_blocked = $1,
                blocked_until = $2,
                blocked_reason = $3,
                last_attempt = $4,
                last_success = $5,
                failure_count = $6,
                success_count = $7
            WHERE id = TRUE
            "#,
        )
        .bind(state.is_blocked)
        .bind(state.blocked_until.map(|t| t.date_time()))
        .bind(state.blocked_reason)
        .bind(state.last_attempt.map(|t| t.date_time()))
        .bind(state.last_success.map(|t| t.date_time()))
        .bind(state.failure_count)
        .bind(state.success_count)
        .execute(&self.pool.current())
        .await
        .context(QuerySnafu)?;
        Ok(())
    }

    async fn catalog_stats(&self) -> Result<CatalogStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) FILTER (WHERE status = 'active') AS active, \
                    COUNT(*) FILTER (WHERE status = 'removed') AS removed \
             FROM listings",
        )
        .fetch_one(&self.pool.current())
        .await
        .context(QuerySnafu)?;

        let active: i64 = row.get("active");
        let removed: i64 = row.get("removed");
        Ok(CatalogStats {
            active_listings: active as u64,
            removed_listings: removed as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    //! These exercise the real schema and only run against a live Postgres,
    //! named by `TEST_DATABASE_URL` -- unlike the rest of the workspace's
    //! unit tests, which run against `MemStore` and need nothing external.
    use super::*;

    async fn test_store() -> Option<PostgresStore> {
        dotenvy::dotenv().ok();
        let dsn = std::env::var("TEST_DATABASE_URL").ok()?;
        Some(PostgresStore::connect(&dsn, 5).await.expect("connect and migrate"))
    }

    fn sample(source_id: &str) -> NewListing {
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
            stations: vec![],
            images: vec![],
        }
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn upsert_then_get_round_trips() {
        let Some(store) = test_store().await else { return };
        let now = Time::from(Utc::now());
        let record = sample("pg-1");
        let outcome = store.upsert_listing(&record, now).await.unwrap();
        assert!(outcome.created);

        let id = watch_types::listing_id(&NaturalKey::new("yahoo", "pg-1"));
        let listing = store.get_listing(id).await.unwrap().unwrap();
        assert_eq!(listing.rent_minor_units, Some(100_000));
    }

    #[tokio::test]
    #[ignore = "requires TEST_DATABASE_URL"]
    async fn queue_next_runnable_skips_locked_rows() {
        let Some(store) = test_store().await else { return };
        let now = Time::from(Utc::now());
        store
            .queue_enqueue(
                &[NewQueueItem {
                    source: "yahoo".into(),
                    source_id: "pg-q1".into(),
                    url: "https://x/pg-q1".into(),
                    priority: 0,
                }],
                now,
            )
            .await
            .unwrap();

        let item = store.queue_next_runnable(now).await.unwrap().unwrap();
        assert_eq!(item.status, QueueStatus::Processing);
        assert_eq!(item.attempts, 1);
    }
}
