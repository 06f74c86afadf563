use watch_types::{Change, DeleteLog, Listing, ListingId, NaturalKey, QueueItem, QueueOutcome, QueueStatus};

use crate::filter::Cursor;

/// Result of `Store::UpsertListing` (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub created: bool,
}

/// One page of `Store::ListActive` (§4.1, §6).
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Listing>,
    pub total_count: u64,
    pub next_cursor: Option<Cursor>,
}

/// A queue item not yet persisted, as produced by the Scheduler for `New`
/// URLs (§4.8).
#[derive(Debug, Clone)]
pub struct NewQueueItem {
    pub source: String,
    pub source_id: String,
    pub url: String,
    pub priority: i32,
}

/// Result of `Store::PurgeRemoved` (§4.1, §4.10).
#[derive(Debug, Clone, Default)]
pub struct PurgeOutcome {
    pub target_count: u64,
    pub deleted_count: u64,
    pub dry_run: bool,
    pub log: Vec<DeleteLog>,
}

/// Per-status counts backing the `get-queue-stats` admin command (§B.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub failed: u64,
    pub permanent_fail: u64,
    pub done: u64,
    pub oldest_pending_age_seconds: Option<i64>,
}

impl QueueStats {
    pub fn count_for(&self, status: QueueStatus) -> u64 {
        match status {
            QueueStatus::Pending => self.pending,
            QueueStatus::Processing => self.processing,
            QueueStatus::Failed => self.failed,
            QueueStatus::PermanentFail => self.permanent_fail,
            QueueStatus::Done => self.done,
        }
    }
}

/// Backing data for the `get-stats` admin command (§B.6).
#[derive(Debug, Clone, Default)]
pub struct CatalogStats {
    pub active_listings: u64,
    pub removed_listings: u64,
}

/// A slim natural-key summary of one active listing, used by the
/// Scheduler's set-difference reconciliation (§4.8) without pulling every
/// scalar field across the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActiveListingRef {
    pub id: ListingId,
    pub natural_key: NaturalKey,
}

/// Outcome of `Store::QueueComplete`'s terminal transition, paired with the
/// error/retry metadata the caller computed (§4.1, §4.5).
#[derive(Debug, Clone)]
pub struct QueueCompletion {
    pub outcome: QueueOutcome,
    pub error: Option<String>,
    pub next_retry_at: Option<watch_time::Time>,
}

/// A listing's change-detection write for one day (§4.1, §4.9): the
/// snapshot plus the changes it produced.
#[derive(Debug, Clone)]
pub struct SnapshotWrite {
    pub listing_id: ListingId,
    pub day: chrono::NaiveDate,
    pub changes: Vec<Change>,
}

/// A fully materialized `QueueItem` plus whether it was newly created by
/// `QueueEnqueue` (duplicates within one call are deduplicated by the
/// natural key + pending/processing rule the Scheduler already applies
/// before calling this, §4.8 step 3).
pub type EnqueuedItem = QueueItem;
