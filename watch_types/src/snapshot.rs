use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Change, ListingId, Timestamp};

/// One row per (listing, day) (§3). `has_changed` is derived from whether
/// any [`Change`] rows were produced for this write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub listing_id: ListingId,
    pub day: NaiveDate,
    pub has_changed: bool,
    pub change_note: Option<String>,
    pub changes: Vec<Change>,
    pub created_at: Timestamp,
}

impl Snapshot {
    pub fn new(listing_id: ListingId, day: NaiveDate, changes: Vec<Change>, created_at: Timestamp) -> Self {
        let has_changed = !changes.is_empty();
        Self {
            listing_id,
            day,
            has_changed,
            change_note: None,
            changes,
            created_at,
        }
    }
}
