use serde::{Deserialize, Serialize};

use crate::{ListingId, Timestamp};

/// Audit row written whenever a listing is physically purged (§3, §4.10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteLog {
    pub listing_id: ListingId,
    pub title: Option<String>,
    pub url: String,
    pub removed_at: Timestamp,
    pub deleted_at: Timestamp,
    pub reason: String,
}
