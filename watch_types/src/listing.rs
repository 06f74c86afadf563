use serde::{Deserialize, Serialize};

use crate::{MinorUnits, Timestamp};

/// `id = H(source, source_id)` (§3). Never recomputed after insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub(crate) u64);

impl ListingId {
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Reconstructs an id from its raw value, e.g. when decoding a pagination
    /// cursor (§6) that stored the hex form of an id already assigned by
    /// [`crate::listing_id`].
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for ListingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl std::str::FromStr for ListingId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "listing_status", rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Removed,
}

/// One entry in a listing's ordered station-access list. `rank` 1 is
/// nearest (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationAccess {
    pub station: String,
    pub line: String,
    pub walk_minutes: Option<i32>,
    pub rank: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingImage {
    pub url: String,
    pub position: i32,
}

/// The full persisted record (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub source: String,
    pub source_id: String,
    pub title: Option<String>,
    pub detail_url: String,

    pub rent_minor_units: Option<MinorUnits>,
    pub area_sqm: Option<f64>,
    pub floor_plan: Option<String>,
    pub walk_minutes: Option<i32>,
    pub building_age_years: Option<i32>,
    pub floor: Option<i32>,
    pub address: Option<String>,
    pub building_type: Option<String>,
    pub facilities: Vec<String>,

    pub stations: Vec<StationAccess>,
    pub images: Vec<ListingImage>,

    pub status: ListingStatus,
    pub removed_at: Option<Timestamp>,
    pub fetched_at: Timestamp,
    pub last_seen_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// What `Extractor::parse` (and the Scheduler's shell-record path) produce:
/// everything about a listing except the identity and lifecycle fields that
/// only `Store::UpsertListing` is allowed to set (§4.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    pub source: String,
    pub source_id: String,
    pub title: Option<String>,
    pub detail_url: String,

    pub rent_minor_units: Option<MinorUnits>,
    pub area_sqm: Option<f64>,
    pub floor_plan: Option<String>,
    pub walk_minutes: Option<i32>,
    pub building_age_years: Option<i32>,
    pub floor: Option<i32>,
    pub address: Option<String>,
    pub building_type: Option<String>,
    pub facilities: Vec<String>,

    pub stations: Vec<StationAccess>,
    pub images: Vec<ListingImage>,
}

impl NewListing {
    pub fn natural_key(&self) -> crate::NaturalKey {
        crate::NaturalKey::new(self.source.clone(), self.source_id.clone())
    }
}
