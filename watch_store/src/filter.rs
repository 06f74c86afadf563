use base64::Engine;
use serde::{Deserialize, Serialize};
use watch_types::{ListingId, Timestamp};

use crate::error::{Error, Result};

/// Query-collaborator filter options (§6). The filter façade itself is an
/// out-of-core collaborator; Store only needs to answer it.
#[derive(Debug, Clone, Default)]
pub struct ListingFilter {
    pub station: Option<String>,
    pub line: Option<String>,
    pub max_walk: Option<i32>,
    pub walk_mode: WalkMode,
    pub min_rent: Option<i64>,
    pub max_rent: Option<i64>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub min_age: Option<i32>,
    pub max_age: Option<i32>,
    pub min_floor: Option<i32>,
    pub max_floor: Option<i32>,
    pub floor_plans: Vec<String>,
    pub building_types: Vec<String>,
    pub facilities: Vec<String>,
    pub exclude_ids: Vec<ListingId>,
    pub sort: SortOrder,
    pub cursor: Option<Cursor>,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WalkMode {
    #[default]
    Nearest,
    Any,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Newest,
    RentAsc,
    RentDesc,
    AreaDesc,
    WalkTimeAsc,
    BuildingAgeAsc,
    FetchedAtAsc,
}

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 20_000;
pub const MAX_FLOOR_PLANS: usize = 20;
pub const MAX_BUILDING_TYPES: usize = 10;
pub const MAX_FACILITIES: usize = 30;
pub const MAX_EXCLUDE_IDS: usize = 500;

impl ListingFilter {
    /// Validates the range/size-cap rules of §6. Does not validate
    /// cursor-vs-sort compatibility; callers decode the cursor separately.
    pub fn validate(&self) -> Result<(), FilterError> {
        check_range(self.min_rent, self.max_rent)?;
        check_range(self.min_area.map(OrderedF64), self.max_area.map(OrderedF64))?;
        check_range(self.min_age, self.max_age)?;
        check_range(self.min_floor, self.max_floor)?;

        check_cap("floorPlans", self.floor_plans.len(), MAX_FLOOR_PLANS)?;
        check_cap("buildingTypes", self.building_types.len(), MAX_BUILDING_TYPES)?;
        check_cap("facilities", self.facilities.len(), MAX_FACILITIES)?;
        check_cap("excludeIds", self.exclude_ids.len(), MAX_EXCLUDE_IDS)?;

        if self.cursor.is_some()
            && !matches!(self.sort, SortOrder::Newest | SortOrder::FetchedAtAsc)
        {
            return Err(FilterError::CursorRequiresCompatibleSort);
        }

        Ok(())
    }

    pub fn effective_limit(&self) -> u32 {
        if self.limit == 0 {
            DEFAULT_LIMIT
        } else {
            self.limit.min(MAX_LIMIT)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
struct OrderedF64(f64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, snafu::Snafu)]
pub enum FilterError {
    #[snafu(display("min must be <= max"))]
    MinGreaterThanMax,
    #[snafu(display("{field} exceeds its size cap of {cap}"))]
    CapExceeded { field: &'static str, cap: usize },
    #[snafu(display("cursor pagination is only valid for sort in {{newest, fetched_at_asc}}"))]
    CursorRequiresCompatibleSort,
}

fn check_range<T: PartialOrd>(min: Option<T>, max: Option<T>) -> Result<(), FilterError> {
    if let (Some(min), Some(max)) = (&min, &max) {
        if min > max {
            return Err(FilterError::MinGreaterThanMax);
        }
    }
    Ok(())
}

fn check_cap(field: &'static str, len: usize, cap: usize) -> Result<(), FilterError> {
    if len > cap {
        return Err(FilterError::CapExceeded { field, cap });
    }
    Ok(())
}

/// An opaque, base64-encoded JSON cursor: `{t: RFC3339, id: string}` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub fetched_at: Timestamp,
    pub id: ListingId,
}

#[derive(Serialize, Deserialize)]
struct CursorWire {
    t: chrono::DateTime<chrono::Utc>,
    id: String,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let wire = CursorWire {
            t: self.fetched_at.date_time(),
            id: self.id.to_string(),
        };
        let json = serde_json::to_vec(&wire).expect("cursor always serializes");
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|_| Error::InvalidCursor)?;
        let wire: CursorWire = serde_json::from_slice(&bytes).map_err(|_| Error::InvalidCursor)?;
        let id: ListingId = wire.id.parse().map_err(|_| Error::InvalidCursor)?;
        Ok(Self {
            fetched_at: Timestamp::from(wire.t),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_time::Time;

    #[test]
    fn cursor_round_trips() {
        let cursor = Cursor {
            fetched_at: Time::from_timestamp_nanos(1_700_000_000_000_000_000),
            id: watch_types::listing_id(&watch_types::NaturalKey::new("yahoo", "A1")),
        };
        let encoded = cursor.encode();
        let decoded = Cursor::decode(&encoded).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn filter_rejects_min_greater_than_max() {
        let filter = ListingFilter {
            min_rent: Some(200_000),
            max_rent: Some(100_000),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
    }

    #[test]
    fn filter_rejects_oversized_facility_list() {
        let filter = ListingFilter {
            facilities: (0..40).map(|i| i.to_string()).collect(),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
    }

    #[test]
    fn cursor_incompatible_with_rent_sort_is_rejected() {
        let filter = ListingFilter {
            sort: SortOrder::RentAsc,
            cursor: Some(Cursor {
                fetched_at: Time::from_timestamp_nanos(0),
                id: watch_types::listing_id(&watch_types::NaturalKey::new("a", "b")),
            }),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
    }
}
