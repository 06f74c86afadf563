use serde::{Deserialize, Serialize};

/// `kind` discriminant for a [`Change`] row (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "change_kind", rename_all = "snake_case")]
pub enum ChangeKind {
    New,
    Removed,
    Rent,
    Area,
    FloorPlan,
    BuildingAge,
    Status,
    Image,
    /// Emitted when `P = ∅` (§4.7).
    NewProperty,
    /// Emitted when `N.status = removed ∧ P.status = active` (§4.7).
    PropertyRemoved,
}

/// A per-field record pointing to a Snapshot (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub old: Option<String>,
    pub new: Option<String>,
    /// `|new - old|` for numeric changes, unset otherwise (§4.7).
    pub magnitude: Option<f64>,
}

impl Change {
    pub fn new_property() -> Self {
        Self {
            kind: ChangeKind::NewProperty,
            old: None,
            new: None,
            magnitude: None,
        }
    }

    pub fn property_removed() -> Self {
        Self {
            kind: ChangeKind::PropertyRemoved,
            old: Some("active".to_string()),
            new: Some("removed".to_string()),
            magnitude: None,
        }
    }

    pub fn numeric(kind: ChangeKind, old: f64, new: f64) -> Self {
        Self {
            kind,
            old: Some(old.to_string()),
            new: Some(new.to_string()),
            magnitude: Some((new - old).abs()),
        }
    }

    pub fn textual(kind: ChangeKind, old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            kind,
            old: Some(old.into()),
            new: Some(new.into()),
            magnitude: None,
        }
    }
}
