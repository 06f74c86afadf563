use crate::{Change, ChangeKind, Listing, NewListing};

fn trimmed_eq(a: &str, b: &str) -> bool {
    a.trim() == b.trim()
}

fn string_change(kind: ChangeKind, old: &Option<String>, new: &Option<String>) -> Option<Change> {
    match (old, new) {
        (None, None) => None,
        (None, Some(new)) => Some(Change::textual(kind, "", new.clone())),
        (Some(old), None) => Some(Change::textual(kind, old.clone(), "")),
        (Some(old), Some(new)) if !trimmed_eq(old, new) => {
            Some(Change::textual(kind, old.clone(), new.clone()))
        }
        _ => None,
    }
}

fn numeric_change(kind: ChangeKind, old: Option<f64>, new: Option<f64>) -> Option<Change> {
    match (old, new) {
        (None, None) => None,
        (Some(old), Some(new)) if old == new => None,
        (old, new) => Some(Change::numeric(
            kind,
            old.unwrap_or(0.0),
            new.unwrap_or(0.0),
        )),
    }
}

/// The change-detection function of §4.7: given the previous record `prior`
/// (`None` when there is none, i.e. `P = ∅`) and the freshly-extracted
/// `new` record, emit one [`Change`] per tracked field whose value differs
/// under a type-specific equality (numeric: exact; strings: exact
/// post-trim).
pub fn diff_listing(prior: Option<&Listing>, new: &NewListing) -> Vec<Change> {
    let Some(prior) = prior else {
        return vec![Change::new_property()];
    };

    let mut changes = Vec::new();

    if let Some(c) = numeric_change(
        ChangeKind::Rent,
        prior.rent_minor_units.map(|v| v as f64),
        new.rent_minor_units.map(|v| v as f64),
    ) {
        changes.push(c);
    }
    if let Some(c) = numeric_change(ChangeKind::Area, prior.area_sqm, new.area_sqm) {
        changes.push(c);
    }
    if let Some(c) = numeric_change(
        ChangeKind::BuildingAge,
        prior.building_age_years.map(|v| v as f64),
        new.building_age_years.map(|v| v as f64),
    ) {
        changes.push(c);
    }
    if let Some(c) = string_change(ChangeKind::FloorPlan, &prior.floor_plan, &new.floor_plan) {
        changes.push(c);
    }

    let prior_images: Vec<&str> = prior.images.iter().map(|i| i.url.as_str()).collect();
    let new_images: Vec<&str> = new.images.iter().map(|i| i.url.as_str()).collect();
    if !new.images.is_empty() && prior_images != new_images {
        changes.push(Change::textual(
            ChangeKind::Image,
            prior_images.join(","),
            new_images.join(","),
        ));
    }

    changes
}

/// The `property_removed` Change emitted alongside a Scheduler-driven
/// `MarkRemoved` transition (§4.7, §8 scenario S5) — distinct from
/// `diff_listing` because it fires on a status transition, not on a
/// re-extraction.
pub fn status_removed_change() -> Change {
    Change::property_removed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ListingId, ListingImage, ListingStatus, Timestamp};
    use watch_time::SystemProvider;
    use watch_time::TimeProvider;

    fn base_listing() -> Listing {
        let now = SystemProvider::new().now();
        Listing {
            id: ListingId(1),
            source: "yahoo".into(),
            source_id: "A1".into(),
            title: Some("T".into()),
            detail_url: "https://x/rent/detail/A1".into(),
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
            images: vec![ListingImage {
                url: "https://x/a.jpg".into(),
                position: 0,
            }],
            status: ListingStatus::Active,
            removed_at: None,
            fetched_at: now,
            last_seen_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    fn base_new(prior: &Listing) -> NewListing {
        NewListing {
            source: prior.source.clone(),
            source_id: prior.source_id.clone(),
            title: prior.title.clone(),
            detail_url: prior.detail_url.clone(),
            rent_minor_units: prior.rent_minor_units,
            area_sqm: prior.area_sqm,
            floor_plan: prior.floor_plan.clone(),
            walk_minutes: prior.walk_minutes,
            building_age_years: prior.building_age_years,
            floor: prior.floor,
            address: prior.address.clone(),
            building_type: prior.building_type.clone(),
            facilities: prior.facilities.clone(),
            stations: prior.stations.clone(),
            images: prior.images.clone(),
        }
    }

    #[test]
    fn no_prior_emits_new_property() {
        let prior = base_listing();
        let new = base_new(&prior);
        let changes = diff_listing(None, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::NewProperty);
    }

    #[test]
    fn identical_records_emit_nothing() {
        let prior = base_listing();
        let new = base_new(&prior);
        assert!(diff_listing(Some(&prior), &new).is_empty());
    }

    #[test]
    fn rent_change_is_numeric_with_magnitude() {
        let prior = base_listing();
        let mut new = base_new(&prior);
        new.rent_minor_units = Some(120_000);
        let changes = diff_listing(Some(&prior), &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Rent);
        assert_eq!(changes[0].magnitude, Some(20_000.0));
    }

    #[test]
    fn floor_plan_whitespace_only_difference_is_not_a_change() {
        let prior = base_listing();
        let mut new = base_new(&prior);
        new.floor_plan = Some(" 1K ".into());
        assert!(diff_listing(Some(&prior), &new).is_empty());
    }

    #[test]
    fn empty_new_image_set_is_preserved_and_not_a_change() {
        let prior = base_listing();
        let mut new = base_new(&prior);
        new.images = vec![];
        assert!(diff_listing(Some(&prior), &new).is_empty());
    }
}
