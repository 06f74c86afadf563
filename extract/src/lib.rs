//! C6 Extractor contract (§4.0 overview, §9 Design Notes: "Parsing is
//! opaque. Do not specify the upstream's DOM; the core depends only on the
//! `Extract` contract.").
//!
//! This crate deliberately contains no HTML/DOM logic — that is explicitly
//! out of scope (§1). It exists only so Worker and Scheduler can depend on
//! a trait object rather than a concrete parser, and so tests can supply a
//! trivial double instead of real markup.
#![warn(missing_debug_implementations, clippy::use_self)]

use snafu::Snafu;
use url::Url;
use watch_types::NewListing;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to extract a listing record: {reason}"))]
    Record { reason: String },

    #[snafu(display("failed to extract property URLs: {reason}"))]
    Links { reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// `bytes -> Record` / `bytes -> [URL]` (§4, C6). Implementations translate
/// one upstream source's HTML into the engine's data model; the engine
/// itself never inspects markup directly.
///
/// Per §4.7/§7 ("Extraction empty"), returning a [`NewListing`] whose
/// `stations`/`images` are empty is not an error — it signals "extraction
/// found the page but not those child collections", and `Store::
/// UpsertListing` treats that as "keep prior data" rather than as a
/// failure. Only a genuinely unparseable page should return `Err`.
pub trait Extractor: std::fmt::Debug + Send + Sync + 'static {
    /// Parses one detail page into a record. `source` and `source_id` are
    /// supplied by the caller (derived from the queue item's natural key)
    /// rather than re-derived from the page, since the caller already knows
    /// them and a parser finding a mismatched id on the page is itself an
    /// extraction error the caller should decide how to handle.
    fn parse_detail(&self, body: &[u8], source: &str, source_id: &str) -> Result<NewListing>;

    /// Parses one list/index page into the property detail URLs it links
    /// to, for the Scheduler's pagination walk (§4.8).
    fn parse_list(&self, body: &[u8]) -> Result<Vec<Url>>;

    /// Recovers the natural-key `source_id` half of a detail URL surfaced
    /// by [`Extractor::parse_list`] (§3: "the natural key derived from the
    /// upstream URL"). The exact URL shape is source-specific and out of
    /// scope (§1), so the default here is a generic fallback — the last
    /// non-empty path segment — that a concrete per-source implementation
    /// is expected to override with its own URL/regex shape.
    fn source_id_from_url(&self, url: &Url) -> Result<String> {
        url.path_segments()
            .and_then(|mut segments| segments.next_back().filter(|s| !s.is_empty()))
            .map(str::to_string)
            .ok_or_else(|| Error::Links {
                reason: format!("could not recover a source id from {url}"),
            })
    }
}

/// A trivial test double: one fixed [`NewListing`] for every detail page,
/// one fixed set of links for every list page. Useful for exercising
/// Worker/Scheduler control flow without any real markup (§B.5).
#[derive(Debug, Clone, Default)]
pub struct FixedExtractor {
    pub detail: Option<NewListing>,
    pub links: Vec<Url>,
}

impl FixedExtractor {
    pub fn new(detail: NewListing, links: Vec<Url>) -> Self {
        Self {
            detail: Some(detail),
            links,
        }
    }
}

impl Extractor for FixedExtractor {
    fn parse_detail(&self, _body: &[u8], _source: &str, _source_id: &str) -> Result<NewListing> {
        self.detail.clone().ok_or(Error::Record {
            reason: "no fixed detail record configured".to_string(),
        })
    }

    fn parse_list(&self, _body: &[u8]) -> Result<Vec<Url>> {
        Ok(self.links.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_listing() -> NewListing {
        NewListing {
            source: "yahoo".into(),
            source_id: "A1".into(),
            title: Some("T".into()),
            detail_url: "https://x/rent/detail/A1".into(),
            rent_minor_units: Some(100_000),
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
        }
    }

    #[test]
    fn fixed_extractor_returns_the_configured_record() {
        let extractor = FixedExtractor::new(sample_listing(), vec![]);
        let parsed = extractor.parse_detail(b"<html></html>", "yahoo", "A1").unwrap();
        assert_eq!(parsed.source_id, "A1");
    }

    #[test]
    fn unconfigured_detail_is_an_error_not_a_panic() {
        let extractor = FixedExtractor::default();
        assert!(extractor.parse_detail(b"", "yahoo", "A1").is_err());
    }

    #[test]
    fn default_source_id_from_url_takes_the_last_path_segment() {
        let extractor = FixedExtractor::default();
        let url = Url::parse("https://x/rent/detail/A1").unwrap();
        assert_eq!(extractor.source_id_from_url(&url).unwrap(), "A1");
    }

    #[test]
    fn default_source_id_from_url_rejects_a_trailing_slash() {
        let extractor = FixedExtractor::default();
        let url = Url::parse("https://x/rent/detail/").unwrap();
        assert!(extractor.source_id_from_url(&url).is_err());
    }
}
