use sha2::{Digest, Sha256};
use url::Url;

use crate::listing::ListingId;

/// `(source, source_id)` — the stable identifier extracted from the
/// upstream URL, distinct from the internal [`ListingId`] hash (§3, GLOSSARY).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    pub source: String,
    pub source_id: String,
}

impl NaturalKey {
    pub fn new(source: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            source_id: source_id.into(),
        }
    }
}

/// `id = H(source, source_id)`, stable across upserts (§3 invariant, §8 P2).
///
/// A deterministic cryptographic hash rather than `DefaultHasher` — the
/// latter's output is only guaranteed stable within one build of the
/// standard library, and this value is persisted and compared across
/// process restarts and Rust toolchain upgrades.
pub fn listing_id(key: &NaturalKey) -> ListingId {
    let mut hasher = Sha256::new();
    hasher.update(key.source.as_bytes());
    hasher.update([0u8]); // separator so ("ab","c") != ("a","bc")
    hasher.update(key.source_id.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    ListingId(u64::from_be_bytes(bytes))
}

/// Marker byte sequences whose presence in a detail URL's path indicates
/// that a trailing slash is semantically significant for this source.
/// Parsing is opaque (§9) but URL normalization is a core-engine concern
/// (§6) because the natural key and dedup all depend on a single canonical
/// form; the marker itself is source-specific and supplied by the caller.
pub fn normalize_url(raw: &str, detail_page_marker: Option<&str>) -> Result<String, url::ParseError> {
    let mut url = Url::parse(raw)?;
    let _ = url.set_scheme("https");
    url.set_query(None);
    url.set_fragment(None);

    let keep_trailing_slash = detail_page_marker
        .map(|marker| url.path().contains(marker))
        .unwrap_or(false);

    if !keep_trailing_slash {
        let trimmed = url.path().trim_end_matches('/').to_string();
        url.set_path(&trimmed);
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_across_calls() {
        let key = NaturalKey::new("yahoo", "A1");
        assert_eq!(listing_id(&key), listing_id(&key));
    }

    #[test]
    fn id_distinguishes_the_separator_position() {
        let a = NaturalKey::new("ab", "c");
        let b = NaturalKey::new("a", "bc");
        assert_ne!(listing_id(&a), listing_id(&b));
    }

    #[test]
    fn normalize_forces_https_and_strips_query_and_fragment() {
        let normalized =
            normalize_url("http://example.com/rent/detail/A1/?utm=1#top", Some("/detail/"))
                .unwrap();
        assert_eq!(normalized, "https://example.com/rent/detail/A1/");
    }

    #[test]
    fn normalize_strips_trailing_slash_when_no_marker_matches() {
        let normalized = normalize_url("https://example.com/rent/list/", Some("/detail/")).unwrap();
        assert_eq!(normalized, "https://example.com/rent/list");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_url("https://example.com/rent/detail/A1/", Some("/detail/")).unwrap();
        let twice = normalize_url(&once, Some("/detail/")).unwrap();
        assert_eq!(once, twice);
    }
}
