use extract::{Error, Extractor, Result};
use url::Url;
use watch_types::NewListing;

/// The `Extractor` wired into the binary until a deployment supplies its
/// own. Parsing the upstream's actual markup is explicitly out of scope
/// (§1 "Parsing is treated as an opaque `extract(html) -> Record`
/// function") and source-specific (§1 "source-specific URL/regex shapes"
/// are likewise excluded), so there is nothing here to implement — this
/// type exists only so `run`/`trigger-scrape-now` have a concrete
/// `Arc<dyn Extractor>` to hand to Worker and Scheduler.
///
/// A real deployment replaces this with a per-source implementation of
/// [`Extractor`] (built against the contract in the `extract` crate) before
/// running `run`/`trigger-scrape-now` against a live upstream.
#[derive(Debug, Default)]
pub struct UnimplementedExtractor;

impl Extractor for UnimplementedExtractor {
    fn parse_detail(&self, _body: &[u8], source: &str, source_id: &str) -> Result<NewListing> {
        Err(Error::Record {
            reason: format!(
                "no source-specific extractor wired in for {source}/{source_id}; supply one per §1"
            ),
        })
    }

    fn parse_list(&self, _body: &[u8]) -> Result<Vec<Url>> {
        Err(Error::Links {
            reason: "no source-specific extractor wired in; supply one per §1".to_string(),
        })
    }
}
