/// How the Scheduler turns a scope's entry URL plus a 1-indexed page number
/// into the URL for that page (§4.8 "following pagination via the
/// upstream's page parameter"). Kept as a trait, not baked into the walk
/// itself, since the upstream's actual query-parameter shape is
/// source-specific and explicitly out of scope (§1) — the same posture as
/// [`extract::Extractor`] towards markup.
pub trait ScopePaginator: std::fmt::Debug + Send + Sync + 'static {
    fn page_url(&self, scope_url: &str, page: u32) -> String;
}

/// A generic fallback paginator: appends `page=N` to the scope URL's query
/// string, using `&` if one is already present and `?` otherwise. Page 1 is
/// the scope URL itself, unmodified, matching the common "first page has no
/// page parameter" convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPaginator;

impl ScopePaginator for DefaultPaginator {
    fn page_url(&self, scope_url: &str, page: u32) -> String {
        if page <= 1 {
            return scope_url.to_string();
        }
        let separator = if scope_url.contains('?') { '&' } else { '?' };
        format!("{scope_url}{separator}page={page}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_is_the_scope_url_unmodified() {
        let paginator = DefaultPaginator;
        assert_eq!(paginator.page_url("https://x/list", 1), "https://x/list");
    }

    #[test]
    fn later_pages_append_a_page_query_parameter() {
        let paginator = DefaultPaginator;
        assert_eq!(paginator.page_url("https://x/list", 2), "https://x/list?page=2");
        assert_eq!(
            paginator.page_url("https://x/list?area=tokyo", 3),
            "https://x/list?area=tokyo&page=3"
        );
    }
}
