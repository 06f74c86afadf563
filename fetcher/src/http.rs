use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use breaker::Breaker;
use observability_deps::tracing::{info, warn};
use pacer::Pacer;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use snafu::{ResultExt, Snafu};
use watch_time::{Time, TimeProvider};

use crate::{classify, Classification, FetchKind, FetchResponse, Fetcher};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to build the HTTP client: {source}"))]
    BuildClient { source: reqwest::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Tunables for [`HttpFetcher`] (§4.4), mirrored from
/// `watch_config::ScraperConfig`.
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub user_agent: String,
    /// Substring that, when present in a `500` body, reclassifies the
    /// response as `blocked` rather than `transient` (§4.4).
    pub block_page_signature: Option<String>,
    /// The upstream's root page, touched at most once per
    /// `homepage_touch_interval` before a list-page walk (§4.4, §9 Q2).
    pub homepage_url: Option<String>,
    pub homepage_touch_interval: Duration,
}

/// `HTTP 500 with block-page body` / `403` / `429,5xx` / network timeout,
/// backed off and retried according to §4.4, with browser-mimicking
/// headers and a cookie jar honored across every call.
pub struct HttpFetcher {
    client: reqwest::Client,
    config: HttpFetcherConfig,
    pacer: Arc<Pacer>,
    breaker: Arc<Breaker>,
    time: Arc<dyn TimeProvider>,
    last_homepage_touch: Mutex<Option<Time>>,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("user_agent", &self.config.user_agent)
            .finish()
    }
}

impl HttpFetcher {
    pub fn new(
        config: HttpFetcherConfig,
        pacer: Arc<Pacer>,
        breaker: Arc<Breaker>,
        time: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ja,en-US;q=0.8,en;q=0.6"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .timeout(config.timeout)
            .build()
            .context(BuildClientSnafu)?;

        Ok(Self {
            client,
            config,
            pacer,
            breaker,
            time,
            last_homepage_touch: Mutex::new(None),
        })
    }

    /// `retryDelay · 2^(attempt-1)`, capped at 60s; server errors use a
    /// longer variant (§4.4).
    fn backoff_for_attempt(&self, attempt: u32, is_server_error: bool) -> Duration {
        let multiplier = if is_server_error { 2.0 } else { 1.0 };
        let secs = self.config.retry_delay.as_secs_f64() * 2f64.powi((attempt.max(1) - 1) as i32) * multiplier;
        Duration::from_secs_f64(secs.min(60.0))
    }

    async fn maybe_touch_homepage(&self) {
        let Some(homepage_url) = self.config.homepage_url.clone() else {
            return;
        };
        let now = self.time.now();
        let needs_touch = {
            let last = *self.last_homepage_touch.lock();
            match last {
                Some(last) => now
                    .checked_duration_since(last)
                    .map(|elapsed| elapsed >= self.config.homepage_touch_interval)
                    .unwrap_or(true),
                None => true,
            }
        };
        if !needs_touch {
            return;
        }
        info!(homepage_url, "touching homepage before list walk");
        let _ = self.client.get(&homepage_url).send().await;
        *self.last_homepage_touch.lock() = Some(self.time.now());
    }

    async fn do_attempt(&self, url: &str) -> (Option<u16>, bytes::Bytes) {
        match self.client.get(url).send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.bytes().await.unwrap_or_default();
                (Some(status), body)
            }
            Err(e) => {
                warn!(url, error=%e, "network error fetching url");
                (None, bytes::Bytes::new())
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, kind: FetchKind) -> FetchResponse {
        if !self.breaker.can_proceed() {
            return FetchResponse::blocked();
        }

        let _permit = match kind {
            FetchKind::List => {
                self.maybe_touch_homepage().await;
                Some(self.pacer.acquire_list().await)
            }
            FetchKind::Detail => Some(self.pacer.acquire_global().await),
        };

        let max_attempts = self.config.max_retries + 1;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let (status, body) = self.do_attempt(url).await;
            let classification = classify(status, &body, self.config.block_page_signature.as_deref());

            match classification {
                Classification::Ok => {
                    self.breaker.record_success();
                    return FetchResponse {
                        status: status.unwrap_or(200),
                        body,
                        classification,
                    };
                }
                Classification::PermanentNotFound | Classification::ClientError => {
                    return FetchResponse {
                        status: status.unwrap_or(0),
                        body,
                        classification,
                    };
                }
                Classification::Blocked => {
                    self.breaker.record_failure(status.unwrap_or(0) as u32);
                    return FetchResponse {
                        status: status.unwrap_or(0),
                        body,
                        classification,
                    };
                }
                Classification::Transient | Classification::NetworkError => {
                    self.breaker.record_failure(status.unwrap_or(0) as u32);
                    if attempt >= max_attempts {
                        return FetchResponse {
                            status: status.unwrap_or(0),
                            body,
                            classification: Classification::Transient,
                        };
                    }
                    let is_server_error = status.map(|s| s >= 500).unwrap_or(true);
                    let backoff = self.backoff_for_attempt(attempt, is_server_error);
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacer::{Pacer, PacerConfig, Tier3Config};
    use watch_time::{SeededJitter, SystemProvider};

    fn fetcher(_server_url: &str, max_retries: u32) -> HttpFetcher {
        let time = Arc::new(SystemProvider::new());
        let pacer = Arc::new(Pacer::new(
            PacerConfig {
                concurrency: 4,
                list_base_delay: Duration::ZERO,
                list_jitter: Duration::ZERO,
                tier3: Tier3Config::default(),
            },
            time.clone(),
            Arc::new(SeededJitter::zero()),
        ));
        let breaker = Arc::new(Breaker::new(Default::default(), time.clone()));
        HttpFetcher::new(
            HttpFetcherConfig {
                timeout: Duration::from_secs(5),
                max_retries,
                retry_delay: Duration::from_millis(1),
                user_agent: "estate-watch-test/1.0".to_string(),
                block_page_signature: Some("verify you are human".to_string()),
                homepage_url: None,
                homepage_touch_interval: Duration::from_secs(1800),
            },
            pacer,
            breaker,
            time,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn ok_response_is_classified_ok_and_records_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/x").with_status(200).with_body("hi").create_async().await;
        let f = fetcher(&server.url(), 2);
        let resp = f.fetch(&format!("{}/x", server.url()), FetchKind::Detail).await;
        assert_eq!(resp.classification, Classification::Ok);
        assert_eq!(resp.status, 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_does_not_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let f = fetcher(&server.url(), 3);
        let resp = f.fetch(&format!("{}/missing", server.url()), FetchKind::Detail).await;
        assert_eq!(resp.classification, Classification::PermanentNotFound);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn transient_error_retries_up_to_the_configured_max() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3) // max_retries=2 => 3 total attempts
            .create_async()
            .await;
        let f = fetcher(&server.url(), 2);
        let resp = f.fetch(&format!("{}/flaky", server.url()), FetchKind::Detail).await;
        assert_eq!(resp.classification, Classification::Transient);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn breaker_blocks_before_any_request_is_made() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/x").expect(0).create_async().await;
        let f = fetcher(&server.url(), 2);
        f.breaker.record_failure(500);
        f.breaker.record_failure(500);
        assert!(f.breaker.is_open());

        let resp = f.fetch(&format!("{}/x", server.url()), FetchKind::Detail).await;
        assert_eq!(resp.classification, Classification::Blocked);
        mock.assert_async().await;
    }
}
