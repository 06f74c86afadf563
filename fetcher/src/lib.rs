//! C5 Fetcher (§4.4): performs one logical GET — including its own retry
//! storm — through Pacer and Breaker, and classifies the final response.
//!
//! `Fetcher` is a trait so Worker and Scheduler depend on the contract, not
//! on `reqwest` directly: [`HttpFetcher`] is the production implementation,
//! [`ScriptedFetcher`] is a deterministic test double (§B.5).
#![warn(missing_debug_implementations, clippy::use_self)]

mod classification;
mod http;
mod response;
mod scripted;

pub use classification::{classify, Classification, FetchKind};
pub use http::{Error, HttpFetcher, HttpFetcherConfig};
pub use response::FetchResponse;
pub use scripted::ScriptedFetcher;

use async_trait::async_trait;

/// One logical GET (§4.4). Short-circuits with `blocked` if the Breaker is
/// open; otherwise acquires the appropriate Pacer tier(s) and retries
/// locally per the classification rules before returning.
#[async_trait]
pub trait Fetcher: std::fmt::Debug + Send + Sync + 'static {
    async fn fetch(&self, url: &str, kind: FetchKind) -> FetchResponse;
}
