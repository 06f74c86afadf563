use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{FetchKind, FetchResponse, Fetcher};

/// A trait-level fake standing in for real network mocking (§B.5): each
/// call to `fetch` pops the next scripted response regardless of `url`, in
/// call order. Panics if the script runs dry — a test that exhausts its
/// script made more calls than it expected.
#[derive(Debug)]
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<FetchResponse>>,
    calls: Mutex<Vec<(String, FetchKind)>>,
}

impl ScriptedFetcher {
    pub fn new(responses: impl IntoIterator<Item = FetchResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, FetchKind)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str, kind: FetchKind) -> FetchResponse {
        self.calls.lock().push((url.to_string(), kind));
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedFetcher ran out of responses at call for {url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Classification;
    use bytes::Bytes;

    #[tokio::test]
    async fn replays_responses_in_order() {
        let fetcher = ScriptedFetcher::new([
            FetchResponse {
                status: 200,
                body: Bytes::from_static(b"one"),
                classification: Classification::Ok,
            },
            FetchResponse {
                status: 404,
                body: Bytes::new(),
                classification: Classification::PermanentNotFound,
            },
        ]);

        let first = fetcher.fetch("https://x/1", FetchKind::Detail).await;
        assert_eq!(first.classification, Classification::Ok);
        let second = fetcher.fetch("https://x/2", FetchKind::Detail).await;
        assert_eq!(second.classification, Classification::PermanentNotFound);
        assert_eq!(fetcher.calls().len(), 2);
    }
}
