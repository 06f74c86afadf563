use bytes::Bytes;

use crate::Classification;

/// The result of one logical GET (§4.4): includes the retry storm inside
/// it, so callers only ever see the final outcome.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
    pub classification: Classification,
}

impl FetchResponse {
    pub fn blocked() -> Self {
        Self {
            status: 0,
            body: Bytes::new(),
            classification: Classification::Blocked,
        }
    }
}
