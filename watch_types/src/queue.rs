use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// The state machine driving one [`QueueItem`] (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "queue_status", rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Processing,
    Done,
    Failed,
    PermanentFail,
}

/// The outcome `Store::QueueComplete` transitions a `processing` item to
/// (§4.1). `Failed` carries the retry time the caller computed from the
/// backoff table; `FailedTerminal` is the `attempts >= MaxAttempts` case
/// where no `next_retry_at` is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOutcome {
    Done,
    Failed,
    FailedTerminal,
    PermanentFail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: i64,
    pub source: String,
    pub source_id: String,
    pub url: String,
    pub priority: i32,
    pub status: QueueStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub next_retry_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// `MaxAttempts` from §4.5 — the fifth attempt is the last one allowed.
pub const MAX_ATTEMPTS: i32 = 5;

/// The monotone backoff table of §4.5; attempts beyond its length reuse the
/// last entry.
pub const RETRY_BACKOFF_SECONDS: [i64; 5] = [
    5 * 60,
    15 * 60,
    60 * 60,
    4 * 60 * 60,
    12 * 60 * 60,
];

/// `backoff[attempts-1]`, clamped to the table's last entry (§4.5).
pub fn retry_backoff_for_attempt(attempts: i32) -> std::time::Duration {
    let idx = (attempts.max(1) as usize - 1).min(RETRY_BACKOFF_SECONDS.len() - 1);
    std::time::Duration::from_secs(RETRY_BACKOFF_SECONDS[idx] as u64)
}
