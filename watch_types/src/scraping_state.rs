use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Singleton row tracking the most recent run's outcome (§3), surfaced by
/// the `get-stats` admin command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapingState {
    pub is_blocked: bool,
    pub blocked_until: Option<Timestamp>,
    pub blocked_reason: Option<String>,
    pub last_attempt: Option<Timestamp>,
    pub last_success: Option<Timestamp>,
    pub failure_count: i64,
    pub success_count: i64,
}

impl Default for ScrapingState {
    fn default() -> Self {
        Self {
            is_blocked: false,
            blocked_until: None,
            blocked_reason: None,
            last_attempt: None,
            last_success: None,
            failure_count: 0,
            success_count: 0,
        }
    }
}
