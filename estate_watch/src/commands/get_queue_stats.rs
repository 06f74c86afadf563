use watch_config::Config;

use crate::commands::wiring::{self, Error as WiringError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to wire up collaborators: {0}")]
    Wiring(#[from] WiringError),

    #[error("failed to read queue stats: {0}")]
    Store(#[from] watch_store::Error),

    #[error("failed to render queue stats as JSON: {0}")]
    Render(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// `get-queue-stats` admin command (§6, §B.6): per-status retry-queue
/// counts plus the oldest `pending` item's age, the same breakdown
/// `watch_store::QueueStats` already carries.
pub async fn command(config: Config) -> Result<()> {
    let handles = wiring::connect(&config).await?;
    let stats = handles.store.queue_stats(handles.time.now()).await?;

    println!("{}", serde_json::to_string_pretty(&QueueStatsJson::from(&stats))?);
    Ok(())
}

#[derive(Debug, serde::Serialize)]
struct QueueStatsJson {
    pending: u64,
    processing: u64,
    failed: u64,
    permanent_fail: u64,
    done: u64,
    oldest_pending_age_seconds: Option<i64>,
}

impl From<&watch_store::QueueStats> for QueueStatsJson {
    fn from(stats: &watch_store::QueueStats) -> Self {
        Self {
            pending: stats.pending,
            processing: stats.processing,
            failed: stats.failed,
            permanent_fail: stats.permanent_fail,
            done: stats.done,
            oldest_pending_age_seconds: stats.oldest_pending_age_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_stats_projects_every_status_count() {
        let stats = watch_store::QueueStats {
            pending: 4,
            processing: 1,
            failed: 2,
            permanent_fail: 0,
            done: 9,
            oldest_pending_age_seconds: Some(120),
        };
        let json = QueueStatsJson::from(&stats);
        assert_eq!(json.pending, 4);
        assert_eq!(json.processing, 1);
        assert_eq!(json.failed, 2);
        assert_eq!(json.permanent_fail, 0);
        assert_eq!(json.done, 9);
        assert_eq!(json.oldest_pending_age_seconds, Some(120));
    }
}
