use std::time::Duration;

use fetcher::{FetchKind, Fetcher};
use observability_deps::tracing::{info, warn};
use tracker::JobToken;

/// The escalating sleep schedule a blocked health probe backs off through
/// (§4.6): two four-hour waits, then one twelve-hour wait, after which the
/// main loop starts regardless of the outcome of the last probe.
const BACKOFF_SCHEDULE: [Duration; 3] = [
    Duration::from_secs(4 * 60 * 60),
    Duration::from_secs(4 * 60 * 60),
    Duration::from_secs(12 * 60 * 60),
];

/// Waits out `duration`, returning early if `token` is cancelled first.
async fn sleep_or_cancel(duration: Duration, token: &JobToken) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = token.cancelled() => {}
    }
}

/// The startup health probe (§4.6): a benign page is fetched; a `blocked`
/// classification backs off through [`BACKOFF_SCHEDULE`] before the main
/// loop starts regardless of whether the last probe still came back
/// blocked — Worker's ordinary `blocked` handling in the main loop takes
/// over from there.
pub async fn run_health_probe(fetcher: &dyn Fetcher, url: &str, token: &JobToken) {
    if url.is_empty() {
        return;
    }

    for backoff in BACKOFF_SCHEDULE {
        if token.is_cancelled() {
            return;
        }
        let resp = fetcher.fetch(url, FetchKind::List).await;
        if resp.classification != fetcher::Classification::Blocked {
            info!("worker health probe succeeded, starting main loop");
            return;
        }
        warn!(backoff_secs = backoff.as_secs(), "worker health probe blocked, backing off");
        sleep_or_cancel(backoff, token).await;
    }

    warn!("worker health probe still blocked after full backoff schedule, starting main loop anyway");
}
