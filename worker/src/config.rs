use std::time::Duration;

/// Worker's own timing knobs (§4.6), mirrored 1:1 from
/// `watch_config::ScraperConfig` so this crate has no compile-time
/// dependency on the config crate (the same posture `pacer`/`breaker` take
/// towards their own config mirrors).
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How often the main loop checks for a runnable queue item when one
    /// wasn't available last tick (default 30s).
    pub poll_interval: Duration,

    /// Threshold past which a `processing` item is assumed orphaned by a
    /// crash and reset to `pending` at startup.
    pub stale_processing_threshold: Duration,

    /// A benign, low-cost URL probed at startup to detect whether the
    /// upstream is already blocking this process before the main loop
    /// starts spending its Tier-3 budget.
    pub health_probe_url: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            stale_processing_threshold: Duration::from_secs(10 * 60),
            health_probe_url: String::new(),
        }
    }
}
