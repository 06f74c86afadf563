use std::time::Duration;

/// Cleaner's own timing knobs (§4.10), mirrored 1:1 from a
/// `watch_config::CleanerConfig` the same way `worker::WorkerConfig`
/// mirrors `ScraperConfig`, so this crate has no compile-time dependency
/// on the config crate.
#[derive(Debug, Clone)]
pub struct CleanerConfig {
    /// How long a `removed` listing survives before it becomes eligible
    /// for physical purge (§4.10 default 90 days).
    pub retention: Duration,

    /// Safety cap on one purge's row count (§4.10 default 10000); a live
    /// run whose target count exceeds this aborts with no writes.
    pub max_delete_count: u32,

    /// Whether a purge only reports what it would delete (§4.10 default
    /// true).
    pub dry_run: bool,

    /// Cadence of the independent weekly loop (§4.10 "Run on a weekly
    /// cadence, independent of the main loop").
    pub interval: Duration,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(90 * 24 * 60 * 60),
            max_delete_count: 10_000,
            dry_run: true,
            interval: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}
