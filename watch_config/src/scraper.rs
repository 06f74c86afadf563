use clap::Parser;

/// `scraper.*` (§6): the timing knobs for Worker and Scheduler.
#[derive(Debug, Clone, Parser)]
pub struct ScraperConfig {
    /// Per-attempt HTTP timeout (§5 default 30s).
    #[clap(long = "scraper-timeout", env = "SCRAPER_TIMEOUT", default_value = "30s")]
    #[clap(value_parser = humantime::parse_duration)]
    pub timeout: std::time::Duration,

    /// `maxRetries` passed to Fetcher (§4.4); Fetcher attempts `maxRetries+1`
    /// times total.
    #[clap(long = "scraper-max-retries", env = "SCRAPER_MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// Base for Fetcher's `retryDelay · 2^(attempt-1)` formula (§4.4).
    #[clap(long = "scraper-retry-delay", env = "SCRAPER_RETRY_DELAY", default_value = "1s")]
    #[clap(value_parser = humantime::parse_duration)]
    pub retry_delay: std::time::Duration,

    /// Worker's main-loop poll interval (§4.6 default 30s).
    #[clap(long = "scraper-poll-interval", env = "SCRAPER_POLL_INTERVAL", default_value = "30s")]
    #[clap(value_parser = humantime::parse_duration)]
    pub poll_interval: std::time::Duration,

    /// Whether the daily Scheduler cron is enabled at all.
    #[clap(long = "scraper-daily-run-enabled", env = "SCRAPER_DAILY_RUN_ENABLED", default_value = "true")]
    pub daily_run_enabled: bool,

    /// `HH:MM` wall-clock time (in `timezone`) the daily run triggers at
    /// (§4.8).
    #[clap(long = "scraper-daily-run-time", env = "SCRAPER_DAILY_RUN_TIME", default_value = "03:00")]
    pub daily_run_time: String,

    /// Threshold above which a still-`processing` queue item is assumed
    /// crashed and reset to `pending` at Worker startup.
    #[clap(long = "scraper-stale-processing-threshold", env = "SCRAPER_STALE_PROCESSING_THRESHOLD", default_value = "10m")]
    #[clap(value_parser = humantime::parse_duration)]
    pub stale_processing_threshold: std::time::Duration,

    /// Minimum interval between Fetcher's "homepage touch" requests (§4.4,
    /// §9 Q2).
    #[clap(long = "scraper-homepage-touch-interval", env = "SCRAPER_HOMEPAGE_TOUCH_INTERVAL", default_value = "30m")]
    #[clap(value_parser = humantime::parse_duration)]
    pub homepage_touch_interval: std::time::Duration,

    /// Enabled **scopes** (§4.8, GLOSSARY) — upstream index URLs the
    /// Scheduler walks page by page on each daily run. Comma-separated; a
    /// source-specific URL *shape* is out of scope (§1), but the static
    /// list of scope entry points is operational configuration like any
    /// other.
    #[clap(long = "scraper-scopes", env = "SCRAPER_SCOPES", value_delimiter = ',')]
    pub scopes: Vec<String>,

    /// The single upstream's identifier (§1 "a single upstream website"),
    /// tagged onto every listing's natural key as `source` regardless of
    /// which scope discovered it.
    #[clap(long = "scraper-source", env = "SCRAPER_SOURCE", default_value = "primary")]
    pub source: String,

    /// A benign, low-cost upstream URL Worker probes at startup before
    /// entering its main loop (§4.6). Empty disables the probe outright
    /// (`health::run_health_probe` is a no-op on an empty URL).
    #[clap(long = "scraper-health-probe-url", env = "SCRAPER_HEALTH_PROBE_URL", default_value = "")]
    pub health_probe_url: String,
}
