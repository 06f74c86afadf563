use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;

/// One upstream index URL the daily run walks page by page (GLOSSARY
/// "Scope", §4.8). The `source` tags every listing discovered under it, so
/// it doubles as the natural key's first half.
#[derive(Debug, Clone)]
pub struct Scope {
    pub source: String,
    pub url: String,
}

/// Scheduler's own timing knobs (§4.8), mirrored 1:1 from
/// `watch_config::ScraperConfig`/`RateLimitConfig` the same way
/// `worker::WorkerConfig` mirrors its slice, so this crate has no
/// compile-time dependency on the config crate.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub scopes: Vec<Scope>,

    /// `HH:MM` wall-clock trigger time, interpreted in `timezone` (§4.8).
    pub daily_run_time: NaiveTime,

    /// IANA timezone `daily_run_time` is read in (§6 `timezone`).
    pub timezone: Tz,

    /// How often the cron loop checks the clock against `daily_run_time`.
    pub check_interval: Duration,

    /// Safety cap on pages walked per scope, guarding against a pagination
    /// bug turning into an unbounded crawl; not named by §4.8 directly but
    /// a responsible default for any production build of this loop.
    pub max_pages_per_scope: u32,

    /// Priority assigned to newly-enqueued detail-page work (§4.8 step 3).
    pub new_item_priority: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scopes: Vec::new(),
            daily_run_time: NaiveTime::from_hms_opt(3, 0, 0).expect("valid constant time"),
            timezone: chrono_tz::UTC,
            check_interval: Duration::from_secs(60),
            max_pages_per_scope: 200,
            new_item_priority: 0,
        }
    }
}
