use clap::Parser;

/// `rateLimit` (§6): the Pacer tiers' tunables (§4.2).
#[derive(Debug, Clone, Parser)]
pub struct RateLimitConfig {
    /// Tier-1 global in-flight capacity.
    #[clap(long = "rate-limit-concurrency", env = "RATE_LIMIT_CONCURRENCY", default_value = "1")]
    pub concurrency: usize,

    /// Tier-1/2 base delay between acquisitions.
    #[clap(long = "rate-limit-base-delay", env = "RATE_LIMIT_BASE_DELAY", default_value = "8s")]
    #[clap(value_parser = humantime::parse_duration)]
    pub list_base_delay: std::time::Duration,

    /// Tier-2 jitter ceiling.
    #[clap(long = "rate-limit-list-jitter", env = "RATE_LIMIT_LIST_JITTER", default_value = "4s")]
    #[clap(value_parser = humantime::parse_duration)]
    pub list_jitter: std::time::Duration,

    /// Tier-3 `defaultPerHour`.
    #[clap(long = "rate-limit-default-per-hour", env = "RATE_LIMIT_DEFAULT_PER_HOUR", default_value = "60")]
    pub default_per_hour: u32,

    /// Tier-3 `nightPerHour`.
    #[clap(long = "rate-limit-night-per-hour", env = "RATE_LIMIT_NIGHT_PER_HOUR", default_value = "120")]
    pub night_per_hour: u32,

    /// Tier-3 night window start hour (0-23, local wall clock).
    #[clap(long = "rate-limit-night-start", env = "RATE_LIMIT_NIGHT_START", default_value = "1")]
    pub night_start: u32,

    /// Tier-3 night window end hour (0-23, exclusive).
    #[clap(long = "rate-limit-night-end", env = "RATE_LIMIT_NIGHT_END", default_value = "6")]
    pub night_end: u32,

    /// Tier-3 `dayPerHour`.
    #[clap(long = "rate-limit-day-per-hour", env = "RATE_LIMIT_DAY_PER_HOUR", default_value = "30")]
    pub day_per_hour: u32,

    /// Tier-3 day window start hour.
    #[clap(long = "rate-limit-day-start", env = "RATE_LIMIT_DAY_START", default_value = "9")]
    pub day_start: u32,

    /// Tier-3 day window end hour (exclusive).
    #[clap(long = "rate-limit-day-end", env = "RATE_LIMIT_DAY_END", default_value = "21")]
    pub day_end: u32,

    /// Failure-rate threshold over the rolling window that triggers slow
    /// mode (default 0.20).
    #[clap(long = "rate-limit-slow-threshold", env = "RATE_LIMIT_SLOW_THRESHOLD", default_value = "0.20")]
    pub slow_threshold: f64,

    /// Failure-rate threshold under which ramp-up resumes (default 0.10).
    #[clap(long = "rate-limit-recover-threshold", env = "RATE_LIMIT_RECOVER_THRESHOLD", default_value = "0.10")]
    pub recover_threshold: f64,

    /// Effective cap while in slow mode.
    #[clap(long = "rate-limit-slow-per-hour", env = "RATE_LIMIT_SLOW_PER_HOUR", default_value = "10")]
    pub slow_per_hour: u32,

    /// How long slow mode holds before a ramp-up is considered (default
    /// 60m).
    #[clap(long = "rate-limit-cooldown", env = "RATE_LIMIT_COOLDOWN", default_value = "60m")]
    #[clap(value_parser = humantime::parse_duration)]
    pub cooldown: std::time::Duration,

    /// Amount the effective cap increases per ramp-up step (default 2).
    #[clap(long = "rate-limit-ramp-step", env = "RATE_LIMIT_RAMP_STEP", default_value = "2")]
    pub ramp_step: u32,

    /// Minimum interval between successive ramp-up steps.
    #[clap(long = "rate-limit-ramp-min-interval", env = "RATE_LIMIT_RAMP_MIN_INTERVAL", default_value = "15m")]
    #[clap(value_parser = humantime::parse_duration)]
    pub ramp_min_interval: std::time::Duration,

    /// Size of the rolling failure-rate observation window.
    #[clap(long = "rate-limit-window-size", env = "RATE_LIMIT_WINDOW_SIZE", default_value = "20")]
    pub window_size: usize,
}
