use clap::Parser;

/// `errorHandling` (§6): Breaker thresholds (§4.3).
#[derive(Debug, Clone, Parser)]
pub struct ErrorHandlingConfig {
    /// Consecutive-failure threshold for the immediate-open rule.
    #[clap(long = "error-handling-consecutive-failure-threshold", env = "ERROR_HANDLING_CONSECUTIVE_FAILURE_THRESHOLD", default_value = "2")]
    pub consecutive_failure_threshold: u32,

    /// Minimum total requests before the rolling-rate rule can trip.
    #[clap(long = "error-handling-rolling-window", env = "ERROR_HANDLING_ROLLING_WINDOW", default_value = "20")]
    pub rolling_window: u32,

    /// Failure ratio over `rolling_window` that trips the breaker open.
    #[clap(long = "error-handling-rolling-failure-ratio", env = "ERROR_HANDLING_ROLLING_FAILURE_RATIO", default_value = "0.40")]
    pub rolling_failure_ratio: f64,

    /// How long the breaker stays open before allowing a half-open probe
    /// (§4.3 default 1h).
    #[clap(long = "error-handling-reset-timeout", env = "ERROR_HANDLING_RESET_TIMEOUT", default_value = "1h")]
    #[clap(value_parser = humantime::parse_duration)]
    pub reset_timeout: std::time::Duration,
}
