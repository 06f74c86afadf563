//! The `logging` section of the operational config (§6).
use clap::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ArgEnum)]
pub enum LogFormat {
    Logfmt,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Logfmt
    }
}

/// CLI/env-overridable logging configuration, flattened into the top-level
/// config the way every other section is (§6).
#[derive(Debug, Clone, Parser)]
pub struct LoggingConfig {
    /// `tracing-subscriber` `EnvFilter` directive string, e.g.
    /// `info,estate_watch=debug`.
    #[clap(long = "log-filter", env = "LOG_FILTER", default_value = "info")]
    pub log_filter: String,

    /// Output format for log lines.
    #[clap(
        long = "log-format",
        env = "LOG_FORMAT",
        arg_enum,
        default_value = "logfmt"
    )]
    pub log_format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}
