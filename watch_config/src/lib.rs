//! The operational surface of §6: CLI/env-overridable configuration,
//! parsed once at startup. Precedence is CLI flag > environment variable >
//! `.env` file > built-in default, the same layering `clap`'s `env`
//! attribute gives every flattened sub-config below.
#![warn(missing_debug_implementations, clippy::use_self)]

mod cleaner;
mod database;
mod error_handling;
mod rate_limit;
mod scraper;

pub use cleaner::CleanerConfig;
pub use database::DatabaseConfig;
pub use error_handling::ErrorHandlingConfig;
pub use rate_limit::RateLimitConfig;
pub use scraper::ScraperConfig;

use clap::Parser;
use observability_deps::tracing::warn;
use trogging::cli::LoggingConfig;

/// The root config object. One instance parsed at process startup and
/// threaded down into every component that needs it.
#[derive(Debug, Clone, Parser)]
#[clap(name = "estate_watch", about = "Rental listing ingestion and lifecycle engine")]
pub struct Config {
    #[clap(flatten)]
    pub database: DatabaseConfig,

    #[clap(flatten)]
    pub scraper: ScraperConfig,

    #[clap(flatten)]
    pub rate_limit: RateLimitConfig,

    #[clap(flatten)]
    pub error_handling: ErrorHandlingConfig,

    #[clap(flatten)]
    pub cleaner: CleanerConfig,

    #[clap(flatten)]
    pub logging: LoggingConfig,

    /// User-Agent header sent on every outbound request (§4.4).
    #[clap(
        long = "user-agent",
        env = "USER_AGENT",
        default_value = "Mozilla/5.0 (compatible; estate-watch/1.0)"
    )]
    pub user_agent: String,

    /// IANA timezone name used to interpret `scraper.daily-run-time` as a
    /// wall-clock local time (§4.8).
    #[clap(long = "timezone", env = "TIMEZONE", default_value = "UTC")]
    pub timezone: String,
}

impl Config {
    /// Parses from `std::env::args`, first loading a `.env` file (if one
    /// exists in the current directory) so its values populate the
    /// corresponding environment variables before `clap` reads them.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => warn!(?path, "loaded .env file"),
            Err(dotenvy::Error::Io(_)) => {} // no .env file present, not an error
            Err(e) => warn!(error=%e, "failed to parse .env file"),
        }
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_only_required_defaults() {
        let config = Config::parse_from(["estate_watch", "--database-url", "postgres://x/y"]);
        assert_eq!(config.user_agent, "Mozilla/5.0 (compatible; estate-watch/1.0)");
        assert_eq!(config.timezone, "UTC");
    }
}
