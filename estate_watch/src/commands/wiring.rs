use std::str::FromStr;
use std::sync::Arc;

use breaker::{Breaker, BreakerConfig};
use extract::Extractor;
use fetcher::{Fetcher, HttpFetcher, HttpFetcherConfig};
use metric::Registry;
use pacer::{Pacer, PacerConfig, Tier3Config};
use watch_config::Config;
use watch_store::{PostgresStore, Store};
use watch_time::{JitterSource, SystemJitter, SystemProvider, TimeProvider};

use crate::extractor::UnimplementedExtractor;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to the store: {0}")]
    Store(#[from] watch_store::Error),

    #[error("failed to build the HTTP fetcher: {0}")]
    Fetcher(#[from] fetcher::Error),

    #[error("invalid timezone {0:?}: {1}")]
    Timezone(String, chrono_tz::ParseError),

    #[error("invalid scraper.daily-run-time {0:?}: expected HH:MM")]
    DailyRunTime(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every collaborator `run`/`trigger-scrape-now`/`run-cleanup`/`get-stats`
/// share, built once from the parsed [`Config`] (§6).
pub struct Handles {
    pub store: Arc<dyn Store>,
    pub time: Arc<dyn TimeProvider>,
    pub pacer: Arc<Pacer>,
    pub breaker: Arc<Breaker>,
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub metrics: Arc<Registry>,
}

impl std::fmt::Debug for Handles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handles").finish_non_exhaustive()
    }
}

/// Connects to the store and builds every shared collaborator (§5 "Pacer
/// counters, Breaker state... are process-global") from the parsed config.
/// Used by every subcommand that touches the live system.
pub async fn connect(config: &Config) -> Result<Handles> {
    let time: Arc<dyn TimeProvider> = Arc::new(SystemProvider::new());
    let jitter: Arc<dyn JitterSource> = Arc::new(SystemJitter::new());
    let metrics = Arc::new(Registry::new());

    let store: Arc<dyn Store> =
        Arc::new(PostgresStore::connect(&config.database.dsn, config.database.max_connections).await?);

    let pacer = Arc::new(Pacer::new(
        PacerConfig {
            concurrency: config.rate_limit.concurrency,
            list_base_delay: config.rate_limit.list_base_delay,
            list_jitter: config.rate_limit.list_jitter,
            tier3: Tier3Config {
                default_per_hour: config.rate_limit.default_per_hour,
                night_per_hour: config.rate_limit.night_per_hour,
                night_start: config.rate_limit.night_start,
                night_end: config.rate_limit.night_end,
                day_per_hour: config.rate_limit.day_per_hour,
                day_start: config.rate_limit.day_start,
                day_end: config.rate_limit.day_end,
                slow_threshold: config.rate_limit.slow_threshold,
                recover_threshold: config.rate_limit.recover_threshold,
                slow_per_hour: config.rate_limit.slow_per_hour,
                cooldown: config.rate_limit.cooldown,
                ramp_step: config.rate_limit.ramp_step,
                ramp_min_interval: config.rate_limit.ramp_min_interval,
                window_size: config.rate_limit.window_size,
            },
        },
        Arc::clone(&time),
        jitter,
    ));

    let breaker = Arc::new(Breaker::new(
        BreakerConfig {
            consecutive_failure_threshold: config.error_handling.consecutive_failure_threshold,
            rolling_window: config.error_handling.rolling_window,
            rolling_failure_ratio: config.error_handling.rolling_failure_ratio,
            reset_timeout: config.error_handling.reset_timeout,
        },
        Arc::clone(&time),
    ));

    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(
        HttpFetcherConfig {
            timeout: config.scraper.timeout,
            max_retries: config.scraper.max_retries,
            retry_delay: config.scraper.retry_delay,
            user_agent: config.user_agent.clone(),
            block_page_signature: None,
            homepage_url: None,
            homepage_touch_interval: config.scraper.homepage_touch_interval,
        },
        Arc::clone(&pacer),
        Arc::clone(&breaker),
        Arc::clone(&time),
    )?);

    let extractor: Arc<dyn Extractor> = Arc::new(UnimplementedExtractor);

    Ok(Handles {
        store,
        time,
        pacer,
        breaker,
        fetcher,
        extractor,
        metrics,
    })
}

/// Parses `config.timezone` into a [`chrono_tz::Tz`] (§4.8, §6 `timezone`).
pub fn parse_timezone(config: &Config) -> Result<chrono_tz::Tz> {
    chrono_tz::Tz::from_str(&config.timezone).map_err(|e| Error::Timezone(config.timezone.clone(), e))
}

/// Parses `config.scraper.daily_run_time` (`"HH:MM"`) into a
/// [`chrono::NaiveTime`] (§4.8).
pub fn parse_daily_run_time(config: &Config) -> Result<chrono::NaiveTime> {
    chrono::NaiveTime::parse_from_str(&config.scraper.daily_run_time, "%H:%M")
        .map_err(|_| Error::DailyRunTime(config.scraper.daily_run_time.clone()))
}

/// Builds the [`scheduler::Scope`] list from `config.scraper.scopes`, all
/// tagged with the single upstream's `source` identifier (§1 "a single
/// upstream website").
pub fn scopes(config: &Config) -> Vec<scheduler::Scope> {
    config
        .scraper
        .scopes
        .iter()
        .map(|url| scheduler::Scope {
            source: config.scraper.source.clone(),
            url: url.clone(),
        })
        .collect()
}
