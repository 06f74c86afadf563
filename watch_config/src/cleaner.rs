use clap::Parser;

/// `cleaner.*` (§6, §4.10): the retention purge's defaults for the
/// always-on weekly loop. The `run-cleanup` admin command takes its own
/// `retentionDays`/`maxDeletionCount`/`dryRun` arguments instead of reading
/// this section, the same way `get-stats`/`get-queue-stats` bypass it
/// entirely (§6 "Administrative commands").
#[derive(Debug, Clone, Parser)]
pub struct CleanerConfig {
    /// Days a `removed` listing survives before physical purge (§4.10
    /// default 90).
    #[clap(long = "cleaner-retention-days", env = "CLEANER_RETENTION_DAYS", default_value = "90")]
    pub retention_days: u32,

    /// Safety cap on one purge's row count (§4.10 default 10000).
    #[clap(long = "cleaner-max-delete-count", env = "CLEANER_MAX_DELETE_COUNT", default_value = "10000")]
    pub max_delete_count: u32,

    /// Whether the weekly loop's own runs only report instead of deleting
    /// (§4.10 "dry=true by default").
    #[clap(long = "cleaner-dry-run", env = "CLEANER_DRY_RUN", default_value = "true")]
    pub dry_run: bool,

    /// Cadence of the independent weekly loop (§4.10, §5 "one Cleaner
    /// timer task").
    #[clap(long = "cleaner-interval", env = "CLEANER_INTERVAL", default_value = "7d")]
    #[clap(value_parser = humantime::parse_duration)]
    pub interval: std::time::Duration,
}
