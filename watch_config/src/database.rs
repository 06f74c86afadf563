use clap::Parser;

/// Connection settings for the Store's Postgres pool (§4.1), including the
/// hotswap credential file `sqlx-hotswap-pool` watches for rotation.
#[derive(Debug, Clone, Parser)]
pub struct DatabaseConfig {
    /// Postgres connection string.
    #[clap(long = "database-url", env = "DATABASE_URL")]
    pub dsn: String,

    /// Maximum number of pooled connections.
    #[clap(long = "database-max-connections", env = "DATABASE_MAX_CONNECTIONS", default_value = "10")]
    pub max_connections: u32,

    /// Path to a file containing a DSN to hot-swap to when credentials
    /// rotate. When unset, the pool never swaps.
    #[clap(long = "database-hotswap-credentials-file", env = "DATABASE_HOTSWAP_CREDENTIALS_FILE")]
    pub hotswap_credentials_file: Option<std::path::PathBuf>,
}
