use snafu::Snafu;

/// Errors the Store surfaces (§7: store conflict resolved by upsert
/// semantics so does not appear here; policy violations and fatal errors
/// belong to the caller, not this crate).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("error connecting to the store: {source}"))]
    Connect { source: sqlx::Error },

    #[snafu(display("error running a store query: {source}"))]
    Query { source: sqlx::Error },

    #[snafu(display("error running a store migration: {source}"))]
    Migration { source: sqlx::migrate::MigrateError },

    #[snafu(display("queue item {id} is not in a processing state"))]
    NotProcessing { id: i64 },

    #[snafu(display("cleaner target count {target} exceeds max_delete_count {max}"))]
    PurgeCapExceeded { target: i64, max: i64 },

    #[snafu(display("invalid pagination cursor"))]
    InvalidCursor,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
