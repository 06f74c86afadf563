//! C2 Store (§4.1): the single-writer durable catalog, retry queue, and
//! change/delete logs shared by every other component.
//!
//! [`Store`] is the object-safe contract; [`PostgresStore`] is the
//! production backend and [`MemStore`] is the in-memory one every other
//! crate's unit tests build on (§B.5).
#![warn(missing_debug_implementations, clippy::use_self)]

mod error;
mod filter;
mod mem;
mod postgres;
mod store;
mod types;

pub use error::{Error, Result};
pub use filter::{Cursor, FilterError, ListingFilter, SortOrder, WalkMode};
pub use mem::MemStore;
pub use postgres::PostgresStore;
pub use store::Store;
pub use types::{
    ActiveListingRef, CatalogStats, EnqueuedItem, NewQueueItem, Page, PurgeOutcome, QueueCompletion,
    QueueStats, SnapshotWrite, UpsertOutcome,
};
