//! The catalog's data model (§3): the shapes every other crate shares.
//!
//! Nothing in here talks to a database or the network — this crate is pure
//! types, the natural-key hash, URL normalization, and the change-detection
//! function of §4.7, which both Worker and Scheduler need and neither owns.
#![warn(missing_debug_implementations, clippy::use_self)]

mod change;
mod delete_log;
mod diff;
mod listing;
mod natural_key;
mod queue;
mod scraping_state;
mod snapshot;

pub use change::{Change, ChangeKind};
pub use delete_log::DeleteLog;
pub use diff::{diff_listing, status_removed_change};
pub use listing::{Listing, ListingId, ListingImage, ListingStatus, NewListing, StationAccess};
pub use natural_key::{listing_id, normalize_url, NaturalKey};
pub use queue::{retry_backoff_for_attempt, QueueItem, QueueOutcome, QueueStatus, MAX_ATTEMPTS};
pub use scraping_state::ScrapingState;
pub use snapshot::Snapshot;

use watch_time::Time;

/// Money in minor units (e.g. yen, cents) — never floats, per the data model.
pub type MinorUnits = i64;

/// Re-exported so downstream crates don't need their own `watch_time` import
/// just to spell a field type.
pub type Timestamp = Time;
