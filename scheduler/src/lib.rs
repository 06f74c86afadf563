//! Scheduler (§4.8): the daily job that walks every upstream scope's index
//! pages and reconciles the discovered URLs against the catalog's active
//! listings — the only component that ever enqueues new detail-page work
//! or deactivates a listing.
//!
//! Shaped after `worker::Worker`'s cancellable main-loop pattern, but the
//! suspension point is a wall-clock check against a configured daily
//! trigger time rather than a queue poll.
#![warn(missing_debug_implementations, clippy::use_self)]

mod config;
mod error;
mod paginator;
mod scheduler;
mod trigger;

pub use config::{SchedulerConfig, Scope};
pub use error::{Error, Result};
pub use paginator::{DefaultPaginator, ScopePaginator};
pub use scheduler::{RunOutcome, Scheduler};
