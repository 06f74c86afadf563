//! Injectable time and randomness (C1).
//!
//! Every wall-clock read and every source of jitter in estate-watch goes
//! through this crate so that Pacer, Breaker, Worker and Scheduler can be
//! driven deterministically in tests (see Design Note 2 in SPEC_FULL.md).
#![warn(missing_debug_implementations, clippy::use_self)]

mod jitter;
mod time;

pub use jitter::{JitterSource, SeededJitter, SystemJitter};
pub use time::{MockProvider, SystemProvider, Time, TimeProvider};
