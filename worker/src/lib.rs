//! Worker (§4.6 "the hardest component"): the single logical consumer that
//! drains the retry queue one detail page at a time.
//!
//! A startup recovery sweep followed by a driven main loop reacting to a
//! shared, mutex-guarded piece of state, dispatching on a fetch
//! classification instead of a byte-count threshold.
#![warn(missing_debug_implementations, clippy::use_self)]

mod config;
mod error;
mod health;
mod worker;

pub use config::WorkerConfig;
pub use error::{Error, Result};
pub use worker::Worker;
