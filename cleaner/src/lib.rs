//! C11 Cleaner (§4.10): the retention-based physical purge (see DESIGN.md
//! for the dependency set kept versus dropped).
#![warn(missing_debug_implementations, clippy::use_self)]

mod cleaner;
mod config;
mod error;

pub use cleaner::Cleaner;
pub use config::CleanerConfig;
pub use error::{Error, Result};
