//! Re-exports the tracing facade so every crate depends on one place for
//! `info!`/`warn!`/`error!`/`debug!` rather than picking their own version.
pub use tracing;
