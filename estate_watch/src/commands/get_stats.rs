use watch_config::Config;

use crate::commands::wiring::{self, Error as WiringError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to wire up collaborators: {0}")]
    Wiring(#[from] WiringError),

    #[error("failed to read catalog stats: {0}")]
    Store(#[from] watch_store::Error),

    #[error("failed to render stats as JSON: {0}")]
    Render(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// `get-stats` admin command (§6, §B.6): active/removed listing counts,
/// the `ScrapingState` singleton (§3), and whether the in-process Breaker
/// is currently open. Read-only; errors surface verbatim (§7).
pub async fn command(config: Config) -> Result<()> {
    let handles = wiring::connect(&config).await?;

    let catalog = handles.store.catalog_stats().await?;
    let last_run = handles.store.get_scraping_state().await?;
    let breaker_open = handles.breaker.is_open();

    let stats = Stats {
        active_listings: catalog.active_listings,
        removed_listings: catalog.removed_listings,
        last_run,
        breaker_open,
    };

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

#[derive(Debug, serde::Serialize)]
struct Stats {
    active_listings: u64,
    removed_listings: u64,
    last_run: watch_types::ScrapingState,
    breaker_open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_serializes_with_the_scraping_state_embedded() {
        let stats = Stats {
            active_listings: 10,
            removed_listings: 2,
            last_run: watch_types::ScrapingState::default(),
            breaker_open: false,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["active_listings"], 10);
        assert_eq!(json["removed_listings"], 2);
        assert_eq!(json["breaker_open"], false);
        assert!(json["last_run"].is_object());
    }
}
