//! C3 Pacer (§4.2): three tiers of outbound pacing composed into one value
//! that Fetcher and Worker hold a shared handle to.
//!
//! Tier-1 (global in-flight cap) is always consulted by Fetcher. Tier-2
//! (list pacing) is consulted additionally when Fetcher is walking index
//! pages. Tier-3 (the adaptive per-hour detail budget) is the Worker's own
//! responsibility, acquired *before* calling Fetcher for a detail page
//! (§4.4) — it is not something Fetcher reaches into on its own.
#![warn(missing_debug_implementations, clippy::use_self)]

mod tier1;
mod tier2;
mod tier3;

pub use tier1::{Tier1, Tier1Permit};
pub use tier2::Tier2;
pub use tier3::{Tier3, Tier3Config};

use std::sync::Arc;
use std::time::Duration;

use watch_time::{JitterSource, TimeProvider};

/// Tier-1/2 tunables shared by [`Pacer::new`].
#[derive(Debug, Clone)]
pub struct PacerConfig {
    pub concurrency: usize,
    pub list_base_delay: Duration,
    pub list_jitter: Duration,
    pub tier3: Tier3Config,
}

/// The composed three-tier pacer. One instance per process, shared via
/// `Arc` by every component that performs outbound HTTP (§5: Pacer counters
/// are a process-global shared resource).
#[derive(Debug)]
pub struct Pacer {
    pub tier1: Tier1,
    pub tier2: Tier2,
    pub tier3: Tier3,
}

impl Pacer {
    pub fn new(
        config: PacerConfig,
        time: Arc<dyn TimeProvider>,
        jitter: Arc<dyn JitterSource>,
    ) -> Self {
        Self {
            tier1: Tier1::new(
                config.concurrency,
                config.list_base_delay,
                config.list_jitter,
                Arc::clone(&jitter),
                Arc::clone(&time),
            ),
            tier2: Tier2::new(config.list_base_delay, config.list_jitter, jitter, Arc::clone(&time)),
            tier3: Tier3::new(config.tier3, time),
        }
    }

    /// Tier-1 alone — every outbound request, list or detail (§4.2, §4.4).
    pub async fn acquire_global(&self) -> Tier1Permit<'_> {
        self.tier1.acquire().await
    }

    /// Tier-1 + Tier-2 — the pacing Fetcher applies to list-page walks
    /// (§4.4).
    pub async fn acquire_list(&self) -> Tier1Permit<'_> {
        let permit = self.tier1.acquire().await;
        self.tier2.acquire().await;
        permit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_time::{SeededJitter, SystemProvider};

    #[tokio::test]
    async fn acquire_list_applies_both_tiers() {
        let pacer = Pacer::new(
            PacerConfig {
                concurrency: 1,
                list_base_delay: Duration::ZERO,
                list_jitter: Duration::ZERO,
                tier3: Tier3Config::default(),
            },
            Arc::new(SystemProvider::new()),
            Arc::new(SeededJitter::zero()),
        );
        let _permit = pacer.acquire_list().await;
    }
}
