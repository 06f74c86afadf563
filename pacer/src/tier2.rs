use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use watch_time::{JitterSource, Time, TimeProvider};

/// Tier-2: list-page pacing (§4.2), a slower baseline applied on top of
/// Tier-1 whenever the Scheduler walks index pages. No capacity limit of
/// its own — Tier-1's semaphore already serializes the single in-flight
/// request — just an additional spacing floor.
#[derive(Debug)]
pub struct Tier2 {
    base_delay: Duration,
    jitter_max: Duration,
    jitter: Arc<dyn JitterSource>,
    time: Arc<dyn TimeProvider>,
    last_acquire: Mutex<Option<Time>>,
}

impl Tier2 {
    pub fn new(
        base_delay: Duration,
        jitter_max: Duration,
        jitter: Arc<dyn JitterSource>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            base_delay,
            jitter_max,
            jitter,
            time,
            last_acquire: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) {
        let spacing = self.base_delay + self.jitter.jitter(self.jitter_max);
        let last_acquire = *self.last_acquire.lock();
        if let Some(last_acquire) = last_acquire {
            let now = self.time.now();
            if let Some(elapsed) = now.checked_duration_since(last_acquire) {
                if elapsed < spacing {
                    tokio::time::sleep(spacing - elapsed).await;
                }
            }
        }
        *self.last_acquire.lock() = Some(self.time.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_time::{SeededJitter, SystemProvider};

    #[tokio::test]
    async fn first_acquire_never_waits() {
        let tier = Tier2::new(
            Duration::from_millis(1),
            Duration::ZERO,
            Arc::new(SeededJitter::zero()),
            Arc::new(SystemProvider::new()),
        );
        let started = std::time::Instant::now();
        tier.acquire().await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
