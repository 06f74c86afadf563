use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::sync::{Semaphore, SemaphorePermit};
use watch_time::{JitterSource, Time, TimeProvider};

/// Tier-1: a fixed-capacity semaphore across all outbound work, with a
/// minimum spacing enforced between releases (§4.2). Every [`crate::Pacer`]
/// acquisition goes through this tier regardless of kind.
#[derive(Debug)]
pub struct Tier1 {
    semaphore: Semaphore,
    base_delay: Duration,
    jitter_max: Duration,
    jitter: Arc<dyn JitterSource>,
    time: Arc<dyn TimeProvider>,
    last_release: Mutex<Option<Time>>,
}

impl Tier1 {
    pub fn new(
        capacity: usize,
        base_delay: Duration,
        jitter_max: Duration,
        jitter: Arc<dyn JitterSource>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            semaphore: Semaphore::new(capacity.max(1)),
            base_delay,
            jitter_max,
            jitter,
            time,
            last_release: Mutex::new(None),
        }
    }

    /// Blocks until a slot is free and at least `base_delay + U(0, jitter)`
    /// has elapsed since the last permit was released.
    pub async fn acquire(&self) -> Tier1Permit<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("tier-1 semaphore is never closed");

        let spacing = self.base_delay + self.jitter.jitter(self.jitter_max);
        let last_release = *self.last_release.lock();
        if let Some(last_release) = last_release {
            let now = self.time.now();
            if let Some(elapsed) = now.checked_duration_since(last_release) {
                if elapsed < spacing {
                    tokio::time::sleep(spacing - elapsed).await;
                }
            }
        }

        Tier1Permit {
            _permit: permit,
            tier: self,
        }
    }
}

/// Held while one logical outbound request is in flight. Records the
/// release time on drop so the *next* acquire's spacing is measured from
/// here, not from this acquire's start (§4.2: "since the last release").
#[derive(Debug)]
pub struct Tier1Permit<'a> {
    _permit: SemaphorePermit<'a>,
    tier: &'a Tier1,
}

impl Drop for Tier1Permit<'_> {
    fn drop(&mut self) {
        *self.tier.last_release.lock() = Some(self.tier.time.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_time::{SeededJitter, SystemProvider};

    #[tokio::test]
    async fn first_acquire_never_waits() {
        let tier = Tier1::new(
            1,
            Duration::from_millis(1),
            Duration::ZERO,
            Arc::new(SeededJitter::zero()),
            Arc::new(SystemProvider::new()),
        );
        let started = std::time::Instant::now();
        let _permit = tier.acquire().await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn capacity_one_serializes_acquisitions() {
        let tier = Arc::new(Tier1::new(
            1,
            Duration::ZERO,
            Duration::ZERO,
            Arc::new(SeededJitter::zero()),
            Arc::new(SystemProvider::new()),
        ));
        let first = tier.acquire().await;
        assert_eq!(tier.semaphore.available_permits(), 0);
        drop(first);
        assert_eq!(tier.semaphore.available_permits(), 1);
    }
}
