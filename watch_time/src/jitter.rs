use rand::{rngs::SmallRng, Rng, SeedableRng};
use parking_lot::Mutex;
use std::{fmt::Debug, time::Duration};

/// Injectable source of jitter, the `U(0, jitter)` term in Pacer's spacing
/// formula (§4.2) and the randomized component of Backoff.
pub trait JitterSource: Debug + Send + Sync + 'static {
    /// A uniformly-distributed duration in `[Duration::ZERO, max)`.
    /// Returns `Duration::ZERO` if `max` is zero.
    fn jitter(&self, max: Duration) -> Duration;
}

/// Jitter drawn from the thread-local RNG. Used in production.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemJitter {}

impl SystemJitter {
    pub fn new() -> Self {
        Self {}
    }
}

impl JitterSource for SystemJitter {
    fn jitter(&self, max: Duration) -> Duration {
        if max.is_zero() {
            return Duration::ZERO;
        }
        let nanos = rand::thread_rng().gen_range(0..=max.as_nanos());
        Duration::from_nanos(nanos as u64)
    }
}

/// Deterministic jitter for tests: a seeded RNG behind a mutex so the same
/// seed always produces the same sequence regardless of call order across
/// threads.
#[derive(Debug)]
pub struct SeededJitter {
    rng: Mutex<SmallRng>,
}

impl SeededJitter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(SmallRng::seed_from_u64(seed)),
        }
    }

    /// A jitter source that always returns zero, for tests that want pacing
    /// math without any randomness at all.
    pub fn zero() -> Self {
        Self::new(0)
    }
}

impl JitterSource for SeededJitter {
    fn jitter(&self, max: Duration) -> Duration {
        if max.is_zero() {
            return Duration::ZERO;
        }
        let nanos = self.rng.lock().gen_range(0..=max.as_nanos());
        Duration::from_nanos(nanos as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_max_is_always_zero() {
        let j = SystemJitter::new();
        assert_eq!(j.jitter(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn seeded_jitter_is_reproducible() {
        let a = SeededJitter::new(42);
        let b = SeededJitter::new(42);
        for _ in 0..8 {
            assert_eq!(
                a.jitter(Duration::from_secs(4)),
                b.jitter(Duration::from_secs(4))
            );
        }
    }
}
