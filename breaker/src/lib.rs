//! C4 Breaker (§4.3): a consecutive-failure and rolling-rate circuit
//! breaker with an implicit half-open probe.
//!
//! Consulted before every Fetcher attempt (§4.4) and never bypassed by
//! retries. State transitions are atomic and visible to subsequent callers
//! on the same process (§5).
#![warn(missing_debug_implementations, clippy::use_self)]

use std::sync::Arc;
use std::time::Duration;

use observability_deps::tracing::{info, warn};
use parking_lot::Mutex;
use watch_time::{Time, TimeProvider};

/// Status codes that trip the immediate-open rule on their own (§4.3).
const CRITICAL_CODES: [u32; 3] = [500, 429, 403];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakerState {
    Closed,
    Open,
}

#[derive(Debug, Clone, Copy)]
struct Counters {
    consecutive_failures: u32,
    total_requests: u32,
    total_failures: u32,
    last_failure_time: Option<Time>,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            total_requests: 0,
            total_failures: 0,
            last_failure_time: None,
        }
    }
}

struct State {
    state: BreakerState,
    counters: Counters,
}

/// Thresholds driving [`Breaker`]'s transitions (§4.3), mirrored from
/// `watch_config::ErrorHandlingConfig`.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    pub consecutive_failure_threshold: u32,
    pub rolling_window: u32,
    pub rolling_failure_ratio: f64,
    pub reset_timeout: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            consecutive_failure_threshold: 2,
            rolling_window: 20,
            rolling_failure_ratio: 0.40,
            reset_timeout: Duration::from_secs(60 * 60),
        }
    }
}

/// The breaker itself. Cheap to clone-by-`Arc`; shared by Fetcher across
/// every call on the process.
pub struct Breaker {
    config: BreakerConfig,
    time: Arc<dyn TimeProvider>,
    state: Mutex<State>,
}

impl std::fmt::Debug for Breaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Breaker")
            .field("state", &state.state)
            .field("consecutive_failures", &state.counters.consecutive_failures)
            .field("total_requests", &state.counters.total_requests)
            .field("total_failures", &state.counters.total_failures)
            .finish()
    }
}

impl Breaker {
    pub fn new(config: BreakerConfig, time: Arc<dyn TimeProvider>) -> Self {
        Self {
            config,
            time,
            state: Mutex::new(State {
                state: BreakerState::Closed,
                counters: Counters::default(),
            }),
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.counters.consecutive_failures = 0;
        state.counters.total_requests += 1;
    }

    pub fn record_failure(&self, status_code: u32) {
        let mut state = self.state.lock();
        state.counters.consecutive_failures += 1;
        state.counters.total_requests += 1;
        state.counters.total_failures += 1;
        state.counters.last_failure_time = Some(self.time.now());

        if state.state == BreakerState::Closed {
            let immediate = state.counters.consecutive_failures >= self.config.consecutive_failure_threshold
                && CRITICAL_CODES.contains(&status_code);
            let rolling = state.counters.total_requests >= self.config.rolling_window
                && (state.counters.total_failures as f64 / state.counters.total_requests as f64)
                    >= self.config.rolling_failure_ratio;

            if immediate || rolling {
                warn!(
                    status_code,
                    consecutive_failures = state.counters.consecutive_failures,
                    total_requests = state.counters.total_requests,
                    total_failures = state.counters.total_failures,
                    immediate,
                    rolling,
                    "breaker opening"
                );
                state.state = BreakerState::Open;
            }
        }
    }

    /// Whether the next request is allowed through. Resets all counters to
    /// `closed` on the first call after `reset_timeout` has elapsed since
    /// the last recorded failure — the half-open probe (§4.3).
    pub fn can_proceed(&self) -> bool {
        let mut state = self.state.lock();
        match state.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let last_failure = state.counters.last_failure_time.expect("open implies a failure was recorded");
                let now = self.time.now();
                let elapsed = now.checked_duration_since(last_failure).unwrap_or_default();
                if elapsed > self.config.reset_timeout {
                    info!("breaker half-open probe: resetting to closed");
                    state.state = BreakerState::Closed;
                    state.counters = Counters::default();
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().state == BreakerState::Open
    }
}
