use std::{collections::VecDeque, sync::Arc, time::Duration};

use observability_deps::tracing::info;
use parking_lot::Mutex;
use watch_time::{Time, TimeProvider};

/// Tier-3 tunables (§4.2), mirrored 1:1 from `watch_config::RateLimitConfig`
/// so `pacer` has no compile-time dependency on the config crate.
#[derive(Debug, Clone)]
pub struct Tier3Config {
    pub default_per_hour: u32,
    pub night_per_hour: u32,
    pub night_start: u32,
    pub night_end: u32,
    pub day_per_hour: u32,
    pub day_start: u32,
    pub day_end: u32,
    pub slow_threshold: f64,
    pub recover_threshold: f64,
    pub slow_per_hour: u32,
    pub cooldown: Duration,
    pub ramp_step: u32,
    pub ramp_min_interval: Duration,
    pub window_size: usize,
}

impl Default for Tier3Config {
    fn default() -> Self {
        Self {
            default_per_hour: 60,
            night_per_hour: 120,
            night_start: 1,
            night_end: 6,
            day_per_hour: 30,
            day_start: 9,
            day_end: 21,
            slow_threshold: 0.20,
            recover_threshold: 0.10,
            slow_per_hour: 10,
            cooldown: Duration::from_secs(60 * 60),
            ramp_step: 2,
            ramp_min_interval: Duration::from_secs(15 * 60),
            window_size: 20,
        }
    }
}

impl Tier3Config {
    /// The base schedule by wall-clock hour (§4.2), before slow-mode/ramp-up
    /// adjustments. `hour` is `0..=23` local wall-clock.
    fn base_cap(&self, hour: u32) -> u32 {
        if in_window(hour, self.night_start, self.night_end) {
            self.night_per_hour
        } else if in_window(hour, self.day_start, self.day_end) {
            self.day_per_hour
        } else {
            self.default_per_hour
        }
    }
}

/// `[start, end)` wrapping around midnight if `end <= start`.
fn in_window(hour: u32, start: u32, end: u32) -> bool {
    if start == end {
        false
    } else if start < end {
        hour >= start && hour < end
    } else {
        hour >= start || hour < end
    }
}

struct State {
    window: VecDeque<bool>,
    /// `Some(floor)` while in slow mode; the effective cap is
    /// `min(base_cap, floor)`. `None` once ramp-up has recovered it back to
    /// the base schedule.
    slow_floor: Option<u32>,
    next_ramp_at: Option<Time>,
    last_acquire_at: Option<Time>,
}

/// Tier-3: the adaptive per-hour detail-fetch budget (§4.2).
pub struct Tier3 {
    config: Tier3Config,
    time: Arc<dyn TimeProvider>,
    state: Mutex<State>,
}

impl std::fmt::Debug for Tier3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tier3")
            .field("effective_cap", &self.effective_cap())
            .finish()
    }
}

impl Tier3 {
    pub fn new(config: Tier3Config, time: Arc<dyn TimeProvider>) -> Self {
        Self {
            config,
            time,
            state: Mutex::new(State {
                window: VecDeque::with_capacity(0),
                slow_floor: None,
                next_ramp_at: None,
                last_acquire_at: None,
            }),
        }
    }

    fn hour_of(&self, now: Time) -> u32 {
        use chrono::Timelike;
        now.date_time().hour()
    }

    fn failure_rate(window: &VecDeque<bool>) -> Option<f64> {
        if window.is_empty() {
            return None;
        }
        let failures = window.iter().filter(|success| !**success).count();
        Some(failures as f64 / window.len() as f64)
    }

    /// Applies slow-mode entry / ramp-up transitions for the current moment
    /// and returns the resulting effective cap (§4.2).
    fn refresh(&self, state: &mut State, now: Time) -> u32 {
        let base = self.config.base_cap(self.hour_of(now));
        let Some(rate) = Self::failure_rate(&state.window) else {
            return base;
        };

        if rate >= self.config.slow_threshold {
            if state.slow_floor.is_none() {
                info!(failure_rate = rate, "pacer tier-3 entering slow mode");
            }
            state.slow_floor = Some(self.config.slow_per_hour);
            state.next_ramp_at = now.checked_add(self.config.cooldown + self.config.ramp_min_interval);
        } else if let Some(floor) = state.slow_floor {
            if rate <= self.config.recover_threshold {
                if let Some(next_ramp_at) = state.next_ramp_at {
                    if now >= next_ramp_at {
                        let new_floor = floor + self.config.ramp_step;
                        state.next_ramp_at = next_ramp_at.checked_add(self.config.ramp_min_interval);
                        if new_floor >= base {
                            info!("pacer tier-3 ramped back to the full schedule");
                            state.slow_floor = None;
                        } else {
                            info!(new_floor, "pacer tier-3 ramping up");
                            state.slow_floor = Some(new_floor);
                        }
                    }
                }
            }
        }

        match state.slow_floor {
            Some(floor) => base.min(floor),
            None => base,
        }
    }

    /// The current effective cap, without mutating ramp state (for
    /// inspection/logging; `acquire`/`observe` are the only mutators).
    pub fn effective_cap(&self) -> u32 {
        let mut state = self.state.lock();
        self.refresh(&mut state, self.time.now())
    }

    /// Blocks under the per-hour budget: enforces a global minimum interval
    /// of `3600s / effective_cap` between acquires so mid-window cap
    /// changes cannot be exploited by switching windows (§4.2).
    pub async fn acquire(&self, caller: &str) {
        let _ = caller;
        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = self.time.now();
                let cap = self.refresh(&mut state, now).max(1);
                let interval = Duration::from_secs_f64(3600.0 / cap as f64);
                match state.last_acquire_at {
                    Some(last) => match now.checked_duration_since(last) {
                        Some(elapsed) if elapsed < interval => Some(interval - elapsed),
                        _ => None,
                    },
                    None => None,
                }
            };

            match wait {
                Some(duration) => tokio::time::sleep(duration).await,
                None => break,
            }
        }
        self.state.lock().last_acquire_at = Some(self.time.now());
    }

    /// Feeds the rolling failure window fed by every detail attempt (§4.2).
    pub fn observe(&self, success: bool) {
        let mut state = self.state.lock();
        if state.window.len() >= self.config.window_size.max(1) {
            state.window.pop_front();
        }
        state.window.push_back(success);
        let now = self.time.now();
        self.refresh(&mut state, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watch_time::MockProvider;

    fn at_hour(hour: u32) -> Time {
        use chrono::{TimeZone, Utc};
        Time::from(Utc.with_ymd_and_hms(2026, 7, 28, hour, 0, 0).unwrap())
    }

    #[test]
    fn base_schedule_picks_the_right_bucket() {
        let config = Tier3Config::default();
        assert_eq!(config.base_cap(2), config.night_per_hour);
        assert_eq!(config.base_cap(12), config.day_per_hour);
        assert_eq!(config.base_cap(23), config.default_per_hour);
    }

    #[test]
    fn no_observations_yet_uses_base_cap() {
        let config = Tier3Config::default();
        let clock = Arc::new(MockProvider::new(at_hour(12)));
        let tier = Tier3::new(config.clone(), clock);
        assert_eq!(tier.effective_cap(), config.day_per_hour);
    }

    #[test]
    fn high_failure_rate_enters_slow_mode() {
        let config = Tier3Config {
            window_size: 5,
            ..Tier3Config::default()
        };
        let clock = Arc::new(MockProvider::new(at_hour(12)));
        let tier = Tier3::new(config.clone(), clock);

        for success in [false, false, true, true, true] {
            tier.observe(success);
        }
        // 2/5 = 0.40 >= 0.20 slow threshold.
        assert_eq!(tier.effective_cap(), config.slow_per_hour.min(config.day_per_hour));
    }

    #[test]
    fn ramp_up_only_fires_after_next_ramp_at() {
        let config = Tier3Config {
            window_size: 4,
            slow_per_hour: 4,
            ramp_step: 2,
            cooldown: Duration::from_secs(60),
            ramp_min_interval: Duration::from_secs(60),
            day_per_hour: 100,
            day_start: 0,
            day_end: 24,
            ..Tier3Config::default()
        };
        let clock = Arc::new(MockProvider::new(at_hour(12)));
        let tier = Tier3::new(config.clone(), Arc::clone(&clock) as Arc<dyn TimeProvider>);

        // Trip into slow mode.
        for _ in 0..4 {
            tier.observe(false);
        }
        assert_eq!(tier.effective_cap(), 4);

        // Now recover: all successes, but not yet past next_ramp_at.
        for _ in 0..4 {
            tier.observe(true);
        }
        assert_eq!(tier.effective_cap(), 4);

        // Advance past cooldown + ramp_min_interval.
        clock.inc(Duration::from_secs(121));
        assert_eq!(tier.effective_cap(), 6);
    }
}
