use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    fmt::Debug,
    sync::Arc,
    time::{Duration, SystemTime},
};

/// A point in time, represented as nanoseconds since the Unix epoch.
///
/// Thin wrapper so call sites never reach for [`SystemTime::now`] or
/// [`Utc::now`] directly; every timestamp in the system flows through a
/// [`TimeProvider`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time(i64);

impl Time {
    pub fn from_timestamp_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn timestamp_nanos(&self) -> i64 {
        self.0
    }

    pub fn date_time(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.0)
    }

    /// The calendar day this timestamp falls on, in UTC.
    pub fn calendar_day(&self) -> chrono::NaiveDate {
        self.date_time().date_naive()
    }

    pub fn checked_add(&self, duration: Duration) -> Option<Self> {
        let nanos = i64::try_from(duration.as_nanos()).ok()?;
        self.0.checked_add(nanos).map(Self)
    }

    pub fn checked_duration_since(&self, other: Self) -> Option<Duration> {
        if self.0 < other.0 {
            return None;
        }
        Some(Duration::from_nanos((self.0 - other.0) as u64))
    }
}

impl From<DateTime<Utc>> for Time {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_nanos_opt().unwrap_or(i64::MAX))
    }
}

impl From<Time> for DateTime<Utc> {
    fn from(t: Time) -> Self {
        t.date_time()
    }
}

/// Injectable wall-clock source.
///
/// Implementations must be cheap to clone (an `Arc` internally) since every
/// component that needs the time holds its own handle.
pub trait TimeProvider: Debug + Send + Sync + 'static {
    fn now(&self) -> Time;
}

/// Real wall-clock time, backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProvider {}

impl SystemProvider {
    pub fn new() -> Self {
        Self {}
    }
}

impl TimeProvider for SystemProvider {
    fn now(&self) -> Time {
        let since_epoch = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("system clock before epoch");
        Time::from_timestamp_nanos(since_epoch.as_nanos() as i64)
    }
}

/// A controllable clock for tests. Starts at a fixed [`Time`] and only moves
/// forward when [`MockProvider::inc`] or [`MockProvider::set`] is called.
#[derive(Debug)]
pub struct MockProvider {
    now: Mutex<Time>,
}

impl MockProvider {
    pub fn new(start: Time) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn inc(&self, duration: Duration) -> Time {
        let mut now = self.now.lock();
        *now = now.checked_add(duration).expect("mock clock overflow");
        *now
    }

    pub fn set(&self, time: Time) {
        *self.now.lock() = time;
    }
}

impl TimeProvider for MockProvider {
    fn now(&self) -> Time {
        *self.now.lock()
    }
}

impl TimeProvider for Arc<dyn TimeProvider> {
    fn now(&self) -> Time {
        self.as_ref().now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_provider_only_moves_forward_when_told() {
        let t0 = Time::from_timestamp_nanos(1_000);
        let clock = MockProvider::new(t0);
        assert_eq!(clock.now(), t0);
        clock.inc(Duration::from_secs(1));
        assert_eq!(clock.now(), Time::from_timestamp_nanos(1_000_000_001_000));
    }

    #[test]
    fn checked_duration_since_is_none_when_negative() {
        let earlier = Time::from_timestamp_nanos(10);
        let later = Time::from_timestamp_nanos(20);
        assert_eq!(
            later.checked_duration_since(earlier),
            Some(Duration::from_nanos(10))
        );
        assert_eq!(earlier.checked_duration_since(later), None);
    }
}
