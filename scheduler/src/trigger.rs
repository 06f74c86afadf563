use chrono::{NaiveDate, NaiveTime};

/// Whether the daily cron should fire now: true iff local wall-clock time
/// has reached `daily_run_time` on a calendar day that hasn't already
/// fired (§4.8 "Triggered by cron at a configured wall-clock time"). A
/// pure function over the caller's already-localized clock reading, so
/// it's testable without any timezone machinery in the test itself.
pub fn is_due(local_time: NaiveTime, local_date: NaiveDate, daily_run_time: NaiveTime, last_fired: Option<NaiveDate>) -> bool {
    if last_fired == Some(local_date) {
        return false;
    }
    local_time >= daily_run_time
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fires_once_the_clock_reaches_the_target() {
        assert!(!is_due(time(2, 59), date(2026, 1, 1), time(3, 0), None));
        assert!(is_due(time(3, 0), date(2026, 1, 1), time(3, 0), None));
        assert!(is_due(time(3, 5), date(2026, 1, 1), time(3, 0), None));
    }

    #[test]
    fn does_not_fire_twice_on_the_same_calendar_day() {
        let today = date(2026, 1, 1);
        assert!(!is_due(time(3, 5), today, time(3, 0), Some(today)));
    }

    #[test]
    fn fires_again_on_the_next_calendar_day() {
        let yesterday = date(2026, 1, 1);
        let today = date(2026, 1, 2);
        assert!(is_due(time(3, 5), today, time(3, 0), Some(yesterday)));
    }
}
