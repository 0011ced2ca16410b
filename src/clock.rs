//! Clock source: local calendar fields for the status frame.

use chrono::{DateTime, Datelike, Local, TimeZone};

use crate::TimeSnapshot;

/// Something that can tell the current local time.
pub trait ClockSource {
    fn now(&mut self) -> TimeSnapshot;
}

/// Wall clock in the system's local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&mut self) -> TimeSnapshot {
        TimeSnapshot::from_datetime(&Local::now())
    }
}

/// Always reports the same snapshot. Handy for demos and tests.
#[derive(Debug, Clone)]
pub struct FixedClock(pub TimeSnapshot);

impl ClockSource for FixedClock {
    fn now(&mut self) -> TimeSnapshot {
        self.0.clone()
    }
}

impl TimeSnapshot {
    /// Break a timestamp down into the fields the panel shows.
    pub fn from_datetime<Tz: TimeZone>(moment: &DateTime<Tz>) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        TimeSnapshot {
            weekday: moment.weekday().num_days_from_sunday() as u8,
            date: moment.format("%d.%m").to_string(),
            time: moment.format("%H:%M").to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};

    #[test]
    fn test_snapshot_fields() {
        // Wednesday 15 March 2023, 14:05
        let moment = Utc.with_ymd_and_hms(2023, 3, 15, 14, 5, 59).unwrap();
        let snapshot = TimeSnapshot::from_datetime(&moment);
        assert_eq!(snapshot.weekday, 3);
        assert_eq!(snapshot.date, "15.03");
        assert_eq!(snapshot.time, "14:05");
    }

    #[test]
    fn test_sunday_is_zero_and_fields_zero_padded() {
        let moment = Utc.with_ymd_and_hms(2023, 1, 1, 7, 3, 0).unwrap();
        let snapshot = TimeSnapshot::from_datetime(&moment);
        assert_eq!(snapshot.weekday, 0);
        assert_eq!(snapshot.date, "01.01");
        assert_eq!(snapshot.time, "07:03");
    }

    #[test]
    fn test_offset_applied_before_formatting() {
        // 23:30 UTC on a Saturday is already Sunday in UTC+2
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let moment = Utc
            .with_ymd_and_hms(2023, 6, 3, 23, 30, 0)
            .unwrap()
            .with_timezone(&offset);
        let snapshot = TimeSnapshot::from_datetime(&moment);
        assert_eq!(snapshot.weekday, 0);
        assert_eq!(snapshot.date, "04.06");
        assert_eq!(snapshot.time, "01:30");
    }

    #[test]
    fn test_system_clock_produces_valid_weekday() {
        let snapshot = SystemClock.now();
        assert!(snapshot.weekday <= 6);
        assert_eq!(snapshot.time.len(), 5);
    }
}
