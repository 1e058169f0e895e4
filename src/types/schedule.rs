//! Calendar windows used to filter run listings.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

/// A closed interval of instants, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ScheduleWindow {
    /// The calendar month (UTC) containing `date`: from the first instant of
    /// the month through the last millisecond of its final day.
    pub fn month_containing(date: DateTime<Utc>) -> Self {
        let (year, month) = (date.year(), date.month());
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };

        // Midnight on the first of a month always exists in UTC.
        let start = Utc
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .unwrap_or(date);
        let next_start = Utc
            .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
            .single()
            .unwrap_or(date);

        ScheduleWindow {
            start,
            end: next_start - Duration::milliseconds(1),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}
