use chrono::{Duration, NaiveDate};
use serde::Serialize;

/// Inclusive calendar-day window driving telemetry queries.
///
/// Invariant: `start <= end`. Every constructor and setter clamps instead of
/// failing, so a `TimeWindow` value is always valid.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct TimeWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl TimeWindow {
    /// Builds a window, clamping `start` down to `end` when it lies after it.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start.min(end),
            end,
        }
    }

    /// `[today - days, today]`.
    pub fn trailing_days(today: NaiveDate, days: i64) -> Self {
        let days = days.max(0);
        Self::new(today - Duration::days(days), today)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Moves the start; a start after `end` is clamped to `end`.
    pub fn with_start(self, start: NaiveDate) -> Self {
        Self {
            start: start.min(self.end),
            end: self.end,
        }
    }

    /// Moves the end; an end before `start` is clamped to `start`.
    pub fn with_end(self, end: NaiveDate) -> Self {
        Self {
            start: self.start,
            end: end.max(self.start),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of calendar days covered, counting both ends.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Cache key for `resource` over this window.
    pub fn key(&self, resource: &str) -> WindowKey {
        WindowKey(format!("{resource}:{self}"))
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}..{}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Serialized `(resource, window)` pair used to key cached query results.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowKey(String);

impl WindowKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WindowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
