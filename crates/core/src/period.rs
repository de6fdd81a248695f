//! Date-window math for the period listing API.
//!
//! The remote listing endpoint caps the queryable span per call, so
//! arbitrary ranges are split into consecutive inclusive windows before
//! pagination. Windows are always produced in ascending date order.

use chrono::{Datelike, Duration, Months, NaiveDate};

/// Maximum queryable span per listing call, in days (remote API limit).
pub const MAX_WINDOW_DAYS: i64 = 31;

/// An inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Number of days covered, counting both endpoints.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Split `[start, end]` into consecutive inclusive windows of at most
/// [`MAX_WINDOW_DAYS`] days each.
///
/// A zero-length range (`start == end`) yields a single one-day window;
/// an inverted range yields nothing.
pub fn windows(start: NaiveDate, end: NaiveDate) -> Vec<DateWindow> {
    let mut out = Vec::new();
    let mut cur = start;
    while cur <= end {
        let span_end = (cur + Duration::days(MAX_WINDOW_DAYS - 1)).min(end);
        out.push(DateWindow {
            start: cur,
            end: span_end,
        });
        match span_end.succ_opt() {
            Some(next) => cur = next,
            None => break,
        }
    }
    out
}

/// The full calendar month containing `day`.
pub fn month_window(day: NaiveDate) -> DateWindow {
    let first = day.with_day(1).expect("day 1 is valid in every month");
    let last = (first + Months::new(1))
        .pred_opt()
        .expect("month start has a predecessor");
    DateWindow {
        start: first,
        end: last,
    }
}

/// The windows covered by a scheduled run: the previous and current
/// calendar months, ascending. "Previous" is taken 28 days back, so late
/// in a long month both probes can land in the same month and collapse
/// to one window.
pub fn recent_month_windows(today: NaiveDate) -> Vec<DateWindow> {
    let current = month_window(today);
    let previous = month_window(today - Duration::days(28));
    if previous == current {
        vec![current]
    } else {
        vec![previous, current]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn seventy_days_split_into_31_31_8() {
        let start = d(2024, 1, 1);
        let end = start + Duration::days(69);
        let ws = windows(start, end);
        assert_eq!(ws.len(), 3);
        assert_eq!(ws[0].days(), 31);
        assert_eq!(ws[1].days(), 31);
        assert_eq!(ws[2].days(), 8);
    }

    #[test]
    fn windows_are_contiguous_and_ordered() {
        let ws = windows(d(2024, 1, 1), d(2024, 3, 10));
        for pair in ws.windows(2) {
            assert_eq!(pair[0].end.succ_opt().unwrap(), pair[1].start);
            assert!(pair[0].start < pair[1].start);
        }
        assert_eq!(ws.first().unwrap().start, d(2024, 1, 1));
        assert_eq!(ws.last().unwrap().end, d(2024, 3, 10));
    }

    #[test]
    fn zero_length_range_is_one_window() {
        let ws = windows(d(2025, 6, 15), d(2025, 6, 15));
        assert_eq!(ws.len(), 1);
        assert_eq!(ws[0].days(), 1);
    }

    #[test]
    fn inverted_range_is_empty() {
        assert!(windows(d(2025, 6, 16), d(2025, 6, 15)).is_empty());
    }

    #[test]
    fn exact_window_multiple_has_no_stub() {
        let start = d(2024, 1, 1);
        let end = start + Duration::days(61); // 62 days
        let ws = windows(start, end);
        assert_eq!(ws.len(), 2);
        assert!(ws.iter().all(|w| w.days() == 31));
    }

    #[test]
    fn month_window_covers_whole_month() {
        let w = month_window(d(2024, 2, 15));
        assert_eq!(w.start, d(2024, 2, 1));
        assert_eq!(w.end, d(2024, 2, 29)); // leap year
    }

    #[test]
    fn recent_months_are_previous_then_current() {
        let ws = recent_month_windows(d(2025, 4, 10));
        assert_eq!(ws.len(), 2);
        assert_eq!(ws[0], month_window(d(2025, 3, 1)));
        assert_eq!(ws[1], month_window(d(2025, 4, 1)));
    }

    #[test]
    fn recent_months_collapse_late_in_long_months() {
        // 28 days before Mar 31 is Mar 3: both probes hit March.
        let ws = recent_month_windows(d(2025, 3, 31));
        assert_eq!(ws.len(), 1);
        assert_eq!(ws[0], month_window(d(2025, 3, 1)));
    }

    #[test]
    fn year_boundary_previous_month_is_december() {
        let ws = recent_month_windows(d(2025, 1, 10));
        assert_eq!(ws[0].start, d(2024, 12, 1));
        assert_eq!(ws[0].end, d(2024, 12, 31));
    }
}
