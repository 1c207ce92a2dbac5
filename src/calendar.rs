//! Calendar bucket generation
//!
//! Derives gap-free day, ISO-week and month sequences from the observed span
//! of the data. Every sequence is produced by a loop bounded by a bucket count
//! computed up front, so a degenerate span (`start == end`) yields exactly one
//! bucket and a pathological span cannot iterate forever.

use crate::types::{DayBucket, WeekBucket};
use chrono::{Datelike, Days, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// An inclusive date range `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    /// Build a span, swapping the bounds if they arrive reversed.
    pub fn new(a: NaiveDate, b: NaiveDate) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// A single-day span.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Resolve each bound from an ordered preference list.
    ///
    /// The first `Some` in `mins` becomes the start and the first `Some` in
    /// `maxs` becomes the end. When a list has no value the bound falls back
    /// to `fallback`, so a span always exists.
    pub fn first_available(
        mins: &[Option<NaiveDate>],
        maxs: &[Option<NaiveDate>],
        fallback: NaiveDate,
    ) -> Self {
        let start = mins.iter().find_map(|d| *d).unwrap_or(fallback);
        let end = maxs.iter().find_map(|d| *d).unwrap_or(fallback);
        Self::new(start, end)
    }

    /// Restrict the span to `[window_start, window_end]`.
    ///
    /// If nothing of the span survives, the result is the single day
    /// `window_end`.
    pub fn clamp_to(&self, window_start: NaiveDate, window_end: NaiveDate) -> Self {
        let start = self.start.max(window_start);
        let end = self.end.min(window_end);
        if start > end {
            Self::single(window_end)
        } else {
            Self { start, end }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days in the span.
    pub fn day_count(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

/// Generator for calendar bucket sequences
pub struct CalendarGenerator;

impl CalendarGenerator {
    /// Weeks from the Monday on/before `span.start` through the Monday
    /// on/before `span.end`, inclusive.
    pub fn weeks(span: &DateSpan) -> Vec<WeekBucket> {
        let first_monday = week_start_of(span.start);
        let last_monday = week_start_of(span.end);
        let count = (last_monday - first_monday).num_days() / 7 + 1;

        (0..count)
            .map(|offset| week_bucket(first_monday + Duration::weeks(offset)))
            .collect()
    }

    /// Every calendar day in the span.
    pub fn days(span: &DateSpan) -> Vec<DayBucket> {
        (0..span.day_count())
            .map(|offset| DayBucket {
                calendar_date: span.start + Duration::days(offset),
            })
            .collect()
    }

    /// Monday through Friday only.
    pub fn weekdays(span: &DateSpan) -> Vec<DayBucket> {
        Self::days(span)
            .into_iter()
            .filter(|day| is_weekday(day.calendar_date))
            .collect()
    }

    /// First-of-month dates from the month of `span.start` through the month
    /// of `span.end`.
    pub fn months(span: &DateSpan) -> Vec<NaiveDate> {
        let first = month_start_of(span.start);
        let count = month_index(span.end) - month_index(span.start) + 1;

        let mut months = Vec::with_capacity(count.max(0) as usize);
        let mut current = first;
        for _ in 0..count {
            months.push(current);
            current = next_month_start(current);
        }
        months
    }
}

/// Build the bucket for the ISO week starting on `monday`.
pub fn week_bucket(monday: NaiveDate) -> WeekBucket {
    let iso = monday.iso_week();
    WeekBucket {
        week_start: monday,
        week_end: monday.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX),
        iso_year: iso.year(),
        iso_week: iso.week(),
        label: format!("{:04}-W{:02}", iso.year(), iso.week()),
    }
}

/// Monday on or before `date`, saturating at the earliest representable day.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    let offset = Days::new(u64::from(date.weekday().num_days_from_monday()));
    date.checked_sub_days(offset).unwrap_or(NaiveDate::MIN)
}

pub fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// First day of the month containing `date`.
pub fn month_start_of(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`.
pub fn month_end_of(date: NaiveDate) -> NaiveDate {
    let start = month_start_of(date);
    match next_month_start(start) {
        next if next > start => next.pred_opt().unwrap_or(start),
        _ => NaiveDate::MAX,
    }
}

/// First day of the month after the one containing `date`.
pub fn next_month_start(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// First day of the month before the one containing `date`.
pub fn previous_month_start(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// `YYYY-MM`
pub fn month_label(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

fn month_index(date: NaiveDate) -> i64 {
    date.year() as i64 * 12 + date.month0() as i64
}
