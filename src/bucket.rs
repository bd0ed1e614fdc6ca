//! Date-range bucketing for historical cache keys.
//!
//! A [`Granularity`] tiles the calendar into contiguous, non-overlapping `[start, end)` ranges. Every date falls into
//! exactly one of them, and the computation is a pure function of the date and the granularity, so repeated calls
//! for dates within one window produce the very same key.

use chrono::Datelike;
use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::num::NonZeroU32;

use crate::types::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// Calendar months, aligned on multiples of `n` months counted from year 0.
    Months(NonZeroU32),
    /// Fixed windows of `n` days, aligned on multiples of `n` counted from 0001-01-01.
    Days(NonZeroU32),
}

impl Granularity {
    pub const MONTH: Self = Self::Months(NonZeroU32::MIN);

    pub fn months(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self::Months)
    }

    pub fn days(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self::Days)
    }

    /// The bucket containing `date`.
    pub fn bucket(&self, date: Date) -> DateRange {
        match *self {
            Self::Months(n) => month_bucket(date, n.get()),
            Self::Days(n) => day_bucket(date, n.get()),
        }
    }
}

impl Default for Granularity {
    fn default() -> Self {
        Self::MONTH
    }
}

impl Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Months(n) => write!(f, "{n}M"),
            Self::Days(n) => write!(f, "{n}D"),
        }
    }
}

/// Shorthand for [`Granularity::bucket`].
#[inline]
pub fn bucket(date: Date, granularity: Granularity) -> DateRange {
    granularity.bucket(date)
}

fn month_bucket(date: Date, n: u32) -> DateRange {
    let n = i64::from(n);
    let index = i64::from(date.year()) * 12 + i64::from(date.month0());
    let first = index.div_euclid(n) * n;

    DateRange::new(
        month_start(first).unwrap_or(NaiveDate::MIN),
        month_start(first + n).unwrap_or(NaiveDate::MAX),
    )
}

// First day of the month with the given index, counted as `year * 12 + month0`.
fn month_start(index: i64) -> Option<Date> {
    let year = i32::try_from(index.div_euclid(12)).ok()?;
    NaiveDate::from_ymd_opt(year, index.rem_euclid(12) as u32 + 1, 1)
}

fn day_bucket(date: Date, n: u32) -> DateRange {
    let n = i64::from(n);
    let mut first = i64::from(date.num_days_from_ce()).div_euclid(n) * n;
    // A window starting on the last representable day can't have an end; that day goes to the window before it.
    if day_start(first) == Some(NaiveDate::MAX) {
        first -= n;
    }

    DateRange::new(
        day_start(first).unwrap_or(NaiveDate::MIN),
        day_start(first + n).unwrap_or(NaiveDate::MAX),
    )
}

fn day_start(days_from_ce: i64) -> Option<Date> {
    i32::try_from(days_from_ce)
        .ok()
        .and_then(NaiveDate::from_num_days_from_ce_opt)
}

/// Half-open date range. A range ending at `NaiveDate::MAX` also contains `NaiveDate::MAX` since there is nothing
/// after it to end on. No bucket starts on `NaiveDate::MAX`, so exactly one bucket holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DateRange {
    start: Date,
    end:   Date,
}

impl DateRange {
    pub fn new(start: Date, end: Date) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn start(&self) -> Date {
        self.start
    }

    #[inline]
    pub fn end(&self) -> Date {
        self.end
    }

    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && (date < self.end || self.end == NaiveDate::MAX)
    }

    /// Whether the inclusive window `[from, to]` shares at least one day with this range.
    pub fn overlaps(&self, from: Date, to: Date) -> bool {
        if from > to {
            return false;
        }
        let before_end = from < self.end || (self.end == NaiveDate::MAX && from == NaiveDate::MAX);
        before_end && to >= self.start
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;

    fn d(y: i32, m: u32, day: u32) -> Date {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn month_buckets_are_calendar_months() {
        let b = bucket(d(2024, 1, 15), Granularity::MONTH);
        assert_eq!(b.start(), d(2024, 1, 1));
        assert_eq!(b.end(), d(2024, 2, 1));
        assert_eq!(b, bucket(d(2024, 1, 20), Granularity::MONTH));
        assert_eq!(b, bucket(d(2024, 1, 31), Granularity::MONTH));
        assert_ne!(b, bucket(d(2024, 2, 1), Granularity::MONTH));
    }

    #[test]
    fn quarter_buckets_align_on_january() {
        let quarter = Granularity::months(3).unwrap();
        let b = bucket(d(2023, 5, 9), quarter);
        assert_eq!(b.start(), d(2023, 4, 1));
        assert_eq!(b.end(), d(2023, 7, 1));
        assert_eq!(bucket(d(2023, 12, 31), quarter).end(), d(2024, 1, 1));
    }

    #[test]
    fn day_buckets_are_contiguous() {
        let week = Granularity::days(7).unwrap();
        let b = bucket(d(2024, 3, 10), week);
        assert_eq!((b.end() - b.start()).num_days(), 7);
        assert!(b.contains(d(2024, 3, 10)));
        assert_eq!(bucket(b.end(), week).start(), b.end());
        assert_eq!(bucket(b.end() - Days::new(1), week), b);
    }

    #[test]
    fn zero_granularity_is_rejected() {
        assert!(Granularity::days(0).is_none());
        assert!(Granularity::months(0).is_none());
    }

    #[test]
    fn last_representable_date_has_a_bucket() {
        let b = bucket(NaiveDate::MAX, Granularity::MONTH);
        assert!(b.contains(NaiveDate::MAX));
        assert_eq!(b.end(), NaiveDate::MAX);
    }

    #[test]
    fn last_representable_date_is_in_one_day_bucket() {
        let max = NaiveDate::MAX;
        for n in [1, 2, 7, 30] {
            let days = Granularity::days(n).unwrap();
            let last = bucket(max, days);
            assert!(last.contains(max), "{days}");
            assert!(last.start() < max, "{days}");
            assert_eq!(last.end(), max, "{days}");

            let before = bucket(last.start() - Days::new(1), days);
            assert!(!before.contains(max), "{days}");
            assert_eq!(before.end(), last.start(), "{days}");
        }

        let single = Granularity::days(1).unwrap();
        let eve = max - Days::new(1);
        assert_eq!(bucket(eve, single), bucket(max, single));
        assert!(!bucket(eve - Days::new(1), single).contains(max));
    }

    #[test]
    fn overlap_is_inclusive_of_window_ends() {
        let b = bucket(d(2024, 1, 15), Granularity::MONTH);
        assert!(b.overlaps(d(2023, 6, 1), d(2024, 1, 1)));
        assert!(b.overlaps(d(2024, 1, 31), d(2030, 1, 1)));
        assert!(!b.overlaps(d(2024, 2, 1), d(2030, 1, 1)));
        assert!(!b.overlaps(d(2023, 1, 1), d(2023, 12, 31)));
        assert!(!b.overlaps(d(2024, 1, 20), d(2024, 1, 10)));
    }

    #[test]
    fn granularity_deserializes_from_settings() {
        let g: Granularity = serde_json::from_str(r#"{"days": 14}"#).unwrap();
        assert_eq!(g, Granularity::days(14).unwrap());
        let g: Granularity = serde_json::from_str(r#"{"months": 1}"#).unwrap();
        assert_eq!(g, Granularity::MONTH);
    }
}
