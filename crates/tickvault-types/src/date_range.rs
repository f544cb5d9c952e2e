//! Date range and day iteration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{DateRangeError, MS_PER_DAY, day_start_ms};

/// An inclusive range of UTC calendar days.
///
/// Days are the unit of storage, download and presence tracking, so every
/// range is expressed in whole partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// Start date (inclusive).
    pub start: NaiveDate,
    /// End date (inclusive).
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a new date range, validating that start <= end.
    ///
    /// # Errors
    ///
    /// Returns an error if start > end.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if start > end {
            return Err(DateRangeError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Creates a date range for a single day.
    #[must_use]
    pub const fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Creates the smallest range of days covering `[start_ms, end_ms]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `start_ms > end_ms`.
    pub fn covering_ms(start_ms: u64, end_ms: u64) -> Result<Self, DateRangeError> {
        Self::new(crate::date_of_ms(start_ms), crate::date_of_ms(end_ms))
    }

    /// Returns an iterator over all days in the range.
    #[must_use]
    pub fn days(&self) -> DayIterator {
        DayIterator {
            current: Some(self.start),
            end: self.end,
        }
    }

    /// Returns the total number of days in the range.
    #[must_use]
    pub fn total_days(&self) -> usize {
        usize::try_from((self.end - self.start).num_days() + 1).unwrap_or(0)
    }

    /// Returns true if the range contains the given date.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Returns true if the two ranges share at least one day.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Unix milliseconds of the first instant of the range.
    #[must_use]
    pub fn start_ms(&self) -> u64 {
        day_start_ms(self.start)
    }

    /// Unix milliseconds one past the last instant of the range.
    #[must_use]
    pub fn end_ms_exclusive(&self) -> u64 {
        day_start_ms(self.end) + MS_PER_DAY
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Iterator over all days in a date range.
#[derive(Debug, Clone)]
pub struct DayIterator {
    current: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DayIterator {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        let day = self.current.filter(|day| *day <= self.end)?;
        self.current = day.succ_opt();
        Some(day)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .current
            .filter(|day| *day <= self.end)
            .map_or(0, |day| {
                usize::try_from((self.end - day).num_days() + 1).unwrap_or(0)
            });
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DayIterator {}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range_new() {
        let range = DateRange::new(day(2024, 1, 1), day(2024, 1, 31)).unwrap();

        assert_eq!(range.start, day(2024, 1, 1));
        assert_eq!(range.end, day(2024, 1, 31));
        assert_eq!(range.total_days(), 31);
    }

    #[test]
    fn test_date_range_invalid() {
        assert!(DateRange::new(day(2024, 1, 31), day(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_day_iterator() {
        let range = DateRange::new(day(2024, 2, 27), day(2024, 3, 1)).unwrap();
        let days: Vec<_> = range.days().collect();

        assert_eq!(range.days().len(), 4);
        assert_eq!(
            days,
            vec![day(2024, 2, 27), day(2024, 2, 28), day(2024, 2, 29), day(2024, 3, 1)]
        );
    }

    #[test]
    fn test_overlaps() {
        let a = DateRange::new(day(2024, 1, 1), day(2024, 1, 10)).unwrap();
        let b = DateRange::new(day(2024, 1, 10), day(2024, 1, 20)).unwrap();
        let c = DateRange::new(day(2024, 1, 11), day(2024, 1, 20)).unwrap();

        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_ms_bounds() {
        let range = DateRange::single_day(day(1970, 1, 2));
        assert_eq!(range.start_ms(), MS_PER_DAY);
        assert_eq!(range.end_ms_exclusive(), 2 * MS_PER_DAY);
    }

    #[test]
    fn test_covering_ms() {
        let range = DateRange::covering_ms(MS_PER_DAY - 1, MS_PER_DAY + 5).unwrap();
        assert_eq!(range.start, day(1970, 1, 1));
        assert_eq!(range.end, day(1970, 1, 2));
    }
}
