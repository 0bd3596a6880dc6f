use crate::error::{AppError, Result};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// An inclusive span of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(AppError::InvalidRange(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Range used when the caller does not supply one.
    ///
    /// Starts on January 1 of the year after the earliest observed day, so the
    /// partial first year of a record is left out, and ends on December 31 of
    /// `reference_date`'s year.
    pub fn default_for(earliest: NaiveDate, reference_date: NaiveDate) -> Result<Self> {
        Self::new(default_start(earliest)?, default_end(reference_date)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn num_days(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn days(&self) -> RangeDays {
        RangeDays {
            next: Some(self.start),
            end: self.end,
        }
    }
}

/// Iterator over every day of a [`DateRange`].
#[derive(Debug, Clone)]
pub struct RangeDays {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for RangeDays {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.filter(|d| *d <= self.end)?;
        self.next = current.succ_opt();
        Some(current)
    }
}

/// January 1 of the year after `earliest`.
pub fn default_start(earliest: NaiveDate) -> Result<NaiveDate> {
    first_of_year(earliest.year() + 1)
}

/// December 31 of `reference_date`'s year.
pub fn default_end(reference_date: NaiveDate) -> Result<NaiveDate> {
    last_of_year(reference_date.year())
}

fn first_of_year(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .ok_or_else(|| AppError::InvalidRange(format!("year {} is out of range", year)))
}

fn last_of_year(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| AppError::InvalidRange(format!("year {} is out of range", year)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_iteration() {
        let range = DateRange::new(ymd(2022, 1, 1), ymd(2022, 1, 5)).unwrap();
        let dates: Vec<NaiveDate> = range.days().collect();
        assert_eq!(dates.len(), 5);
        assert_eq!(dates[0], ymd(2022, 1, 1));
        assert_eq!(dates[4], ymd(2022, 1, 5));
        assert_eq!(range.num_days(), 5);
    }

    #[test]
    fn test_single_day() {
        let range = DateRange::new(ymd(2022, 3, 15), ymd(2022, 3, 15)).unwrap();
        assert_eq!(range.days().count(), 1);
        assert_eq!(range.num_days(), 1);
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        let result = DateRange::new(ymd(2022, 3, 15), ymd(2022, 3, 14));
        assert!(matches!(result, Err(AppError::InvalidRange(_))));
    }

    #[test]
    fn test_leap_year_length() {
        let range = DateRange::new(ymd(2024, 1, 1), ymd(2024, 12, 31)).unwrap();
        assert_eq!(range.num_days(), 366);
        assert_eq!(range.days().count(), 366);
    }

    #[test]
    fn test_default_skips_first_partial_year() {
        let range = DateRange::default_for(ymd(1953, 7, 14), ymd(2025, 3, 2)).unwrap();
        assert_eq!(range.start(), ymd(1954, 1, 1));
        assert_eq!(range.end(), ymd(2025, 12, 31));
    }

    #[test]
    fn test_default_fails_when_record_starts_in_reference_year() {
        let result = DateRange::default_for(ymd(2025, 2, 1), ymd(2025, 6, 1));
        assert!(matches!(result, Err(AppError::InvalidRange(_))));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let range = DateRange::new(ymd(2020, 1, 1), ymd(2020, 1, 31)).unwrap();
        assert!(range.contains(ymd(2020, 1, 1)));
        assert!(range.contains(ymd(2020, 1, 31)));
        assert!(!range.contains(ymd(2020, 2, 1)));
    }
}
