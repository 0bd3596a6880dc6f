use crate::date_range::{self, DateRange};
use crate::error::{AppError, Result};
use crate::normalizer::Observation;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Three-way classification of a single day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Regime {
    Missing,
    Dry,
    Wet,
}

impl Regime {
    pub fn classify(has_data: bool, has_flow: bool) -> Self {
        match (has_data, has_flow) {
            (false, _) => Regime::Missing,
            (true, false) => Regime::Dry,
            (true, true) => Regime::Wet,
        }
    }
}

/// One calendar day of the grid.
///
/// `has_flow` and `mean_flow` only carry meaning when `has_data` is set; a day
/// without data always has `has_flow == false` and `mean_flow == None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub has_data: bool,
    pub has_flow: bool,
    pub mean_flow: Option<f64>,
}

impl DailyRecord {
    pub fn missing(date: NaiveDate) -> Self {
        Self {
            date,
            has_data: false,
            has_flow: false,
            mean_flow: None,
        }
    }

    /// Collapse every valid value observed on `date` into one record.
    pub fn from_values(date: NaiveDate, values: &[f64]) -> Self {
        let mut day = DayAccumulator::default();
        for v in values {
            day.add(*v);
        }
        day.into_record(date)
    }

    pub fn regime(&self) -> Regime {
        Regime::classify(self.has_data, self.has_flow)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct DayAccumulator {
    sum: f64,
    count: usize,
    any_positive: bool,
}

impl DayAccumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.any_positive |= value > 0.0;
    }

    fn into_record(self, date: NaiveDate) -> DailyRecord {
        if self.count == 0 {
            return DailyRecord::missing(date);
        }
        DailyRecord {
            date,
            has_data: true,
            has_flow: self.any_positive,
            mean_flow: Some(self.sum / self.count as f64),
        }
    }
}

/// Calendar-complete sequence of days, one record per day of its range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyGrid {
    range: DateRange,
    days: Vec<DailyRecord>,
}

impl DailyGrid {
    /// Left-join `observations` onto every day of `range`.
    ///
    /// Fails before aggregating anything if an observation falls anywhere but
    /// on midnight or if the observations span more than one series.
    /// Observations outside the range are ignored.
    pub fn build(observations: &[Observation], range: DateRange) -> Result<Self> {
        check_day_alignment(observations)?;
        check_single_series(observations)?;

        let mut per_day: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();
        let mut outside = 0usize;
        for obs in observations {
            let date = obs.date();
            if !range.contains(date) {
                outside += 1;
                continue;
            }
            let day = per_day.entry(date).or_default();
            if let Some(value) = obs.value {
                day.add(value);
            }
        }
        if outside > 0 {
            debug!("{} observations fall outside {} to {}", outside, range.start(), range.end());
        }

        let days: Vec<DailyRecord> = range
            .days()
            .map(|date| match per_day.get(&date) {
                Some(day) => day.into_record(date),
                None => DailyRecord::missing(date),
            })
            .collect();

        let with_data = days.iter().filter(|d| d.has_data).count();
        info!(
            "Built daily grid {} to {}: {} days, {} with data",
            range.start(),
            range.end(),
            days.len(),
            with_data
        );

        Ok(Self { range, days })
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn days(&self) -> &[DailyRecord] {
        &self.days
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn regimes(&self) -> impl Iterator<Item = Regime> + '_ {
        self.days.iter().map(DailyRecord::regime)
    }

    pub fn data_bearing(&self) -> impl Iterator<Item = &DailyRecord> + '_ {
        self.days.iter().filter(|d| d.has_data)
    }
}

/// Fill in whichever bound the caller left open.
///
/// The start defaults to January 1 after the earliest observation, the end to
/// December 31 of `reference_date`'s year.
pub fn resolve_range(
    observations: &[Observation],
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    reference_date: NaiveDate,
) -> Result<DateRange> {
    let start = match start {
        Some(start) => start,
        None => {
            let earliest = observations
                .iter()
                .map(Observation::date)
                .min()
                .ok_or_else(|| {
                    AppError::EmptyInput("no observations to derive a start date from".to_string())
                })?;
            date_range::default_start(earliest)?
        }
    };
    let end = match end {
        Some(end) => end,
        None => date_range::default_end(reference_date)?,
    };
    DateRange::new(start, end)
}

/// Reject any observation whose timestamp carries a time of day.
pub fn check_day_alignment(observations: &[Observation]) -> Result<()> {
    let misaligned: Vec<&Observation> = observations
        .iter()
        .filter(|o| !o.is_day_aligned())
        .collect();
    match misaligned.first() {
        None => Ok(()),
        Some(first) => Err(AppError::DataIntegrity(format!(
            "{} observations have a non-zero time of day (first: {} at site {})",
            misaligned.len(),
            first.timestamp,
            first.site_code
        ))),
    }
}

/// Reject observations drawn from more than one site, variable or statistic.
///
/// Same-day values are averaged, and that is only meaningful within a series.
pub fn check_single_series(observations: &[Observation]) -> Result<()> {
    let Some(first) = observations.first() else {
        return Ok(());
    };
    let other = observations.iter().find(|o| {
        o.site_code != first.site_code
            || o.variable_code != first.variable_code
            || o.statistic_code != first.statistic_code
    });
    match other {
        None => Ok(()),
        Some(other) => Err(AppError::DataIntegrity(format!(
            "observations mix series {} {} {:?} and {} {} {:?}; filter the input to one series",
            first.site_code,
            first.variable_code,
            first.statistic_code,
            other.site_code,
            other.variable_code,
            other.statistic_code
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(date: NaiveDate, value: Option<f64>) -> Observation {
        Observation {
            site_code: "09485000".to_string(),
            variable_code: "00060".to_string(),
            statistic_code: Some("00003".to_string()),
            timestamp: date.and_time(NaiveTime::MIN),
            value,
            qualifiers: "A".to_string(),
        }
    }

    #[test]
    fn test_regime_is_total() {
        assert_eq!(Regime::classify(false, false), Regime::Missing);
        assert_eq!(Regime::classify(false, true), Regime::Missing);
        assert_eq!(Regime::classify(true, false), Regime::Dry);
        assert_eq!(Regime::classify(true, true), Regime::Wet);
    }

    #[test]
    fn test_same_day_values_are_averaged() {
        let record = DailyRecord::from_values(ymd(2020, 5, 1), &[5.0, 7.0]);
        assert!(record.has_data);
        assert!(record.has_flow);
        assert_eq!(record.mean_flow, Some(6.0));
    }

    #[test]
    fn test_zero_values_are_dry() {
        let record = DailyRecord::from_values(ymd(2020, 5, 1), &[0.0, 0.0]);
        assert_eq!(record.regime(), Regime::Dry);
        assert_eq!(record.mean_flow, Some(0.0));
    }

    #[test]
    fn test_grid_fills_gaps() {
        let range = DateRange::new(ymd(2020, 1, 1), ymd(2020, 1, 10)).unwrap();
        let observations = vec![obs(ymd(2020, 1, 3), Some(1.5)), obs(ymd(2020, 1, 7), Some(0.0))];
        let grid = DailyGrid::build(&observations, range).unwrap();

        assert_eq!(grid.len(), 10);
        assert_eq!(grid.days()[2].mean_flow, Some(1.5));
        assert_eq!(grid.days()[6].regime(), Regime::Dry);
        assert_eq!(grid.data_bearing().count(), 2);
        for day in grid.days().iter().filter(|d| !d.has_data) {
            assert!(!day.has_flow);
            assert_eq!(day.mean_flow, None);
        }
    }

    #[test]
    fn test_invalid_values_do_not_make_data() {
        let range = DateRange::new(ymd(2020, 1, 1), ymd(2020, 1, 2)).unwrap();
        let observations = vec![obs(ymd(2020, 1, 1), None)];
        let grid = DailyGrid::build(&observations, range).unwrap();
        assert_eq!(grid.days()[0].regime(), Regime::Missing);
    }

    #[test]
    fn test_misaligned_timestamp_is_fatal() {
        let range = DateRange::new(ymd(2020, 1, 1), ymd(2020, 1, 2)).unwrap();
        let mut bad = obs(ymd(2020, 1, 1), Some(1.0));
        bad.timestamp = ymd(2020, 1, 1).and_hms_opt(6, 0, 0).unwrap();
        let result = DailyGrid::build(&[obs(ymd(2020, 1, 2), Some(1.0)), bad], range);
        assert!(matches!(result, Err(AppError::DataIntegrity(_))));
    }

    #[test]
    fn test_misaligned_timestamp_outside_range_is_still_fatal() {
        let range = DateRange::new(ymd(2020, 1, 1), ymd(2020, 1, 2)).unwrap();
        let mut bad = obs(ymd(2019, 6, 1), Some(1.0));
        bad.timestamp = ymd(2019, 6, 1).and_hms_opt(0, 15, 0).unwrap();
        assert!(DailyGrid::build(&[bad], range).is_err());
    }

    #[test]
    fn test_mixed_variables_are_rejected() {
        let range = DateRange::new(ymd(2020, 1, 1), ymd(2020, 1, 2)).unwrap();
        let mut stage = obs(ymd(2020, 1, 1), Some(2.0));
        stage.variable_code = "00065".to_string();
        let result = DailyGrid::build(&[obs(ymd(2020, 1, 1), Some(10.0)), stage], range);
        assert!(matches!(result, Err(AppError::DataIntegrity(_))));
    }

    #[test]
    fn test_mixed_sites_are_rejected() {
        let mut other = obs(ymd(2020, 1, 2), Some(1.0));
        other.site_code = "09484550".to_string();
        assert!(check_single_series(&[obs(ymd(2020, 1, 1), Some(1.0)), other]).is_err());
        assert!(check_single_series(&[]).is_ok());
    }

    #[test]
    fn test_default_range() {
        let observations = vec![obs(ymd(2018, 8, 20), Some(2.0)), obs(ymd(2019, 2, 1), Some(1.0))];
        let range = resolve_range(&observations, None, None, ymd(2020, 4, 1)).unwrap();
        let grid = DailyGrid::build(&observations, range).unwrap();
        assert_eq!(grid.range().start(), ymd(2019, 1, 1));
        assert_eq!(grid.range().end(), ymd(2020, 12, 31));
        assert_eq!(grid.len(), 365 + 366);
    }

    #[test]
    fn test_default_range_needs_observations() {
        let result = resolve_range(&[], None, None, ymd(2020, 4, 1));
        assert!(matches!(result, Err(AppError::EmptyInput(_))));
    }

    #[test]
    fn test_configured_start_needs_no_observations() {
        let range = resolve_range(&[], Some(ymd(2020, 3, 1)), None, ymd(2020, 4, 1)).unwrap();
        assert_eq!(range.start(), ymd(2020, 3, 1));
        assert_eq!(range.end(), ymd(2020, 12, 31));
    }
}
