use crate::grid::{DailyGrid, DailyRecord};
use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

/// Statistics for one calendar month of the grid.
///
/// Every numeric field is only trustworthy when `days_with_data > 0`.
/// `max_mean_flow` is reported as 0.0 for a month without data so charts have
/// a baseline; use [`MonthlyRecord::peak_flow`] to tell the two apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRecord {
    pub month: NaiveDate,
    pub days_with_data: u32,
    pub days_with_flow: u32,
    pub max_mean_flow: f64,
    pub mean_flow: Option<f64>,
    pub q25: Option<f64>,
    pub q75: Option<f64>,
}

impl MonthlyRecord {
    pub fn has_data(&self) -> bool {
        self.days_with_data > 0
    }

    pub fn peak_flow(&self) -> Option<f64> {
        self.has_data().then_some(self.max_mean_flow)
    }

    pub fn year(&self) -> i32 {
        self.month.year()
    }

    /// Month number, 1 through 12.
    pub fn month_number(&self) -> u32 {
        self.month.month()
    }

    fn month0(&self) -> usize {
        self.month.month0() as usize
    }

    fn summarize(month: NaiveDate, days: &[DailyRecord]) -> Self {
        let mut values: Vec<f64> = days.iter().filter_map(|d| d.mean_flow).collect();
        values.sort_by(f64::total_cmp);

        let days_with_data = days.iter().filter(|d| d.has_data).count() as u32;
        let days_with_flow = days.iter().filter(|d| d.has_data && d.has_flow).count() as u32;
        let mean_flow = if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        };

        Self {
            month,
            days_with_data,
            days_with_flow,
            max_mean_flow: values.last().copied().unwrap_or(0.0),
            mean_flow,
            q25: quantile(&values, 0.25),
            q75: quantile(&values, 0.75),
        }
    }
}

/// Linear-interpolation quantile of an ascending slice.
///
/// Uses position `h = (n - 1) * p` and interpolates between the order
/// statistics on either side of it. Returns `None` for an empty slice.
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lower = h.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = h - lower as f64;
    Some(sorted[lower] + fraction * (sorted[upper] - sorted[lower]))
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

/// One record per calendar month the grid touches, empty months included.
pub fn aggregate_months(grid: &DailyGrid) -> Vec<MonthlyRecord> {
    let days = grid.days();
    let mut months = Vec::new();
    let mut start = 0;

    while start < days.len() {
        let key = month_start(days[start].date);
        let end = days[start..]
            .iter()
            .position(|d| month_start(d.date) != key)
            .map_or(days.len(), |offset| start + offset);
        months.push(MonthlyRecord::summarize(key, &days[start..end]));
        start = end;
    }

    months
}

/// Counts for one cell of the year-by-month matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthCell {
    pub days_with_data: u32,
    pub days_with_flow: u32,
    pub max_mean_flow: f64,
}

/// One row of the year-by-month matrix; a cell is `None` when the month has
/// no data or lies outside the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearMonths {
    pub year: i32,
    pub months: [Option<MonthCell>; 12],
}

pub fn year_month_matrix(months: &[MonthlyRecord]) -> Vec<YearMonths> {
    let mut rows: Vec<YearMonths> = Vec::new();
    for record in months {
        let year = record.year();
        if rows.last().map(|r| r.year) != Some(year) {
            rows.push(YearMonths {
                year,
                months: [None; 12],
            });
        }
        if !record.has_data() {
            continue;
        }
        if let Some(row) = rows.last_mut() {
            row.months[record.month0()] = Some(MonthCell {
                days_with_data: record.days_with_data,
                days_with_flow: record.days_with_flow,
                max_mean_flow: record.max_mean_flow,
            });
        }
    }
    rows
}
