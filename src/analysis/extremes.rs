use crate::grid::DailyGrid;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// A data-bearing day and its mean flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlowDay {
    pub date: NaiveDate,
    pub mean_flow: f64,
}

/// Annual summary over a year's data-bearing days.
///
/// A year is `eligible` for wettest/driest ranking only when each of its
/// twelve months holds at least one data-bearing day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearStat {
    pub year: i32,
    pub mean_flow: Option<f64>,
    pub days_with_data: u32,
    pub months_with_data: u32,
    pub eligible: bool,
}

/// The `n` highest single-day mean flows, earliest date first on ties.
pub fn top_flow_days(grid: &DailyGrid, n: usize) -> Vec<FlowDay> {
    let mut days: Vec<FlowDay> = grid
        .days()
        .iter()
        .filter_map(|d| {
            d.mean_flow.map(|mean_flow| FlowDay {
                date: d.date,
                mean_flow,
            })
        })
        .collect();
    days.sort_by(|a, b| {
        b.mean_flow
            .total_cmp(&a.mean_flow)
            .then_with(|| a.date.cmp(&b.date))
    });
    days.truncate(n);
    days
}

#[derive(Debug, Default)]
struct YearAccumulator {
    sum: f64,
    days: u32,
    months: [bool; 12],
}

/// One entry per calendar year the grid touches, in year order.
pub fn year_stats(grid: &DailyGrid) -> Vec<YearStat> {
    let mut years: BTreeMap<i32, YearAccumulator> = BTreeMap::new();

    for day in grid.days() {
        let year = years.entry(day.date.year()).or_default();
        if let Some(flow) = day.mean_flow {
            year.sum += flow;
            year.days += 1;
            year.months[day.date.month0() as usize] = true;
        }
    }

    years
        .into_iter()
        .map(|(year, acc)| {
            let months_with_data = acc.months.iter().filter(|m| **m).count() as u32;
            YearStat {
                year,
                mean_flow: (acc.days > 0).then(|| acc.sum / f64::from(acc.days)),
                days_with_data: acc.days,
                months_with_data,
                eligible: months_with_data == 12,
            }
        })
        .collect()
}

/// Eligible years with the highest annual mean flow.
pub fn wettest_years(stats: &[YearStat], n: usize) -> Vec<YearStat> {
    rank_eligible(stats, n, |a, b| b.total_cmp(&a))
}

/// Eligible years with the lowest annual mean flow.
pub fn driest_years(stats: &[YearStat], n: usize) -> Vec<YearStat> {
    rank_eligible(stats, n, |a, b| a.total_cmp(&b))
}

fn rank_eligible<F>(stats: &[YearStat], n: usize, by_flow: F) -> Vec<YearStat>
where
    F: Fn(f64, f64) -> std::cmp::Ordering,
{
    let mut eligible: Vec<(f64, YearStat)> = stats
        .iter()
        .filter(|s| s.eligible)
        .filter_map(|s| s.mean_flow.map(|flow| (flow, *s)))
        .collect();
    eligible.sort_by(|(fa, a), (fb, b)| by_flow(*fa, *fb).then_with(|| a.year.cmp(&b.year)));
    eligible.into_iter().take(n).map(|(_, s)| s).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_range::DateRange;
    use crate::normalizer::Observation;
    use chrono::NaiveTime;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(date: NaiveDate, value: f64) -> Observation {
        Observation {
            site_code: "09484600".to_string(),
            variable_code: "00060".to_string(),
            statistic_code: None,
            timestamp: date.and_time(NaiveTime::MIN),
            value: Some(value),
            qualifiers: String::new(),
        }
    }

    /// One observation on the 15th of every month of `year`.
    fn full_year(year: i32, value: f64) -> Vec<Observation> {
        (1..=12).map(|m| obs(ymd(year, m, 15), value)).collect()
    }

    #[test]
    fn test_top_flow_days_ties_go_to_earliest() {
        let range = DateRange::new(ymd(2020, 1, 1), ymd(2020, 1, 10)).unwrap();
        let observations = vec![
            obs(ymd(2020, 1, 8), 9.0),
            obs(ymd(2020, 1, 2), 9.0),
            obs(ymd(2020, 1, 5), 12.0),
            obs(ymd(2020, 1, 6), 0.0),
        ];
        let grid = DailyGrid::build(&observations, range).unwrap();

        let top = top_flow_days(&grid, 3);
        let dates: Vec<NaiveDate> = top.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![ymd(2020, 1, 5), ymd(2020, 1, 2), ymd(2020, 1, 8)]);

        assert_eq!(top_flow_days(&grid, 10).len(), 4);
    }

    #[test]
    fn test_year_eligibility() {
        let range = DateRange::new(ymd(2019, 1, 1), ymd(2021, 12, 31)).unwrap();
        let mut observations = full_year(2019, 2.0);
        observations.extend(full_year(2020, 5.0).into_iter().filter(|o| o.date().month() != 7));
        observations.extend(full_year(2021, 1.0));
        let grid = DailyGrid::build(&observations, range).unwrap();

        let stats = year_stats(&grid);
        assert_eq!(stats.len(), 3);
        assert!(stats[0].eligible);
        assert!(!stats[1].eligible);
        assert_eq!(stats[1].months_with_data, 11);
        assert_eq!(stats[1].mean_flow, Some(5.0));
        assert!(stats[2].eligible);

        let wettest = wettest_years(&stats, 10);
        assert_eq!(wettest.iter().map(|s| s.year).collect::<Vec<_>>(), vec![2019, 2021]);
        let driest = driest_years(&stats, 1);
        assert_eq!(driest[0].year, 2021);
    }

    #[test]
    fn test_year_without_data_has_no_mean() {
        let range = DateRange::new(ymd(2020, 1, 1), ymd(2020, 12, 31)).unwrap();
        let grid = DailyGrid::build(&[], range).unwrap();
        let stats = year_stats(&grid);
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].mean_flow, None);
        assert!(!stats[0].eligible);
        assert!(wettest_years(&stats, 10).is_empty());
    }

    #[test]
    fn test_equal_years_rank_earliest_first() {
        let range = DateRange::new(ymd(2018, 1, 1), ymd(2019, 12, 31)).unwrap();
        let mut observations = full_year(2019, 3.0);
        observations.extend(full_year(2018, 3.0));
        let grid = DailyGrid::build(&observations, range).unwrap();
        let stats = year_stats(&grid);

        assert_eq!(wettest_years(&stats, 2)[0].year, 2018);
        assert_eq!(driest_years(&stats, 2)[0].year, 2018);
    }
}
