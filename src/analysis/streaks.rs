use crate::grid::{DailyGrid, Regime};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;

/// A maximal run of consecutive days sharing one regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Streak {
    pub regime: Regime,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub length: usize,
}

impl Streak {
    /// Longer runs first; equal lengths go to the earlier start.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .length
            .cmp(&self.length)
            .then_with(|| self.start.cmp(&other.start))
    }
}

/// Run-length encode the grid's regime sequence, Missing runs included.
///
/// Runs come back in date order and cover every day exactly once.
pub fn runs(grid: &DailyGrid) -> Vec<Streak> {
    let mut runs: Vec<Streak> = Vec::new();

    for day in grid.days() {
        let regime = day.regime();
        if let Some(open) = runs.last_mut() {
            if open.regime == regime {
                open.end = day.date;
                open.length += 1;
                continue;
            }
        }
        runs.push(Streak {
            regime,
            start: day.date,
            end: day.date,
            length: 1,
        });
    }

    runs
}

/// Every dry run in date order.
pub fn dry_streaks(grid: &DailyGrid) -> Vec<Streak> {
    of_regime(grid, Regime::Dry)
}

/// Every wet run in date order.
pub fn wet_streaks(grid: &DailyGrid) -> Vec<Streak> {
    of_regime(grid, Regime::Wet)
}

fn of_regime(grid: &DailyGrid, regime: Regime) -> Vec<Streak> {
    runs(grid).into_iter().filter(|s| s.regime == regime).collect()
}

/// The `n` best streaks by [`Streak::rank_cmp`]. May return fewer than `n`.
pub fn top_n(streaks: &[Streak], n: usize) -> Vec<Streak> {
    let mut ranked = streaks.to_vec();
    ranked.sort_by(Streak::rank_cmp);
    ranked.truncate(n);
    ranked
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

    fn grid_from(values: &[Option<f64>]) -> DailyGrid {
        let start = ymd(2022, 6, 1);
        let observations: Vec<Observation> = values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| {
                v.map(|value| Observation {
                    site_code: "09485000".to_string(),
                    variable_code: "00060".to_string(),
                    statistic_code: None,
                    timestamp: (start + chrono::Days::new(i as u64)).and_time(NaiveTime::MIN),
                    value: Some(value),
                    qualifiers: String::new(),
                })
            })
            .collect();
        let end = start + chrono::Days::new(values.len() as u64 - 1);
        DailyGrid::build(&observations, DateRange::new(start, end).unwrap()).unwrap()
    }

    #[test]
    fn test_ten_day_window() {
        let grid = grid_from(&[
            Some(0.0),
            Some(0.0),
            None,
            Some(3.2),
            Some(0.0),
            Some(0.0),
            Some(0.0),
            Some(0.0),
            Some(0.0),
            Some(0.0),
        ]);

        let regimes: Vec<Regime> = grid.regimes().collect();
        assert_eq!(
            regimes,
            vec![
                Regime::Dry,
                Regime::Dry,
                Regime::Missing,
                Regime::Wet,
                Regime::Dry,
                Regime::Dry,
                Regime::Dry,
                Regime::Dry,
                Regime::Dry,
                Regime::Dry,
            ]
        );

        let dry = top_n(&dry_streaks(&grid), 10);
        assert_eq!(dry.len(), 2);
        assert_eq!(
            (dry[0].start, dry[0].end, dry[0].length),
            (ymd(2022, 6, 5), ymd(2022, 6, 10), 6)
        );
        assert_eq!(
            (dry[1].start, dry[1].end, dry[1].length),
            (ymd(2022, 6, 1), ymd(2022, 6, 2), 2)
        );

        let wet = top_n(&wet_streaks(&grid), 10);
        assert_eq!(wet.len(), 1);
        assert_eq!((wet[0].start, wet[0].length), (ymd(2022, 6, 4), 1));

        assert_eq!(top_n(&dry_streaks(&grid), 1)[0].start, ymd(2022, 6, 5));
    }

    #[test]
    fn test_missing_day_splits_runs() {
        let grid = grid_from(&[Some(1.0), None, Some(1.0)]);
        let wet = wet_streaks(&grid);
        assert_eq!(wet.len(), 2);
        assert!(wet.iter().all(|s| s.length == 1));
    }

    #[test]
    fn test_runs_cover_every_day() {
        let grid = grid_from(&[None, None, Some(0.0), Some(2.0), Some(2.0), None, Some(0.0)]);
        let all = runs(&grid);
        assert_eq!(all.iter().map(|s| s.length).sum::<usize>(), grid.len());

        let missing_days = grid.regimes().filter(|r| *r == Regime::Missing).count();
        let dry: usize = dry_streaks(&grid).iter().map(|s| s.length).sum();
        let wet: usize = wet_streaks(&grid).iter().map(|s| s.length).sum();
        assert_eq!(dry + wet + missing_days, grid.len());
    }

    #[test]
    fn test_equal_lengths_prefer_earliest_start() {
        let grid = grid_from(&[Some(0.0), Some(0.0), Some(1.0), Some(0.0), Some(0.0)]);
        let top = top_n(&dry_streaks(&grid), 1);
        assert_eq!(top[0].start, ymd(2022, 6, 1));
    }

    #[test]
    fn test_top_n_may_be_short() {
        let grid = grid_from(&[None, None]);
        assert!(top_n(&dry_streaks(&grid), 10).is_empty());
        assert!(top_n(&wet_streaks(&grid), 10).is_empty());
    }
}
