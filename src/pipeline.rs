use crate::analysis::extremes::{self, FlowDay, YearStat};
use crate::analysis::monthly::{self, MonthlyRecord, YearMonths};
use crate::analysis::streaks::{self, Streak};
use crate::date_range::DateRange;
use crate::error::Result;
use crate::grid::{self, DailyGrid, DailyRecord};
use crate::normalizer::{
    DailyValuesDocument, NormalizeStats, Normalizer, Observation, SeriesFilter,
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

/// Number of entries kept in each ranked list unless configured otherwise.
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Inclusive start; defaults to January 1 after the earliest observation.
    pub start: Option<NaiveDate>,
    /// Inclusive end; defaults to December 31 of `reference_date`'s year.
    pub end: Option<NaiveDate>,
    pub reference_date: NaiveDate,
    pub top_n: usize,
}

impl PipelineOptions {
    pub fn new(reference_date: NaiveDate) -> Self {
        Self {
            start: None,
            end: None,
            reference_date,
            top_n: DEFAULT_TOP_N,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rankings {
    pub dry_streaks: Vec<Streak>,
    pub wet_streaks: Vec<Streak>,
    pub top_flow_days: Vec<FlowDay>,
    pub wettest_years: Vec<YearStat>,
    pub driest_years: Vec<YearStat>,
}

/// Everything derived from one run over one observation sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowReport {
    pub range: DateRange,
    pub daily: Vec<DailyRecord>,
    pub monthly: Vec<MonthlyRecord>,
    pub year_months: Vec<YearMonths>,
    pub years: Vec<YearStat>,
    pub rankings: Rankings,
}

pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    /// Normalize `document` and run the analysis over the result.
    pub fn run_document(
        &self,
        document: &DailyValuesDocument,
        filter: &SeriesFilter,
    ) -> Result<(FlowReport, NormalizeStats)> {
        let (observations, stats) = Normalizer::normalize(document, filter)?;
        let report = self.run(&observations)?;
        Ok((report, stats))
    }

    /// Build the grid and every derived table. Nothing is produced if any
    /// observation fails the grid's integrity checks.
    pub fn run(&self, observations: &[Observation]) -> Result<FlowReport> {
        let range = grid::resolve_range(
            observations,
            self.options.start,
            self.options.end,
            self.options.reference_date,
        )?;
        let grid = DailyGrid::build(observations, range)?;

        let monthly = monthly::aggregate_months(&grid);
        let year_months = monthly::year_month_matrix(&monthly);
        let years = extremes::year_stats(&grid);

        let n = self.options.top_n;
        let rankings = Rankings {
            dry_streaks: streaks::top_n(&streaks::dry_streaks(&grid), n),
            wet_streaks: streaks::top_n(&streaks::wet_streaks(&grid), n),
            top_flow_days: extremes::top_flow_days(&grid, n),
            wettest_years: extremes::wettest_years(&years, n),
            driest_years: extremes::driest_years(&years, n),
        };

        info!(
            "Derived {} months, {} years ({} eligible), {} dry and {} wet streaks ranked",
            monthly.len(),
            years.len(),
            years.iter().filter(|y| y.eligible).count(),
            rankings.dry_streaks.len(),
            rankings.wet_streaks.len()
        );

        Ok(FlowReport {
            range,
            daily: grid.days().to_vec(),
            monthly,
            year_months,
            years,
            rankings,
        })
    }
}
