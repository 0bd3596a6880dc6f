//! Roll-ups and rankings over a [`DailyGrid`](crate::grid::DailyGrid).
//!
//! - `monthly`: one record per calendar month, plus the year-by-month matrix.
//! - `streaks`: run-length encoding of the daily regime sequence.
//! - `extremes`: highest-flow days and wettest/driest eligible years.

pub mod extremes;
pub mod monthly;
pub mod streaks;

pub use extremes::{FlowDay, YearStat};
pub use monthly::{MonthCell, MonthlyRecord, YearMonths};
pub use streaks::Streak;
