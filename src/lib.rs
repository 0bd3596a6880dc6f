pub mod analysis;
pub mod config;
pub mod date_range;
pub mod error;
pub mod grid;
pub mod normalizer;
pub mod pipeline;
pub mod report;
