use crate::config::OutputFormat;
use crate::error::Result;
use crate::pipeline::FlowReport;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

pub const REPORT_FILE: &str = "report.json";
pub const DAILY_FILE: &str = "daily.csv";
pub const MONTHLY_FILE: &str = "monthly.csv";

/// Writes a [`FlowReport`] into one output directory.
pub struct ReportWriter {
    directory: PathBuf,
}

impl ReportWriter {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /// Write every requested format and return the files produced.
    pub fn write(&self, report: &FlowReport, formats: &[OutputFormat]) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.directory)?;

        let mut written = Vec::new();
        for format in formats {
            match format {
                OutputFormat::Json => {
                    written.push(self.write_json(report)?);
                }
                OutputFormat::Csv => {
                    written.push(write_csv(&self.directory.join(DAILY_FILE), &report.daily)?);
                    written.push(write_csv(&self.directory.join(MONTHLY_FILE), &report.monthly)?);
                }
            }
        }

        info!(
            "Wrote {} report files to {}",
            written.len(),
            self.directory.display()
        );
        Ok(written)
    }

    fn write_json(&self, report: &FlowReport) -> Result<PathBuf> {
        let path = self.directory.join(REPORT_FILE);
        let file = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(file, report)?;
        Ok(path)
    }
}

/// Render a report as pretty JSON.
pub fn to_json_string(report: &FlowReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// One row per record; absent values become empty cells.
fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<PathBuf> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}
