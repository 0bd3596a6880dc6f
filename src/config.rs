use crate::error::{AppError, Result};
use crate::normalizer::{SeriesFilter, DEFAULT_NO_DATA_VALUE};
use crate::pipeline::{PipelineOptions, DEFAULT_TOP_N};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub input: InputConfig,
    #[serde(default)]
    pub range: RangeConfig,
    #[serde(default)]
    pub rankings: RankingConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Daily-values JSON document to analyse.
    pub path: PathBuf,
    pub site: Option<String>,
    pub variable_code: Option<String>,
    pub statistic_code: Option<String>,
    #[serde(default = "default_no_data_value")]
    pub no_data_value: f64,
}

fn default_no_data_value() -> f64 {
    DEFAULT_NO_DATA_VALUE
}

impl InputConfig {
    pub fn series_filter(&self) -> SeriesFilter {
        SeriesFilter {
            site_code: self.site.clone(),
            variable_code: self.variable_code.clone(),
            statistic_code: self.statistic_code.clone(),
            no_data_value: self.no_data_value,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RangeConfig {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub reference_date: ReferenceDate,
}

/// Date the default range end is derived from.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ReferenceDate {
    Specific(NaiveDate),
    Keyword(String),
}

impl Default for ReferenceDate {
    fn default() -> Self {
        ReferenceDate::Keyword("today".to_string())
    }
}

impl ReferenceDate {
    /// Resolve against `today`, which the caller reads from the clock.
    pub fn resolve(&self, today: NaiveDate) -> Result<NaiveDate> {
        match self {
            ReferenceDate::Specific(date) => Ok(*date),
            ReferenceDate::Keyword(keyword) => match keyword.as_str() {
                "today" => Ok(today),
                other => Err(AppError::Config(format!(
                    "Unknown reference_date '{}', expected 'today' or YYYY-MM-DD",
                    other
                ))),
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RankingConfig {
    #[serde(default = "default_top_n", deserialize_with = "deserialize_count")]
    pub top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
        }
    }
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

/// Custom deserializer that handles a count as both number and string
///
/// Accepts:
/// - `top_n: 10` (number)
/// - `top_n: "10"` (string that parses to number)
/// - `top_n: ${TOP_N}` (env var substituted to either)
fn deserialize_count<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CountValue {
        Number(usize),
        String(String),
    }

    match CountValue::deserialize(deserializer)? {
        CountValue::Number(n) => Ok(n),
        CountValue::String(s) => s
            .trim()
            .parse::<usize>()
            .map_err(|_| serde::de::Error::custom(format!("Invalid count: '{}'", s))),
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
    #[serde(default = "default_formats")]
    pub formats: Vec<OutputFormat>,
}

fn default_formats() -> Vec<OutputFormat> {
    vec![OutputFormat::Json, OutputFormat::Csv]
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let expanded = expand_env_vars(content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn pipeline_options(&self, today: NaiveDate) -> Result<PipelineOptions> {
        Ok(PipelineOptions {
            start: self.range.start,
            end: self.range.end,
            reference_date: self.range.reference_date.resolve(today)?,
            top_n: self.rankings.top_n,
        })
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Unexpanded environment variables
    /// - Non-empty input and output paths
    /// - Numeric site codes
    /// - A non-reversed explicit range
    /// - A usable ranking size and at least one output format
    fn validate(&self) -> Result<()> {
        let fields_to_check = [
            ("input.path", self.input.path.to_string_lossy().to_string()),
            ("output.directory", self.output.directory.to_string_lossy().to_string()),
        ];

        for (field_name, value) in &fields_to_check {
            if value.contains("${") {
                return Err(AppError::Config(format!(
                    "{} refers to an environment variable that is not set. \
                     Please set it or create a .env file.",
                    field_name
                )));
            }
            if value.is_empty() {
                return Err(AppError::Config(format!("{} cannot be empty", field_name)));
            }
        }

        if let Some(site) = &self.input.site {
            if site.is_empty() || !site.chars().all(|c| c.is_ascii_digit()) {
                return Err(AppError::Config(format!(
                    "Site code '{}' must be all digits (e.g., '09485000')",
                    site
                )));
            }
        }

        if let (Some(start), Some(end)) = (self.range.start, self.range.end) {
            if start > end {
                return Err(AppError::Config(format!(
                    "range.start {} is after range.end {}",
                    start, end
                )));
            }
        }

        if let ReferenceDate::Keyword(keyword) = &self.range.reference_date {
            if keyword != "today" {
                return Err(AppError::Config(format!(
                    "range.reference_date '{}' must be 'today' or a YYYY-MM-DD date",
                    keyword
                )));
            }
        }

        if self.rankings.top_n == 0 {
            return Err(AppError::Config(
                "rankings.top_n must be at least 1".to_string(),
            ));
        }

        if self.rankings.top_n > 100 {
            tracing::warn!(
                "rankings.top_n of {} is large, ranked lists are usually 10 entries",
                self.rankings.top_n
            );
        }

        if self.output.formats.is_empty() {
            return Err(AppError::Config(
                "output.formats must name at least one of: json, csv".to_string(),
            ));
        }

        Ok(())
    }
}

fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| AppError::Config(format!("Invalid substitution pattern: {}", e)))?;

    let mut missing_vars = Vec::new();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                missing_vars.push(var_name.to_string());
            }
        }
    }

    if !missing_vars.is_empty() {
        return Err(AppError::Config(format!(
            "Missing required environment variable{}: {}\n\n\
             To fix this:\n\
             1. Create a .env file in the project root\n\
             2. Set the missing variable{}: export {}=<value>",
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars.join(", "),
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars[0],
        )));
    }

    Ok(result)
}
