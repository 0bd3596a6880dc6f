use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// Sentinel the daily-values service uses for "no value recorded".
pub const DEFAULT_NO_DATA_VALUE: f64 = -999999.0;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Daily-values document
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DailyValuesDocument {
    pub value: DocumentBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentBody {
    #[serde(default)]
    pub time_series: Vec<TimeSeries>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    pub source_info: SourceInfo,
    pub variable: Variable,
    #[serde(default)]
    pub values: Vec<ValueBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    #[serde(default)]
    pub site_name: String,
    #[serde(default)]
    pub site_code: Vec<CodeValue>,
}

#[derive(Debug, Deserialize)]
pub struct CodeValue {
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(default)]
    pub variable_code: Vec<CodeValue>,
    #[serde(default)]
    pub options: VariableOptions,
    pub no_data_value: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct VariableOptions {
    #[serde(default)]
    pub option: Vec<VariableOption>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableOption {
    pub option_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ValueBlock {
    #[serde(default)]
    pub value: Vec<Option<PointRecord>>,
}

/// One point as it appears on the wire; every field may be absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointRecord {
    pub date_time: Option<String>,
    pub value: Option<WireValue>,
    pub qualifiers: Option<WireQualifiers>,
}

/// Values arrive string-encoded, but a bare number is accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireQualifiers {
    Many(Vec<String>),
    One(String),
}

// ============================================================================
// Classified points and observations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    EmptyRecord,
    MissingTimestamp,
    MissingValue,
}

/// A wire point after classification.
#[derive(Debug, Clone)]
pub enum RawPoint {
    Valid {
        timestamp: String,
        value: WireValue,
        qualifiers: String,
    },
    Malformed(MalformedReason),
}

impl RawPoint {
    pub fn classify(record: Option<&PointRecord>) -> Self {
        let Some(record) = record else {
            return RawPoint::Malformed(MalformedReason::EmptyRecord);
        };
        match (&record.date_time, &record.value) {
            (None, _) => RawPoint::Malformed(MalformedReason::MissingTimestamp),
            (Some(_), None) => RawPoint::Malformed(MalformedReason::MissingValue),
            (Some(timestamp), Some(value)) => RawPoint::Valid {
                timestamp: timestamp.clone(),
                value: value.clone(),
                qualifiers: canonical_qualifiers(record.qualifiers.as_ref()),
            },
        }
    }
}

/// One normalized data point.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub site_code: String,
    pub variable_code: String,
    pub statistic_code: Option<String>,
    pub timestamp: NaiveDateTime,
    /// `None` when the source value was the no-data sentinel or not a number.
    pub value: Option<f64>,
    pub qualifiers: String,
}

impl Observation {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn is_day_aligned(&self) -> bool {
        self.timestamp.time() == NaiveTime::MIN
    }
}

/// Which series of a document take part in normalization.
#[derive(Debug, Clone)]
pub struct SeriesFilter {
    pub site_code: Option<String>,
    pub variable_code: Option<String>,
    pub statistic_code: Option<String>,
    pub no_data_value: f64,
}

impl Default for SeriesFilter {
    fn default() -> Self {
        Self {
            site_code: None,
            variable_code: None,
            statistic_code: None,
            no_data_value: DEFAULT_NO_DATA_VALUE,
        }
    }
}

impl SeriesFilter {
    fn accepts(&self, site: &str, variable: &str, statistic: Option<&str>) -> bool {
        let wanted = |filter: &Option<String>, actual: Option<&str>| match filter {
            Some(code) => actual == Some(code.as_str()),
            None => true,
        };
        wanted(&self.site_code, Some(site))
            && wanted(&self.variable_code, Some(variable))
            && wanted(&self.statistic_code, statistic)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub series_seen: usize,
    pub series_skipped: usize,
    pub points_seen: usize,
    pub observations: usize,
    pub empty_records: usize,
    pub missing_timestamp: usize,
    pub missing_value: usize,
    pub invalid_value: usize,
}

impl NormalizeStats {
    pub fn malformed(&self) -> usize {
        self.empty_records + self.missing_timestamp + self.missing_value
    }

    fn record_malformed(&mut self, reason: MalformedReason) {
        match reason {
            MalformedReason::EmptyRecord => self.empty_records += 1,
            MalformedReason::MissingTimestamp => self.missing_timestamp += 1,
            MalformedReason::MissingValue => self.missing_value += 1,
        }
    }
}

// ============================================================================
// Normalizer
// ============================================================================

pub struct Normalizer;

impl Normalizer {
    pub fn load_document<P: AsRef<Path>>(path: P) -> Result<DailyValuesDocument> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Parse(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse_document(&content)
    }

    pub fn parse_document(content: &str) -> Result<DailyValuesDocument> {
        serde_json::from_str(content)
            .map_err(|e| AppError::Parse(format!("Invalid daily-values document: {}", e)))
    }

    /// Flatten a document into observations ordered by timestamp.
    ///
    /// Points lacking a timestamp or value are dropped and counted. A
    /// timestamp that cannot be read as a calendar date is an integrity fault.
    pub fn normalize(
        document: &DailyValuesDocument,
        filter: &SeriesFilter,
    ) -> Result<(Vec<Observation>, NormalizeStats)> {
        let mut observations = Vec::new();
        let mut stats = NormalizeStats::default();

        for series in &document.value.time_series {
            stats.series_seen += 1;

            let site_code = first_code(&series.source_info.site_code, "siteCode")?;
            let variable_code = first_code(&series.variable.variable_code, "variableCode")?;
            let statistic_code = series
                .variable
                .options
                .option
                .iter()
                .find_map(|o| o.option_code.clone());

            if !filter.accepts(&site_code, &variable_code, statistic_code.as_deref()) {
                stats.series_skipped += 1;
                debug!(
                    "Skipping series {} {} {:?}",
                    site_code, variable_code, statistic_code
                );
                continue;
            }

            let sentinel = series.variable.no_data_value.unwrap_or(filter.no_data_value);
            info!(
                "Normalizing series {} ({}) variable {}",
                site_code, series.source_info.site_name, variable_code
            );

            let records = series.values.iter().flat_map(|b| b.value.iter());
            for (index, record) in records.enumerate() {
                stats.points_seen += 1;

                let point = RawPoint::classify(record.as_ref());
                let (timestamp, wire_value, qualifiers) = match point {
                    RawPoint::Valid {
                        timestamp,
                        value,
                        qualifiers,
                    } => (timestamp, value, qualifiers),
                    RawPoint::Malformed(reason) => {
                        stats.record_malformed(reason);
                        debug!(
                            "Dropping point {} of series {}: {:?}",
                            index, site_code, reason
                        );
                        continue;
                    }
                };

                let timestamp = parse_timestamp(&timestamp)?;
                let value = numeric_value(&wire_value, sentinel);
                if value.is_none() {
                    stats.invalid_value += 1;
                }

                observations.push(Observation {
                    site_code: site_code.clone(),
                    variable_code: variable_code.clone(),
                    statistic_code: statistic_code.clone(),
                    timestamp,
                    value,
                    qualifiers,
                });
            }
        }

        observations.sort_by_key(|o| o.timestamp);
        stats.observations = observations.len();

        if stats.malformed() > 0 || stats.invalid_value > 0 {
            warn!(
                "Dropped {} malformed points ({} empty, {} no timestamp, {} no value); {} unusable values",
                stats.malformed(),
                stats.empty_records,
                stats.missing_timestamp,
                stats.missing_value,
                stats.invalid_value
            );
        }
        info!(
            "Normalized {} observations from {} points across {} series",
            stats.observations, stats.points_seen, stats.series_seen
        );

        Ok((observations, stats))
    }
}

fn first_code(codes: &[CodeValue], field: &str) -> Result<String> {
    codes
        .first()
        .map(|c| c.value.clone())
        .ok_or_else(|| AppError::Parse(format!("Time series is missing {}", field)))
}

fn canonical_qualifiers(qualifiers: Option<&WireQualifiers>) -> String {
    let tags: BTreeSet<&str> = match qualifiers {
        Some(WireQualifiers::Many(list)) => list.iter().map(|t| t.trim()).collect(),
        Some(WireQualifiers::One(single)) => single.split(',').map(str::trim).collect(),
        None => BTreeSet::new(),
    };
    tags.into_iter()
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

fn numeric_value(value: &WireValue, sentinel: f64) -> Option<f64> {
    let parsed = match value {
        WireValue::Number(n) => *n,
        WireValue::Text(s) => s.trim().parse::<f64>().ok()?,
    };
    if !parsed.is_finite() || parsed == sentinel {
        None
    } else {
        Some(parsed)
    }
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT) {
        return Ok(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    Err(AppError::DataIntegrity(format!(
        "Timestamp '{}' is not a calendar date",
        raw
    )))
}
