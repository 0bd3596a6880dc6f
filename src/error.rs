use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// An observation timestamp is not aligned to a whole calendar day.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
