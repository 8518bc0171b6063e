use crate::schema::CanonicalField;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error(
        "Missing required columns: {} (detected columns: {})",
        join_fields(.missing),
        .detected.join(", ")
    )]
    SchemaValidation {
        missing: Vec<CanonicalField>,
        detected: Vec<String>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid projection horizon {0}: must be between 1 and 120 months")]
    InvalidHorizon(u32),

    #[error("Invalid series for {operation}: {details}")]
    InvalidSeries { operation: String, details: String },

    #[error("Row {row} has {actual} values but the record set has {expected} columns")]
    RowLengthMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Column '{column}' has {actual} values, expected {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Reconciliation check '{check}' failed: expected {expected}, got {actual}")]
    ReconciliationMismatch {
        check: String,
        expected: f64,
        actual: f64,
    },

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn join_fields(fields: &[CanonicalField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
