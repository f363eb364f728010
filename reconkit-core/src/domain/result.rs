//! Result and error types for the core library

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Per-cell normalization failure.
///
/// Never fatal: the loader keeps the original text in a `Cell::Unparsed`
/// and the engine routes the row to the missing tables with a marker.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParseError {
    #[error("empty value")]
    Empty,

    #[error("invalid amount: '{0}'")]
    InvalidAmount(String),

    #[error("invalid date: '{0}'")]
    InvalidDate(String),
}

/// Fatal loader failure, reported before any matching begins
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {source_name}: {message}")]
    Io { source_name: String, message: String },

    #[error("{0} has no data rows")]
    EmptyFile(String),

    #[error("{source_name}: missing {role} column '{column}'")]
    SchemaMismatch {
        source_name: String,
        role: String,
        column: String,
    },

    #[error("{source_name}: {error}")]
    InvalidSchema { source_name: String, error: ConfigError },
}

impl LoadError {
    pub fn io(source_name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Io {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}

/// Invalid run configuration, rejected before the matching pass starts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("amount tolerance must not be negative (got {0})")]
    NegativeTolerance(Decimal),

    #[error("column '{column}' is assigned to both {first} and {second}")]
    DuplicateRole {
        column: String,
        first: String,
        second: String,
    },

    #[error("{0} column name is empty")]
    EmptyColumn(String),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Reconciliation cancelled")]
    Cancelled,

    #[error("Reconciliation worker failed: {0}")]
    Worker(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Create an export error
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Whether the error aborted a run that was otherwise valid
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_messages() {
        let err = LoadError::SchemaMismatch {
            source_name: "bank.csv".to_string(),
            role: "key".to_string(),
            column: "ref".to_string(),
        };
        assert_eq!(err.to_string(), "bank.csv: missing key column 'ref'");

        let err = LoadError::EmptyFile("ledger.csv".to_string());
        assert_eq!(err.to_string(), "ledger.csv has no data rows");
    }

    #[test]
    fn test_error_wraps_config() {
        let err: Error = ConfigError::NegativeTolerance(Decimal::new(-1, 2)).into();
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("-0.01"));
        assert!(!err.is_cancelled());
        assert!(Error::Cancelled.is_cancelled());
    }

    #[test]
    fn test_parse_error_serializes_tagged() {
        let json = serde_json::to_string(&ParseError::InvalidDate("31/04/2024".into())).unwrap();
        assert_eq!(json, r#"{"kind":"invalid_date","value":"31/04/2024"}"#);
    }
}
