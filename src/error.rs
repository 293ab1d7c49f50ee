//! Error types for gravity-lab
//!
//! Three failure families exist: configuration errors (missing input, split
//! bounds that empty a partition), estimator failures, and I/O. Rows with
//! missing or non-positive values are never errors; they are filtered.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// gravity-lab error types
#[derive(Error, Debug)]
pub enum Error {
    /// Input panel file does not exist
    #[error("Input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// None of the trade-flow source columns is present
    #[error("No trade-flow column found; expected one of: {}", .candidates.join(", "))]
    MissingTargetColumn {
        /// Candidate column names, in preference order
        candidates: Vec<String>,
    },

    /// A required raw column is absent from the input schema
    #[error("Required column missing: {0}")]
    MissingColumn(String),

    /// Temporal split left a partition empty (caller misconfiguration)
    #[error(
        "Temporal split produced empty set. Train rows: {train_rows}, Test rows: {test_rows}.\n\
         Check train_end_year/test_start_year against the data's year range."
    )]
    EmptySplit {
        /// Rows in the training partition
        train_rows: usize,
        /// Rows in the test partition
        test_rows: usize,
    },

    /// Paired vectors differ in length
    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Invalid argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Estimator fit/predict failure
    #[error("Estimator {model} failed: {message}")]
    Estimator {
        /// Estimator name
        model: String,
        /// Failure detail
        message: String,
    },

    /// Predict called before fit
    #[error("Estimator {0} used before fit()")]
    NotFitted(&'static str),

    /// Storage error (CSV/Parquet)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Invalid pipeline configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Summarization found no importance tables to read
    #[error("No feature-importance files found. Run the experiments first.")]
    NoImportanceTables,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Shorthand for an estimator failure.
    pub(crate) fn estimator(model: &str, message: impl Into<String>) -> Self {
        Self::Estimator {
            model: model.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error signals caller misconfiguration rather than a data
    /// or estimator fault.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingInput(_)
                | Self::EmptySplit { .. }
                | Self::Config(_)
                | Self::MissingTargetColumn { .. }
        )
    }
}
