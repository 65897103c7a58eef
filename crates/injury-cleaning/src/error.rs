//! Error types for the cleaning pipeline.
//!
//! Per-cell problems (a value that cannot be parsed) never become errors;
//! they are turned into nulls and counted in the report. The variants here
//! cover column-level impossibilities and plumbing failures.
//!
//! Errors are serializable so a caller can ship them alongside the JSON
//! report.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the cleaning pipeline.
#[derive(Error, Debug)]
pub enum CleaningError {
    /// A mode-filled column has no non-missing value to take the mode of.
    #[error("No mode available for column '{0}': every value is missing")]
    NoModeAvailable(String),

    /// A numeric rule found no valid value to compute a statistic from.
    #[error("No valid values found in column '{0}'")]
    NoValidValues(String),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Type conversion failed for a whole column.
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// A whole-table cleaning stage failed.
    #[error("Failed to clean data: {0}")]
    CleaningFailed(String),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CleaningError>,
    },
}

impl CleaningError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CleaningError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code, carried into the report for recorded failures.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoModeAvailable(_) => "NO_MODE_AVAILABLE",
            Self::NoValidValues(_) => "NO_VALID_VALUES",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::CleaningFailed(_) => "CLEANING_FAILED",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether this error only concerns a single column.
    ///
    /// Column failures halt that column's imputation; the pipeline records
    /// them and carries on with the other columns unless `fail_fast` is set.
    pub fn is_column_failure(&self) -> bool {
        match self {
            Self::NoModeAvailable(_)
            | Self::NoValidValues(_)
            | Self::TypeConversionFailed { .. } => true,
            Self::WithContext { source, .. } => source.is_column_failure(),
            _ => false,
        }
    }

    /// The column this error is about, if any.
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::NoModeAvailable(c) | Self::NoValidValues(c) | Self::ColumnNotFound(c) => {
                Some(c)
            }
            Self::TypeConversionFailed { column, .. } => Some(column),
            Self::WithContext { source, .. } => source.column(),
            _ => None,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for CleaningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("CleaningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for cleaning operations.
pub type Result<T> = std::result::Result<T, CleaningError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CleaningError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            CleaningError::NoModeAvailable("sexo".to_string()).error_code(),
            "NO_MODE_AVAILABLE"
        );
        assert_eq!(
            CleaningError::ColumnNotFound("edad".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
    }

    #[test]
    fn test_is_column_failure() {
        assert!(CleaningError::NoModeAvailable("sexo".to_string()).is_column_failure());
        assert!(CleaningError::NoValidValues("edad".to_string()).is_column_failure());
        assert!(!CleaningError::InvalidConfig("bad".to_string()).is_column_failure());
    }

    #[test]
    fn test_error_serialization() {
        let error = CleaningError::NoModeAvailable("sexo".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("NO_MODE_AVAILABLE"));
        assert!(json.contains("sexo"));
    }

    #[test]
    fn test_with_context_preserves_code_and_column() {
        let error = CleaningError::NoValidValues("edad".to_string()).with_context("Imputing");
        assert!(error.to_string().contains("Imputing"));
        assert_eq!(error.error_code(), "NO_VALID_VALUES");
        assert_eq!(error.column(), Some("edad"));
        assert!(error.is_column_failure());
    }
}
