use crate::cleaner::KeyDuplicateSummary;
use crate::error::{CleaningError, Result};
use crate::metrics::MonthlySeries;
use crate::statistics::NumericSummary;
use chrono::{DateTime, Local};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

// ============================================================================
// Cleaning Report Types
// ============================================================================

/// Audit trail of one cleaning run.
///
/// Every count is taken from the frame at a fixed stage of the pipeline, so
/// a reader can see where each missing value came from and where it went:
///
/// ```text
/// raw_missing -> after_token_missing -> (+ parse_failures) -> imputed -> after_imputation_missing
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Number of rows received.
    pub rows_before: usize,
    /// Number of rows in the cleaned table.
    pub rows_after: usize,
    /// Rows dropped as exact duplicates.
    pub duplicates_removed: usize,

    /// Informational count of rows sharing the key column's value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_duplicates: Option<KeyDuplicateSummary>,

    /// Per-column counts, in frame order after header normalization.
    pub columns: Vec<ColumnReport>,

    /// Numeric-rule columns described before imputation.
    pub numeric_before: Vec<NamedSummary>,
    /// Numeric-rule columns described after imputation.
    pub numeric_after: Vec<NamedSummary>,

    /// Alternative imputations computed on copies of the table.
    pub strategy_previews: Vec<StrategyPreview>,

    /// Schema drift and fallbacks that did not stop the run.
    pub notes: Vec<String>,
    /// Columns whose imputation could not be completed.
    pub failures: Vec<ColumnFailure>,
    /// Human-readable log of every stage.
    pub processing_steps: Vec<String>,

    pub generated_at: DateTime<Local>,
}

impl Default for CleaningReport {
    fn default() -> Self {
        Self {
            rows_before: 0,
            rows_after: 0,
            duplicates_removed: 0,
            key_duplicates: None,
            columns: Vec::new(),
            numeric_before: Vec::new(),
            numeric_after: Vec::new(),
            strategy_previews: Vec::new(),
            notes: Vec::new(),
            failures: Vec::new(),
            processing_steps: Vec::new(),
            generated_at: Local::now(),
        }
    }
}

impl CleaningReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a note to the report.
    pub fn add_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Add a processing step to the report.
    pub fn add_step(&mut self, step: impl Into<String>) {
        self.processing_steps.push(step.into());
    }

    /// Record a column failure.
    pub fn add_failure(&mut self, failure: ColumnFailure) {
        self.failures.push(failure);
    }

    /// Report for a column, if the column was seen.
    pub fn column(&self, name: &str) -> Option<&ColumnReport> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Mutable report for a column, created on first use.
    pub fn column_mut(&mut self, name: &str) -> &mut ColumnReport {
        let idx = match self.columns.iter().position(|c| c.name == name) {
            Some(idx) => idx,
            None => {
                self.columns.push(ColumnReport::new(name));
                self.columns.len() - 1
            }
        };
        &mut self.columns[idx]
    }

    /// Summary taken before imputation for a column.
    pub fn summary_before(&self, column: &str) -> Option<&NumericSummary> {
        self.numeric_before
            .iter()
            .find(|s| s.column == column)
            .map(|s| &s.summary)
    }

    /// Summary taken after imputation for a column.
    pub fn summary_after(&self, column: &str) -> Option<&NumericSummary> {
        self.numeric_after
            .iter()
            .find(|s| s.column == column)
            .map(|s| &s.summary)
    }

    /// Whether any column failed.
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Total values replaced by imputation across all columns.
    pub fn total_imputed(&self) -> usize {
        self.columns.iter().map(|c| c.imputed).sum()
    }

    /// Serialize the report as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Missing-value counts of one column through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnReport {
    pub name: String,
    /// Nulls as received.
    pub raw_missing: usize,
    /// Nulls after null-token normalization.
    pub after_token_missing: usize,
    /// Cells that did not coerce to the column's numeric type.
    pub parse_failures: usize,
    /// Cells filled by the column's rule.
    pub imputed: usize,
    /// Nulls left in the cleaned table.
    pub after_imputation_missing: usize,
    /// Rule applied, rendered as text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    /// Value or statistic used to fill.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_value: Option<String>,
}

impl ColumnReport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_missing: 0,
            after_token_missing: 0,
            parse_failures: 0,
            imputed: 0,
            after_imputation_missing: 0,
            rule: None,
            fill_value: None,
        }
    }
}

/// A column whose rule could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFailure {
    pub column: String,
    pub code: String,
    pub message: String,
}

impl ColumnFailure {
    pub fn new(column: impl Into<String>, error: &CleaningError) -> Self {
        Self {
            column: column.into(),
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// A numeric summary bound to its column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSummary {
    pub column: String,
    pub summary: NumericSummary,
}

/// Description of a column as if it had been imputed with `rule`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPreview {
    pub column: String,
    pub rule: String,
    pub summary: NumericSummary,
}

// ============================================================================
// Cleaning Outcome
// ============================================================================

/// Everything a cleaning run produces.
#[derive(Debug, Clone)]
pub struct CleaningOutcome {
    /// The cleaned table.
    pub data: DataFrame,
    pub report: CleaningReport,
    /// Records per month, if a month column was found.
    pub monthly: Option<MonthlySeries>,
}

// ============================================================================
// Tests
// ============================================================================
