//! Exact-duplicate removal and key-duplicate diagnostics.

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Rows that share a key column's value with an earlier row.
///
/// Informational only: many legitimate records share a district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDuplicateSummary {
    pub column: String,
    pub distinct_values: usize,
    pub repeated_rows: usize,
}

/// Detects duplicated rows.
pub struct Deduplicator;

impl Deduplicator {
    /// Remove rows equal across every column to an earlier row.
    ///
    /// The first occurrence is kept and the relative order of kept rows is
    /// unchanged. Returns the frame and the number of rows removed.
    pub fn remove_exact_duplicates(df: DataFrame) -> Result<(DataFrame, usize)> {
        let height = df.height();
        if height == 0 || df.width() == 0 {
            return Ok((df, 0));
        }

        let deduped = df.unique_stable(None, UniqueKeepStrategy::First, None)?;
        let removed = height - deduped.height();
        if removed > 0 {
            debug!("Removed {} exact duplicate rows", removed);
        }

        Ok((deduped, removed))
    }

    /// Count rows whose `column` value already appeared in an earlier row.
    ///
    /// Returns `None` when the column is absent.
    pub fn key_duplicates(df: &DataFrame, column: &str) -> Result<Option<KeyDuplicateSummary>> {
        let Ok(col) = df.column(column) else {
            return Ok(None);
        };

        let distinct_values = col.as_materialized_series().n_unique()?;
        let repeated_rows = col.len() - distinct_values;

        Ok(Some(KeyDuplicateSummary {
            column: column.to_string(),
            distinct_values,
            repeated_rows,
        }))
    }
}
