//! Null-token normalization for text columns.

use crate::utils::is_text_dtype;
use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Set of literal cell values that mean "missing".
///
/// Matching is exact and case-sensitive per token, so each spelling that
/// should count as missing has to be listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullTokens {
    tokens: HashSet<String>,
    /// Treat any whitespace-only value as missing, listed or not.
    pub treat_blank_as_missing: bool,
}

impl Default for NullTokens {
    fn default() -> Self {
        Self::new([
            "",
            " ",
            "   ",
            "-",
            "na",
            "NA",
            "NaN",
            "nan",
            "N/A",
            "n/a",
            "Desconocido",
            "desconocido",
            "Sin determinar",
            "sin determinar",
            "Unknown",
            "unknown",
            "Undetermined",
            "undetermined",
        ])
    }
}

impl NullTokens {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            treat_blank_as_missing: true,
        }
    }

    /// Whether a raw cell value denotes a missing value.
    pub fn is_null_token(&self, value: &str) -> bool {
        self.tokens.contains(value) || (self.treat_blank_as_missing && value.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Replaces null tokens with real nulls in every text column.
pub struct NullTokenNormalizer<'a> {
    tokens: &'a NullTokens,
}

impl<'a> NullTokenNormalizer<'a> {
    pub fn new(tokens: &'a NullTokens) -> Self {
        Self { tokens }
    }

    /// Normalize every `String` column of the frame.
    ///
    /// Returns the frame and the total number of cells replaced. Columns of
    /// any other dtype are left alone.
    pub fn apply(&self, df: DataFrame) -> Result<(DataFrame, usize)> {
        let mut df = df;
        let column_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let mut total_replacements = 0;

        for col_name in &column_names {
            let column = df.column(col_name)?;
            if !is_text_dtype(column.dtype()) {
                continue;
            }
            let (cleaned, count) = self.normalize_series(column.as_materialized_series())?;
            if count > 0 {
                debug!("'{}': {} null tokens replaced", col_name, count);
                total_replacements += count;
                df.replace(col_name, cleaned)?;
            }
        }

        Ok((df, total_replacements))
    }

    /// Replace null tokens in a single text series.
    pub fn normalize_series(&self, series: &Series) -> Result<(Series, usize)> {
        let str_series = series.str()?;
        let mut cleaned_values: Vec<Option<&str>> = Vec::with_capacity(str_series.len());
        let mut replacement_count = 0;

        for opt_val in str_series.into_iter() {
            match opt_val {
                Some(val) if self.tokens.is_null_token(val) => {
                    cleaned_values.push(None);
                    replacement_count += 1;
                }
                other => cleaned_values.push(other),
            }
        }

        Ok((
            Series::new(series.name().clone(), cleaned_values),
            replacement_count,
        ))
    }
}
