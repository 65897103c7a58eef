//! Shared helpers for series inspection, parsing and filling.

use polars::prelude::*;
use std::collections::HashMap;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType holds text.
#[inline]
pub fn is_text_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String)
}

// =============================================================================
// String Utilities
// =============================================================================

/// Parse a trimmed string as a finite `f64`.
///
/// Unlike a lenient parser this does not strip units or separators: `"42 años"`
/// is not a number.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Fold accented Spanish letters to their plain ASCII form.
pub fn fold_accents(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'Á' | 'À' | 'Ä' | 'Â' => 'A',
            'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'Ó' | 'Ò' | 'Ö' | 'Ô' => 'O',
            'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

// =============================================================================
// Series Statistics Utilities
// =============================================================================

/// Most frequent value of a text Series.
///
/// Ties go to the value that appears first in row order. Returns `None`
/// when every value is null.
pub fn string_mode(series: &Series) -> Option<String> {
    let str_series = series.cast(&DataType::String).ok()?;
    let str_chunked = str_series.str().ok()?;

    // value -> (count, first row index)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, val) in str_chunked.into_iter().enumerate() {
        if let Some(val) = val {
            counts.entry(val).or_insert((0, idx)).0 += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|(_, (ca, fa)), (_, (cb, fb))| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(val, _)| val.to_string())
}

/// Most frequent value of a numeric Series, with the same tie rule as
/// [`string_mode`].
pub fn numeric_mode(series: &Series) -> Option<f64> {
    let floats = series.cast(&DataType::Float64).ok()?;
    let chunked = floats.f64().ok()?;

    let mut counts: HashMap<u64, (usize, usize, f64)> = HashMap::new();
    for (idx, val) in chunked.into_iter().enumerate() {
        if let Some(val) = val {
            counts.entry(val.to_bits()).or_insert((0, idx, val)).0 += 1;
        }
    }

    counts
        .into_values()
        .max_by(|(ca, fa, _), (cb, fb, _)| ca.cmp(cb).then(fb.cmp(fa)))
        .map(|(_, _, val)| val)
}

// =============================================================================
// Series Transformation Utilities
// =============================================================================

/// Fill null values in a numeric Series with a specific value.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64) -> PolarsResult<Series> {
    let floats = series.cast(&DataType::Float64)?;
    let filled: Vec<Option<f64>> = floats
        .f64()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value)))
        .collect();
    Ok(Series::new(series.name().clone(), filled))
}

/// Fill null values in a text Series with a specific value.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let strings = series.cast(&DataType::String)?;
    let filled: Vec<Option<String>> = strings
        .str()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value).to_string()))
        .collect();
    Ok(Series::new(series.name().clone(), filled))
}

// =============================================================================
// Tests
// =============================================================================
