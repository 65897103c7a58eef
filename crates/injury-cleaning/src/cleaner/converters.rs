//! Type coercion: numeric age, hour of day, month index.
//!
//! Every conversion here is total. A cell that cannot be converted becomes
//! null and is counted, it never aborts the column.

use crate::utils::{is_numeric_dtype, parse_numeric_string};
use anyhow::Result;
use chrono::{NaiveTime, Timelike};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Outcome of coercing one column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoercionStats {
    /// Non-null inputs that converted.
    pub converted: usize,
    /// Non-null inputs that did not convert and became null.
    pub parse_failures: usize,
}

/// Coerce a series to `Float64`.
///
/// Numeric dtypes are cast. Text is trimmed and parsed; anything that is
/// not a finite number becomes null.
pub fn coerce_numeric(series: &Series) -> Result<(Series, CoercionStats)> {
    let dtype = series.dtype();

    if dtype == &DataType::Float64 {
        let converted = series.len() - series.null_count();
        return Ok((
            series.clone(),
            CoercionStats {
                converted,
                parse_failures: 0,
            },
        ));
    }

    if is_numeric_dtype(dtype) {
        let cast = series.cast(&DataType::Float64)?;
        let converted = cast.len() - cast.null_count();
        return Ok((
            cast,
            CoercionStats {
                converted,
                parse_failures: 0,
            },
        ));
    }

    let str_series = series.cast(&DataType::String)?;
    let mut stats = CoercionStats::default();
    let values: Vec<Option<f64>> = str_series
        .str()?
        .into_iter()
        .map(|opt_val| {
            let val = opt_val?;
            let parsed = parse_numeric_string(val);
            if parsed.is_some() {
                stats.converted += 1;
            } else {
                stats.parse_failures += 1;
            }
            parsed
        })
        .collect();

    Ok((Series::new(series.name().clone(), values), stats))
}

/// Parse an `HH:MM` string into an hour of day (0–23).
///
/// One- or two-digit hours are accepted; minutes must be two digits. Out of
/// range values such as `25:99` are rejected.
pub fn parse_hour(value: &str) -> Option<i32> {
    let trimmed = value.trim();
    let (hours, minutes) = trimmed.split_once(':')?;
    let well_formed = (1..=2).contains(&hours.len())
        && minutes.len() == 2
        && hours.bytes().all(|b| b.is_ascii_digit())
        && minutes.bytes().all(|b| b.is_ascii_digit());
    if !well_formed {
        return None;
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .ok()
        .map(|t| t.hour() as i32)
}

/// Build an `Int32` hour-of-day series from an `HH:MM` text series.
pub fn hour_series(series: &Series, name: &str) -> Result<(Series, CoercionStats)> {
    let str_series = series.cast(&DataType::String)?;
    let mut stats = CoercionStats::default();
    let values: Vec<Option<i32>> = str_series
        .str()?
        .into_iter()
        .map(|opt_val| {
            let parsed = parse_hour(opt_val?);
            if parsed.is_some() {
                stats.converted += 1;
            } else {
                stats.parse_failures += 1;
            }
            parsed
        })
        .collect();

    Ok((Series::new(name.into(), values), stats))
}

/// Immutable month-name lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthMap {
    months: HashMap<String, u32>,
}

impl Default for MonthMap {
    fn default() -> Self {
        Self::new([
            ("enero", 1),
            ("febrero", 2),
            ("marzo", 3),
            ("abril", 4),
            ("mayo", 5),
            ("junio", 6),
            ("julio", 7),
            ("agosto", 8),
            ("septiembre", 9),
            ("setiembre", 9),
            ("octubre", 10),
            ("noviembre", 11),
            ("diciembre", 12),
        ])
    }
}

impl MonthMap {
    /// Build a map from `(name, index)` pairs. Names are stored lowercase.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: AsRef<str>,
    {
        Self {
            months: entries
                .into_iter()
                .map(|(name, idx)| (name.as_ref().to_lowercase(), idx))
                .collect(),
        }
    }

    /// Month index of a label, looked up exactly after lowercasing and
    /// trimming.
    pub fn index(&self, name: &str) -> Option<u32> {
        self.months.get(&name.trim().to_lowercase()).copied()
    }

    /// Indices that fall outside 1..=12.
    pub fn invalid_indices(&self) -> Vec<u32> {
        self.months
            .values()
            .copied()
            .filter(|idx| !(1..=12).contains(idx))
            .collect()
    }

    /// Build an `Int32` month-index series from a text series.
    pub fn month_series(&self, series: &Series, name: &str) -> Result<(Series, CoercionStats)> {
        let str_series = series.cast(&DataType::String)?;
        let mut stats = CoercionStats::default();
        let values: Vec<Option<i32>> = str_series
            .str()?
            .into_iter()
            .map(|opt_val| {
                let idx = self.index(opt_val?).map(|m| m as i32);
                if idx.is_some() {
                    stats.converted += 1;
                } else {
                    stats.parse_failures += 1;
                }
                idx
            })
            .collect();

        Ok((Series::new(name.into(), values), stats))
    }
}
