//! Descriptive statistics for numeric columns.

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Count, location and spread of a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericSummary {
    pub count: usize,
    pub missing: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Sample standard deviation (n - 1 denominator).
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericSummary {
    /// Describe a series. Non-numeric series are cast to `Float64` first;
    /// values that do not cast count as missing.
    pub fn describe(series: &Series) -> Result<Self> {
        let numeric = series.cast(&DataType::Float64)?;
        let missing = numeric.null_count();
        let count = numeric.len() - missing;

        Ok(Self {
            count,
            missing,
            mean: numeric.mean(),
            median: numeric.median(),
            std: if count > 1 { numeric.std(1) } else { None },
            min: numeric.min::<f64>()?,
            max: numeric.max::<f64>()?,
        })
    }
}
