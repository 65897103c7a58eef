//! Derived hour/month columns and the monthly record series.

use crate::cleaner::{MonthMap, hour_series};
use crate::error::{CleaningError, Result};
use crate::schema::{self, SchemaResolver};
use crate::types::CleaningReport;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Record count of one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyCount {
    /// Month label as first seen in the table.
    pub label: String,
    /// Month index, 1..=12.
    pub month: u32,
    pub count: usize,
    /// Percentage change from the previous entry; `None` for the first.
    pub pct_change: Option<f64>,
}

/// Records per month, ordered by month index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlySeries {
    pub entries: Vec<MonthlyCount>,
    /// Rows whose month label is missing or not a known month.
    pub unmapped_records: usize,
}

impl MonthlySeries {
    /// Build a series from per-month `(index, label, count)` triples.
    fn from_counts(counts: BTreeMap<u32, (String, usize)>, unmapped_records: usize) -> Self {
        let mut entries: Vec<MonthlyCount> = Vec::with_capacity(counts.len());
        for (month, (label, count)) in counts {
            let pct_change = entries
                .last()
                .and_then(|prev| pct_change(prev.count, count));
            entries.push(MonthlyCount {
                label,
                month,
                count,
                pct_change,
            });
        }
        Self {
            entries,
            unmapped_records,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total records assigned to a month.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Table with columns `mes`, `numeric_month`, `count` and `pct_change`.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let labels: Vec<&str> = self.entries.iter().map(|e| e.label.as_str()).collect();
        let months: Vec<i32> = self.entries.iter().map(|e| e.month as i32).collect();
        let counts: Vec<u64> = self.entries.iter().map(|e| e.count as u64).collect();
        let changes: Vec<Option<f64>> = self.entries.iter().map(|e| e.pct_change).collect();

        Ok(df![
            schema::MES => labels,
            schema::NUMERIC_MONTH => months,
            "count" => counts,
            "pct_change" => changes,
        ]?)
    }
}

/// `(current - previous) / previous * 100`; `None` when there is no base.
pub fn pct_change(previous: usize, current: usize) -> Option<f64> {
    if previous == 0 {
        return None;
    }
    Some((current as f64 - previous as f64) * 100.0 / previous as f64)
}

/// Computes derived columns and month aggregates.
pub struct DerivedMetrics<'a> {
    months: &'a MonthMap,
    month_column: &'a str,
    hour_column: &'a str,
}

impl<'a> DerivedMetrics<'a> {
    pub fn new(months: &'a MonthMap, month_column: &'a str, hour_column: &'a str) -> Self {
        Self {
            months,
            month_column,
            hour_column,
        }
    }

    /// Add `numeric_hour` and `numeric_month` to the frame.
    ///
    /// Values that do not convert become null and are counted as parse
    /// failures of the derived column. A source column that cannot be found
    /// is noted and its derived column is not added.
    pub fn add_derived_columns(
        &self,
        df: &mut DataFrame,
        report: &mut CleaningReport,
    ) -> Result<()> {
        match SchemaResolver::resolve(df, self.hour_column) {
            Some(source) => {
                let text = df.column(&source)?.as_materialized_series();
                let (hours, stats) = hour_series(text, schema::NUMERIC_HOUR)
                    .map_err(|e| derive_error(&source, schema::NUMERIC_HOUR, e))?;
                df.with_column(hours)?;
                Self::record(report, &source, schema::NUMERIC_HOUR, stats.parse_failures);
            }
            None => Self::note_missing(report, self.hour_column, schema::NUMERIC_HOUR),
        }

        match SchemaResolver::resolve(df, self.month_column) {
            Some(source) => {
                let text = df.column(&source)?.as_materialized_series();
                let (months, stats) = self
                    .months
                    .month_series(text, schema::NUMERIC_MONTH)
                    .map_err(|e| derive_error(&source, schema::NUMERIC_MONTH, e))?;
                df.with_column(months)?;
                Self::record(report, &source, schema::NUMERIC_MONTH, stats.parse_failures);
            }
            None => Self::note_missing(report, self.month_column, schema::NUMERIC_MONTH),
        }

        Ok(())
    }

    /// Count records per month of the month column.
    pub fn monthly_counts(&self, df: &DataFrame) -> Result<MonthlySeries> {
        let source = SchemaResolver::resolve(df, self.month_column)
            .ok_or_else(|| CleaningError::ColumnNotFound(self.month_column.to_string()))?;
        let labels = df
            .column(&source)?
            .as_materialized_series()
            .cast(&DataType::String)?;

        let mut counts: BTreeMap<u32, (String, usize)> = BTreeMap::new();
        let mut unmapped = 0;
        for label in labels.str()?.into_iter() {
            match label.and_then(|l| self.months.index(l).map(|m| (l, m))) {
                Some((label, month)) => {
                    counts
                        .entry(month)
                        .or_insert_with(|| (label.trim().to_string(), 0))
                        .1 += 1;
                }
                None => unmapped += 1,
            }
        }

        if unmapped > 0 {
            debug!("{} records with no recognised month in '{}'", unmapped, source);
        }

        Ok(MonthlySeries::from_counts(counts, unmapped))
    }

    fn record(report: &mut CleaningReport, source: &str, derived: &str, failures: usize) {
        let entry = report.column_mut(derived);
        entry.parse_failures = failures;
        report.add_step(format!(
            "Derived '{}' from '{}' ({} values not converted)",
            derived, source, failures
        ));
    }

    fn note_missing(report: &mut CleaningReport, hint: &str, derived: &str) {
        let note = format!("Column '{}' not present; '{}' not derived", hint, derived);
        warn!("{}", note);
        report.add_note(note);
    }
}

fn derive_error(source: &str, derived: &str, e: anyhow::Error) -> CleaningError {
    CleaningError::TypeConversionFailed {
        column: source.to_string(),
        target_type: format!("Int32 ({})", derived),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn month_frame(parts: &[(&str, usize)]) -> DataFrame {
        let labels: Vec<&str> = parts
            .iter()
            .flat_map(|(label, n)| std::iter::repeat_n(*label, *n))
            .collect();
        df!["mes" => labels].unwrap()
    }

    #[test]
    fn test_monthly_counts_pct_change() {
        // Table order does not matter, months are sorted by index.
        let df = month_frame(&[("marzo", 90), ("enero", 100), ("febrero", 150)]);
        let months = MonthMap::default();

        let series = DerivedMetrics::new(&months, "mes", "hora")
            .monthly_counts(&df)
            .unwrap();

        let labels: Vec<&str> = series.entries.iter().map(|e| e.label.as_str()).collect();
        let counts: Vec<usize> = series.entries.iter().map(|e| e.count).collect();
        let changes: Vec<Option<f64>> = series.entries.iter().map(|e| e.pct_change).collect();

        assert_eq!(labels, vec!["enero", "febrero", "marzo"]);
        assert_eq!(counts, vec![100, 150, 90]);
        assert_eq!(changes, vec![None, Some(50.0), Some(-40.0)]);
        assert_eq!(series.unmapped_records, 0);
    }

    #[test]
    fn test_monthly_counts_excludes_unmapped() {
        let df = df!["mes" => [Some("enero"), Some("Enero"), Some("ene"), None]].unwrap();
        let months = MonthMap::default();

        let series = DerivedMetrics::new(&months, "mes", "hora")
            .monthly_counts(&df)
            .unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series.entries[0].count, 2);
        assert_eq!(series.unmapped_records, 2);
        assert_eq!(series.total(), 2);
    }

    #[test]
    fn test_monthly_counts_missing_column() {
        let df = df!["partido" => ["Tandil"]].unwrap();
        let months = MonthMap::default();

        let err = DerivedMetrics::new(&months, "mes", "hora")
            .monthly_counts(&df)
            .unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_to_dataframe_columns() {
        let df = month_frame(&[("enero", 2), ("febrero", 3)]);
        let months = MonthMap::default();
        let series = DerivedMetrics::new(&months, "mes", "hora")
            .monthly_counts(&df)
            .unwrap();

        let table = series.to_dataframe().unwrap();
        let names: Vec<String> = table
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(names, vec!["mes", "numeric_month", "count", "pct_change"]);
        assert_eq!(table.height(), 2);
        assert_eq!(table.column("pct_change").unwrap().null_count(), 1);
    }

    #[test]
    fn test_add_derived_columns() {
        let mut df = df![
            "hora" => [Some("08:15"), Some("25:99"), None],
            "mes" => [Some("marzo"), Some("setiembre"), Some("mar")],
        ]
        .unwrap();
        let months = MonthMap::default();
        let mut report = CleaningReport::new();

        DerivedMetrics::new(&months, "mes", "hora")
            .add_derived_columns(&mut df, &mut report)
            .unwrap();

        let hours: Vec<Option<i32>> = df
            .column("numeric_hour")
            .unwrap()
            .as_materialized_series()
            .i32()
            .unwrap()
            .into_iter()
            .collect();
        let month_idx: Vec<Option<i32>> = df
            .column("numeric_month")
            .unwrap()
            .as_materialized_series()
            .i32()
            .unwrap()
            .into_iter()
            .collect();

        assert_eq!(hours, vec![Some(8), None, None]);
        assert_eq!(month_idx, vec![Some(3), Some(9), None]);
        assert_eq!(report.column("numeric_hour").unwrap().parse_failures, 1);
        assert_eq!(report.column("numeric_month").unwrap().parse_failures, 1);
    }

    #[test]
    fn test_add_derived_columns_notes_missing_source() {
        let mut df = df!["mes" => ["enero"]].unwrap();
        let months = MonthMap::default();
        let mut report = CleaningReport::new();

        DerivedMetrics::new(&months, "mes", "hora")
            .add_derived_columns(&mut df, &mut report)
            .unwrap();

        assert!(df.column("numeric_hour").is_err());
        assert!(df.column("numeric_month").is_ok());
        assert_eq!(report.notes.len(), 1);
    }

    #[test]
    fn test_pct_change_no_base() {
        assert_eq!(pct_change(0, 10), None);
        assert_eq!(pct_change(4, 5), Some(25.0));
    }
}
