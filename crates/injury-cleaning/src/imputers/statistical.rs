//! Rule-driven imputation.
//!
//! Provides fixed, mode, median and grouped-mean fills, applied column by
//! column according to an [`ImputationPolicy`].

use super::policy::{ColumnRule, FillValue, ImputationPolicy, ImputationRule};
use crate::cleaner::coerce_numeric;
use crate::error::{CleaningError, Result};
use crate::schema::SchemaResolver;
use crate::statistics::NumericSummary;
use crate::types::{CleaningReport, ColumnFailure};
use crate::utils::{
    fill_numeric_nulls, fill_string_nulls, is_numeric_dtype, numeric_mode, string_mode,
};
use polars::prelude::*;
use tracing::{debug, warn};

/// What one rule did to its column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    /// Number of nulls replaced.
    pub filled: usize,
    /// Value or statistic used, rendered as text.
    pub fill_value: Option<String>,
    /// Fallbacks taken while applying the rule.
    pub notes: Vec<String>,
}

/// Applies an imputation policy to a table.
pub struct Imputer<'a> {
    policy: &'a ImputationPolicy,
}

impl<'a> Imputer<'a> {
    pub fn new(policy: &'a ImputationPolicy) -> Self {
        Self { policy }
    }

    /// Apply every rule of the policy in phase order.
    ///
    /// Columns absent from the frame are skipped with a note. A column whose
    /// rule cannot be completed (no mode, no valid values) keeps its nulls
    /// and is recorded as a failure, unless `fail_fast` is set, in which case
    /// the error is returned.
    pub fn apply(
        &self,
        df: &mut DataFrame,
        report: &mut CleaningReport,
        fail_fast: bool,
    ) -> Result<()> {
        for ColumnRule { column, rule } in self.policy.ordered() {
            if df.column(column).is_err() {
                let note = format!("Column '{}' not present; {} fill skipped", column, rule);
                warn!("{}", note);
                report.add_note(note);
                continue;
            }

            match Self::apply_rule(df, column, rule) {
                Ok(outcome) => {
                    debug!(
                        "Column '{}': {} fill replaced {} values",
                        column, rule, outcome.filled
                    );
                    if outcome.filled > 0 {
                        report.add_step(format!(
                            "Filled {} missing values in '{}' with {} ({})",
                            outcome.filled,
                            column,
                            rule,
                            outcome.fill_value.as_deref().unwrap_or("-")
                        ));
                    }
                    let entry = report.column_mut(column);
                    entry.imputed = outcome.filled;
                    entry.rule = Some(rule.to_string());
                    entry.fill_value = outcome.fill_value;
                    for note in outcome.notes {
                        report.add_note(note);
                    }
                }
                Err(e) if e.is_column_failure() && !fail_fast => {
                    warn!("Column '{}' left with missing values: {}", column, e);
                    report.column_mut(column).rule = Some(rule.to_string());
                    report.add_failure(ColumnFailure::new(column.as_str(), &e));
                }
                Err(e) => return Err(e.with_context(format!("Imputing column '{}'", column))),
            }
        }

        Ok(())
    }

    /// Apply a single rule to a column of the frame.
    pub fn apply_rule(
        df: &mut DataFrame,
        column: &str,
        rule: &ImputationRule,
    ) -> Result<RuleOutcome> {
        let series = df
            .column(column)
            .map_err(|_| CleaningError::ColumnNotFound(column.to_string()))?
            .as_materialized_series()
            .clone();

        match rule {
            ImputationRule::FixedFill(value) => Self::fill_fixed(df, &series, value),
            ImputationRule::ModeFill => Self::fill_mode(df, &series),
            ImputationRule::MedianFill => Self::fill_median(df, &series),
            ImputationRule::GroupedMeanFill { group_column } => {
                Self::fill_grouped_mean(df, &series, group_column)
            }
        }
    }

    /// Describe `column` as it would look after applying `rule`.
    ///
    /// Works on a copy; the frame is left untouched.
    pub fn preview(df: &DataFrame, column: &str, rule: &ImputationRule) -> Result<NumericSummary> {
        let mut scratch = df.clone();
        if rule.is_numeric() {
            let numeric = Self::numeric_series(scratch.column(column)?.as_materialized_series())?;
            scratch.replace(column, numeric)?;
        }
        Self::apply_rule(&mut scratch, column, rule)?;
        Self::describe(&scratch, column)
    }

    /// Describe a column of the frame.
    pub fn describe(df: &DataFrame, column: &str) -> Result<NumericSummary> {
        let series = df
            .column(column)
            .map_err(|_| CleaningError::ColumnNotFound(column.to_string()))?
            .as_materialized_series();
        NumericSummary::describe(series).map_err(|e| CleaningError::TypeConversionFailed {
            column: column.to_string(),
            target_type: "Float64".to_string(),
            reason: e.to_string(),
        })
    }

    // ========================================================================
    // Rules
    // ========================================================================

    fn fill_fixed(df: &mut DataFrame, series: &Series, value: &FillValue) -> Result<RuleOutcome> {
        let filled = series.null_count();
        let outcome = RuleOutcome {
            filled,
            fill_value: Some(value.to_string()),
            notes: Vec::new(),
        };
        if filled == 0 {
            return Ok(outcome);
        }

        let replacement = match value.as_number() {
            Some(n) if is_numeric_dtype(series.dtype()) => {
                let numeric = fill_numeric_nulls(series, n)?;
                if n.fract() == 0.0 {
                    numeric.cast(series.dtype())?
                } else {
                    numeric
                }
            }
            _ => fill_string_nulls(series, &value.to_string())?,
        };
        df.replace(series.name().as_str(), replacement)?;

        Ok(outcome)
    }

    fn fill_mode(df: &mut DataFrame, series: &Series) -> Result<RuleOutcome> {
        let filled = series.null_count();
        if filled == 0 {
            return Ok(RuleOutcome::default());
        }

        let column = series.name().as_str();
        let (replacement, mode) = if is_numeric_dtype(series.dtype()) {
            let mode = numeric_mode(series)
                .ok_or_else(|| CleaningError::NoModeAvailable(column.to_string()))?;
            let filled = fill_numeric_nulls(series, mode)?.cast(series.dtype())?;
            (filled, mode.to_string())
        } else {
            let mode = string_mode(series)
                .ok_or_else(|| CleaningError::NoModeAvailable(column.to_string()))?;
            (fill_string_nulls(series, &mode)?, mode)
        };
        df.replace(column, replacement)?;

        Ok(RuleOutcome {
            filled,
            fill_value: Some(mode),
            notes: Vec::new(),
        })
    }

    fn fill_median(df: &mut DataFrame, series: &Series) -> Result<RuleOutcome> {
        let column = series.name().as_str();
        let numeric = Self::numeric_series(series)?;

        // Median of the observed values, taken before any fill.
        let median = numeric.median();
        let filled = numeric.null_count();
        if filled == 0 {
            Self::keep_coerced(df, series, numeric)?;
            return Ok(RuleOutcome {
                fill_value: median.map(|m| m.to_string()),
                ..RuleOutcome::default()
            });
        }

        let median = median.ok_or_else(|| CleaningError::NoValidValues(column.to_string()))?;
        df.replace(column, fill_numeric_nulls(&numeric, median)?)?;

        Ok(RuleOutcome {
            filled,
            fill_value: Some(median.to_string()),
            notes: Vec::new(),
        })
    }

    fn fill_grouped_mean(
        df: &mut DataFrame,
        series: &Series,
        group_hint: &str,
    ) -> Result<RuleOutcome> {
        let column = series.name().as_str().to_string();
        let numeric = Self::numeric_series(series)?;

        let mut notes = Vec::new();
        let group = match SchemaResolver::resolve(df, group_hint) {
            Some(group) if group != column => Some(group),
            _ => {
                let note = format!(
                    "Group column '{}' not present; '{}' filled with the overall mean",
                    group_hint, column
                );
                warn!("{}", note);
                notes.push(note);
                None
            }
        };

        let overall = numeric.mean();
        let filled = numeric.null_count();
        if filled == 0 {
            Self::keep_coerced(df, series, numeric)?;
            return Ok(RuleOutcome {
                fill_value: overall.map(|m| m.to_string()),
                notes,
                ..RuleOutcome::default()
            });
        }
        let overall = overall.ok_or_else(|| CleaningError::NoValidValues(column.clone()))?;

        let Some(group) = group else {
            df.replace(&column, fill_numeric_nulls(&numeric, overall)?)?;
            return Ok(RuleOutcome {
                filled,
                fill_value: Some(overall.to_string()),
                notes,
            });
        };

        let scratch = DataFrame::new(vec![
            numeric.into_column(),
            df.column(&group)?.clone(),
        ])?;
        let target = col(column.as_str());
        let key = col(group.as_str());

        // Rows without a group key, and groups with no observed value, take
        // the overall mean.
        let group_mean = when(key.clone().is_not_null())
            .then(target.clone().mean().over([key.clone()]))
            .otherwise(lit(overall));
        let imputed = scratch
            .clone()
            .lazy()
            .select([target
                .clone()
                .fill_null(group_mean)
                .fill_null(lit(overall))
                .alias(column.as_str())])
            .collect()?;

        let means = scratch
            .lazy()
            .filter(key.clone().is_not_null())
            .group_by([key.clone()])
            .agg([target.mean()])
            .sort_by_exprs([key], SortMultipleOptions::default())
            .collect()?;
        let description = Self::describe_group_means(&means, &group, &column)?;

        let replacement = imputed.column(&column)?.as_materialized_series().clone();
        df.replace(&column, replacement)?;

        Ok(RuleOutcome {
            filled,
            fill_value: Some(format!("{}; overall={}", description, overall)),
            notes,
        })
    }

    /// Render per-group means as `key=mean, ...`, skipping groups without
    /// an observed value.
    fn describe_group_means(means: &DataFrame, group: &str, column: &str) -> Result<String> {
        let keys = means
            .column(group)?
            .as_materialized_series()
            .cast(&DataType::String)?;
        let values = means.column(column)?.as_materialized_series().clone();

        let rendered: Vec<String> = keys
            .str()?
            .into_iter()
            .zip(values.f64()?.into_iter())
            .filter_map(|(key, mean)| Some(format!("{}={}", key?, mean?)))
            .collect();

        Ok(rendered.join(", "))
    }

    /// Store the coerced series when coercion changed the column's dtype.
    fn keep_coerced(df: &mut DataFrame, original: &Series, numeric: Series) -> Result<()> {
        if original.dtype() != numeric.dtype() {
            df.replace(original.name().as_str(), numeric)?;
        }
        Ok(())
    }

    /// The series as `Float64`, coercing text when needed.
    fn numeric_series(series: &Series) -> Result<Series> {
        if series.dtype() == &DataType::Float64 {
            return Ok(series.clone());
        }
        coerce_numeric(series)
            .map(|(numeric, _)| numeric)
            .map_err(|e| CleaningError::TypeConversionFailed {
                column: series.name().to_string(),
                target_type: "Float64".to_string(),
                reason: e.to_string(),
            })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn f64_values(df: &DataFrame, column: &str) -> Vec<Option<f64>> {
        df.column(column)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect()
    }

    fn str_values(df: &DataFrame, column: &str) -> Vec<Option<String>> {
        df.column(column)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    // ========================================================================
    // MedianFill tests
    // ========================================================================

    #[test]
    fn test_median_uses_values_before_filling() {
        let mut df = df!["edad" => [Some(10.0), None, Some(30.0), None, Some(20.0)]].unwrap();

        let outcome = Imputer::apply_rule(&mut df, "edad", &ImputationRule::MedianFill).unwrap();

        assert_eq!(outcome.filled, 2);
        assert_eq!(outcome.fill_value.as_deref(), Some("20"));
        assert_eq!(
            f64_values(&df, "edad"),
            vec![Some(10.0), Some(20.0), Some(30.0), Some(20.0), Some(20.0)]
        );
    }

    #[test]
    fn test_median_coerces_text() {
        let mut df = df!["edad" => [Some("40"), Some("20"), None]].unwrap();

        let outcome = Imputer::apply_rule(&mut df, "edad", &ImputationRule::MedianFill).unwrap();

        assert_eq!(outcome.filled, 1);
        assert_eq!(f64_values(&df, "edad"), vec![Some(40.0), Some(20.0), Some(30.0)]);
    }

    #[test]
    fn test_median_all_missing_is_no_valid_values() {
        let mut df = df!["edad" => [Option::<f64>::None, None]].unwrap();

        let err = Imputer::apply_rule(&mut df, "edad", &ImputationRule::MedianFill).unwrap_err();
        assert!(matches!(err, CleaningError::NoValidValues(ref c) if c == "edad"));
    }

    #[test]
    fn test_median_on_empty_column_fills_nothing() {
        let mut df = df!["edad" => Vec::<&str>::new()].unwrap();

        let outcome = Imputer::apply_rule(&mut df, "edad", &ImputationRule::MedianFill).unwrap();

        assert_eq!(outcome.filled, 0);
        assert_eq!(outcome.fill_value, None);
        assert_eq!(df.column("edad").unwrap().dtype(), &DataType::Float64);
    }

    // ========================================================================
    // ModeFill tests
    // ========================================================================

    #[test]
    fn test_mode_tie_goes_to_first_seen() {
        let mut df = df!["sexo" => [Some("Femenino"), Some("Masculino"), Some("Masculino"), Some("Femenino"), None]]
            .unwrap();

        let outcome = Imputer::apply_rule(&mut df, "sexo", &ImputationRule::ModeFill).unwrap();

        assert_eq!(outcome.filled, 1);
        assert_eq!(outcome.fill_value.as_deref(), Some("Femenino"));
        assert_eq!(str_values(&df, "sexo")[4].as_deref(), Some("Femenino"));
    }

    #[test]
    fn test_mode_all_missing_is_no_mode_available() {
        let mut df = df!["sexo" => [Option::<&str>::None, None]].unwrap();

        let err = Imputer::apply_rule(&mut df, "sexo", &ImputationRule::ModeFill).unwrap_err();
        assert!(matches!(err, CleaningError::NoModeAvailable(ref c) if c == "sexo"));
    }

    #[test]
    fn test_mode_keeps_numeric_dtype() {
        let mut df = df!["dia" => [Some(3i64), Some(3), Some(5), None]].unwrap();

        Imputer::apply_rule(&mut df, "dia", &ImputationRule::ModeFill).unwrap();

        let series = df.column("dia").unwrap().as_materialized_series();
        assert_eq!(series.dtype(), &DataType::Int64);
        assert_eq!(series.i64().unwrap().get(3), Some(3));
    }

    // ========================================================================
    // FixedFill tests
    // ========================================================================

    #[test]
    fn test_fixed_text_on_text_column() {
        let mut df = df!["codigo_partido" => [Some("06441"), None]].unwrap();
        let rule = ImputationRule::FixedFill(FillValue::Text("99999".into()));

        let outcome = Imputer::apply_rule(&mut df, "codigo_partido", &rule).unwrap();

        assert_eq!(outcome.filled, 1);
        assert_eq!(
            str_values(&df, "codigo_partido"),
            vec![Some("06441".to_string()), Some("99999".to_string())]
        );
    }

    #[test]
    fn test_fixed_numeric_text_on_numeric_column_stays_numeric() {
        let mut df = df!["codigo_partido" => [Some(6441i64), None]].unwrap();
        let rule = ImputationRule::FixedFill(FillValue::Text("99999".into()));

        Imputer::apply_rule(&mut df, "codigo_partido", &rule).unwrap();

        let series = df.column("codigo_partido").unwrap().as_materialized_series();
        assert_eq!(series.dtype(), &DataType::Int64);
        assert_eq!(series.i64().unwrap().get(1), Some(99999));
    }

    #[test]
    fn test_fixed_text_on_numeric_column_casts_to_text() {
        let mut df = df!["codigo_partido" => [Some(6441i64), None]].unwrap();
        let rule = ImputationRule::FixedFill(FillValue::Text("S/D".into()));

        Imputer::apply_rule(&mut df, "codigo_partido", &rule).unwrap();

        assert_eq!(
            str_values(&df, "codigo_partido"),
            vec![Some("6441".to_string()), Some("S/D".to_string())]
        );
    }

    // ========================================================================
    // GroupedMeanFill tests
    // ========================================================================

    #[test]
    fn test_grouped_mean_fills_per_group() {
        let mut df = df![
            "edad" => [Some(20.0), Some(40.0), None, Some(60.0), None],
            "sexo" => [Some("F"), Some("F"), Some("F"), Some("M"), Some("M")],
        ]
        .unwrap();
        let rule = ImputationRule::GroupedMeanFill {
            group_column: "sexo".into(),
        };

        let outcome = Imputer::apply_rule(&mut df, "edad", &rule).unwrap();

        assert_eq!(outcome.filled, 2);
        assert!(outcome.notes.is_empty());
        assert_eq!(
            f64_values(&df, "edad"),
            vec![Some(20.0), Some(40.0), Some(30.0), Some(60.0), Some(60.0)]
        );
    }

    #[test]
    fn test_grouped_mean_empty_group_uses_overall_mean() {
        // Group "X" has no observed age and the last row has no group.
        let mut df = df![
            "edad" => [Some(20.0), Some(40.0), None, None],
            "sexo" => [Some("F"), Some("M"), Some("X"), None],
        ]
        .unwrap();
        let rule = ImputationRule::GroupedMeanFill {
            group_column: "sexo".into(),
        };

        Imputer::apply_rule(&mut df, "edad", &rule).unwrap();

        assert_eq!(
            f64_values(&df, "edad"),
            vec![Some(20.0), Some(40.0), Some(30.0), Some(30.0)]
        );
    }

    #[test]
    fn test_grouped_mean_missing_group_column_falls_back() {
        let mut df = df!["edad" => [Some(10.0), None, Some(20.0)]].unwrap();
        let rule = ImputationRule::GroupedMeanFill {
            group_column: "sexo".into(),
        };

        let outcome = Imputer::apply_rule(&mut df, "edad", &rule).unwrap();

        assert_eq!(outcome.notes.len(), 1);
        assert!(outcome.notes[0].contains("sexo"));
        assert_eq!(f64_values(&df, "edad"), vec![Some(10.0), Some(15.0), Some(20.0)]);
    }

    #[test]
    fn test_grouped_mean_all_missing_is_no_valid_values() {
        let mut df = df![
            "edad" => [Option::<f64>::None, None],
            "sexo" => ["F", "M"],
        ]
        .unwrap();
        let rule = ImputationRule::GroupedMeanFill {
            group_column: "sexo".into(),
        };

        let err = Imputer::apply_rule(&mut df, "edad", &rule).unwrap_err();
        assert!(matches!(err, CleaningError::NoValidValues(_)));
    }

    #[test]
    fn test_grouped_mean_on_empty_column_fills_nothing() {
        let mut df = df![
            "edad" => Vec::<f64>::new(),
            "sexo" => Vec::<&str>::new(),
        ]
        .unwrap();
        let rule = ImputationRule::GroupedMeanFill {
            group_column: "sexo".into(),
        };

        let outcome = Imputer::apply_rule(&mut df, "edad", &rule).unwrap();
        assert_eq!(outcome.filled, 0);
    }

    #[test]
    fn test_grouped_mean_describes_group_means() {
        let mut df = df![
            "edad" => [Some(20.0), Some(40.0), None, Some(60.0), None],
            "sexo" => [Some("M"), Some("M"), Some("F"), Some("F"), None],
        ]
        .unwrap();
        let rule = ImputationRule::GroupedMeanFill {
            group_column: "sexo".into(),
        };

        let outcome = Imputer::apply_rule(&mut df, "edad", &rule).unwrap();

        assert_eq!(outcome.fill_value.as_deref(), Some("F=60, M=30; overall=40"));
        assert_eq!(
            f64_values(&df, "edad"),
            vec![Some(20.0), Some(40.0), Some(60.0), Some(60.0), Some(40.0)]
        );
    }

    // ========================================================================
    // Policy application tests
    // ========================================================================

    #[test]
    fn test_apply_records_failure_and_continues() {
        let mut df = df![
            "sexo" => [Option::<&str>::None, None],
            "partido" => [Some("Tandil"), None],
        ]
        .unwrap();
        let policy = ImputationPolicy::empty()
            .with_rule("sexo", ImputationRule::ModeFill)
            .with_rule("partido", ImputationRule::ModeFill);
        let mut report = CleaningReport::new();

        Imputer::new(&policy).apply(&mut df, &mut report, false).unwrap();

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].column, "sexo");
        assert_eq!(report.failures[0].code, "NO_MODE_AVAILABLE");
        assert_eq!(df.column("sexo").unwrap().null_count(), 2);
        assert_eq!(df.column("partido").unwrap().null_count(), 0);
        assert_eq!(report.column("partido").unwrap().imputed, 1);
    }

    #[test]
    fn test_apply_fail_fast_returns_error() {
        let mut df = df!["sexo" => [Option::<&str>::None]].unwrap();
        let policy = ImputationPolicy::empty().with_rule("sexo", ImputationRule::ModeFill);
        let mut report = CleaningReport::new();

        let err = Imputer::new(&policy)
            .apply(&mut df, &mut report, true)
            .unwrap_err();
        assert_eq!(err.error_code(), "NO_MODE_AVAILABLE");
    }

    #[test]
    fn test_apply_skips_absent_columns_with_note() {
        let mut df = df!["partido" => ["Tandil"]].unwrap();
        let policy = ImputationPolicy::default();
        let mut report = CleaningReport::new();

        Imputer::new(&policy).apply(&mut df, &mut report, false).unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(report.notes.len(), policy.len() - 1);
        assert!(report.notes.iter().any(|n| n.contains("'edad'")));
    }

    #[test]
    fn test_preview_leaves_frame_untouched() {
        let df = df![
            "edad" => [Some(10.0), None, Some(30.0)],
            "sexo" => ["F", "F", "M"],
        ]
        .unwrap();

        let summary = Imputer::preview(&df, "edad", &ImputationRule::MedianFill).unwrap();

        assert_eq!(summary.count, 3);
        assert_eq!(summary.mean, Some(20.0));
        assert_eq!(df.column("edad").unwrap().null_count(), 1);
    }
}
