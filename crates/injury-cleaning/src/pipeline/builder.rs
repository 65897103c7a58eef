//! Main cleaning pipeline module.
//!
//! This module provides the core `TableCleaner` struct and builder for
//! orchestrating the cleaning workflow.

use crate::cleaner::{ColumnNameNormalizer, Deduplicator, NullTokenNormalizer, coerce_numeric};
use crate::config::CleaningConfig;
use crate::error::{CleaningError, Result, ResultExt};
use crate::imputers::Imputer;
use crate::metrics::{DerivedMetrics, MonthlySeries};
use crate::schema::SchemaResolver;
use crate::types::{CleaningOutcome, CleaningReport, NamedSummary, StrategyPreview};
use polars::prelude::*;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The main cleaning pipeline.
///
/// Use [`TableCleaner::builder()`] to create a new cleaner with custom
/// configuration.
///
/// # Example
///
/// ```rust,ignore
/// use injury_cleaning::{CleaningConfig, ImputationPolicy, TableCleaner};
///
/// let outcome = TableCleaner::builder()
///     .config(
///         CleaningConfig::builder()
///             .policy(ImputationPolicy::grouped_age())
///             .build()?,
///     )
///     .build()?
///     .clean(dataframe)?;
///
/// println!("{}", outcome.report.to_json()?);
/// ```
pub struct TableCleaner {
    config: CleaningConfig,
}

// Cleaners are built on one thread and run on a worker.
static_assertions::assert_impl_all!(TableCleaner: Send, Sync);

impl TableCleaner {
    /// Create a new cleaner builder.
    pub fn builder() -> TableCleanerBuilder {
        TableCleanerBuilder::default()
    }

    /// The configuration this cleaner runs with.
    pub fn config(&self) -> &CleaningConfig {
        &self.config
    }

    /// Clean a table.
    ///
    /// Returns the cleaned table, the report and the monthly series.
    ///
    /// # Errors
    ///
    /// With `fail_fast` set, the first column that cannot be imputed is
    /// returned as an error. Polars failures are always returned.
    pub fn clean(&self, df: DataFrame) -> Result<CleaningOutcome> {
        match self.clean_internal(df) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Cleaning error: {}", e);
                Err(e)
            }
        }
    }

    fn clean_internal(&self, df: DataFrame) -> Result<CleaningOutcome> {
        let start_time = Instant::now();
        let config = &self.config;

        info!(
            "Starting cleaning of {} rows x {} columns...",
            df.height(),
            df.width()
        );

        let mut report = CleaningReport::new();
        report.rows_before = df.height();

        // Step 1: Header normalization
        info!("Step 1: Normalizing column names...");
        let (df, renames) = ColumnNameNormalizer::new(&config.header_map)
            .apply(df)
            .map_err(|e| CleaningError::CleaningFailed(e.to_string()))?;
        report.processing_steps.extend(renames);

        // Step 2: Raw missing counts
        for (name, missing) in missing_counts(&df) {
            report.column_mut(&name).raw_missing = missing;
        }

        // Step 3: Null tokens
        info!("Step 3: Normalizing null tokens...");
        let (mut df, replaced) = NullTokenNormalizer::new(&config.null_tokens)
            .apply(df)
            .map_err(|e| CleaningError::CleaningFailed(e.to_string()))?;
        report.add_step(format!("Replaced {} null tokens with missing values", replaced));
        for (name, missing) in missing_counts(&df) {
            report.column_mut(&name).after_token_missing = missing;
        }

        // Step 4: Numeric coercion of median / grouped-mean columns
        info!("Step 4: Coercing numeric columns...");
        let numeric_columns = self.present_numeric_columns(&df);
        for column in &numeric_columns {
            self.coerce_column(&mut df, column, &mut report)?;
        }

        // Step 5: Statistics before imputation and strategy previews
        info!("Step 5: Describing numeric columns...");
        report.numeric_before = describe_columns(&df, &numeric_columns)?;
        report.strategy_previews = self.strategy_previews(&df, &mut report)?;

        // Step 6: Imputation
        info!("Step 6: Imputing missing values...");
        Imputer::new(&config.policy).apply(&mut df, &mut report, config.fail_fast)?;

        // Step 7: Derived columns
        if config.derive_columns {
            info!("Step 7: Deriving hour and month columns...");
            DerivedMetrics::new(&config.month_map, &config.month_column, &config.hour_column)
                .add_derived_columns(&mut df, &mut report)?;
        } else {
            info!("Step 7: Skipping derived columns (disabled)");
        }

        // Step 8: Duplicates
        let df = if config.remove_duplicates {
            info!("Step 8: Removing exact duplicate rows...");
            let (deduped, removed) = Deduplicator::remove_exact_duplicates(df)
                .map_err(|e| CleaningError::CleaningFailed(e.to_string()))?;
            report.duplicates_removed = removed;
            report.add_step(format!("Removed {} exact duplicate rows", removed));
            deduped
        } else {
            info!("Step 8: Skipping duplicate removal (disabled)");
            df
        };
        self.key_duplicates(&df, &mut report)?;

        // Step 9: Post-imputation counts
        for (name, missing) in missing_counts(&df) {
            report.column_mut(&name).after_imputation_missing = missing;
        }
        report.numeric_after = describe_columns(&df, &numeric_columns)?;

        // Step 10: Monthly series
        info!("Step 10: Counting records per month...");
        let monthly = self.monthly_series(&df, &mut report)?;

        report.rows_after = df.height();

        info!(
            "Cleaning complete in {}ms: {} -> {} rows, {} values imputed, {} column failures",
            start_time.elapsed().as_millis(),
            report.rows_before,
            report.rows_after,
            report.total_imputed(),
            report.failures.len()
        );

        Ok(CleaningOutcome {
            data: df,
            report,
            monthly,
        })
    }

    /// Policy columns with a numeric rule that exist in the frame.
    fn present_numeric_columns(&self, df: &DataFrame) -> Vec<String> {
        self.config
            .policy
            .numeric_columns()
            .into_iter()
            .filter(|c| df.column(c).is_ok())
            .map(str::to_string)
            .collect()
    }

    fn coerce_column(
        &self,
        df: &mut DataFrame,
        column: &str,
        report: &mut CleaningReport,
    ) -> Result<()> {
        let series = df
            .column(column)
            .context(format!("Coercing column '{}'", column))?
            .as_materialized_series();
        let (numeric, stats) =
            coerce_numeric(series).map_err(|e| CleaningError::TypeConversionFailed {
                column: column.to_string(),
                target_type: "Float64".to_string(),
                reason: e.to_string(),
            })?;
        df.replace(column, numeric)?;

        debug!(
            "'{}': {} values converted, {} parse failures",
            column, stats.converted, stats.parse_failures
        );
        report.column_mut(column).parse_failures = stats.parse_failures;
        if stats.parse_failures > 0 {
            report.add_step(format!(
                "Set {} unparsable values in '{}' to missing",
                stats.parse_failures, column
            ));
        }

        Ok(())
    }

    fn strategy_previews(
        &self,
        df: &DataFrame,
        report: &mut CleaningReport,
    ) -> Result<Vec<StrategyPreview>> {
        let mut previews = Vec::with_capacity(self.config.strategy_previews.len());

        for preview in &self.config.strategy_previews {
            let Some(column) = SchemaResolver::resolve(df, &preview.column) else {
                let note = format!(
                    "Column '{}' not present; {} preview skipped",
                    preview.column, preview.rule
                );
                warn!("{}", note);
                report.add_note(note);
                continue;
            };

            match Imputer::preview(df, &column, &preview.rule) {
                Ok(summary) => previews.push(StrategyPreview {
                    column,
                    rule: preview.rule.to_string(),
                    summary,
                }),
                Err(e) if e.is_column_failure() => {
                    let note = format!("{} preview of '{}' skipped: {}", preview.rule, column, e);
                    warn!("{}", note);
                    report.add_note(note);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(previews)
    }

    fn key_duplicates(&self, df: &DataFrame, report: &mut CleaningReport) -> Result<()> {
        let Some(hint) = &self.config.duplicate_key_column else {
            return Ok(());
        };

        match SchemaResolver::resolve(df, hint) {
            Some(column) => {
                if column != *hint {
                    let note = format!(
                        "Column '{}' not present; key duplicates counted on '{}'",
                        hint, column
                    );
                    warn!("{}", note);
                    report.add_note(note);
                }
                let summary = Deduplicator::key_duplicates(df, &column)
                    .map_err(|e| CleaningError::CleaningFailed(e.to_string()))?;
                if let Some(summary) = &summary {
                    debug!(
                        "'{}': {} distinct values, {} repeated rows",
                        column, summary.distinct_values, summary.repeated_rows
                    );
                }
                report.key_duplicates = summary;
            }
            None => {
                let note = format!("Column '{}' not present; key duplicates not counted", hint);
                warn!("{}", note);
                report.add_note(note);
            }
        }

        Ok(())
    }

    fn monthly_series(
        &self,
        df: &DataFrame,
        report: &mut CleaningReport,
    ) -> Result<Option<MonthlySeries>> {
        let config = &self.config;
        if SchemaResolver::resolve(df, &config.month_column).is_none() {
            let note = format!(
                "Column '{}' not present; monthly series not computed",
                config.month_column
            );
            warn!("{}", note);
            report.add_note(note);
            return Ok(None);
        }

        let metrics =
            DerivedMetrics::new(&config.month_map, &config.month_column, &config.hour_column);
        let series = metrics.monthly_counts(df)?;
        report.add_step(format!(
            "Counted records for {} months ({} records without a month)",
            series.len(),
            series.unmapped_records
        ));

        Ok(Some(series))
    }
}

/// Null count of every column, in frame order.
fn missing_counts(df: &DataFrame) -> Vec<(String, usize)> {
    df.get_columns()
        .iter()
        .map(|c| (c.name().to_string(), c.null_count()))
        .collect()
}

fn describe_columns(df: &DataFrame, columns: &[String]) -> Result<Vec<NamedSummary>> {
    columns
        .iter()
        .map(|column| {
            Ok(NamedSummary {
                column: column.clone(),
                summary: Imputer::describe(df, column)?,
            })
        })
        .collect()
}

/// Builder for creating a [`TableCleaner`] instance.
///
/// Use [`TableCleaner::builder()`] to get started.
#[derive(Default)]
pub struct TableCleanerBuilder {
    config: Option<CleaningConfig>,
}

static_assertions::assert_impl_all!(TableCleanerBuilder: Send);

impl TableCleanerBuilder {
    /// Set the cleaning configuration.
    pub fn config(mut self, config: CleaningConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the cleaner.
    ///
    /// # Errors
    ///
    /// Returns [`CleaningError::InvalidConfig`] if the configuration does
    /// not validate.
    pub fn build(self) -> Result<TableCleaner> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(TableCleaner { config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imputers::{ImputationPolicy, ImputationRule};
    use pretty_assertions::assert_eq;

    fn raw_frame() -> DataFrame {
        df![
            "PARTIDO" => [Some("La Plata"), Some("Tandil"), Some("La Plata"), Some("La Plata"), Some("Desconocido")],
            "MES" => [Some("enero"), Some("enero"), Some("febrero"), Some("enero"), Some("marzo")],
            "HORA" => [Some("08:15"), Some("-"), Some("22:40"), Some("08:15"), Some("13:05")],
            "EDAD" => [Some("30"), Some("sin dato"), Some("50"), Some("30"), None],
            "SEXO" => [Some("Masculino"), Some("Femenino"), Some("Masculino"), Some("Masculino"), Some("Sin determinar")],
        ]
        .unwrap()
    }

    #[test]
    fn test_builder_default_config() {
        let cleaner = TableCleaner::builder().build().unwrap();
        assert_eq!(cleaner.config(), &CleaningConfig::default());
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let mut config = CleaningConfig::default();
        config.month_column = String::new();

        let err = TableCleaner::builder().config(config).build().err().unwrap();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_clean_counts_each_stage() {
        let outcome = TableCleaner::builder()
            .build()
            .unwrap()
            .clean(raw_frame())
            .unwrap();
        let report = &outcome.report;

        let edad = report.column("edad").unwrap();
        assert_eq!(edad.raw_missing, 1);
        assert_eq!(edad.after_token_missing, 1);
        assert_eq!(edad.parse_failures, 1);
        assert_eq!(edad.imputed, 2);
        assert_eq!(edad.after_imputation_missing, 0);
        assert_eq!(edad.rule.as_deref(), Some("median"));

        let sexo = report.column("sexo").unwrap();
        assert_eq!(sexo.raw_missing, 0);
        assert_eq!(sexo.after_token_missing, 1);
        assert_eq!(sexo.imputed, 1);

        // Rows 0 and 3 are identical once cleaned.
        assert_eq!(report.duplicates_removed, 1);
        assert_eq!(report.rows_before, 5);
        assert_eq!(report.rows_after, 4);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_clean_median_from_observed_values() {
        let outcome = TableCleaner::builder()
            .build()
            .unwrap()
            .clean(raw_frame())
            .unwrap();

        let before = outcome.report.summary_before("edad").unwrap();
        assert_eq!(before.count, 3);
        assert_eq!(before.median, Some(30.0));

        let edad: Vec<Option<f64>> = outcome
            .data
            .column("edad")
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(edad, vec![Some(30.0), Some(30.0), Some(50.0), Some(30.0)]);
    }

    #[test]
    fn test_clean_records_previews_without_applying() {
        let outcome = TableCleaner::builder()
            .build()
            .unwrap()
            .clean(raw_frame())
            .unwrap();

        let previews = &outcome.report.strategy_previews;
        assert_eq!(previews.len(), 2);
        assert_eq!(previews[0].rule, "median");
        assert_eq!(previews[1].rule, "grouped_mean(sexo)");
        assert_eq!(outcome.report.column("edad").unwrap().rule.as_deref(), Some("median"));
    }

    #[test]
    fn test_clean_fail_fast_on_all_missing_column() {
        let df = df![
            "partido" => [Option::<&str>::None, None],
            "edad" => [Some(1.0), Some(2.0)],
        ]
        .unwrap();
        let config = CleaningConfig::builder()
            .policy(ImputationPolicy::empty().with_rule("partido", ImputationRule::ModeFill))
            .fail_fast(true)
            .build()
            .unwrap();

        let err = TableCleaner::builder()
            .config(config)
            .build()
            .unwrap()
            .clean(df)
            .unwrap_err();
        assert_eq!(err.error_code(), "NO_MODE_AVAILABLE");
        assert_eq!(err.column(), Some("partido"));
    }

    #[test]
    fn test_clean_notes_substring_key_column() {
        let df = df![
            "codigo_partido" => ["06441", "06441", "06357"],
            "edad" => [30.0, 40.0, 50.0],
        ]
        .unwrap();

        let outcome = TableCleaner::builder().build().unwrap().clean(df).unwrap();
        let report = &outcome.report;

        let summary = report.key_duplicates.as_ref().unwrap();
        assert_eq!(summary.column, "codigo_partido");
        assert_eq!(summary.repeated_rows, 1);
        assert!(
            report
                .notes
                .iter()
                .any(|n| n.contains("key duplicates counted on 'codigo_partido'"))
        );
    }

    #[test]
    fn test_clean_empty_frame_records_no_failures() {
        let df = df![
            "partido" => Vec::<&str>::new(),
            "mes" => Vec::<&str>::new(),
            "hora" => Vec::<&str>::new(),
            "edad" => Vec::<f64>::new(),
            "sexo" => Vec::<&str>::new(),
        ]
        .unwrap();

        let outcome = TableCleaner::builder().build().unwrap().clean(df).unwrap();
        let report = &outcome.report;

        assert!(report.failures.is_empty(), "{:?}", report.failures);
        assert_eq!(report.rows_before, 0);
        assert_eq!(report.rows_after, 0);
        assert_eq!(report.column("edad").unwrap().imputed, 0);
        assert!(outcome.monthly.unwrap().is_empty());
    }

    #[test]
    fn test_clean_monthly_series() {
        let outcome = TableCleaner::builder()
            .build()
            .unwrap()
            .clean(raw_frame())
            .unwrap();

        let monthly = outcome.monthly.unwrap();
        let counts: Vec<(u32, usize)> = monthly.entries.iter().map(|e| (e.month, e.count)).collect();
        assert_eq!(counts, vec![(1, 2), (2, 1), (3, 1)]);
    }
}
