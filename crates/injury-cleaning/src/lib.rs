//! Traffic-Injury Table Cleaning Library
//!
//! Turns a raw table of traffic-injury records into an analysis-ready table,
//! built with Rust and Polars.
//!
//! # Overview
//!
//! A cleaning run takes a [`polars::prelude::DataFrame`] produced by any CSV
//! loader and applies, in order:
//!
//! - **Header normalization**: source headers map to canonical snake_case names
//! - **Null tokens**: literal placeholders (`"Desconocido"`, `"N/A"`, `"-"`, ...) become nulls
//! - **Type coercion**: age to numbers, `HH:MM` times to hours, month names to indices
//! - **Imputation**: fixed, mode, median or grouped-mean fill per column
//! - **Deduplication**: exact duplicate rows removed, first occurrence kept
//! - **Monthly series**: records per month with month-over-month percentage change
//!
//! Every stage is counted in a [`CleaningReport`] that serializes to JSON.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use injury_cleaning::TableCleaner;
//! use polars::prelude::*;
//!
//! let df = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .with_parse_options(CsvParseOptions::default().with_separator(b';'))
//!     .try_into_reader_with_file_path(Some("lesionados.csv".into()))?
//!     .finish()?;
//!
//! let outcome = TableCleaner::builder().build()?.clean(df)?;
//!
//! println!("{} rows, {} duplicates removed", outcome.report.rows_after, outcome.report.duplicates_removed);
//! if let Some(monthly) = &outcome.monthly {
//!     println!("{}", monthly.to_dataframe()?);
//! }
//! ```
//!
//! # Configuration
//!
//! Use [`CleaningConfig`] to customize cleaning behavior:
//!
//! ```rust,ignore
//! use injury_cleaning::{CleaningConfig, ImputationPolicy, ImputationRule, FillValue};
//!
//! let policy = ImputationPolicy::grouped_age()
//!     .with_rule("partido", ImputationRule::FixedFill(FillValue::Text("Sin partido".into())));
//!
//! let config = CleaningConfig::builder()
//!     .policy(policy)
//!     .remove_duplicates(true)
//!     .fail_fast(false)
//!     .build()?;
//! ```
//!
//! # Logging
//!
//! Stages log through `tracing`. The library installs no subscriber.

pub mod cleaner;
pub mod config;
pub mod error;
pub mod imputers;
pub mod metrics;
pub mod pipeline;
pub mod schema;
pub mod statistics;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{
    CoercionStats, ColumnNameNormalizer, Deduplicator, HeaderMap, KeyDuplicateSummary, MonthMap,
    NullTokenNormalizer, NullTokens, coerce_numeric, parse_hour,
};
pub use config::{CleaningConfig, CleaningConfigBuilder, ConfigValidationError};
pub use error::{CleaningError, Result as CleaningResult, ResultExt};
pub use imputers::{ColumnRule, FillValue, ImputationPolicy, ImputationRule, Imputer, RuleOutcome};
pub use metrics::{DerivedMetrics, MonthlyCount, MonthlySeries, pct_change};
pub use pipeline::{TableCleaner, TableCleanerBuilder};
pub use schema::SchemaResolver;
pub use statistics::NumericSummary;
pub use types::{
    CleaningOutcome, CleaningReport, ColumnFailure, ColumnReport, NamedSummary, StrategyPreview,
};
