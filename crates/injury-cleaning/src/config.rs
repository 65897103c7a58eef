//! Configuration types for the cleaning pipeline.
//!
//! This module provides configuration options using the builder pattern
//! for flexible and ergonomic pipeline setup. Every lookup table (headers,
//! null tokens, month names) and the imputation policy are plain data, so a
//! whole configuration can be loaded from JSON.

use crate::cleaner::{HeaderMap, MonthMap, NullTokens};
use crate::error::CleaningError;
use crate::imputers::{ColumnRule, ImputationPolicy, ImputationRule};
use crate::schema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Configuration for the cleaning pipeline.
///
/// Use [`CleaningConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use injury_cleaning::{CleaningConfig, ImputationPolicy};
///
/// let config = CleaningConfig::builder()
///     .policy(ImputationPolicy::grouped_age())
///     .remove_duplicates(false)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Source header to canonical column name.
    pub header_map: HeaderMap,

    /// Cell values treated as missing in text columns.
    pub null_tokens: NullTokens,

    /// Month label to month index.
    pub month_map: MonthMap,

    /// Imputation rule per column.
    /// Default: [`ImputationPolicy::default()`]
    pub policy: ImputationPolicy,

    /// Whether to remove rows equal to an earlier row.
    /// Default: true
    pub remove_duplicates: bool,

    /// Column whose repeated values are reported (never removed).
    /// Default: "partido"
    pub duplicate_key_column: Option<String>,

    /// Column holding month labels, resolved by name or substring.
    /// Default: "mes"
    pub month_column: String,

    /// Column holding `HH:MM` times, resolved by name or substring.
    /// Default: "hora"
    pub hour_column: String,

    /// Whether to add `numeric_hour` and `numeric_month`.
    /// Default: true
    pub derive_columns: bool,

    /// Alternative rules to describe side by side without applying them.
    /// Default: median and grouped-by-sex mean of `edad`
    pub strategy_previews: Vec<ColumnRule>,

    /// Return the first column failure as an error instead of recording it.
    /// Default: false
    pub fail_fast: bool,
}

fn default_previews() -> Vec<ColumnRule> {
    vec![
        ColumnRule::new(schema::EDAD, ImputationRule::MedianFill),
        ColumnRule::new(
            schema::EDAD,
            ImputationRule::GroupedMeanFill {
                group_column: schema::SEXO.to_string(),
            },
        ),
    ]
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            header_map: HeaderMap::default(),
            null_tokens: NullTokens::default(),
            month_map: MonthMap::default(),
            policy: ImputationPolicy::default(),
            remove_duplicates: true,
            duplicate_key_column: Some(schema::PARTIDO.to_string()),
            month_column: schema::MES.to_string(),
            hour_column: schema::HORA.to_string(),
            derive_columns: true,
            strategy_previews: default_previews(),
            fail_fast: false,
        }
    }
}

impl CleaningConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CleaningConfigBuilder {
        CleaningConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, value) in [
            ("month_column", self.month_column.as_str()),
            ("hour_column", self.hour_column.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::EmptyColumnName(field.to_string()));
            }
        }
        if let Some(key) = &self.duplicate_key_column
            && key.trim().is_empty()
        {
            return Err(ConfigValidationError::EmptyColumnName(
                "duplicate_key_column".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for ColumnRule { column, rule } in self.policy.rules() {
            if column.trim().is_empty() {
                return Err(ConfigValidationError::EmptyColumnName("policy".to_string()));
            }
            if !seen.insert(column.as_str()) {
                return Err(ConfigValidationError::DuplicateRule(column.clone()));
            }
            self.validate_rule(column, rule)?;
        }

        for ColumnRule { column, rule } in &self.strategy_previews {
            if column.trim().is_empty() {
                return Err(ConfigValidationError::EmptyColumnName(
                    "strategy_previews".to_string(),
                ));
            }
            if !rule.is_numeric() {
                return Err(ConfigValidationError::NonNumericPreview {
                    column: column.clone(),
                    rule: rule.to_string(),
                });
            }
            self.validate_rule(column, rule)?;
        }

        if let Some(index) = self.month_map.invalid_indices().first() {
            return Err(ConfigValidationError::InvalidMonthIndex(*index));
        }

        Ok(())
    }

    fn validate_rule(&self, column: &str, rule: &ImputationRule) -> Result<(), ConfigValidationError> {
        match rule {
            ImputationRule::FixedFill(value) if self.null_tokens.is_null_token(&value.to_string()) => {
                Err(ConfigValidationError::FillValueIsNullToken {
                    column: column.to_string(),
                    value: value.to_string(),
                })
            }
            ImputationRule::GroupedMeanFill { group_column } if group_column.trim().is_empty() => {
                Err(ConfigValidationError::EmptyColumnName("group_column".to_string()))
            }
            ImputationRule::GroupedMeanFill { group_column } if group_column == column => {
                Err(ConfigValidationError::SelfGrouping(column.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Empty column name for '{0}'")]
    EmptyColumnName(String),

    #[error("Column '{0}' has more than one imputation rule")]
    DuplicateRule(String),

    #[error("Fill value '{value}' for column '{column}' is itself a null token")]
    FillValueIsNullToken { column: String, value: String },

    #[error("Column '{0}' cannot be grouped by itself")]
    SelfGrouping(String),

    #[error("Preview of column '{column}' uses non-numeric rule '{rule}'")]
    NonNumericPreview { column: String, rule: String },

    #[error("Invalid month index: {0} (must be between 1 and 12)")]
    InvalidMonthIndex(u32),
}

impl From<ConfigValidationError> for CleaningError {
    fn from(err: ConfigValidationError) -> Self {
        CleaningError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`CleaningConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct CleaningConfigBuilder {
    header_map: Option<HeaderMap>,
    null_tokens: Option<NullTokens>,
    month_map: Option<MonthMap>,
    policy: Option<ImputationPolicy>,
    remove_duplicates: Option<bool>,
    duplicate_key_column: Option<Option<String>>,
    month_column: Option<String>,
    hour_column: Option<String>,
    derive_columns: Option<bool>,
    strategy_previews: Option<Vec<ColumnRule>>,
    fail_fast: Option<bool>,
}

impl CleaningConfigBuilder {
    pub fn header_map(mut self, headers: HeaderMap) -> Self {
        self.header_map = Some(headers);
        self
    }

    pub fn null_tokens(mut self, tokens: NullTokens) -> Self {
        self.null_tokens = Some(tokens);
        self
    }

    pub fn month_map(mut self, months: MonthMap) -> Self {
        self.month_map = Some(months);
        self
    }

    /// Set the imputation policy.
    pub fn policy(mut self, policy: ImputationPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Set whether exact duplicate rows are removed.
    pub fn remove_duplicates(mut self, remove: bool) -> Self {
        self.remove_duplicates = Some(remove);
        self
    }

    /// Set the column used for the key-duplicate diagnostic.
    ///
    /// `None` disables the diagnostic.
    pub fn duplicate_key_column(mut self, column: Option<String>) -> Self {
        self.duplicate_key_column = Some(column);
        self
    }

    pub fn month_column(mut self, column: impl Into<String>) -> Self {
        self.month_column = Some(column.into());
        self
    }

    pub fn hour_column(mut self, column: impl Into<String>) -> Self {
        self.hour_column = Some(column.into());
        self
    }

    /// Set whether derived hour/month columns are added.
    pub fn derive_columns(mut self, derive: bool) -> Self {
        self.derive_columns = Some(derive);
        self
    }

    /// Replace the strategy previews.
    pub fn strategy_previews(mut self, previews: Vec<ColumnRule>) -> Self {
        self.strategy_previews = Some(previews);
        self
    }

    /// Stop at the first column that cannot be imputed.
    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = Some(fail_fast);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `CleaningConfig` or an error if validation fails.
    pub fn build(self) -> Result<CleaningConfig, ConfigValidationError> {
        let config = CleaningConfig {
            header_map: self.header_map.unwrap_or_default(),
            null_tokens: self.null_tokens.unwrap_or_default(),
            month_map: self.month_map.unwrap_or_default(),
            policy: self.policy.unwrap_or_default(),
            remove_duplicates: self.remove_duplicates.unwrap_or(true),
            duplicate_key_column: self
                .duplicate_key_column
                .unwrap_or_else(|| Some(schema::PARTIDO.to_string())),
            month_column: self
                .month_column
                .unwrap_or_else(|| schema::MES.to_string()),
            hour_column: self
                .hour_column
                .unwrap_or_else(|| schema::HORA.to_string()),
            derive_columns: self.derive_columns.unwrap_or(true),
            strategy_previews: self.strategy_previews.unwrap_or_else(default_previews),
            fail_fast: self.fail_fast.unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }
}
