//! Imputation rules and the per-column policy.

use crate::schema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal used by [`ImputationRule::FixedFill`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FillValue {
    Number(f64),
    Text(String),
}

impl FillValue {
    /// The value as a number, if it is one or parses as one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FillValue::Number(n) => Some(*n),
            FillValue::Text(t) => crate::utils::parse_numeric_string(t),
        }
    }
}

impl fmt::Display for FillValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillValue::Number(n) => write!(f, "{}", n),
            FillValue::Text(t) => write!(f, "{}", t),
        }
    }
}

/// How missing values of one column are replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationRule {
    /// Median of the column's numeric values, computed before filling.
    MedianFill,
    /// Most frequent value; ties go to the first one seen.
    ModeFill,
    /// A literal constant.
    FixedFill(FillValue),
    /// Mean of the column within each group of `group_column`.
    GroupedMeanFill { group_column: String },
}

impl ImputationRule {
    /// Application phase: fixed values, then modes, then numeric statistics.
    pub fn phase(&self) -> u8 {
        match self {
            ImputationRule::FixedFill(_) => 0,
            ImputationRule::ModeFill => 1,
            ImputationRule::MedianFill | ImputationRule::GroupedMeanFill { .. } => 2,
        }
    }

    /// Whether the rule needs the column coerced to numeric.
    pub fn is_numeric(&self) -> bool {
        self.phase() == 2
    }
}

impl fmt::Display for ImputationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImputationRule::MedianFill => write!(f, "median"),
            ImputationRule::ModeFill => write!(f, "mode"),
            ImputationRule::FixedFill(value) => write!(f, "fixed({})", value),
            ImputationRule::GroupedMeanFill { group_column } => {
                write!(f, "grouped_mean({})", group_column)
            }
        }
    }
}

/// A rule bound to a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub column: String,
    pub rule: ImputationRule,
}

impl ColumnRule {
    pub fn new(column: impl Into<String>, rule: ImputationRule) -> Self {
        Self {
            column: column.into(),
            rule,
        }
    }
}

/// Code used for records whose district code is missing.
pub const UNKNOWN_DISTRICT_CODE: &str = "99999";

/// Ordered set of column rules, one per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationPolicy {
    rules: Vec<ColumnRule>,
}

impl Default for ImputationPolicy {
    fn default() -> Self {
        let mut rules = vec![ColumnRule::new(
            schema::CODIGO_PARTIDO,
            ImputationRule::FixedFill(FillValue::Text(UNKNOWN_DISTRICT_CODE.to_string())),
        )];
        for column in [
            schema::PARTIDO,
            schema::FECHA,
            schema::MES,
            schema::DIA_SEMANA,
            schema::DIA_SEMANA_AGRUPADO,
            schema::HORA,
            schema::DIURNO_NOCTURNO,
            schema::EDAD_AGRUPADA,
            schema::SEXO,
        ] {
            rules.push(ColumnRule::new(column, ImputationRule::ModeFill));
        }
        rules.push(ColumnRule::new(schema::EDAD, ImputationRule::MedianFill));

        Self { rules }
    }
}

impl ImputationPolicy {
    /// An empty policy.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// The default policy with age imputed by the mean of its sex group.
    pub fn grouped_age() -> Self {
        Self::default().with_rule(
            schema::EDAD,
            ImputationRule::GroupedMeanFill {
                group_column: schema::SEXO.to_string(),
            },
        )
    }

    /// Set the rule of a column, replacing any previous rule for it.
    pub fn with_rule(mut self, column: impl Into<String>, rule: ImputationRule) -> Self {
        let column = column.into();
        match self.rules.iter_mut().find(|r| r.column == column) {
            Some(existing) => existing.rule = rule,
            None => self.rules.push(ColumnRule { column, rule }),
        }
        self
    }

    /// Rule declared for a column.
    pub fn rule_for(&self, column: &str) -> Option<&ImputationRule> {
        self.rules
            .iter()
            .find(|r| r.column == column)
            .map(|r| &r.rule)
    }

    /// Rules in declared order.
    pub fn rules(&self) -> &[ColumnRule] {
        &self.rules
    }

    /// Rules in application order: by phase, declared order within a phase.
    pub fn ordered(&self) -> Vec<&ColumnRule> {
        let mut ordered: Vec<&ColumnRule> = self.rules.iter().collect();
        ordered.sort_by_key(|r| r.rule.phase());
        ordered
    }

    /// Columns whose rule needs numeric values.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|r| r.rule.is_numeric())
            .map(|r| r.column.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
