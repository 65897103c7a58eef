//! Imputation module for handling missing values.
//!
//! This module provides:
//! - Imputation rules and the per-column policy
//! - Statistical fills (fixed value, mode, median, grouped mean)

mod policy;
mod statistical;

pub use policy::{ColumnRule, FillValue, ImputationPolicy, ImputationRule, UNKNOWN_DISTRICT_CODE};
pub use statistical::{Imputer, RuleOutcome};
