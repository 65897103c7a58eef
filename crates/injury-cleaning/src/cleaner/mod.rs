//! Column-wise cleaning stages.
//!
//! This module provides:
//! - Header normalization to canonical column names
//! - Null-token normalization for text columns
//! - Type coercion for age, hour and month columns
//! - Exact-duplicate removal

mod converters;
mod dedup;
mod headers;
mod sanitizers;

pub use converters::{CoercionStats, MonthMap, coerce_numeric, hour_series, parse_hour};
pub use dedup::{Deduplicator, KeyDuplicateSummary};
pub use headers::{ColumnNameNormalizer, HeaderMap};
pub use sanitizers::{NullTokenNormalizer, NullTokens};
