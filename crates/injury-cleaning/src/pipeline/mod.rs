//! Pipeline module.
//!
//! This module provides the table cleaner that runs every cleaning stage in
//! order.

mod builder;

pub use builder::{TableCleaner, TableCleanerBuilder};
