//! Column names of the injury dataset and column discovery helpers.

use polars::prelude::*;
use tracing::debug;

/// INDEC district code.
pub const CODIGO_PARTIDO: &str = "codigo_partido";
/// District name.
pub const PARTIDO: &str = "partido";
/// Date of the event.
pub const FECHA: &str = "fecha";
/// Month name, in Spanish.
pub const MES: &str = "mes";
/// Weekday name.
pub const DIA_SEMANA: &str = "dia_semana";
/// Weekday group (weekday / weekend).
pub const DIA_SEMANA_AGRUPADO: &str = "dia_semana_agrupado";
/// Hour as an `HH:MM` string.
pub const HORA: &str = "hora";
/// Day / night flag.
pub const DIURNO_NOCTURNO: &str = "diurno_nocturno";
/// Age of the injured person.
pub const EDAD: &str = "edad";
/// Age bracket label.
pub const EDAD_AGRUPADA: &str = "edad_agrupada";
/// Sex label.
pub const SEXO: &str = "sexo";

/// Hour of day extracted from [`HORA`].
pub const NUMERIC_HOUR: &str = "numeric_hour";
/// Month index extracted from [`MES`].
pub const NUMERIC_MONTH: &str = "numeric_month";

/// Declared columns, in declared order.
pub const DECLARED_COLUMNS: [&str; 11] = [
    CODIGO_PARTIDO,
    PARTIDO,
    FECHA,
    MES,
    DIA_SEMANA,
    DIA_SEMANA_AGRUPADO,
    HORA,
    DIURNO_NOCTURNO,
    EDAD,
    EDAD_AGRUPADA,
    SEXO,
];

/// Columns added by the pipeline.
pub const DERIVED_COLUMNS: [&str; 2] = [NUMERIC_HOUR, NUMERIC_MONTH];

/// Resolves loosely named columns against a frame.
pub struct SchemaResolver;

impl SchemaResolver {
    /// Find the column a hint refers to.
    ///
    /// An exact name match wins. Otherwise the first column, in frame order,
    /// whose lowercase name contains the lowercase hint is returned.
    pub fn resolve(df: &DataFrame, hint: &str) -> Option<String> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self::resolve_in(&names, hint)
    }

    /// Same as [`SchemaResolver::resolve`], over a plain list of names.
    pub fn resolve_in(names: &[String], hint: &str) -> Option<String> {
        if hint.is_empty() {
            return None;
        }
        if let Some(exact) = names.iter().find(|n| n.as_str() == hint) {
            return Some(exact.clone());
        }

        let needle = hint.to_lowercase();
        let matches: Vec<&String> = names
            .iter()
            .filter(|n| n.to_lowercase().contains(&needle))
            .collect();

        if matches.len() > 1 {
            debug!(
                "Hint '{}' matches {} columns {:?}, using '{}'",
                hint,
                matches.len(),
                matches,
                matches[0]
            );
        }

        matches.first().map(|n| (*n).clone())
    }

    /// Whether `name` is one of the canonical or derived column names.
    pub fn is_canonical(name: &str) -> bool {
        DECLARED_COLUMNS.contains(&name) || DERIVED_COLUMNS.contains(&name)
    }
}
