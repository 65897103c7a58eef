//! Header normalization: raw source headers to canonical snake_case names.

use crate::schema::{self, SchemaResolver};
use crate::utils::fold_accents;
use anyhow::Result;
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex: whitespace run"));

/// Fold a header for lookup: trim, collapse whitespace, strip accents,
/// uppercase.
pub(crate) fn fold_header(header: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(header.trim(), " ");
    fold_accents(&collapsed).to_uppercase()
}

/// Immutable lookup of source header to canonical column name.
///
/// Serialized as the list of `(source header, canonical name)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, String)>", into = "Vec<(String, String)>")]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
    folded: HashMap<String, String>,
}

impl From<Vec<(String, String)>> for HeaderMap {
    fn from(entries: Vec<(String, String)>) -> Self {
        Self::new(entries)
    }
}

impl From<HeaderMap> for Vec<(String, String)> {
    fn from(map: HeaderMap) -> Self {
        map.entries
    }
}

impl Default for HeaderMap {
    fn default() -> Self {
        Self::new([
            (
                "CÓDIGO DE PARTIDO (SEGÚN CODIFICACIÓN INDEC)",
                schema::CODIGO_PARTIDO,
            ),
            ("PARTIDO", schema::PARTIDO),
            ("FECHA", schema::FECHA),
            ("MES", schema::MES),
            ("DÍA DE LA SEMANA", schema::DIA_SEMANA),
            ("DÍA DE LA SEMANA AGRUPADO", schema::DIA_SEMANA_AGRUPADO),
            ("HORA", schema::HORA),
            ("DIURNO / NOCTURNO", schema::DIURNO_NOCTURNO),
            ("EDAD", schema::EDAD),
            ("EDAD AGRUPADA", schema::EDAD_AGRUPADA),
            ("SEXO", schema::SEXO),
        ])
    }
}

impl HeaderMap {
    /// Build a map from `(source header, canonical name)` pairs.
    pub fn new<I, A, B>(entries: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let entries: Vec<(String, String)> = entries
            .into_iter()
            .map(|(a, b)| (a.into(), b.into()))
            .collect();
        let folded = Self::fold_entries(&entries);
        Self { entries, folded }
    }

    fn fold_entries(entries: &[(String, String)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(raw, canonical)| (fold_header(raw), canonical.clone()))
            .collect()
    }

    /// Canonical names this map produces.
    pub fn canonical_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, c)| c.as_str())
    }

    /// Look up the canonical name of a recognised header.
    pub fn lookup(&self, header: &str) -> Option<&str> {
        self.folded.get(&fold_header(header)).map(String::as_str)
    }

    /// Canonical name for a header.
    ///
    /// Recognised headers map to their canonical name, names that are
    /// already canonical are kept, anything else is returned uppercased.
    pub fn normalize(&self, header: &str) -> String {
        if let Some(canonical) = self.lookup(header) {
            return canonical.to_string();
        }
        if SchemaResolver::is_canonical(header) || self.canonical_names().any(|c| c == header) {
            return header.to_string();
        }
        header.to_uppercase()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Renames frame columns to canonical names.
pub struct ColumnNameNormalizer<'a> {
    headers: &'a HeaderMap,
}

impl<'a> ColumnNameNormalizer<'a> {
    pub fn new(headers: &'a HeaderMap) -> Self {
        Self { headers }
    }

    /// Normalize a header row.
    ///
    /// Never fails. If two headers would land on the same name, the later
    /// one keeps its uppercased raw spelling.
    pub fn normalize_headers(&self, raw: &[String]) -> Vec<String> {
        let mut taken: HashSet<String> = HashSet::with_capacity(raw.len());
        let mut out = Vec::with_capacity(raw.len());

        for header in raw {
            let mut name = self.headers.normalize(header);
            if taken.contains(&name) {
                let fallback = header.to_uppercase();
                debug!(
                    "Header '{}' collides on '{}', keeping '{}'",
                    header, name, fallback
                );
                name = fallback;
            }
            // Last resort for pathological inputs: suffix until unique.
            let base = name.clone();
            let mut n = 1;
            while taken.contains(&name) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            taken.insert(name.clone());
            out.push(name);
        }

        out
    }

    /// Rename the columns of a frame, returning the renames performed.
    pub fn apply(&self, df: DataFrame) -> Result<(DataFrame, Vec<String>)> {
        let mut df = df;
        let raw: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let normalized = self.normalize_headers(&raw);

        let renames: Vec<String> = raw
            .iter()
            .zip(&normalized)
            .filter(|(before, after)| before != after)
            .map(|(before, after)| format!("Renamed '{}' -> '{}'", before, after))
            .collect();

        if !renames.is_empty() {
            df.set_column_names(normalized.iter().map(|s| s.as_str()))?;
            debug!("Normalized {} column names", renames.len());
        }

        Ok((df, renames))
    }
}
