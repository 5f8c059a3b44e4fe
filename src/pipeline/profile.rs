//! Dataset profiling and cleaning of raw INVALSI exports

use anyhow::Result;
use polars::prelude::*;
use serde::Serialize;

use super::missing::analyze_missing_values;

/// Columns that are mostly null in INVALSI exports
pub const HIGH_NULL_COLUMNS: [&str; 4] = [
    "codice_orario",
    "PesoClasse",
    "PesoScuola",
    "PesoTotale_Matematica",
];

/// Identifier columns with (almost) one distinct value per record
pub const IDENTIFIER_COLUMNS: [&str; 2] = ["Unnamed: 0", "CODICE_STUDENTE"];

/// Columns holding a single value across the whole export
pub const CONSTANT_COLUMNS: [&str; 2] = ["macrotipologia", "livello"];

/// Distinct-to-rows ratio above which a column looks like an identifier
pub const UNIQUE_RATIO_THRESHOLD: f64 = 0.1;

/// Exploratory view of a raw table
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatasetProfile {
    pub rows: usize,
    pub columns: usize,
    /// Columns with at least one null, by null ratio descending
    pub null_ratios: Vec<(String, f64)>,
    /// Columns whose distinct/rows ratio exceeds [`UNIQUE_RATIO_THRESHOLD`]
    pub near_unique: Vec<(String, f64)>,
    /// Columns with exactly one distinct non-null value
    pub constant: Vec<String>,
}

/// Compute null ratios, near-unique and constant columns of `df`.
pub fn profile_dataset(df: &DataFrame) -> Result<DatasetProfile> {
    let rows = df.height();
    if rows == 0 {
        return Ok(DatasetProfile {
            columns: df.width(),
            ..Default::default()
        });
    }

    let null_ratios: Vec<(String, f64)> = analyze_missing_values(df)?
        .into_iter()
        .filter(|(_, ratio)| *ratio > 0.0)
        .collect();

    let mut near_unique = Vec::new();
    let mut constant = Vec::new();
    for col in df.get_columns() {
        let distinct = col.drop_nulls().n_unique()?;
        let ratio = distinct as f64 / rows as f64;
        if ratio > UNIQUE_RATIO_THRESHOLD {
            near_unique.push((col.name().to_string(), ratio));
        }
        if distinct == 1 {
            constant.push(col.name().to_string());
        }
    }

    Ok(DatasetProfile {
        rows,
        columns: df.width(),
        null_ratios,
        near_unique,
        constant,
    })
}

/// The fixed list of columns removed from every raw export
pub fn useless_columns() -> Vec<&'static str> {
    HIGH_NULL_COLUMNS
        .iter()
        .chain(IDENTIFIER_COLUMNS.iter())
        .chain(CONSTANT_COLUMNS.iter())
        .copied()
        .collect()
}

/// Drop the fixed useless columns that are present; returns the cleaned
/// table and the names actually dropped.
pub fn clean_dataset(df: DataFrame) -> Result<(DataFrame, Vec<String>)> {
    let dropped: Vec<String> = useless_columns()
        .into_iter()
        .filter(|name| df.column(name).is_ok())
        .map(str::to_string)
        .collect();

    if dropped.is_empty() {
        return Ok((df, dropped));
    }
    Ok((df.drop_many(&dropped), dropped))
}

/// Keep only the given columns, in table order
pub fn select_columns(df: &DataFrame, keep: &[&str]) -> Result<DataFrame> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .filter(|name| keep.contains(&name.as_str()))
        .map(|name| name.to_string())
        .collect();
    Ok(df.select(names)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> DataFrame {
        df! {
            "CODICE_STUDENTE" => [1i64, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20],
            "livello" => [8i64; 20],
            "PesoClasse" => [None::<f64>; 20],
            "sesso" => ["M", "F", "M", "F", "M", "F", "M", "F", "M", "F", "M", "F", "M", "F", "M", "F", "M", "F", "M", "F"],
        }
        .unwrap()
    }

    #[test]
    fn test_profile_finds_identifiers_and_constants() {
        let profile = profile_dataset(&raw()).unwrap();
        assert_eq!(profile.rows, 20);
        assert_eq!(profile.null_ratios, vec![("PesoClasse".to_string(), 1.0)]);
        assert_eq!(profile.near_unique, vec![("CODICE_STUDENTE".to_string(), 1.0)]);
        assert_eq!(profile.constant, vec!["livello".to_string()]);
    }

    #[test]
    fn test_clean_drops_only_present_columns() {
        let (cleaned, dropped) = clean_dataset(raw()).unwrap();
        assert_eq!(dropped, vec!["PesoClasse", "CODICE_STUDENTE", "livello"]);
        assert_eq!(cleaned.get_column_names(), &["sesso"]);
    }

    #[test]
    fn test_select_columns_keeps_table_order() {
        let selected = select_columns(&raw(), &["sesso", "livello", "absent"]).unwrap();
        assert_eq!(selected.get_column_names(), &["livello", "sesso"]);
    }
}
