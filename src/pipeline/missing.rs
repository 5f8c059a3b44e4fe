//! Missing value analysis and resolution

use std::str::FromStr;

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;

use super::target::column_to_f64;

/// Score columns whose nulls are resolved by the configured policy
pub const SCORE_COLUMNS: [&str; 4] = [
    "voto_scritto_ita",
    "voto_orale_ita",
    "voto_scritto_mat",
    "voto_orale_mat",
];

/// Italian-language score columns removed by `FillPolicy::Remove`
pub const ITALIAN_SCORE_COLUMNS: [&str; 2] = ["voto_scritto_ita", "voto_orale_ita"];

/// Mathematics score columns that must be present under `FillPolicy::Remove`
pub const MATH_SCORE_COLUMNS: [&str; 2] = ["voto_scritto_mat", "voto_orale_mat"];

/// Province code column whose nulls always become `NOT_AVAILABLE`
pub const PROVINCE_COLUMN: &str = "sigla_provincia_istat";

/// Sentinel category for an unknown province
pub const NOT_AVAILABLE: &str = "ND";

/// Policy for null score values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum FillPolicy {
    /// Drop the Italian score columns and every record missing a math score
    Remove,
    /// Replace nulls with the column mean
    #[default]
    Mean,
    /// Replace nulls with the column median
    Median,
}

impl std::fmt::Display for FillPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FillPolicy::Remove => write!(f, "remove"),
            FillPolicy::Mean => write!(f, "mean"),
            FillPolicy::Median => write!(f, "median"),
        }
    }
}

impl FromStr for FillPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remove" => Ok(FillPolicy::Remove),
            "mean" => Ok(FillPolicy::Mean),
            "median" => Ok(FillPolicy::Median),
            _ => Err(format!(
                "Unknown fill policy: '{}'. Use 'remove', 'mean' or 'median'.",
                s
            )),
        }
    }
}

/// A column whose nulls were replaced
#[derive(Debug, Clone, Serialize)]
pub struct FilledColumn {
    pub column: String,
    pub filled: usize,
    pub value: f64,
}

/// What the resolver changed
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionReport {
    pub filled: Vec<FilledColumn>,
    pub dropped_columns: Vec<String>,
    pub dropped_rows: usize,
    pub provinces_filled: usize,
}

/// Analyze the null ratio of every column, sorted descending
pub fn analyze_missing_values(df: &DataFrame) -> Result<Vec<(String, f64)>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let rows = df.height() as f64;
    let mut missing_ratios: Vec<(String, f64)> = df
        .get_columns()
        .iter()
        .map(|col| (col.name().to_string(), col.null_count() as f64 / rows))
        .collect();

    missing_ratios.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    Ok(missing_ratios)
}

/// Resolve nulls in the score columns and the province column.
///
/// Re-running on an already resolved table changes nothing.
pub fn resolve_missing_values(
    df: DataFrame,
    policy: FillPolicy,
) -> Result<(DataFrame, ResolutionReport)> {
    let mut report = ResolutionReport::default();
    let mut df = fill_province(df, &mut report)?;

    match policy {
        FillPolicy::Remove => {
            let to_drop: Vec<String> = ITALIAN_SCORE_COLUMNS
                .iter()
                .filter(|name| df.column(name).is_ok())
                .map(|name| name.to_string())
                .collect();
            if !to_drop.is_empty() {
                df = df.drop_many(&to_drop);
            }
            report.dropped_columns = to_drop;

            let before = df.height();
            df = drop_rows_missing(&df, &MATH_SCORE_COLUMNS)?;
            report.dropped_rows = before - df.height();
        }
        FillPolicy::Mean | FillPolicy::Median => {
            for name in SCORE_COLUMNS {
                let Ok(col) = df.column(name) else {
                    continue;
                };
                if col.null_count() == 0 {
                    continue;
                }

                let values = column_to_f64(col)?;
                let observed: Vec<f64> = values.iter().filter_map(|v| *v).collect();
                let fill = match policy {
                    FillPolicy::Median => median(&observed),
                    _ => mean(&observed),
                }
                .with_context(|| {
                    format!("Cannot impute '{}': the column has no observed values", name)
                })?;

                let filled = values.iter().filter(|v| v.is_none()).count();
                let resolved: Vec<f64> = values.into_iter().map(|v| v.unwrap_or(fill)).collect();
                df.with_column(Column::new(name.into(), resolved))?;

                report.filled.push(FilledColumn {
                    column: name.to_string(),
                    filled,
                    value: fill,
                });
            }
        }
    }

    Ok((df, report))
}

fn fill_province(mut df: DataFrame, report: &mut ResolutionReport) -> Result<DataFrame> {
    let Ok(col) = df.column(PROVINCE_COLUMN) else {
        return Ok(df);
    };
    let nulls = col.null_count();
    if nulls == 0 && col.dtype() == &DataType::String {
        return Ok(df);
    }

    let cast = col.cast(&DataType::String)?;
    let values: Vec<String> = cast
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or(NOT_AVAILABLE).to_string())
        .collect();
    df.with_column(Column::new(PROVINCE_COLUMN.into(), values))?;
    report.provinces_filled = nulls;
    Ok(df)
}

/// Keep only the rows where every present column in `columns` is non-null
fn drop_rows_missing(df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
    let mut keep = vec![true; df.height()];
    for name in columns {
        let Ok(col) = df.column(name) else {
            continue;
        };
        if col.null_count() == 0 {
            continue;
        }
        for (flag, value) in keep.iter_mut().zip(col.as_materialized_series().iter()) {
            if value.is_null() {
                *flag = false;
            }
        }
    }

    let mask = BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_policy_parsing() {
        assert_eq!("remove".parse::<FillPolicy>().unwrap(), FillPolicy::Remove);
        assert_eq!("MEAN".parse::<FillPolicy>().unwrap(), FillPolicy::Mean);
        assert_eq!("median".parse::<FillPolicy>().unwrap(), FillPolicy::Median);
        assert!("zero".parse::<FillPolicy>().is_err());
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_all_null_column_cannot_be_imputed() {
        let df = df! {
            "voto_scritto_mat" => [None::<f64>, None],
        }
        .unwrap();

        let result = resolve_missing_values(df, FillPolicy::Mean);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("no observed values"));
    }
}
