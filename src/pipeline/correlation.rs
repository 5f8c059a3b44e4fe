//! Pearson correlation among grades, INVALSI scores and competencies

use anyhow::Result;
use faer::Mat;
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;

/// Grades and INVALSI maths scores checked against the competency scores
pub const SCORE_COLUMNS: [&str; 6] = [
    "voto_scritto_ita",
    "voto_orale_ita",
    "voto_scritto_mat",
    "voto_orale_mat",
    "pu_ma_gr",
    "pu_ma_no",
];

/// Absolute correlation above which a pair is reported as strong
pub const STRONG_CORRELATION: f64 = 0.7;

/// A pair of columns and their correlation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelatedPair {
    pub feature1: String,
    pub feature2: String,
    pub correlation: f64,
}

/// Correlation matrix over the columns that could be correlated
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrelationReport {
    pub columns: Vec<String>,
    /// `matrix[i][j]` correlates `columns[i]` with `columns[j]`
    pub matrix: Vec<Vec<f64>>,
    /// Records with a value in every column
    pub rows_used: usize,
    /// Requested columns left out: absent, non-numeric or constant
    pub skipped: Vec<String>,
}

impl CorrelationReport {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        Some(self.matrix[i][j])
    }

    /// Pairs with `|r| > threshold`, strongest first
    pub fn strong_pairs(&self, threshold: f64) -> Vec<CorrelatedPair> {
        let n = self.columns.len();
        let mut pairs: Vec<CorrelatedPair> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .filter(|&(i, j)| self.matrix[i][j].abs() > threshold)
            .map(|(i, j)| CorrelatedPair {
                feature1: self.columns[i].clone(),
                feature2: self.columns[j].clone(),
                correlation: self.matrix[i][j],
            })
            .collect();
        pairs.sort_by(|a, b| {
            b.correlation
                .abs()
                .partial_cmp(&a.correlation.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        pairs
    }
}

/// [`SCORE_COLUMNS`] followed by the competency tags
pub fn correlation_columns(competencies: &[&str]) -> Vec<String> {
    SCORE_COLUMNS
        .iter()
        .chain(competencies.iter())
        .map(|name| name.to_string())
        .collect()
}

fn float_values(df: &DataFrame, name: &str) -> Option<Vec<Option<f64>>> {
    let col = df.column(name).ok()?;
    if !(col.dtype().is_primitive_numeric() || col.dtype() == &DataType::Boolean) {
        return None;
    }
    let cast = col.cast(&DataType::Float64).ok()?;
    Some(cast.f64().ok()?.into_iter().collect())
}

/// Pearson correlation of `columns` over the records with no null in any of them.
///
/// Columns are standardised in parallel and the matrix is `Zᵀ·Z / n`.
pub fn correlation_matrix(df: &DataFrame, columns: &[String]) -> Result<CorrelationReport> {
    let mut skipped = Vec::new();
    let mut present: Vec<(String, Vec<Option<f64>>)> = Vec::new();
    for name in columns {
        match float_values(df, name) {
            Some(values) => present.push((name.clone(), values)),
            None => skipped.push(name.clone()),
        }
    }

    let complete: Vec<usize> = (0..df.height())
        .filter(|&row| present.iter().all(|(_, values)| values[row].is_some()))
        .collect();
    let n = complete.len();
    if n == 0 {
        skipped.extend(present.into_iter().map(|(name, _)| name));
        return Ok(CorrelationReport {
            skipped,
            ..Default::default()
        });
    }

    let standardized: Vec<Option<Vec<f64>>> = present
        .par_iter()
        .map(|(_, values)| {
            let xs: Vec<f64> = complete.iter().filter_map(|&row| values[row]).collect();
            let mean = xs.iter().sum::<f64>() / n as f64;
            let std = (xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64).sqrt();
            if std == 0.0 {
                return None;
            }
            let scale = 1.0 / (std * (n as f64).sqrt());
            Some(xs.iter().map(|x| (x - mean) * scale).collect())
        })
        .collect();

    let mut kept_names = Vec::new();
    let mut kept = Vec::new();
    for ((name, _), column) in present.into_iter().zip(standardized) {
        match column {
            Some(values) => {
                kept_names.push(name);
                kept.push(values);
            }
            None => skipped.push(name),
        }
    }

    let z = Mat::from_fn(n, kept.len(), |i, j| kept[j][i]);
    let r = z.transpose() * &z;
    let matrix = (0..kept.len())
        .map(|i| {
            (0..kept.len())
                .map(|j| if i == j { 1.0 } else { r[(i, j)].clamp(-1.0, 1.0) })
                .collect()
        })
        .collect();

    Ok(CorrelationReport {
        columns: kept_names,
        matrix,
        rows_used: n,
        skipped,
    })
}
