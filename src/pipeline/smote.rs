//! SMOTE-NC oversampling for mixed continuous/categorical records
//!
//! Synthetic minority records interpolate continuous columns between a
//! minority record and one of its nearest minority neighbours, while
//! categorical columns take the most frequent value among those neighbours.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::target::{column_to_f64, dropout_labels, ClassCounts};
use super::taxonomy::{FeatureTaxonomy, DROPOUT_COLUMN};

/// Code given to null or unseen categories
pub const UNKNOWN_CODE: i64 = -1;

/// Dense integer codes for string-categorical columns.
///
/// Codes are fitted on one split (sorted distinct values → 0..n) and the
/// same mapping is re-applied to every other split.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Factorizer {
    codes: BTreeMap<String, BTreeMap<String, i64>>,
}

impl Factorizer {
    pub fn fit(df: &DataFrame, columns: &[String]) -> Result<Self> {
        let mut codes = BTreeMap::new();
        for name in columns {
            let col = df
                .column(name)
                .with_context(|| format!("Cannot factorize missing column '{}'", name))?;
            let cast = col.cast(&DataType::String)?;
            let mut distinct: Vec<String> = cast
                .str()?
                .into_iter()
                .flatten()
                .map(str::to_string)
                .collect();
            distinct.sort();
            distinct.dedup();

            let mapping: BTreeMap<String, i64> = distinct
                .into_iter()
                .enumerate()
                .map(|(code, value)| (value, code as i64))
                .collect();
            codes.insert(name.clone(), mapping);
        }
        Ok(Self { codes })
    }

    /// Replace every fitted column present in `df` by its Int64 codes
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for (name, mapping) in &self.codes {
            let Ok(col) = df.column(name) else {
                continue;
            };
            let cast = col.cast(&DataType::String)?;
            let coded: Vec<i64> = cast
                .str()?
                .into_iter()
                .map(|v| {
                    v.and_then(|s| mapping.get(s).copied())
                        .unwrap_or(UNKNOWN_CODE)
                })
                .collect();
            out.with_column(Column::new(name.as_str().into(), coded))?;
        }
        Ok(out)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }
}

/// Most frequent value; ties go to the smallest value
fn majority_vote(values: impl Iterator<Item = f64>) -> f64 {
    let mut tally: Vec<(f64, usize)> = Vec::new();
    for value in values {
        match tally.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => tally.push((value, 1)),
        }
    }
    tally
        .into_iter()
        .max_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal))
        })
        .map(|(value, _)| value)
        .unwrap_or(0.0)
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Indices (into `members`) of the `k` nearest other members of each member.
///
/// Brute force: O(m² · columns) for m minority records, spread over the rayon
/// pool. Minority classes of a regional INVALSI export (a few thousand
/// records) take seconds; a national export with tens of thousands of
/// dropouts takes minutes and would want a spatial index.
fn nearest_neighbors(
    columns: &[Vec<f64>],
    categorical: &[bool],
    members: &[usize],
    k: usize,
    penalty: f64,
) -> Vec<Vec<usize>> {
    members
        .par_iter()
        .enumerate()
        .map(|(a, &row_a)| {
            let mut distances: Vec<(f64, usize)> = members
                .iter()
                .enumerate()
                .filter(|(b, _)| *b != a)
                .map(|(b, &row_b)| {
                    let distance: f64 = columns
                        .iter()
                        .zip(categorical)
                        .map(|(col, &is_cat)| {
                            if is_cat {
                                if col[row_a] != col[row_b] {
                                    penalty
                                } else {
                                    0.0
                                }
                            } else {
                                (col[row_a] - col[row_b]).powi(2)
                            }
                        })
                        .sum();
                    (distance, b)
                })
                .collect();
            distances.sort_by(|x, y| {
                x.0.partial_cmp(&y.0)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(x.1.cmp(&y.1))
            });
            distances.into_iter().take(k).map(|(_, b)| b).collect()
        })
        .collect()
}

/// Oversample the minority `DROPOUT` class until both classes are equal.
///
/// Every column other than `DROPOUT` must be numeric or boolean and free of
/// nulls. Columns the taxonomy marks as categorical (plus boolean columns)
/// are voted; the rest are interpolated, and integer-typed ones rounded.
pub fn smote_nc(
    df: &DataFrame,
    taxonomy: &FeatureTaxonomy,
    k_neighbors: usize,
    seed: u64,
) -> Result<DataFrame> {
    let labels = dropout_labels(df)?;
    let counts = ClassCounts::from_labels(&labels);
    counts.ensure_non_degenerate()?;
    if counts.is_balanced() {
        return Ok(df.clone());
    }

    let minority_label = counts.minority_label();
    let members: Vec<usize> = (0..labels.len())
        .filter(|&i| labels[i] == minority_label)
        .collect();
    if members.len() < 2 {
        return Err(PipelineError::InsufficientMinority {
            found: members.len(),
        }
        .into());
    }
    let synthetic_count = labels.len() - 2 * members.len();
    let k = k_neighbors.max(1).min(members.len() - 1);

    let feature_columns: Vec<&Column> = df
        .get_columns()
        .iter()
        .filter(|col| col.name().as_str() != DROPOUT_COLUMN)
        .collect();

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(feature_columns.len());
    let mut categorical: Vec<bool> = Vec::with_capacity(feature_columns.len());
    for col in &feature_columns {
        if col.null_count() > 0 {
            return Err(PipelineError::NullsInResampling {
                column: col.name().to_string(),
                nulls: col.null_count(),
            }
            .into());
        }
        if !(col.dtype().is_primitive_numeric() || col.dtype() == &DataType::Boolean) {
            anyhow::bail!(
                "Column '{}' has non-numeric type {} and cannot be resampled",
                col.name(),
                col.dtype()
            );
        }
        columns.push(column_to_f64(col)?.into_iter().map(|v| v.unwrap_or(0.0)).collect());
        categorical.push(
            col.dtype() == &DataType::Boolean
                || taxonomy
                    .kind_of(col.name().as_str())
                    .is_some_and(|kind| kind.is_categorical()),
        );
    }

    let member_stds: Vec<f64> = columns
        .iter()
        .zip(&categorical)
        .filter(|(_, &is_cat)| !is_cat)
        .map(|(col, _)| {
            let values: Vec<f64> = members.iter().map(|&row| col[row]).collect();
            population_std(&values)
        })
        .collect();
    let penalty = median(member_stds).powi(2);

    let neighbors = nearest_neighbors(&columns, &categorical, &members, k, penalty);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut synthetic: Vec<Vec<f64>> = vec![Vec::with_capacity(synthetic_count); columns.len()];
    for _ in 0..synthetic_count {
        let base = rng.gen_range(0..members.len());
        let partner = neighbors[base][rng.gen_range(0..neighbors[base].len())];
        let gap: f64 = rng.gen();
        let (base_row, partner_row) = (members[base], members[partner]);

        for (c, col) in columns.iter().enumerate() {
            let value = if categorical[c] {
                majority_vote(neighbors[base].iter().map(|&n| col[members[n]]))
            } else {
                col[base_row] + gap * (col[partner_row] - col[base_row])
            };
            synthetic[c].push(value);
        }
    }

    let mut out_columns: Vec<Column> = Vec::with_capacity(df.width());
    let mut feature_idx = 0;
    for col in df.get_columns() {
        let name = col.name().clone();
        if name.as_str() == DROPOUT_COLUMN {
            let mut values = labels.clone();
            values.extend(std::iter::repeat(minority_label).take(synthetic_count));
            out_columns.push(Column::new(name, values));
            continue;
        }

        let all: Vec<f64> = columns[feature_idx]
            .iter()
            .chain(synthetic[feature_idx].iter())
            .copied()
            .collect();
        feature_idx += 1;

        let dtype = col.dtype();
        let rebuilt = if dtype == &DataType::Boolean {
            Column::new(name, all.iter().map(|&v| v > 0.5).collect::<Vec<bool>>())
        } else if dtype.is_integer() {
            Column::new(name, all.iter().map(|&v| v.round() as i64).collect::<Vec<i64>>())
        } else {
            Column::new(name, all)
        };
        out_columns.push(rebuilt);
    }

    Ok(DataFrame::new(out_columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_vote_ties_go_to_smallest() {
        assert_eq!(majority_vote([2.0, 1.0, 2.0].into_iter()), 2.0);
        assert_eq!(majority_vote([3.0, 1.0].into_iter()), 1.0);
    }

    #[test]
    fn test_factorizer_codes_are_sorted_and_reapplied() {
        let train = df! { "sesso" => ["M", "F", "M"] }.unwrap();
        let test = df! { "sesso" => [Some("F"), Some("X"), None] }.unwrap();

        let factorizer = Factorizer::fit(&train, &["sesso".to_string()]).unwrap();
        let coded_train = factorizer.apply(&train).unwrap();
        let coded_test = factorizer.apply(&test).unwrap();

        let train_codes: Vec<i64> = coded_train
            .column("sesso")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        let test_codes: Vec<i64> = coded_test
            .column("sesso")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();

        assert_eq!(train_codes, vec![1, 0, 1]);
        assert_eq!(test_codes, vec![0, UNKNOWN_CODE, UNKNOWN_CODE]);
    }

    #[test]
    fn test_smote_balances_and_votes_categoricals() {
        let df = df! {
            "score" => [1.0f64, 1.2, 1.4, 5.0, 6.0, 7.0, 8.0, 9.0],
            "campione" => [3i64, 3, 3, 1, 2, 1, 2, 1],
            "DROPOUT" => [true, true, true, false, false, false, false, false],
        }
        .unwrap();
        let taxonomy = FeatureTaxonomy::new(&["score"], &[], &["campione"], &[], &[], &["DROPOUT"]);

        let balanced = smote_nc(&df, &taxonomy, 5, 13).unwrap();
        let counts = ClassCounts::from_labels(&dropout_labels(&balanced).unwrap());
        assert_eq!(counts.dropout, 5);
        assert_eq!(counts.no_dropout, 5);

        // synthetic minority records stay inside the minority's score range
        // and inherit the only category the minority has
        let scores: Vec<f64> = balanced.column("score").unwrap().f64().unwrap().into_no_null_iter().collect();
        let codes: Vec<i64> = balanced.column("campione").unwrap().i64().unwrap().into_no_null_iter().collect();
        for row in 8..10 {
            assert!((1.0..=1.4).contains(&scores[row]));
            assert_eq!(codes[row], 3);
        }
    }

    #[test]
    fn test_smote_rejects_nulls() {
        let df = df! {
            "score" => [Some(1.0f64), None, Some(3.0), Some(4.0)],
            "DROPOUT" => [true, true, false, false],
        }
        .unwrap();
        let taxonomy = FeatureTaxonomy::new(&["score"], &[], &[], &[], &[], &["DROPOUT"]);

        // balanced input returns early, so make it unbalanced
        let df = df.vstack(&df.slice(2, 2)).unwrap();
        let result = smote_nc(&df, &taxonomy, 5, 1);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("null"));
    }

    #[test]
    fn test_smote_needs_two_minority_records() {
        let df = df! {
            "score" => [1.0f64, 2.0, 3.0],
            "DROPOUT" => [true, false, false],
        }
        .unwrap();
        let taxonomy = FeatureTaxonomy::new(&["score"], &[], &[], &[], &[], &["DROPOUT"]);
        assert!(smote_nc(&df, &taxonomy, 5, 1).is_err());
    }
}
