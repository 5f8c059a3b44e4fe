//! Target column handling
//!
//! Reads `DROPOUT` labels from whatever dtype the loader produced, derives
//! them from `LIVELLI` when absent, and counts classes.

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::Serialize;

use super::error::PipelineError;
use super::taxonomy::{DROPOUT_COLUMN, LEVEL_COLUMN};

/// Lowest `LIVELLI` value counted as dropout
pub const DROPOUT_LEVEL: i64 = 3;

/// Highest valid `LIVELLI` value
pub const MAX_LEVEL: i64 = 5;

/// Interpret a column as booleans.
///
/// Boolean columns are taken as-is, numeric columns are true when non-zero
/// and string columns are true for `true`/`1` (case-insensitive).
pub fn column_to_bools(col: &Column) -> Result<Vec<Option<bool>>> {
    let values = match col.dtype() {
        DataType::Boolean => col.bool()?.into_iter().collect(),
        dtype if dtype.is_primitive_numeric() => {
            let cast = col.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| v.map(|x| x != 0.0))
                .collect()
        }
        _ => {
            let cast = col.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| {
                    v.map(|s| {
                        let s = s.trim();
                        s.eq_ignore_ascii_case("true") || s == "1"
                    })
                })
                .collect()
        }
    };
    Ok(values)
}

/// Interpret a column as floats (booleans become 0.0/1.0)
pub fn column_to_f64(col: &Column) -> Result<Vec<Option<f64>>> {
    let cast = match col.dtype() {
        DataType::Boolean => col.cast(&DataType::UInt8)?.cast(&DataType::Float64)?,
        _ => col
            .cast(&DataType::Float64)
            .with_context(|| format!("Column '{}' is not numeric", col.name()))?,
    };
    Ok(cast.f64()?.into_iter().collect())
}

/// Read the `DROPOUT` labels; nulls are treated as "no dropout"
pub fn dropout_labels(df: &DataFrame) -> Result<Vec<bool>> {
    let col = df
        .column(DROPOUT_COLUMN)
        .map_err(|_| PipelineError::MissingColumn {
            column: DROPOUT_COLUMN.to_string(),
            needed_for: "class labels",
        })?;
    Ok(column_to_bools(col)?
        .into_iter()
        .map(|v| v.unwrap_or(false))
        .collect())
}

/// Read `LIVELLI`, rejecting nulls and values outside 0..=5
pub fn level_values(df: &DataFrame) -> Result<Vec<f64>> {
    let col = df
        .column(LEVEL_COLUMN)
        .map_err(|_| PipelineError::MissingColumn {
            column: LEVEL_COLUMN.to_string(),
            needed_for: "regression targets",
        })?;

    column_to_f64(col)?
        .into_iter()
        .map(|v| match v {
            Some(level) if (0.0..=MAX_LEVEL as f64).contains(&level) => Ok(level),
            Some(level) => Err(PipelineError::InvalidLevel { value: level }.into()),
            None => Err(PipelineError::InvalidLevel { value: f64::NAN }.into()),
        })
        .collect()
}

/// Make sure a boolean `DROPOUT` column exists.
///
/// An existing column is normalised to Boolean; otherwise it is derived as
/// `LIVELLI >= 3`. Returns whether the column had to be derived.
pub fn ensure_dropout_column(df: &mut DataFrame) -> Result<bool> {
    if let Ok(col) = df.column(DROPOUT_COLUMN) {
        if col.dtype() != &DataType::Boolean {
            let labels = dropout_labels(df)?;
            df.with_column(Column::new(DROPOUT_COLUMN.into(), labels))?;
        }
        return Ok(false);
    }

    let levels = level_values(df).context("Cannot derive DROPOUT without LIVELLI")?;
    let labels: Vec<bool> = levels
        .iter()
        .map(|&level| level >= DROPOUT_LEVEL as f64)
        .collect();
    df.with_column(Column::new(DROPOUT_COLUMN.into(), labels))?;
    Ok(true)
}

/// Count of records per `DROPOUT` class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassCounts {
    pub dropout: usize,
    pub no_dropout: usize,
}

impl ClassCounts {
    pub fn from_labels(labels: &[bool]) -> Self {
        let dropout = labels.iter().filter(|&&l| l).count();
        Self {
            dropout,
            no_dropout: labels.len() - dropout,
        }
    }

    pub fn total(&self) -> usize {
        self.dropout + self.no_dropout
    }

    pub fn is_balanced(&self) -> bool {
        self.dropout == self.no_dropout
    }

    /// Share of dropout records, 0.0 for an empty set
    pub fn dropout_ratio(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.dropout as f64 / self.total() as f64
        }
    }

    /// Label of the smaller class (dropout on ties)
    pub fn minority_label(&self) -> bool {
        self.dropout <= self.no_dropout
    }

    /// Fails when either class has no records
    pub fn ensure_non_degenerate(&self) -> Result<(), PipelineError> {
        if self.dropout == 0 || self.no_dropout == 0 {
            return Err(PipelineError::DegenerateClasses {
                dropout: self.dropout,
                no_dropout: self.no_dropout,
            });
        }
        Ok(())
    }
}

/// Class counts of a table's `DROPOUT` column
pub fn class_counts(df: &DataFrame) -> Result<ClassCounts> {
    Ok(ClassCounts::from_labels(&dropout_labels(df)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_labels_are_parsed() {
        let df = df! {
            "DROPOUT" => ["True", "false", "1", "0", "TRUE"],
        }
        .unwrap();

        let labels = dropout_labels(&df).unwrap();
        assert_eq!(labels, vec![true, false, true, false, true]);
    }

    #[test]
    fn test_numeric_labels_are_parsed() {
        let df = df! {
            "DROPOUT" => [0i32, 1, 1, 0],
        }
        .unwrap();

        assert_eq!(dropout_labels(&df).unwrap(), vec![false, true, true, false]);
    }

    #[test]
    fn test_dropout_derived_from_level() {
        let mut df = df! {
            "LIVELLI" => [0i64, 2, 3, 5],
        }
        .unwrap();

        let derived = ensure_dropout_column(&mut df).unwrap();
        assert!(derived);
        assert_eq!(dropout_labels(&df).unwrap(), vec![false, false, true, true]);
        assert_eq!(df.column("DROPOUT").unwrap().dtype(), &DataType::Boolean);
    }

    #[test]
    fn test_existing_dropout_is_normalised() {
        let mut df = df! {
            "DROPOUT" => ["True", "False"],
        }
        .unwrap();

        let derived = ensure_dropout_column(&mut df).unwrap();
        assert!(!derived);
        assert_eq!(df.column("DROPOUT").unwrap().dtype(), &DataType::Boolean);
    }

    #[test]
    fn test_level_out_of_range_is_rejected() {
        let df = df! {
            "LIVELLI" => [1i64, 7],
        }
        .unwrap();

        let err = level_values(&df).unwrap_err();
        assert!(err.to_string().contains("outside the valid range"));
    }

    #[test]
    fn test_degenerate_classes() {
        let counts = ClassCounts::from_labels(&[true, true, true]);
        assert!(counts.ensure_non_degenerate().is_err());

        let counts = ClassCounts::from_labels(&[true, false, false]);
        assert!(counts.ensure_non_degenerate().is_ok());
        assert!(counts.minority_label());
        assert!((counts.dropout_ratio() - 1.0 / 3.0).abs() < 1e-12);
    }
}
