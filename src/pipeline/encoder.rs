//! Heterogeneous feature encoding
//!
//! The encoder is fitted once on the training split and then applied
//! verbatim to every split, so statistics and vocabularies can never be
//! learned from evaluation data.
//!
//! Feature vector layout, each block sorted by column name:
//! 1. boolean columns cast to 0.0/1.0
//! 2. z-scored ordinal columns
//! 3. z-scored continuous columns
//! 4. one one-hot block per categorical column (all zeros when unseen)

use anyhow::Result;
use faer::Mat;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::target::{column_to_bools, column_to_f64};
use super::taxonomy::{FeatureKind, FeatureTaxonomy};

/// Lower bound of the normalisation divisor
const STD_EPSILON: f64 = 1e-7;

/// Per-column mean and population variance of a numeric block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub variance: Vec<f64>,
}

impl NormalizationStats {
    fn fit(df: &DataFrame, columns: &[&str]) -> Result<Self> {
        let mut mean = Vec::with_capacity(columns.len());
        let mut variance = Vec::with_capacity(columns.len());
        for name in columns {
            let values: Vec<f64> = column_to_f64(required_column(df, name)?)?
                .into_iter()
                .flatten()
                .collect();
            let n = values.len().max(1) as f64;
            let m = values.iter().sum::<f64>() / n;
            let v = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / n;
            mean.push(m);
            variance.push(v);
        }
        Ok(Self {
            columns: columns.iter().map(|s| s.to_string()).collect(),
            mean,
            variance,
        })
    }

    fn scale(&self, idx: usize) -> f64 {
        self.variance[idx].sqrt().max(STD_EPSILON)
    }

    /// Normalised value; a missing cell maps to the mean, i.e. 0.0
    pub fn normalize(&self, idx: usize, value: Option<f64>) -> f64 {
        match value {
            Some(x) => (x - self.mean[idx]) / self.scale(idx),
            None => 0.0,
        }
    }
}

/// Sorted training-split vocabulary of one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Vocabulary {
    Strings(Vec<String>),
    Integers(Vec<i64>),
}

impl Vocabulary {
    pub fn len(&self) -> usize {
        match self {
            Vocabulary::Strings(values) => values.len(),
            Vocabulary::Integers(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One-hot encoding state of a categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoding {
    pub column: String,
    pub vocabulary: Vocabulary,
}

impl CategoricalEncoding {
    fn fit(df: &DataFrame, name: &str, kind: FeatureKind) -> Result<Self> {
        let col = required_column(df, name)?;
        let vocabulary = match kind {
            FeatureKind::IntCategorical if col.dtype().is_primitive_numeric() => {
                let cast = col.cast(&DataType::Int64)?;
                let mut values: Vec<i64> = cast.i64()?.into_iter().flatten().collect();
                values.sort_unstable();
                values.dedup();
                Vocabulary::Integers(values)
            }
            _ => {
                let cast = col.cast(&DataType::String)?;
                let mut values: Vec<String> = cast
                    .str()?
                    .into_iter()
                    .flatten()
                    .map(str::to_string)
                    .collect();
                values.sort();
                values.dedup();
                Vocabulary::Strings(values)
            }
        };
        Ok(Self {
            column: name.to_string(),
            vocabulary,
        })
    }

    /// Vocabulary position of every row; `None` for null or unseen values
    fn positions(&self, df: &DataFrame) -> Result<Vec<Option<usize>>> {
        let col = required_column(df, &self.column)?;
        let positions = match &self.vocabulary {
            Vocabulary::Integers(vocab) => {
                let cast = col.cast(&DataType::Int64)?;
                cast.i64()?
                    .into_iter()
                    .map(|v| v.and_then(|x| vocab.binary_search(&x).ok()))
                    .collect()
            }
            Vocabulary::Strings(vocab) => {
                let cast = col.cast(&DataType::String)?;
                cast.str()?
                    .into_iter()
                    .map(|v| v.and_then(|s| vocab.binary_search_by(|p| p.as_str().cmp(s)).ok()))
                    .collect()
            }
        };
        Ok(positions)
    }
}

fn required_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|_| {
        PipelineError::MissingColumn {
            column: name.to_string(),
            needed_for: "feature encoding",
        }
        .into()
    })
}

/// Fitted encoder: column order, normalisation statistics and vocabularies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderState {
    pub boolean: Vec<String>,
    pub ordinal: NormalizationStats,
    pub continuous: NormalizationStats,
    pub categorical: Vec<CategoricalEncoding>,
}

impl EncoderState {
    /// Fit on the training split. Every feature column of the taxonomy must
    /// exist in `training`.
    pub fn fit(training: &DataFrame, taxonomy: &FeatureTaxonomy) -> Result<Self> {
        let boolean: Vec<String> = taxonomy
            .group(FeatureKind::Boolean)
            .into_iter()
            .map(|name| required_column(training, name).map(|_| name.to_string()))
            .collect::<Result<_>>()?;

        let ordinal = NormalizationStats::fit(training, &taxonomy.group(FeatureKind::Ordinal))?;
        let continuous =
            NormalizationStats::fit(training, &taxonomy.group(FeatureKind::Continuous))?;

        let mut categorical_columns: Vec<(&str, FeatureKind)> = taxonomy
            .group(FeatureKind::StrCategorical)
            .into_iter()
            .map(|name| (name, FeatureKind::StrCategorical))
            .chain(
                taxonomy
                    .group(FeatureKind::IntCategorical)
                    .into_iter()
                    .map(|name| (name, FeatureKind::IntCategorical)),
            )
            .collect();
        categorical_columns.sort_by(|a, b| a.0.cmp(b.0));

        let categorical = categorical_columns
            .into_iter()
            .map(|(name, kind)| CategoricalEncoding::fit(training, name, kind))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            boolean,
            ordinal,
            continuous,
            categorical,
        })
    }

    /// Length of an encoded feature vector
    pub fn width(&self) -> usize {
        self.boolean.len()
            + self.ordinal.columns.len()
            + self.continuous.columns.len()
            + self.categorical.iter().map(|c| c.vocabulary.len()).sum::<usize>()
    }

    /// Names of the feature vector's entries, e.g. `sesso=F` for one-hot slots
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.boolean.clone();
        names.extend(self.ordinal.columns.iter().cloned());
        names.extend(self.continuous.columns.iter().cloned());
        for encoding in &self.categorical {
            match &encoding.vocabulary {
                Vocabulary::Strings(values) => {
                    names.extend(values.iter().map(|v| format!("{}={}", encoding.column, v)))
                }
                Vocabulary::Integers(values) => {
                    names.extend(values.iter().map(|v| format!("{}={}", encoding.column, v)))
                }
            }
        }
        names
    }

    /// Encode every row of `df` into a `rows × width` matrix
    pub fn transform(&self, df: &DataFrame) -> Result<Mat<f64>> {
        let rows = df.height();
        let mut features = Mat::<f64>::zeros(rows, self.width());
        let mut offset = 0;

        for name in &self.boolean {
            let values = column_to_bools(required_column(df, name)?)?;
            for (row, value) in values.iter().enumerate() {
                features[(row, offset)] = if value.unwrap_or(false) { 1.0 } else { 0.0 };
            }
            offset += 1;
        }

        for stats in [&self.ordinal, &self.continuous] {
            for (idx, name) in stats.columns.iter().enumerate() {
                let values = column_to_f64(required_column(df, name)?)?;
                for (row, value) in values.iter().enumerate() {
                    features[(row, offset)] = stats.normalize(idx, *value);
                }
                offset += 1;
            }
        }

        for encoding in &self.categorical {
            for (row, position) in encoding.positions(df)?.iter().enumerate() {
                if let Some(position) = position {
                    features[(row, offset + position)] = 1.0;
                }
            }
            offset += encoding.vocabulary.len();
        }

        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomy() -> FeatureTaxonomy {
        FeatureTaxonomy::new(
            &["score"],
            &["n_classi_prev"],
            &["campione"],
            &["sesso"],
            &["Pon"],
            &["DROPOUT"],
        )
    }

    fn training() -> DataFrame {
        df! {
            "score" => [1.0f64, 2.0, 3.0, 4.0],
            "n_classi_prev" => [2i64, 2, 4, 4],
            "campione" => [7i64, 3, 3, 7],
            "sesso" => ["M", "F", "F", "M"],
            "Pon" => [true, false, true, false],
            "DROPOUT" => [true, false, true, false],
        }
        .unwrap()
    }

    #[test]
    fn test_fit_statistics_and_vocabularies() {
        let state = EncoderState::fit(&training(), &taxonomy()).unwrap();

        assert_eq!(state.continuous.mean, vec![2.5]);
        assert!((state.continuous.variance[0] - 1.25).abs() < 1e-12);
        assert_eq!(state.ordinal.mean, vec![3.0]);
        assert_eq!(state.categorical[0].column, "campione");
        assert_eq!(state.categorical[0].vocabulary, Vocabulary::Integers(vec![3, 7]));
        assert_eq!(
            state.categorical[1].vocabulary,
            Vocabulary::Strings(vec!["F".to_string(), "M".to_string()])
        );
        assert_eq!(state.width(), 1 + 1 + 1 + 2 + 2);
    }

    #[test]
    fn test_transform_layout() {
        let state = EncoderState::fit(&training(), &taxonomy()).unwrap();
        let x = state.transform(&training()).unwrap();

        // row 0: Pon=1, ordinal (2-3)/1, score (1-2.5)/sqrt(1.25), campione=7, sesso=M
        assert_eq!(x[(0, 0)], 1.0);
        assert!((x[(0, 1)] + 1.0).abs() < 1e-12);
        assert!((x[(0, 2)] - (-1.5 / 1.25f64.sqrt())).abs() < 1e-12);
        assert_eq!((x[(0, 3)], x[(0, 4)]), (0.0, 1.0));
        assert_eq!((x[(0, 5)], x[(0, 6)]), (0.0, 1.0));
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let df = training().drop("Pon").unwrap();
        let result = EncoderState::fit(&df, &taxonomy());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Pon"));
    }

    #[test]
    fn test_constant_column_does_not_divide_by_zero() {
        let df = df! { "score" => [5.0f64, 5.0, 5.0] }.unwrap();
        let taxonomy = FeatureTaxonomy::new(&["score"], &[], &[], &[], &[], &[]);
        let state = EncoderState::fit(&df, &taxonomy).unwrap();
        let x = state.transform(&df).unwrap();
        assert_eq!(x[(1, 0)], 0.0);
    }
}
