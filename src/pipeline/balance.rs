//! Class balancing of the training split
//!
//! Only the training split is ever resampled. Validation and test pass
//! through untouched, except that SMOTE-NC re-applies the training split's
//! category codes to them so all splits share one encoding.

use std::str::FromStr;

use anyhow::Result;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;
use serde::Serialize;

use super::split::{take_rows, DatasetSplits};
use super::smote::{smote_nc, Factorizer};
use super::target::{dropout_labels, ClassCounts};
use super::taxonomy::{FeatureKind, FeatureTaxonomy};

/// Resampling strategy for the training split
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SamplingStrategy {
    /// Shrink the majority class to the minority count
    #[default]
    RandomUndersampling,
    /// Grow the minority class with SMOTE-NC synthetic records
    SmoteNc,
}

impl std::fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplingStrategy::RandomUndersampling => write!(f, "random_undersampling"),
            SamplingStrategy::SmoteNc => write!(f, "SMOTENC"),
        }
    }
}

impl FromStr for SamplingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "random_undersampling" | "undersampling" => Ok(SamplingStrategy::RandomUndersampling),
            "smotenc" | "smote_nc" => Ok(SamplingStrategy::SmoteNc),
            _ => Err(format!(
                "Unknown sampling strategy: '{}'. Use 'random_undersampling' or 'SMOTENC'.",
                s
            )),
        }
    }
}

/// Balanced splits together with the taxonomy that now describes them
#[derive(Debug, Clone)]
pub struct BalancedSplits {
    pub splits: DatasetSplits,
    pub taxonomy: FeatureTaxonomy,
    pub before: ClassCounts,
    pub after: ClassCounts,
}

/// Randomly drop majority-class records until both classes are equal.
///
/// The result is shuffled; the same seed gives the same table.
pub fn random_undersample(df: &DataFrame, seed: u64) -> Result<DataFrame> {
    let labels = dropout_labels(df)?;
    let counts = ClassCounts::from_labels(&labels);
    counts.ensure_non_degenerate()?;

    let minority_label = counts.minority_label();
    let minority: Vec<usize> = (0..labels.len())
        .filter(|&i| labels[i] == minority_label)
        .collect();
    let majority: Vec<usize> = (0..labels.len())
        .filter(|&i| labels[i] != minority_label)
        .collect();

    let mut rng = StdRng::seed_from_u64(seed);
    let sampled = index::sample(&mut rng, majority.len(), minority.len());

    let mut rows: Vec<usize> = minority;
    rows.extend(sampled.iter().map(|i| majority[i]));
    rows.shuffle(&mut rng);

    take_rows(df, &rows)
}

/// Balance the training split with the chosen strategy.
pub fn balance_training_split(
    splits: DatasetSplits,
    taxonomy: &FeatureTaxonomy,
    strategy: SamplingStrategy,
    smote_neighbors: usize,
    seed: u64,
) -> Result<BalancedSplits> {
    let before = ClassCounts::from_labels(&dropout_labels(&splits.training)?);
    before.ensure_non_degenerate()?;

    let (splits, taxonomy) = match strategy {
        SamplingStrategy::RandomUndersampling => {
            let training = random_undersample(&splits.training, seed)?;
            (
                DatasetSplits {
                    training,
                    ..splits
                },
                taxonomy.clone(),
            )
        }
        SamplingStrategy::SmoteNc => {
            let string_columns: Vec<String> = taxonomy
                .group(FeatureKind::StrCategorical)
                .into_iter()
                .filter(|name| splits.training.column(name).is_ok())
                .map(str::to_string)
                .collect();
            let factorizer = Factorizer::fit(&splits.training, &string_columns)?;
            let training = factorizer.apply(&splits.training)?;
            let validation = factorizer.apply(&splits.validation)?;
            let test = factorizer.apply(&splits.test)?;

            let collapsed = taxonomy.collapse_string_categoricals();
            let training = smote_nc(&training, &collapsed, smote_neighbors, seed)?;
            (
                DatasetSplits {
                    training,
                    validation,
                    test,
                },
                collapsed,
            )
        }
    };

    let after = ClassCounts::from_labels(&dropout_labels(&splits.training)?);

    Ok(BalancedSplits {
        splits,
        taxonomy,
        before,
        after,
    })
}
