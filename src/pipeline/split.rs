//! Seeded train/validation/test splitting

use anyhow::Result;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::error::PipelineError;
use super::target::dropout_labels;

/// The three disjoint record sets of a run
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    pub training: DataFrame,
    pub validation: DataFrame,
    pub test: DataFrame,
}

/// Take the rows at `indices`, in that order
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

/// Number of held-out rows for `fraction` of `n` (rounded up, like scikit-learn)
fn held_out_count(n: usize, fraction: f64) -> usize {
    ((n as f64) * fraction).ceil() as usize
}

/// Split `df` into (kept, held-out) with `fraction` of the rows held out.
///
/// With `stratify`, each `DROPOUT` class is split separately so both parts
/// keep the class ratio; every class keeps at least one row on the kept side.
pub fn split_frame(
    df: &DataFrame,
    fraction: f64,
    seed: u64,
    stratify: bool,
    split_name: &'static str,
) -> Result<(DataFrame, DataFrame)> {
    let n = df.height();
    let mut rng = StdRng::seed_from_u64(seed);

    let (mut kept, mut held): (Vec<usize>, Vec<usize>) = if stratify {
        let labels = dropout_labels(df)?;
        let mut kept = Vec::new();
        let mut held = Vec::new();
        for class in [false, true] {
            let mut members: Vec<usize> = (0..n).filter(|&i| labels[i] == class).collect();
            members.shuffle(&mut rng);
            let count = ((members.len() as f64) * fraction).round() as usize;
            let count = count.min(members.len().saturating_sub(1));
            held.extend_from_slice(&members[..count]);
            kept.extend_from_slice(&members[count..]);
        }
        (kept, held)
    } else {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let count = held_out_count(n, fraction).min(n);
        let held = order[..count].to_vec();
        let kept = order[count..].to_vec();
        (kept, held)
    };

    if held.is_empty() || kept.is_empty() {
        return Err(PipelineError::EmptySplit {
            split: split_name,
            rows: n,
            fraction,
        }
        .into());
    }

    kept.shuffle(&mut rng);
    held.shuffle(&mut rng);

    Ok((take_rows(df, &kept)?, take_rows(df, &held)?))
}

/// Split off the test set, then the validation set from the remainder.
pub fn split_dataset(
    df: &DataFrame,
    test_fraction: f64,
    validation_fraction: f64,
    seed: u64,
    stratify: bool,
) -> Result<DatasetSplits> {
    let (remainder, test) = split_frame(df, test_fraction, seed, stratify, "test")?;
    let (training, validation) = split_frame(
        &remainder,
        validation_fraction,
        seed.wrapping_add(1),
        stratify,
        "validation",
    )?;

    Ok(DatasetSplits {
        training,
        validation,
        test,
    })
}
