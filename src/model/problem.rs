//! Problem type: target construction, output head, loss and metric thresholds

use std::str::FromStr;

use anyhow::Result;
use candle_core::{Device, Tensor, D};
use faer::Mat;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::tensor::mat_to_tensor;
use crate::pipeline::target::{dropout_labels, level_values, MAX_LEVEL};

/// Classification threshold on the positive-class probability
pub const CLASSIFICATION_THRESHOLD: f64 = 0.5;

/// Threshold on the sigmoid output of the regression variants
pub const REGRESSION_THRESHOLD: f64 = 0.6;

/// Training objective
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    /// One-hot DROPOUT, 2-unit softmax, categorical cross-entropy
    #[default]
    Classification,
    /// `|LIVELLI - 5| / 5`, 1-unit sigmoid, binary cross-entropy
    Regression,
    /// `LIVELLI / 5`, 1-unit sigmoid, mean squared error
    PureRegression,
}

impl std::fmt::Display for ProblemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProblemType::Classification => write!(f, "classification"),
            ProblemType::Regression => write!(f, "regression"),
            ProblemType::PureRegression => write!(f, "pure_regression"),
        }
    }
}

impl FromStr for ProblemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "classification" => Ok(ProblemType::Classification),
            "regression" => Ok(ProblemType::Regression),
            "pure_regression" => Ok(ProblemType::PureRegression),
            _ => Err(format!(
                "Unknown problem type: '{}'. Use 'classification', 'regression' or 'pure_regression'.",
                s
            )),
        }
    }
}

/// Output nonlinearity of the last layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputHead {
    Softmax,
    Sigmoid,
}

impl OutputHead {
    /// Probabilities from logits, row by row
    pub fn activate(self, logits: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            OutputHead::Softmax => candle_nn::ops::softmax(logits, D::Minus1),
            OutputHead::Sigmoid => candle_nn::ops::sigmoid(logits),
        }
    }
}

impl ProblemType {
    pub fn head(self) -> OutputHead {
        match self {
            ProblemType::Classification => OutputHead::Softmax,
            ProblemType::Regression | ProblemType::PureRegression => OutputHead::Sigmoid,
        }
    }

    pub fn output_units(self) -> usize {
        match self {
            ProblemType::Classification => 2,
            ProblemType::Regression | ProblemType::PureRegression => 1,
        }
    }

    /// Name of the per-epoch primary metric in the history
    pub fn primary_metric(self) -> &'static str {
        match self {
            ProblemType::Classification => "accuracy",
            ProblemType::Regression => "binary_accuracy",
            ProblemType::PureRegression => "mae",
        }
    }

    /// Name of the loss function
    pub fn loss_name(self) -> &'static str {
        match self {
            ProblemType::Classification => "categorical_crossentropy",
            ProblemType::Regression => "binary_crossentropy",
            ProblemType::PureRegression => "mean_squared_error",
        }
    }

    /// Target matrix of `df`: one-hot `[no dropout, dropout]` for
    /// classification, a single rescaled `LIVELLI` column otherwise
    pub fn targets(self, df: &DataFrame) -> Result<Mat<f64>> {
        match self {
            ProblemType::Classification => {
                let labels = dropout_labels(df)?;
                Ok(Mat::from_fn(labels.len(), 2, |i, j| {
                    if (j == 1) == labels[i] {
                        1.0
                    } else {
                        0.0
                    }
                }))
            }
            ProblemType::Regression => {
                let levels = level_values(df)?;
                let max = MAX_LEVEL as f64;
                Ok(Mat::from_fn(levels.len(), 1, |i, _| (levels[i] - max).abs() / max))
            }
            ProblemType::PureRegression => {
                let levels = level_values(df)?;
                let max = MAX_LEVEL as f64;
                Ok(Mat::from_fn(levels.len(), 1, |i, _| levels[i] / max))
            }
        }
    }

    /// Targets in the form [`loss`](Self::loss) expects: class indices for
    /// classification, a `(rows, 1)` tensor otherwise
    pub fn target_tensor(self, targets: &Mat<f64>, device: &Device) -> candle_core::Result<Tensor> {
        match self {
            ProblemType::Classification => {
                let labels: Vec<u32> = (0..targets.nrows())
                    .map(|i| u32::from(targets[(i, 1)] > CLASSIFICATION_THRESHOLD))
                    .collect();
                Tensor::from_vec(labels, targets.nrows(), device)
            }
            ProblemType::Regression | ProblemType::PureRegression => mat_to_tensor(targets, device),
        }
    }

    /// Mean loss of a batch, computed from the output logits
    pub fn loss(self, logits: &Tensor, targets: &Tensor) -> candle_core::Result<Tensor> {
        match self {
            ProblemType::Classification => candle_nn::loss::cross_entropy(logits, targets),
            ProblemType::Regression => {
                candle_nn::loss::binary_cross_entropy_with_logit(logits, targets)
            }
            ProblemType::PureRegression => {
                candle_nn::loss::mse(&candle_nn::ops::sigmoid(logits)?, targets)
            }
        }
    }

    /// Whether row `i` of the targets is a positive case; a target of exactly
    /// 0.6 is `LIVELLI` 3 for `pure_regression`, hence `>=`
    pub fn truth_is_positive(self, targets: &Mat<f64>, i: usize) -> bool {
        match self {
            ProblemType::Classification => targets[(i, 1)] > CLASSIFICATION_THRESHOLD,
            _ => targets[(i, 0)] >= REGRESSION_THRESHOLD,
        }
    }

    /// Whether row `i` of the predictions is a positive prediction.
    ///
    /// Strictly above the threshold, as Keras thresholded metrics count.
    pub fn prediction_is_positive(self, probs: &Mat<f64>, i: usize) -> bool {
        match self {
            ProblemType::Classification => probs[(i, 1)] > CLASSIFICATION_THRESHOLD,
            _ => probs[(i, 0)] > REGRESSION_THRESHOLD,
        }
    }
}
