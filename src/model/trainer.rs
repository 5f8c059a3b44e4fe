//! Mini-batch training with early stopping and best-model checkpointing

use std::path::PathBuf;

use anyhow::Result;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use faer::Mat;
use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use super::checkpoint::TrainedModel;
use super::metrics::{EvaluationMetrics, MetricAccumulator, MetricHistory};
use super::network::{Network, WeightSnapshot};
use super::problem::ProblemType;
use super::tensor::{mat_to_tensor, row_index, tensor_to_mat};
use crate::pipeline::error::PipelineError;
use crate::utils::progress::{create_progress_bar, finish_with_success, finish_with_warning};

pub const ADAM_BETA_1: f64 = 0.9;
pub const ADAM_BETA_2: f64 = 0.999;
pub const ADAM_EPSILON: f64 = 1e-7;

/// Training hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Epochs without validation-loss improvement before stopping; `None` disables
    pub early_stopping_patience: Option<usize>,
    /// Where the best model is written whenever validation loss improves
    pub checkpoint_path: Option<PathBuf>,
    pub seed: u64,
    /// Show the epoch progress bar
    pub show_progress: bool,
}

/// Encoded features and targets of one split
#[derive(Debug, Clone)]
pub struct EncodedSplit {
    pub features: Mat<f64>,
    pub targets: Mat<f64>,
}

impl EncodedSplit {
    pub fn rows(&self) -> usize {
        self.features.nrows()
    }
}

/// What happened during [`fit`]
#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub history: MetricHistory,
    pub epochs_run: usize,
    /// 1-based epoch with the lowest validation loss
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub stopped_early: bool,
    pub checkpoints_written: usize,
}

/// Gather rows `indices` of `m`
fn gather_rows(m: &Mat<f64>, indices: &[usize]) -> Mat<f64> {
    Mat::from_fn(indices.len(), m.ncols(), |i, j| m[(indices[i], j)])
}

/// Run the whole split through the network in inference mode
pub fn evaluate(
    network: &Network,
    problem_type: ProblemType,
    split: &EncodedSplit,
) -> Result<EvaluationMetrics> {
    let mut acc = MetricAccumulator::new(problem_type);
    if split.rows() == 0 {
        return Ok(acc.finish());
    }

    let device = network.device();
    let logits = network.forward_t(&mat_to_tensor(&split.features, device)?, false)?;
    let targets = problem_type.target_tensor(&split.targets, device)?;
    let loss = problem_type.loss(&logits, &targets)?.to_scalar::<f64>()?;
    let probs = tensor_to_mat(&problem_type.head().activate(&logits)?)?;
    acc.update(&probs, &split.targets, loss);
    Ok(acc.finish())
}

/// Adam with the Keras defaults: AdamW without weight decay
fn adam(network: &Network, learning_rate: f64) -> Result<AdamW> {
    let params = ParamsAdamW {
        lr: learning_rate,
        beta1: ADAM_BETA_1,
        beta2: ADAM_BETA_2,
        eps: ADAM_EPSILON,
        weight_decay: 0.0,
    };
    Ok(AdamW::new(network.trainable_vars()?, params)?)
}

/// Train `model.network` on `training`, validating on `validation` after
/// every epoch.
///
/// Every epoch shuffles the training rows and processes only full batches.
/// With early stopping enabled the best-validation weights are restored at
/// the end.
pub fn fit(
    model: &mut TrainedModel,
    training: &EncodedSplit,
    validation: &EncodedSplit,
    config: &TrainingConfig,
) -> Result<TrainingOutcome> {
    let rows = training.rows();
    let batches = rows / config.batch_size.max(1);
    if config.batch_size == 0 || batches == 0 {
        return Err(PipelineError::TrainingSplitTooSmall {
            rows,
            batch_size: config.batch_size,
        }
        .into());
    }

    let problem_type = model.problem_type;
    let device = model.network.device().clone();
    let features = mat_to_tensor(&training.features, &device)?;
    let targets = problem_type.target_tensor(&training.targets, &device)?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut optimizer = adam(&model.network, config.learning_rate)?;
    let mut history = MetricHistory::default();
    let mut order: Vec<usize> = (0..rows).collect();

    let mut best: Option<(f64, usize, WeightSnapshot)> = None;
    let mut epochs_without_improvement = 0;
    let mut stopped_early = false;
    let mut checkpoints_written = 0;
    let mut epochs_run = 0;

    let pb = if config.show_progress {
        create_progress_bar(config.epochs as u64, "Training")
    } else {
        ProgressBar::hidden()
    };

    for epoch in 1..=config.epochs {
        order.shuffle(&mut rng);
        let mut acc = MetricAccumulator::new(problem_type);

        for batch in order.chunks_exact(config.batch_size) {
            let index = row_index(batch, &device)?;
            let x = features.index_select(&index, 0)?;
            let y = targets.index_select(&index, 0)?;

            let logits = model.network.forward_t(&x, true)?;
            let loss = problem_type.loss(&logits, &y)?;
            let loss_value = loss.to_scalar::<f64>()?;
            if !loss_value.is_finite() {
                pb.abandon();
                return Err(PipelineError::TrainingDiverged {
                    epoch,
                    loss: loss_value,
                }
                .into());
            }

            let probs = tensor_to_mat(&problem_type.head().activate(&logits)?)?;
            acc.update(&probs, &gather_rows(&training.targets, batch), loss_value);
            optimizer.backward_step(&loss)?;
        }

        let train_metrics = acc.finish();
        let val_metrics = evaluate(&model.network, problem_type, validation)?;
        if !val_metrics.loss.is_finite() {
            pb.abandon();
            return Err(PipelineError::TrainingDiverged {
                epoch,
                loss: val_metrics.loss,
            }
            .into());
        }

        history.record("", &train_metrics);
        history.record("val_", &val_metrics);
        epochs_run = epoch;

        let improved = best
            .as_ref()
            .map_or(true, |(loss, _, _)| val_metrics.loss < *loss);
        if improved {
            best = Some((val_metrics.loss, epoch, model.network.snapshot()?));
            epochs_without_improvement = 0;
            if let Some(path) = &config.checkpoint_path {
                model.save(path)?;
                checkpoints_written += 1;
            }
        } else {
            epochs_without_improvement += 1;
        }

        pb.set_message(format!(
            "Epoch {} - loss {:.4} - val_loss {:.4}",
            epoch, train_metrics.loss, val_metrics.loss
        ));
        pb.inc(1);

        if let Some(patience) = config.early_stopping_patience {
            if epochs_without_improvement >= patience {
                stopped_early = true;
                break;
            }
        }
    }

    let (best_val_loss, best_epoch) = match best {
        Some((loss, epoch, snapshot)) => {
            if config.early_stopping_patience.is_some() {
                model.network.restore(&snapshot)?;
            }
            (loss, epoch)
        }
        None => (f64::NAN, 0),
    };

    if stopped_early {
        finish_with_warning(
            &pb,
            &format!("Early stop after epoch {} (best epoch {})", epochs_run, best_epoch),
        );
    } else {
        finish_with_success(&pb, &format!("Trained {} epoch(s)", epochs_run));
    }

    Ok(TrainingOutcome {
        history,
        epochs_run,
        best_epoch,
        best_val_loss,
        stopped_early,
        checkpoints_written,
    })
}
