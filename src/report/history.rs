//! Run history export: metadata, per-epoch metrics and test evaluation

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::cli::PipelineConfig;
use crate::model::{EvaluationMetrics, MetricHistory, TrainingOutcome};
use crate::pipeline::ClassCounts;

/// Metadata about the training run
#[derive(Serialize)]
pub struct RunMetadata {
    /// Timestamp of the run (ISO 8601 format)
    pub timestamp: String,
    /// Crate version
    pub version: String,
    /// The validated configuration
    pub config: PipelineConfig,
    /// Feature vector width after encoding
    pub encoded_features: usize,
    pub class_counts_before_balancing: ClassCounts,
    pub class_counts_after_balancing: ClassCounts,
}

/// Training summary fields
#[derive(Serialize)]
pub struct TrainingSummary {
    /// Keras name of the loss the problem type trains with
    pub loss: String,
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_val_loss: f64,
    pub stopped_early: bool,
    pub checkpoints_written: usize,
}

/// Complete history export
#[derive(Serialize)]
pub struct HistoryExport {
    pub metadata: RunMetadata,
    pub training: TrainingSummary,
    /// Metric name -> value per epoch
    pub history: MetricHistory,
    /// Metric name -> value on the test split
    pub test: BTreeMap<String, f64>,
}

/// Everything the history export is built from
pub struct HistoryParams<'a> {
    pub config: &'a PipelineConfig,
    pub encoded_features: usize,
    pub before: ClassCounts,
    pub after: ClassCounts,
    pub outcome: &'a TrainingOutcome,
    pub test_metrics: &'a EvaluationMetrics,
}

pub fn build_history_export(params: &HistoryParams) -> HistoryExport {
    HistoryExport {
        metadata: RunMetadata {
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config: params.config.clone(),
            encoded_features: params.encoded_features,
            class_counts_before_balancing: params.before,
            class_counts_after_balancing: params.after,
        },
        training: TrainingSummary {
            loss: params.config.problem_type.loss_name().to_string(),
            epochs_run: params.outcome.epochs_run,
            best_epoch: params.outcome.best_epoch,
            best_val_loss: params.outcome.best_val_loss,
            stopped_early: params.outcome.stopped_early,
            checkpoints_written: params.outcome.checkpoints_written,
        },
        history: params.outcome.history.clone(),
        test: params
            .test_metrics
            .named_values()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    }
}

/// Export the run history to a JSON file
pub fn export_history(params: &HistoryParams, output_path: &Path) -> Result<()> {
    let export = build_history_export(params);

    let json =
        serde_json::to_string_pretty(&export).context("Failed to serialize run history to JSON")?;

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write run history to {}", output_path.display()))?;

    Ok(())
}
