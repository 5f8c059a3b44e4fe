//! Validated run configuration
//!
//! Every string option is parsed into its closed enum and every numeric
//! option is range-checked here, before any file is touched.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use super::args::Cli;
use crate::model::{ActivationKind, BatchNormPlacement, NetworkConfig, ProblemType, TrainingConfig};
use crate::pipeline::{FillPolicy, LoadOptions, SamplingStrategy};

/// Invalid option values or combinations
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Input file is required. Use -i/--input to specify a file.")]
    MissingInput,

    #[error("invalid value for --{option}: {message}")]
    InvalidChoice {
        option: &'static str,
        message: String,
    },

    #[error("--{option} must be in {range}, got {value}")]
    OutOfRange {
        option: &'static str,
        range: &'static str,
        value: f64,
    },

    #[error("--{option} must be at least 1")]
    Zero { option: &'static str },

    #[error("batch normalization '{placement}' needs at least one hidden layer")]
    BatchNormWithoutHiddenLayers { placement: BatchNormPlacement },

    #[error("--smote-neighbors must be at least 1 when sampling with SMOTENC")]
    NoSmoteNeighbors,
}

/// Everything a training run needs, typed and validated
#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub mapping: Option<PathBuf>,
    #[serde(skip)]
    pub load: LoadOptions,
    pub save_aggregated: Option<PathBuf>,
    pub fill_policy: FillPolicy,
    pub sampling: SamplingStrategy,
    pub smote_neighbors: usize,
    pub problem_type: ProblemType,
    pub network: NetworkConfig,
    pub learning_rate: f64,
    pub epochs: usize,
    pub batch_size: usize,
    pub test_fraction: f64,
    pub validation_fraction: f64,
    pub stratify: bool,
    pub early_stopping_patience: Option<usize>,
    pub seed: u64,
    pub checkpoint_dir: PathBuf,
    pub history_path: PathBuf,
    pub confirm: bool,
}

fn choice<T: std::str::FromStr<Err = String>>(
    option: &'static str,
    value: &str,
) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|message| ConfigError::InvalidChoice { option, message })
}

fn open_unit_interval(option: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            option,
            range: "(0, 1)",
            value,
        })
    }
}

fn positive_count(option: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(ConfigError::Zero { option })
    } else {
        Ok(value)
    }
}

impl PipelineConfig {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let input = cli.input.clone().ok_or(ConfigError::MissingInput)?;

        let fill_policy: FillPolicy = choice("fill-nan", &cli.fill_nan)?;
        let sampling: SamplingStrategy = choice("sampling", &cli.sampling)?;
        let problem_type: ProblemType = choice("problem-type", &cli.problem_type)?;
        let batch_normalization: BatchNormPlacement =
            choice("batch-normalization", &cli.batch_normalization)?;
        let activation: ActivationKind = choice("activation", &cli.activation)?;

        let test_fraction = open_unit_interval("test-fraction", cli.test_fraction)?;
        let validation_fraction =
            open_unit_interval("validation-fraction", cli.validation_fraction)?;

        if !(cli.learning_rate > 0.0 && cli.learning_rate.is_finite()) {
            return Err(ConfigError::OutOfRange {
                option: "learning-rate",
                range: "(0, inf)",
                value: cli.learning_rate,
            });
        }
        if !(cli.leaky_relu_alpha >= 0.0 && cli.leaky_relu_alpha.is_finite()) {
            return Err(ConfigError::OutOfRange {
                option: "leaky-relu-alpha",
                range: "[0, inf)",
                value: cli.leaky_relu_alpha,
            });
        }

        let epochs = positive_count("epochs", cli.epochs)?;
        let batch_size = positive_count("batch-size", cli.batch_size)?;
        let neurons = positive_count("neurons", cli.neurons)?;

        if cli.layers == 0 && batch_normalization != BatchNormPlacement::None {
            return Err(ConfigError::BatchNormWithoutHiddenLayers {
                placement: batch_normalization,
            });
        }

        let (input_dropout, hidden_dropout) = if cli.dropout_layer {
            (
                Some(open_unit_interval("input-dropout-rate", cli.input_dropout_rate)?),
                Some(open_unit_interval("hidden-dropout-rate", cli.hidden_dropout_rate)?),
            )
        } else {
            (None, None)
        };

        if sampling == SamplingStrategy::SmoteNc && cli.smote_neighbors == 0 {
            return Err(ConfigError::NoSmoteNeighbors);
        }

        let history_path = cli.history.clone().unwrap_or_else(|| {
            cli.checkpoint_dir
                .join(format!("history_{}.json", problem_type))
        });

        Ok(Self {
            input,
            mapping: cli.mapping.clone(),
            load: LoadOptions {
                separator: cli.separator,
                infer_schema_length: cli.infer_schema_length,
            },
            save_aggregated: cli.save_aggregated.clone(),
            fill_policy,
            sampling,
            smote_neighbors: cli.smote_neighbors,
            problem_type,
            network: NetworkConfig {
                input_width: 0,
                hidden_layers: cli.layers,
                neurons,
                activation,
                leaky_relu_alpha: cli.leaky_relu_alpha,
                batch_normalization,
                input_dropout,
                hidden_dropout,
            },
            learning_rate: cli.learning_rate,
            epochs,
            batch_size,
            test_fraction,
            validation_fraction,
            stratify: cli.stratify,
            early_stopping_patience: match cli.early_stopping_patience {
                0 => None,
                n => Some(n),
            },
            seed: cli.seed,
            checkpoint_dir: cli.checkpoint_dir.clone(),
            history_path,
            confirm: !cli.no_confirm,
        })
    }

    /// Trainer settings derived from this configuration
    pub fn training(&self, show_progress: bool) -> TrainingConfig {
        TrainingConfig {
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            early_stopping_patience: self.early_stopping_patience,
            checkpoint_path: Some(crate::model::TrainedModel::checkpoint_path(
                &self.checkpoint_dir,
                self.problem_type,
            )),
            seed: self.seed,
            show_progress,
        }
    }
}
