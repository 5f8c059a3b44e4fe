//! Trained model persistence
//!
//! A checkpoint is two files side by side: `<name>.json`, a manifest holding
//! the problem type, the fitted encoder and the network configuration, and
//! `<name>.safetensors` with the weights and batch-norm statistics.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use faer::Mat;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::network::{Network, NetworkConfig};
use super::problem::ProblemType;
use crate::pipeline::encoder::EncoderState;

/// Everything needed to score new records: problem type, fitted encoder and
/// network weights with batch-norm statistics
#[derive(Debug)]
pub struct TrainedModel {
    pub problem_type: ProblemType,
    pub encoder: EncoderState,
    pub network: Network,
}

/// JSON half of a checkpoint
#[derive(Debug, Serialize, Deserialize)]
struct CheckpointManifest {
    problem_type: ProblemType,
    network: NetworkConfig,
    encoder: EncoderState,
    /// File name of the weights, relative to the manifest
    weights: String,
}

impl TrainedModel {
    /// A fresh, untrained model sized to the encoder's width
    pub fn build(
        problem_type: ProblemType,
        encoder: EncoderState,
        config: &NetworkConfig,
        seed: u64,
    ) -> Result<Self> {
        let config = NetworkConfig {
            input_width: encoder.width(),
            ..config.clone()
        };
        let network = Network::build(&config, problem_type, seed)?;
        Ok(Self {
            problem_type,
            encoder,
            network,
        })
    }

    /// `<dir>/best_model_<problem_type>.json`
    pub fn checkpoint_path(dir: &Path, problem_type: ProblemType) -> PathBuf {
        dir.join(format!("best_model_{}.json", problem_type))
    }

    /// Weights file next to the manifest at `path`
    pub fn weights_path(path: &Path) -> PathBuf {
        path.with_extension("safetensors")
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create checkpoint directory: {}", parent.display())
                })?;
            }
        }

        let weights_path = Self::weights_path(path);
        self.network.save_weights(&weights_path)?;

        let manifest = CheckpointManifest {
            problem_type: self.problem_type,
            network: self.network.config().clone(),
            encoder: self.encoder.clone(),
            weights: weights_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let json = serde_json::to_string_pretty(&manifest).context("Failed to serialize model")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write checkpoint: {}", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read checkpoint: {}", path.display()))?;
        let manifest: CheckpointManifest = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse checkpoint: {}", path.display()))?;

        let weights_path = path
            .parent()
            .map_or_else(|| PathBuf::from(&manifest.weights), |dir| dir.join(&manifest.weights));
        let mut network = Network::build(&manifest.network, manifest.problem_type, 0)?;
        network.load_weights(&weights_path)?;

        Ok(Self {
            problem_type: manifest.problem_type,
            encoder: manifest.encoder,
            network,
        })
    }

    /// Encode `df` with the stored encoder and run inference
    pub fn predict(&self, df: &DataFrame) -> Result<Mat<f64>> {
        let features = self.encoder.transform(df)?;
        self.network.predict(&features)
    }
}
