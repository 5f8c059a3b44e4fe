//! Feed-forward network assembly
//!
//! Layout: optional input dropout, `hidden_layers` blocks of dense +
//! activation (with optional batch normalisation and dropout), optional batch
//! normalisation before the output, output dense with a softmax or sigmoid
//! head. Parameters and batch-norm statistics live in one [`VarMap`], which
//! is what checkpoints save and restore.

use std::str::FromStr;

use std::path::Path;
use std::sync::MutexGuard;

use anyhow::{anyhow, bail, Context, Result};
use candle_core::{Device, Tensor, Var};
use candle_nn::{Dropout, ModuleT, VarBuilder, VarMap};
use faer::Mat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::layers::{batch_norm, dense, Activation, Initializer, Layer, NETWORK_DTYPE};
use super::problem::{OutputHead, ProblemType};
use super::tensor::{mat_to_tensor, tensor_to_mat};

/// Default negative slope of the leaky ReLU
pub const DEFAULT_LEAKY_RELU_ALPHA: f64 = 0.3;

/// Where batch normalisation goes, if anywhere
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchNormPlacement {
    #[default]
    None,
    /// dense → batch norm → activation, in every hidden block
    DenseBatchActivation,
    /// dense → activation → batch norm, in every hidden block
    DenseActivationBatch,
    /// once, between the last hidden block and the output layer
    BeforeOutput,
}

impl std::fmt::Display for BatchNormPlacement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchNormPlacement::None => write!(f, "none"),
            BatchNormPlacement::DenseBatchActivation => write!(f, "dense_batch_activation"),
            BatchNormPlacement::DenseActivationBatch => write!(f, "dense_activation_batch"),
            BatchNormPlacement::BeforeOutput => write!(f, "before_output"),
        }
    }
}

impl FromStr for BatchNormPlacement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "none" | "off" => Ok(BatchNormPlacement::None),
            "dense_batch_activation" => Ok(BatchNormPlacement::DenseBatchActivation),
            "dense_activation_batch" => Ok(BatchNormPlacement::DenseActivationBatch),
            "before_output" => Ok(BatchNormPlacement::BeforeOutput),
            _ => Err(format!(
                "Unknown batch normalization placement: '{}'. Use 'none', \
                 'dense_batch_activation', 'dense_activation_batch' or 'before_output'.",
                s
            )),
        }
    }
}

/// Hidden-layer activation function
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    #[default]
    Relu,
    LeakyRelu,
}

impl std::fmt::Display for ActivationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivationKind::Relu => write!(f, "relu"),
            ActivationKind::LeakyRelu => write!(f, "leaky_relu"),
        }
    }
}

impl FromStr for ActivationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "relu" => Ok(ActivationKind::Relu),
            "leaky_relu" | "leakyrelu" => Ok(ActivationKind::LeakyRelu),
            _ => Err(format!(
                "Unknown activation: '{}'. Use 'relu' or 'leaky_relu'.",
                s
            )),
        }
    }
}

/// Shape and regularisation of the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub input_width: usize,
    pub hidden_layers: usize,
    pub neurons: usize,
    pub activation: ActivationKind,
    pub leaky_relu_alpha: f64,
    pub batch_normalization: BatchNormPlacement,
    /// Dropout rate applied to the inputs
    pub input_dropout: Option<f64>,
    /// Dropout rate applied after every hidden block
    pub hidden_dropout: Option<f64>,
}

impl NetworkConfig {
    fn alpha(&self) -> f64 {
        match self.activation {
            ActivationKind::Relu => 0.0,
            ActivationKind::LeakyRelu => self.leaky_relu_alpha,
        }
    }
}

/// Values of every variable, for restoring the best weights in memory
pub type WeightSnapshot = Vec<(String, Tensor)>;

/// A built network
pub struct Network {
    config: NetworkConfig,
    head: OutputHead,
    varmap: VarMap,
    layers: Vec<Layer>,
    device: Device,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("config", &self.config)
            .field("head", &self.head)
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl Network {
    /// Build a freshly initialised network; the same seed gives the same weights.
    pub fn build(config: &NetworkConfig, problem_type: ProblemType, seed: u64) -> Result<Self> {
        if config.input_width == 0 {
            bail!("Cannot build a network with no input features");
        }
        if config.hidden_layers > 0 && config.neurons == 0 {
            bail!("Hidden layers need at least one neuron");
        }

        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, NETWORK_DTYPE, &device);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut layers = Vec::new();
        let activation = Activation {
            alpha: config.alpha(),
        };

        if let Some(rate) = config.input_dropout {
            layers.push(Layer::Dropout(Dropout::new(rate as f32)));
        }

        let mut fan_in = config.input_width;
        for index in 0..config.hidden_layers {
            let vb = vb.pp(format!("hidden_{}", index));
            layers.push(Layer::Dense(dense(
                fan_in,
                config.neurons,
                Initializer::HeNormal,
                &mut rng,
                vb.pp("dense"),
            )?));
            match config.batch_normalization {
                BatchNormPlacement::DenseBatchActivation => {
                    layers.push(Layer::BatchNorm(batch_norm(config.neurons, vb.pp("batch_norm"))?));
                    layers.push(Layer::Activation(activation));
                }
                BatchNormPlacement::DenseActivationBatch => {
                    layers.push(Layer::Activation(activation));
                    layers.push(Layer::BatchNorm(batch_norm(config.neurons, vb.pp("batch_norm"))?));
                }
                BatchNormPlacement::None | BatchNormPlacement::BeforeOutput => {
                    layers.push(Layer::Activation(activation));
                }
            }
            if let Some(rate) = config.hidden_dropout {
                layers.push(Layer::Dropout(Dropout::new(rate as f32)));
            }
            fan_in = config.neurons;
        }

        if config.batch_normalization == BatchNormPlacement::BeforeOutput {
            layers.push(Layer::BatchNorm(batch_norm(fan_in, vb.pp("output_batch_norm"))?));
        }

        layers.push(Layer::Dense(dense(
            fan_in,
            problem_type.output_units(),
            Initializer::GlorotNormal,
            &mut rng,
            vb.pp("output"),
        )?));

        Ok(Self {
            config: config.clone(),
            head: problem_type.head(),
            varmap,
            layers,
            device,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn head(&self) -> OutputHead {
        self.head
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn variables(&self) -> Result<MutexGuard<'_, std::collections::HashMap<String, Var>>> {
        self.varmap
            .data()
            .lock()
            .map_err(|_| anyhow!("Network variables are unavailable"))
    }

    /// Parameters the optimiser updates: everything but batch-norm running statistics
    pub fn trainable_vars(&self) -> Result<Vec<Var>> {
        let variables = self.variables()?;
        let mut named: Vec<(&String, &Var)> = variables
            .iter()
            .filter(|(name, _)| !is_running_statistic(name))
            .collect();
        named.sort_by(|a, b| a.0.cmp(b.0));
        Ok(named.into_iter().map(|(_, var)| var.clone()).collect())
    }

    /// Number of trainable scalars
    pub fn parameter_count(&self) -> Result<usize> {
        Ok(self
            .trainable_vars()?
            .iter()
            .map(|var| var.as_tensor().elem_count())
            .sum())
    }

    /// Output logits; `train` enables dropout and batch statistics
    pub fn forward_t(&self, x: &Tensor, train: bool) -> Result<Tensor> {
        let mut out = x.clone();
        for layer in &self.layers {
            out = layer.forward_t(&out, train)?;
        }
        Ok(out)
    }

    /// Inference-mode probabilities: dropout off, batch norm on moving statistics
    pub fn predict(&self, x: &Mat<f64>) -> Result<Mat<f64>> {
        let logits = self.forward_t(&mat_to_tensor(x, &self.device)?, false)?;
        Ok(tensor_to_mat(&self.head.activate(&logits)?)?)
    }

    /// Copy of every variable's current value
    pub fn snapshot(&self) -> Result<WeightSnapshot> {
        let variables = self.variables()?;
        variables
            .iter()
            .map(|(name, var)| Ok((name.clone(), var.as_tensor().copy()?)))
            .collect()
    }

    /// Write a [`snapshot`](Self::snapshot) back into the variables
    pub fn restore(&self, snapshot: &WeightSnapshot) -> Result<()> {
        let variables = self.variables()?;
        for (name, value) in snapshot {
            let var = variables
                .get(name)
                .ok_or_else(|| anyhow!("Snapshot variable '{}' is not part of the network", name))?;
            var.set(value)?;
        }
        Ok(())
    }

    /// Save weights and batch-norm statistics as safetensors
    pub fn save_weights(&self, path: &Path) -> Result<()> {
        self.varmap
            .save(path)
            .with_context(|| format!("Failed to write weights: {}", path.display()))
    }

    /// Overwrite every variable from a safetensors file written by [`save_weights`](Self::save_weights)
    pub fn load_weights(&mut self, path: &Path) -> Result<()> {
        self.varmap
            .load(path)
            .with_context(|| format!("Failed to read weights: {}", path.display()))
    }
}

fn is_running_statistic(name: &str) -> bool {
    name.ends_with("running_mean") || name.ends_with("running_var")
}
