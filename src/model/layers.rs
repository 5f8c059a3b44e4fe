//! Network layers on candle
//!
//! Every layer runs through [`ModuleT`], so dropout and batch normalisation
//! switch between training and inference behaviour with the `train` flag.

use candle_core::{DType, Device, Result, Tensor, Var};
use candle_nn::{BatchNorm, BatchNormConfig, Dropout, Init, Linear, Module, ModuleT, VarBuilder};
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::StandardNormal;

/// Keras-style truncated normal: samples beyond two standard deviations are
/// redrawn, and the scale compensates for the truncation
const TRUNCATED_NORMAL_CORRECTION: f64 = 0.879_625_661_034_239_8;

/// Batch normalisation moving-average momentum, Keras convention: the
/// weight kept by the running statistics at every step
pub const BATCH_NORM_MOMENTUM: f64 = 0.99;

/// Batch normalisation variance epsilon
pub const BATCH_NORM_EPSILON: f64 = 1e-3;

/// Element type of every parameter and activation
pub const NETWORK_DTYPE: DType = DType::F64;

/// Weight initialisation scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initializer {
    /// He normal, for ReLU-family hidden layers
    HeNormal,
    /// Glorot normal, for the output layer
    GlorotNormal,
}

impl Initializer {
    fn stddev(self, fan_in: usize, fan_out: usize) -> f64 {
        let base = match self {
            Initializer::HeNormal => (2.0 / fan_in.max(1) as f64).sqrt(),
            Initializer::GlorotNormal => (2.0 / (fan_in + fan_out).max(1) as f64).sqrt(),
        };
        base / TRUNCATED_NORMAL_CORRECTION
    }

    /// Seeded `(fan_out, fan_in)` weight tensor, the layout [`Linear`] expects
    pub fn sample(
        self,
        fan_in: usize,
        fan_out: usize,
        rng: &mut StdRng,
        device: &Device,
    ) -> Result<Tensor> {
        let stddev = self.stddev(fan_in, fan_out);
        let values: Vec<f64> = (0..fan_in * fan_out)
            .map(|_| loop {
                let z: f64 = rng.sample(StandardNormal);
                if z.abs() <= 2.0 {
                    break z * stddev;
                }
            })
            .collect();
        Tensor::from_vec(values, (fan_out, fan_in), device)
    }
}

/// Fully connected layer with seeded weights and zero bias
pub fn dense(
    fan_in: usize,
    fan_out: usize,
    init: Initializer,
    rng: &mut StdRng,
    vb: VarBuilder,
) -> Result<Linear> {
    let weight = vb.get_with_hints((fan_out, fan_in), "weight", Init::Const(0.0))?;
    Var::from_tensor(&weight)?.set(&init.sample(fan_in, fan_out, rng, vb.device())?)?;
    let bias = vb.get_with_hints(fan_out, "bias", Init::Const(0.0))?;
    Ok(Linear::new(weight, Some(bias)))
}

/// Batch normalisation with the Keras momentum and epsilon
pub fn batch_norm(features: usize, vb: VarBuilder) -> Result<BatchNorm> {
    let config = BatchNormConfig {
        eps: BATCH_NORM_EPSILON,
        remove_mean: true,
        affine: true,
        // candle weighs the new batch statistics by `momentum`
        momentum: 1.0 - BATCH_NORM_MOMENTUM,
    };
    candle_nn::batch_norm(features, config, vb)
}

/// Hidden-layer activation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Activation {
    /// Slope for negative inputs: 0.0 is ReLU, > 0.0 leaky ReLU
    pub alpha: f64,
}

impl Module for Activation {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        if self.alpha == 0.0 {
            xs.relu()
        } else {
            candle_nn::ops::leaky_relu(xs, self.alpha)
        }
    }
}

/// One layer of the stack
#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Linear),
    BatchNorm(BatchNorm),
    Activation(Activation),
    /// Inverted dropout, active only while training
    Dropout(Dropout),
}

impl ModuleT for Layer {
    fn forward_t(&self, xs: &Tensor, train: bool) -> Result<Tensor> {
        match self {
            Layer::Dense(layer) => layer.forward(xs),
            Layer::BatchNorm(layer) => layer.forward_t(xs, train),
            Layer::Activation(layer) => layer.forward(xs),
            Layer::Dropout(layer) => layer.forward_t(xs, train),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_nn::VarMap;
    use rand::SeedableRng;

    #[test]
    fn test_initializer_is_seeded_and_truncated() {
        let device = Device::Cpu;
        let a = Initializer::HeNormal
            .sample(8, 4, &mut StdRng::seed_from_u64(1), &device)
            .unwrap();
        let b = Initializer::HeNormal
            .sample(8, 4, &mut StdRng::seed_from_u64(1), &device)
            .unwrap();
        assert_eq!(a.dims(), &[4, 8]);

        let a: Vec<Vec<f64>> = a.to_vec2().unwrap();
        let b: Vec<Vec<f64>> = b.to_vec2().unwrap();
        assert_eq!(a, b);

        let limit = 2.0 * Initializer::HeNormal.stddev(8, 4);
        assert!(a.iter().flatten().all(|w| w.abs() <= limit));
    }

    #[test]
    fn test_glorot_is_narrower_than_he() {
        assert!(Initializer::GlorotNormal.stddev(8, 8) < Initializer::HeNormal.stddev(8, 8));
    }

    #[test]
    fn test_dense_weights_live_in_the_var_map() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, NETWORK_DTYPE, &Device::Cpu);
        let layer = dense(3, 2, Initializer::HeNormal, &mut StdRng::seed_from_u64(5), vb.pp("d"))
            .unwrap();

        let stored = varmap.get((2, 3), "d.weight", Init::Const(0.0), NETWORK_DTYPE, &Device::Cpu);
        let stored: Vec<Vec<f64>> = stored.unwrap().to_vec2().unwrap();
        let layer_weights: Vec<Vec<f64>> = layer.weight().to_vec2().unwrap();
        assert_eq!(stored, layer_weights);
        assert!(stored.iter().flatten().any(|w| *w != 0.0));
    }

    #[test]
    fn test_leaky_relu_scales_negatives() {
        let x = Tensor::new(&[[-2.0f64, 3.0]], &Device::Cpu).unwrap();
        let relu: Vec<Vec<f64>> = Activation { alpha: 0.0 }.forward(&x).unwrap().to_vec2().unwrap();
        let leaky: Vec<Vec<f64>> = Activation { alpha: 0.3 }.forward(&x).unwrap().to_vec2().unwrap();
        assert_eq!(relu, vec![vec![0.0, 3.0]]);
        assert!((leaky[0][0] + 0.6).abs() < 1e-12);
        assert_eq!(leaky[0][1], 3.0);
    }

    #[test]
    fn test_dropout_is_identity_at_inference() {
        let x = Tensor::new(&[[1.0f64, 2.0, 3.0]], &Device::Cpu).unwrap();
        let layer = Layer::Dropout(Dropout::new(0.5));
        let out: Vec<Vec<f64>> = layer.forward_t(&x, false).unwrap().to_vec2().unwrap();
        assert_eq!(out, vec![vec![1.0, 2.0, 3.0]]);
    }
}
