//! Model module - candle network, training loop and persistence

pub mod checkpoint;
pub mod layers;
pub mod metrics;
pub mod network;
pub mod problem;
pub mod tensor;
pub mod trainer;

pub use checkpoint::TrainedModel;
pub use metrics::{ConfusionCounts, EvaluationMetrics, MetricHistory};
pub use network::{ActivationKind, BatchNormPlacement, Network, NetworkConfig};
pub use problem::{OutputHead, ProblemType};
pub use trainer::{evaluate, fit, EncodedSplit, TrainingConfig, TrainingOutcome};
