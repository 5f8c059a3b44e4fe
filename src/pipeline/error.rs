//! Error types for the data pipeline.
//!
//! Most functions return `anyhow::Result`; the conditions below are fatal to
//! a run and are kept typed so callers can match on them.

use thiserror::Error;

/// Fatal conditions raised by pipeline stages and the trainer.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A column the current stage cannot work without is absent.
    #[error("required column '{column}' not found (needed for {needed_for})")]
    MissingColumn {
        column: String,
        needed_for: &'static str,
    },

    /// One of the two `DROPOUT` classes has no records.
    #[error("degenerate class distribution: {dropout} dropout vs {no_dropout} no-dropout records")]
    DegenerateClasses { dropout: usize, no_dropout: usize },

    /// Oversampling needs at least two minority records to find neighbours.
    #[error("SMOTE-NC needs at least 2 minority records, found {found}")]
    InsufficientMinority { found: usize },

    /// Resampling cannot interpolate over missing cells.
    #[error("column '{column}' contains {nulls} null value(s); SMOTE-NC requires complete data")]
    NullsInResampling { column: String, nulls: usize },

    /// `LIVELLI` outside the 0..=5 range.
    #[error("LIVELLI value {value} is outside the valid range 0..=5")]
    InvalidLevel { value: f64 },

    /// Not even one full batch fits in the training split.
    #[error("training split has {rows} record(s), fewer than one batch of {batch_size}")]
    TrainingSplitTooSmall { rows: usize, batch_size: usize },

    /// Loss became NaN or infinite.
    #[error("training diverged at epoch {epoch}: loss is {loss}")]
    TrainingDiverged { epoch: usize, loss: f64 },

    /// A split would end up with no records.
    #[error("{split} split would be empty ({rows} record(s), fraction {fraction})")]
    EmptySplit {
        split: &'static str,
        rows: usize,
        fraction: f64,
    },
}
