//! Command-line argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dropout-risk - Train a school dropout risk model on INVALSI survey data
#[derive(Parser, Debug)]
#[command(name = "dropout-risk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Input dataset (CSV or Parquet). Either the cleaned export with
    /// question columns, or a dataset that already carries competency scores.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// JSON file mapping question columns to competency tags.
    /// When given, question columns are aggregated into competency scores.
    #[arg(long)]
    pub mapping: Option<PathBuf>,

    /// CSV field separator
    #[arg(long, default_value = ";", value_parser = parse_separator)]
    pub separator: u8,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan.
    #[arg(long, default_value = "10000")]
    pub infer_schema_length: usize,

    /// Write the dataset-with-competencies to this path (CSV or Parquet)
    #[arg(long)]
    pub save_aggregated: Option<PathBuf>,

    /// Missing score policy: "remove", "mean" (default) or "median"
    #[arg(long, default_value = "mean")]
    pub fill_nan: String,

    /// Class balancing of the training split: "random_undersampling" or "SMOTENC"
    #[arg(long, default_value = "random_undersampling")]
    pub sampling: String,

    /// Objective: "classification", "regression" or "pure_regression"
    #[arg(long, default_value = "classification")]
    pub problem_type: String,

    /// Batch normalization placement: "none", "dense_batch_activation",
    /// "dense_activation_batch" or "before_output"
    #[arg(long, default_value = "none")]
    pub batch_normalization: String,

    /// Hidden activation: "relu" or "leaky_relu"
    #[arg(long, default_value = "relu")]
    pub activation: String,

    /// Negative slope of the leaky ReLU
    #[arg(long, default_value = "0.3")]
    pub leaky_relu_alpha: f64,

    /// Enable dropout layers (input and after every hidden layer)
    #[arg(long, default_value = "false")]
    pub dropout_layer: bool,

    /// Dropout rate on the inputs (with --dropout-layer)
    #[arg(long, default_value = "0.2")]
    pub input_dropout_rate: f64,

    /// Dropout rate after hidden layers (with --dropout-layer)
    #[arg(long, default_value = "0.5")]
    pub hidden_dropout_rate: f64,

    /// Adam learning rate
    #[arg(long, default_value = "0.001")]
    pub learning_rate: f64,

    /// Maximum number of training epochs
    #[arg(long, default_value = "20")]
    pub epochs: usize,

    /// Mini-batch size; the partial final batch of every epoch is dropped
    #[arg(long, default_value = "32")]
    pub batch_size: usize,

    /// Neurons per hidden layer
    #[arg(long, default_value = "128")]
    pub neurons: usize,

    /// Number of hidden layers
    #[arg(long, default_value = "3")]
    pub layers: usize,

    /// Fraction of all records held out as the test split
    #[arg(long, default_value = "0.2")]
    pub test_fraction: f64,

    /// Fraction of the remaining records held out as the validation split
    #[arg(long, default_value = "0.2")]
    pub validation_fraction: f64,

    /// Keep the DROPOUT class ratio in every split
    #[arg(long, default_value = "false")]
    pub stratify: bool,

    /// Stop after this many epochs without validation loss improvement (0 disables)
    #[arg(long, default_value = "5")]
    pub early_stopping_patience: usize,

    /// Nearest neighbours considered by SMOTE-NC
    #[arg(long, default_value = "5")]
    pub smote_neighbors: usize,

    /// Seed for splitting, sampling, weight initialisation and shuffling
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Directory for the best-model checkpoint
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Write the per-epoch metric history to this JSON file.
    /// Defaults to the checkpoint directory.
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Skip interactive confirmation prompts
    #[arg(long, default_value = "false")]
    pub no_confirm: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Profile a raw INVALSI export and write it without the useless columns
    Clean {
        /// Raw export (CSV or Parquet)
        input: PathBuf,

        /// Output file (optional, defaults to input with '_cleaned' suffix)
        output: Option<PathBuf>,

        /// CSV field separator
        #[arg(long, default_value = ";", value_parser = parse_separator)]
        separator: u8,

        /// Number of rows to use for schema inference
        #[arg(long, default_value = "10000")]
        infer_schema_length: usize,
    },

    /// Replace question columns with competency scores and write the result
    Aggregate {
        /// Cleaned dataset (CSV or Parquet)
        input: PathBuf,

        /// JSON file mapping question columns to competency tags
        #[arg(long)]
        mapping: PathBuf,

        /// Output file (optional, defaults to input with '_competencies' suffix)
        output: Option<PathBuf>,

        /// CSV field separator
        #[arg(long, default_value = ";", value_parser = parse_separator)]
        separator: u8,

        /// Number of rows to use for schema inference
        #[arg(long, default_value = "10000")]
        infer_schema_length: usize,
    },
}

/// Output path next to `input` with `suffix` appended to the stem
pub fn derived_path(input: &std::path::Path, suffix: &str) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| std::path::Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let extension = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("csv");
    parent.join(format!("{}_{}.{}", stem, suffix, extension))
}

/// Validator for single-byte separators; `\t` is accepted for tabs
fn parse_separator(s: &str) -> Result<u8, String> {
    match s {
        "\\t" | "tab" => Ok(b'\t'),
        _ if s.len() == 1 && s.is_ascii() => Ok(s.as_bytes()[0]),
        _ => Err(format!(
            "separator must be a single ASCII character, got '{}'",
            s
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_separator() {
        assert_eq!(parse_separator(";"), Ok(b';'));
        assert_eq!(parse_separator("\\t"), Ok(b'\t'));
        assert!(parse_separator(";;").is_err());
    }

    #[test]
    fn test_derived_path() {
        let path = derived_path(std::path::Path::new("/data/invalsi.csv"), "cleaned");
        assert_eq!(path, PathBuf::from("/data/invalsi_cleaned.csv"));
    }
}
