//! CLI module - argument parsing, validated configuration, subcommands and prompts

pub mod args;
pub mod commands;
pub mod config;
mod prompts;

pub use args::{derived_path, Cli, Commands};
pub use commands::{run_aggregate, run_clean};
pub use config::{ConfigError, PipelineConfig};
pub use prompts::*;
