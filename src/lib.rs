//! Dropout risk: school dropout prediction library
//!
//! Feature engineering, class balancing, heterogeneous feature encoding and
//! neural network training over INVALSI standardized-test survey data.

pub mod cli;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod utils;
