//! Report module - console summaries and run history export

pub mod history;
pub mod summary;

pub use history::*;
pub use summary::*;
