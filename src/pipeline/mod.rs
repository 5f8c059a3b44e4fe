//! Pipeline module - data preparation stages from raw export to encoded splits

pub mod balance;
pub mod competency;
pub mod correlation;
pub mod encoder;
pub mod error;
pub mod loader;
pub mod missing;
pub mod profile;
pub mod smote;
pub mod split;
pub mod target;
pub mod taxonomy;

pub use balance::*;
pub use competency::*;
pub use correlation::*;
pub use encoder::*;
pub use error::PipelineError;
pub use loader::*;
pub use missing::*;
pub use profile::*;
pub use smote::{smote_nc, Factorizer};
pub use split::*;
pub use target::*;
pub use taxonomy::*;
