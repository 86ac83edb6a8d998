pub mod config;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use error::{DimensionalError, Result};
pub use types::{EntityId, Frame, LeafId};
