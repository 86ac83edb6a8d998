//! Matching, expansion and the per-frame update loop

pub mod expand;
pub mod matcher;
pub mod space;

pub use expand::{ExpansionState, FrameResult};
pub use matcher::{resolve, Match, ResolvedMatch};
pub use space::{EntityFrame, Space, SpaceEntity};
