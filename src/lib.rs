//! Dimensional - Parametric Dimension Expansion Engine

pub mod core;
pub mod engine;
pub mod expr;
pub mod stage;
