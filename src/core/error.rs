use thiserror::Error;

#[derive(Error, Debug)]
pub enum DimensionalError {
    #[error("Missing binding for parameter: {0}")]
    MissingBinding(String),

    #[error("Template cycle fuse tripped: {leaf_visits} leaf visits, {steps} steps")]
    TemplateCycleExceeded { leaf_visits: usize, steps: usize },

    #[error("Unknown spatial dimension: {0}")]
    UnknownDimension(String),

    #[error("Unknown template reference: {0}")]
    UnknownTemplate(String),

    #[error("Unknown parametric dimension: {0}")]
    UnknownParameter(String),

    #[error("Entity not found: {0:?}")]
    EntityNotFound(crate::core::types::EntityId),

    #[error("Stage validation failed: {}", .0.join(", "))]
    StageValidation(Vec<String>),

    #[error("Stage parse error: {0}")]
    StageParse(#[from] serde_json::Error),

    #[error("Expression compile error: {0}")]
    ExpressionCompile(String),
}

pub type Result<T> = std::result::Result<T, DimensionalError>;
