//! Expression contract for parametric dimension values
//!
//! The engine never parses expression text itself. Stage data carries
//! expressions as opaque compiled objects satisfying [`Expression`]; an
//! external compiler (anything implementing [`ExpressionCompiler`]) turns
//! source strings into them at load time. A plain numeric literal satisfies
//! the same contract trivially through [`DimensionValue::Literal`].

use std::fmt;
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};

use crate::core::error::Result;

/// Parameter bindings handed to expression evaluation
pub type Bindings = AHashMap<String, f64>;

/// A compiled numeric formula over named parameters
///
/// Implementations must be pure and deterministic for fixed bindings and
/// must fail with `DimensionalError::MissingBinding` when a free variable
/// has no entry in the bindings.
pub trait Expression: Send + Sync {
    /// Evaluate the expression against the given bindings
    fn evaluate(&self, bindings: &Bindings) -> Result<f64>;

    /// The fixed set of free variable names this expression reads
    fn free_variables(&self) -> &[String];

    /// Evaluate as a boolean condition (non-zero means true)
    fn evaluate_bool(&self, bindings: &Bindings) -> Result<bool> {
        Ok(self.evaluate(bindings)? != 0.0)
    }
}

/// Compiles expression source text into [`Expression`] objects
///
/// The grammar and operator semantics live outside this crate; the stage
/// loader only ever talks to this trait.
pub trait ExpressionCompiler {
    fn compile(&self, source: &str) -> Result<Arc<dyn Expression>>;
}

/// A spatial-dimension value: either a numeric constant or an expression
#[derive(Clone)]
pub enum DimensionValue {
    /// Plain number; empty free-variable set, never re-evaluated once cached
    Literal(f64),
    /// Compiled expression over the parametric dimensions and leaf attributes
    Expr(Arc<dyn Expression>),
}

impl DimensionValue {
    /// Resolve to a number against the given bindings
    pub fn evaluate(&self, bindings: &Bindings) -> Result<f64> {
        match self {
            DimensionValue::Literal(value) => Ok(*value),
            DimensionValue::Expr(expr) => expr.evaluate(bindings),
        }
    }

    /// Free variables of the underlying expression (empty for literals)
    pub fn free_variables(&self) -> &[String] {
        match self {
            DimensionValue::Literal(_) => &[],
            DimensionValue::Expr(expr) => expr.free_variables(),
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, DimensionValue::Literal(_))
    }

    /// Whether any free variable appears in the changed set
    pub fn depends_on_any(&self, changed: &AHashSet<String>) -> bool {
        self.free_variables().iter().any(|v| changed.contains(v))
    }
}

impl fmt::Debug for DimensionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionValue::Literal(value) => write!(f, "Literal({})", value),
            DimensionValue::Expr(expr) => {
                write!(f, "Expr(free: {:?})", expr.free_variables())
            }
        }
    }
}

impl From<f64> for DimensionValue {
    fn from(value: f64) -> Self {
        DimensionValue::Literal(value)
    }
}

impl From<Arc<dyn Expression>> for DimensionValue {
    fn from(expr: Arc<dyn Expression>) -> Self {
        DimensionValue::Expr(expr)
    }
}
