//! Stage schema types for JSON deserialization
//!
//! These structs mirror the declarative stage documents. Expressions are
//! carried as plain strings here; the loader hands them to an external
//! `ExpressionCompiler` and never interprets them itself.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::stage::DimensionBounds;

/// Complete stage definition
#[derive(Debug, Clone, Deserialize)]
pub struct StageDef {
    /// Declared spatial dimensions (name -> bounds)
    pub spatial: BTreeMap<String, DimensionBounds>,
    /// Declared parametric dimensions (name -> bounds)
    pub parametric: BTreeMap<String, DimensionBounds>,
    /// Named, reusable templates
    #[serde(default)]
    pub templates: BTreeMap<String, Vec<ElementDef>>,
    /// Entities placed in the stage
    #[serde(default)]
    pub entities: Vec<EntityDef>,
}

/// An entity declaration: name plus its root template
#[derive(Debug, Clone, Deserialize)]
pub struct EntityDef {
    pub name: String,
    /// The entity's static "dimensions" definition (its root template)
    pub dimensions: Vec<ElementDef>,
}

/// One element of a template sequence
///
/// Shape-discriminated: `{"when", "then"}` is a branch, `{"guard"}` is a
/// bare guard, a JSON array is a nested group, anything else is a leaf.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ElementDef {
    Branch(BranchDef),
    Guard(GuardDef),
    Leaf(LeafDef),
    Group(Vec<ElementDef>),
}

/// Conditional branch: descend into `then` when `when` holds
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BranchDef {
    pub when: String,
    pub then: Vec<ElementDef>,
}

/// Bare condition gating the rest of its sequence
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardDef {
    pub guard: String,
}

/// Leaf record: dimension values, attributes, optional continuation
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LeafDef {
    /// Spatial-dimension name -> number or expression source
    #[serde(default)]
    pub dimensions: BTreeMap<String, ValueDef>,
    /// Free-form values shadowed into the evaluation context
    #[serde(default)]
    pub attributes: BTreeMap<String, f64>,
    /// Name of a shared template to continue matching into
    #[serde(default)]
    pub template: Option<String>,
}

/// A dimension value: JSON number = literal, JSON string = expression source
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ValueDef {
    Literal(f64),
    Expr(String),
}
