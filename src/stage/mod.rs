//! Stage data: declared dimensions, named templates and stage entities
//!
//! A stage declares the spatial dimensions (output axes), the parametric
//! dimensions (global inputs, each with numeric bounds), a table of named
//! reusable templates, and the entities that live in the stage with their
//! root templates. Everything here is immutable after construction and
//! shared read-only across entities.

pub mod loader;
pub mod schema;
pub mod template;

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

pub use loader::{load_stage, load_stage_str};
pub use schema::{ElementDef, EntityDef, StageDef, ValueDef};
pub use template::{LeafNode, StageBuilder, Template, TemplateElement, TemplateRef};

/// Numeric bounds of a declared dimension
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionBounds {
    pub min: f64,
    pub max: f64,
}

impl DimensionBounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp a value into these bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// An entity declared by the stage: a name plus its root template
pub struct StageEntity {
    pub name: String,
    pub template: Arc<Template>,
}

/// Immutable, validated stage data
pub struct Stage {
    spatial: BTreeMap<String, DimensionBounds>,
    parametric: BTreeMap<String, DimensionBounds>,
    templates: AHashMap<String, Arc<Template>>,
    entities: Vec<StageEntity>,
}

impl Stage {
    pub(crate) fn from_parts(
        spatial: BTreeMap<String, DimensionBounds>,
        parametric: BTreeMap<String, DimensionBounds>,
        templates: AHashMap<String, Arc<Template>>,
        entities: Vec<(String, Arc<Template>)>,
    ) -> Self {
        Self {
            spatial,
            parametric,
            templates,
            entities: entities
                .into_iter()
                .map(|(name, template)| StageEntity { name, template })
                .collect(),
        }
    }

    /// Declared spatial dimensions in stable (sorted) order
    pub fn spatial_dimensions(&self) -> &BTreeMap<String, DimensionBounds> {
        &self.spatial
    }

    /// Declared parametric dimensions in stable (sorted) order
    pub fn parametric_dimensions(&self) -> &BTreeMap<String, DimensionBounds> {
        &self.parametric
    }

    /// Look up a named, reusable template
    pub fn named_template(&self, name: &str) -> Option<&Arc<Template>> {
        self.templates.get(name)
    }

    /// Entities declared by the stage data
    pub fn entities(&self) -> &[StageEntity] {
        &self.entities
    }
}
