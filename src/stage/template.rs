//! Template decision-tree data model and construction-time validation
//!
//! Templates are pure data: ordered sequences of leaves, conditional
//! branches, bare guards and nested groups. They are built once when stage
//! data is parsed, validated, and then shared read-only (`Arc`) across
//! entities for the lifetime of the stage. All behavior lives in the
//! matcher.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ahash::AHashMap;

use crate::core::error::{DimensionalError, Result};
use crate::core::types::LeafId;
use crate::expr::{DimensionValue, Expression};
use crate::stage::Stage;

/// Process-wide leaf id source: strictly increasing, never reused
static NEXT_LEAF_ID: AtomicU64 = AtomicU64::new(1);

fn allocate_leaf_id() -> LeafId {
    LeafId(NEXT_LEAF_ID.fetch_add(1, Ordering::Relaxed))
}

/// A terminal record assigning values to one or more spatial dimensions
pub struct LeafNode {
    /// Path-identity only; never used for lookup
    pub id: LeafId,
    /// Spatial-dimension name -> value; keys are a subset of the stage's
    /// declared spatial dimensions (validated at construction)
    pub dimensions: AHashMap<String, DimensionValue>,
    /// Free-form values merged into the evaluation context; later leaves
    /// shadow earlier ones
    pub attributes: AHashMap<String, f64>,
    /// Continuation template to keep matching into after this leaf applies
    pub template: Option<TemplateRef>,
    /// Dedup flag for the overwrite diagnostic log line
    pub(crate) overwrite_flagged: AtomicBool,
}

impl LeafNode {
    /// Log the ambiguous-overwrite diagnostic at most once for this leaf
    pub(crate) fn flag_overwrite(&self, key: &str) {
        if !self.overwrite_flagged.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                leaf = self.id.0,
                key,
                "overwriting spatial dimension already set earlier in the match path; \
                 adjust the stage definition if unintended"
            );
        }
    }
}

/// Reference to a template: inline subtree or a named, reusable one
///
/// Named references are resolved against the stage's template table at
/// traversal time, which is what permits mutually referential templates.
#[derive(Clone)]
pub enum TemplateRef {
    Inline(Arc<Template>),
    Named(String),
}

impl TemplateRef {
    /// Resolve to the referenced template within a stage
    pub fn resolve<'a>(&'a self, stage: &'a Stage) -> Result<&'a Arc<Template>> {
        match self {
            TemplateRef::Inline(template) => Ok(template),
            TemplateRef::Named(name) => stage
                .named_template(name)
                .ok_or_else(|| DimensionalError::UnknownTemplate(name.clone())),
        }
    }
}

/// One element of a template sequence
pub enum TemplateElement {
    /// Terminal match contributing dimension values
    Leaf(Arc<LeafNode>),
    /// Conditional gate: descend into the template when the condition holds
    Branch {
        condition: Arc<dyn Expression>,
        template: TemplateRef,
    },
    /// Bare condition gating the remaining elements of its own sequence
    Guard(Arc<dyn Expression>),
    /// Nested sequence: OR-style group, first satisfied element wins
    Group(Vec<TemplateElement>),
}

/// Ordered sequence of template elements
pub struct Template {
    pub elements: Vec<TemplateElement>,
}

impl Template {
    pub fn new(elements: Vec<TemplateElement>) -> Self {
        Self { elements }
    }
}

/// Builds templates and stages, assigning leaf ids and validating the result
///
/// Validation is collected rather than fail-fast so stage authors see every
/// problem at once.
pub struct StageBuilder {
    spatial: Vec<(String, crate::stage::DimensionBounds)>,
    parametric: Vec<(String, crate::stage::DimensionBounds)>,
    templates: AHashMap<String, Arc<Template>>,
    entities: Vec<(String, Arc<Template>)>,
}

impl StageBuilder {
    pub fn new() -> Self {
        Self {
            spatial: Vec::new(),
            parametric: Vec::new(),
            templates: AHashMap::new(),
            entities: Vec::new(),
        }
    }

    /// Declare a spatial dimension (an output axis of the engine)
    pub fn spatial_dimension(
        &mut self,
        name: impl Into<String>,
        bounds: crate::stage::DimensionBounds,
    ) -> &mut Self {
        self.spatial.push((name.into(), bounds));
        self
    }

    /// Declare a parametric dimension (a global author-adjustable input)
    pub fn parametric_dimension(
        &mut self,
        name: impl Into<String>,
        bounds: crate::stage::DimensionBounds,
    ) -> &mut Self {
        self.parametric.push((name.into(), bounds));
        self
    }

    /// Construct a leaf node, allocating its process-unique id
    pub fn leaf(
        &mut self,
        dimensions: impl IntoIterator<Item = (String, DimensionValue)>,
        attributes: impl IntoIterator<Item = (String, f64)>,
        template: Option<TemplateRef>,
    ) -> TemplateElement {
        TemplateElement::Leaf(Arc::new(LeafNode {
            id: allocate_leaf_id(),
            dimensions: dimensions.into_iter().collect(),
            attributes: attributes.into_iter().collect(),
            template,
            overwrite_flagged: AtomicBool::new(false),
        }))
    }

    /// Register a named, reusable template
    pub fn named_template(&mut self, name: impl Into<String>, template: Template) -> &mut Self {
        self.templates.insert(name.into(), Arc::new(template));
        self
    }

    /// Register an entity with its root template (its static "dimensions")
    pub fn entity(&mut self, name: impl Into<String>, template: Template) -> &mut Self {
        self.entities.push((name.into(), Arc::new(template)));
        self
    }

    /// Validate everything registered so far and produce the stage
    ///
    /// Named references are checked here, after all templates exist, so
    /// forward and mutual references work. Cyclic references pass validation
    /// by design; the matcher's fuses bound them at traversal time.
    pub fn finish(self) -> Result<Stage> {
        let mut errors = Vec::new();

        let spatial: std::collections::BTreeMap<_, _> = self.spatial.into_iter().collect();
        let parametric: std::collections::BTreeMap<_, _> = self.parametric.into_iter().collect();

        for (name, template) in self
            .templates
            .iter()
            .map(|(n, t)| (n.as_str(), t))
            .chain(self.entities.iter().map(|(n, t)| (n.as_str(), t)))
        {
            validate_template(name, template, &spatial, &self.templates, &mut errors);
        }

        if !errors.is_empty() {
            return Err(DimensionalError::StageValidation(errors));
        }

        Ok(Stage::from_parts(
            spatial,
            parametric,
            self.templates,
            self.entities,
        ))
    }
}

impl Default for StageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk one template tree with an explicit stack, collecting violations
fn validate_template(
    owner: &str,
    template: &Template,
    spatial: &std::collections::BTreeMap<String, crate::stage::DimensionBounds>,
    named: &AHashMap<String, Arc<Template>>,
    errors: &mut Vec<String>,
) {
    let mut pending: Vec<&[TemplateElement]> = vec![&template.elements];

    let mut check_ref = |template_ref: &TemplateRef, errors: &mut Vec<String>| {
        if let TemplateRef::Named(name) = template_ref {
            if !named.contains_key(name) {
                errors.push(format!(
                    "template '{}': unresolved template reference '{}'",
                    owner, name
                ));
            }
        }
    };

    while let Some(elements) = pending.pop() {
        for element in elements {
            match element {
                TemplateElement::Leaf(leaf) => {
                    for key in leaf.dimensions.keys() {
                        if !spatial.contains_key(key) {
                            errors.push(format!(
                                "template '{}': leaf {} uses undeclared spatial dimension '{}'",
                                owner, leaf.id.0, key
                            ));
                        }
                    }
                    if let Some(template_ref) = &leaf.template {
                        check_ref(template_ref, errors);
                        if let TemplateRef::Inline(inner) = template_ref {
                            pending.push(&inner.elements);
                        }
                    }
                }
                TemplateElement::Branch { template, .. } => {
                    check_ref(template, errors);
                    if let TemplateRef::Inline(inner) = template {
                        pending.push(&inner.elements);
                    }
                }
                TemplateElement::Guard(_) => {}
                TemplateElement::Group(inner) => pending.push(inner),
            }
        }
    }
}
