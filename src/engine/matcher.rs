//! Stack-based template traversal
//!
//! `resolve` walks an entity's decision tree for the current parameter
//! bindings and produces the ordered match path (visited leaf ids), the
//! dimension expressions the path contributes, and whether the path is
//! identical to the previous frame's. The walk uses an explicit frame stack
//! so depth is bounded by the cycle fuses, never by the call stack: named
//! templates may reference one another cyclically.

use ahash::AHashMap;

use crate::core::config::EngineConfig;
use crate::core::error::{DimensionalError, Result};
use crate::core::types::LeafId;
use crate::expr::{Bindings, DimensionValue};
use crate::stage::{Stage, Template, TemplateElement};

/// Outcome of one resolve call
pub enum Match {
    /// Stack exhausted with required spatial dimensions unset: the entity
    /// has no active configuration for the current parameters. A valid
    /// terminal outcome, not an error.
    NoMatch,
    /// Every declared spatial dimension received an expression
    Complete(ResolvedMatch),
}

/// A completed traversal
pub struct ResolvedMatch {
    /// Leaf ids in visitation order
    pub path: Vec<LeafId>,
    /// Spatial-dimension key -> contributing expression (last leaf wins)
    pub expressions: AHashMap<String, DimensionValue>,
    /// Working bindings after leaf attribute merges; dimension expressions
    /// must be evaluated against these, not the raw parameter bindings
    pub bindings: Bindings,
    /// Strict path identity: element-wise equal to the previous path AND
    /// equal length
    pub identical: bool,
    /// Ambiguous overwrites observed during the walk (key, overwriting leaf)
    pub overwrites: Vec<(String, LeafId)>,
}

/// One level of the traversal: a sequence and a cursor into it
struct WalkFrame<'a> {
    elements: &'a [TemplateElement],
    cursor: usize,
    /// Frame pushed from a Group element: first satisfied element wins and
    /// the pop is reported to the parent
    exclusive: bool,
    satisfied: bool,
}

impl<'a> WalkFrame<'a> {
    fn new(elements: &'a [TemplateElement], exclusive: bool) -> Self {
        Self {
            elements,
            cursor: 0,
            exclusive,
            satisfied: false,
        }
    }
}

/// Walk the decision tree and select the active leaf set
///
/// `previous_path` is the match path from the previous successful resolve
/// (empty if none). The call is pure with respect to entity state: nothing
/// is committed here, and a failed call leaves no trace.
pub fn resolve<'a>(
    root: &'a Template,
    stage: &'a Stage,
    bindings: &Bindings,
    previous_path: &[LeafId],
    config: &EngineConfig,
) -> Result<Match> {
    let required = stage.spatial_dimensions().len();

    let mut work = bindings.clone();
    let mut expressions: AHashMap<String, DimensionValue> = AHashMap::new();
    let mut path: Vec<LeafId> = Vec::new();
    let mut overwrites: Vec<(String, LeafId)> = Vec::new();
    // One-way flag: once a position disagrees with the previous path it
    // stays false for the whole traversal
    let mut identical = true;

    let mut leaf_visits = 0usize;
    let mut steps = 0usize;

    let mut complete = required == 0;
    let mut stack: Vec<WalkFrame<'a>> = vec![WalkFrame::new(&root.elements, false)];

    while !complete && !stack.is_empty() {
        steps += 1;
        if steps > config.max_steps {
            return Err(DimensionalError::TemplateCycleExceeded { leaf_visits, steps });
        }

        // Frame exhausted: pop, and report group outcomes to the parent
        let exhausted = {
            let frame = stack.last().expect("stack checked non-empty");
            frame.cursor >= frame.elements.len()
        };
        if exhausted {
            let finished = stack.pop().expect("stack checked non-empty");
            if finished.exclusive {
                if let Some(parent) = stack.last_mut() {
                    if finished.satisfied {
                        // OR alternative taken, but the walk is still
                        // incomplete: the parent keeps scanning its own
                        // siblings like after any satisfied element
                        parent.satisfied = true;
                        parent.cursor = if parent.exclusive {
                            parent.elements.len()
                        } else {
                            parent.cursor + 1
                        };
                    } else {
                        // Nothing inside matched: fall through to the next
                        // sibling of the group
                        parent.cursor += 1;
                    }
                }
            }
            continue;
        }

        let mut push: Option<&'a [TemplateElement]> = None;
        let mut push_exclusive = false;

        let frame = stack.last_mut().expect("stack checked non-empty");
        let elements = frame.elements;
        match &elements[frame.cursor] {
            TemplateElement::Guard(condition) => {
                if condition.evaluate_bool(&work)? {
                    frame.cursor += 1;
                } else {
                    // Guard gates the remaining elements of its own level
                    frame.cursor = elements.len();
                }
            }
            TemplateElement::Group(inner) => {
                // Parent cursor is advanced when the group pops, depending
                // on whether anything inside matched
                push = Some(inner.as_slice());
                push_exclusive = true;
            }
            TemplateElement::Branch {
                condition,
                template,
            } => {
                if condition.evaluate_bool(&work)? {
                    frame.satisfied = true;
                    frame.cursor = if frame.exclusive {
                        elements.len()
                    } else {
                        frame.cursor + 1
                    };
                    push = Some(template.resolve(stage)?.elements.as_slice());
                } else {
                    frame.cursor += 1;
                }
            }
            TemplateElement::Leaf(leaf) => {
                leaf_visits += 1;
                if leaf_visits > config.max_leaf_visits {
                    return Err(DimensionalError::TemplateCycleExceeded { leaf_visits, steps });
                }

                if identical && previous_path.get(path.len()) != Some(&leaf.id) {
                    identical = false;
                }
                path.push(leaf.id);

                for (key, value) in &leaf.dimensions {
                    if expressions.contains_key(key) {
                        leaf.flag_overwrite(key);
                        overwrites.push((key.clone(), leaf.id));
                    }
                    expressions.insert(key.clone(), value.clone());
                }
                for (name, value) in &leaf.attributes {
                    work.insert(name.clone(), *value);
                }

                frame.satisfied = true;
                frame.cursor = if frame.exclusive {
                    elements.len()
                } else {
                    frame.cursor + 1
                };

                if expressions.len() == required {
                    complete = true;
                } else if let Some(template) = &leaf.template {
                    // Chained specialization: keep matching into the leaf's
                    // continuation template
                    push = Some(template.resolve(stage)?.elements.as_slice());
                }
            }
        }

        if let Some(elements) = push {
            stack.push(WalkFrame::new(elements, push_exclusive));
        }
    }

    if !complete {
        return Ok(Match::NoMatch);
    }

    // Strict identity: a matching strict prefix is not identical, since the
    // structural shape of the match changed
    identical = identical && path.len() == previous_path.len();

    Ok(Match::Complete(ResolvedMatch {
        path,
        expressions,
        bindings: work,
        identical,
        overwrites,
    }))
}
