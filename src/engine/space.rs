//! Space: attached entities, parameter gauges and the frame loop
//!
//! A space owns one immutable stage, the current values of the stage's
//! parametric dimensions, and the mutable per-entity expansion state.
//! Parameter writes fan out to every attached entity's dirty set, so the
//! frame loop never polls or diffs values itself. Single-threaded by
//! design; the stage and its templates are shared read-only.

use std::sync::Arc;

use ahash::AHashMap;

use crate::core::config::EngineConfig;
use crate::core::error::{DimensionalError, Result};
use crate::core::types::{EntityId, Frame, LeafId};
use crate::engine::expand::{ExpansionState, FrameResult};
use crate::engine::matcher;
use crate::expr::Bindings;
use crate::stage::{Stage, Template};

/// Per-entity outcome of one frame
#[derive(Debug, Clone, PartialEq)]
pub enum EntityFrame {
    /// No active configuration for the current parameters
    NoMatch,
    /// Resolved dimension values; `identical` is false when the branch
    /// selection changed this frame
    Expanded {
        values: AHashMap<String, f64>,
        identical: bool,
    },
}

/// An entity attached to a space
pub struct SpaceEntity {
    pub id: EntityId,
    pub name: String,
    template: Arc<Template>,
    state: ExpansionState,
}

/// Runtime container for a stage and its attached entities
pub struct Space {
    stage: Arc<Stage>,
    config: EngineConfig,
    parameters: Bindings,
    entities: Vec<SpaceEntity>,
    next_entity_id: u64,
    frame: Frame,
}

impl Space {
    /// Create a space with every parametric dimension at its declared minimum
    pub fn new(stage: Arc<Stage>, config: EngineConfig) -> Self {
        let parameters = stage
            .parametric_dimensions()
            .iter()
            .map(|(name, bounds)| (name.clone(), bounds.min))
            .collect();
        Self {
            stage,
            config,
            parameters,
            entities: Vec::new(),
            next_entity_id: 1,
            frame: 0,
        }
    }

    /// Attach an entity with its own root template
    ///
    /// Every parametric dimension starts dirty so the first frame resolves
    /// and expands the entity from scratch.
    pub fn attach(&mut self, name: impl Into<String>, template: Arc<Template>) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;

        let mut state = ExpansionState::new();
        for parameter in self.stage.parametric_dimensions().keys() {
            state.mark_changed(parameter);
        }
        self.entities.push(SpaceEntity {
            id,
            name: name.into(),
            template,
            state,
        });
        id
    }

    /// Attach every entity the stage data declares
    pub fn attach_stage_entities(&mut self) -> Vec<EntityId> {
        let declared: Vec<(String, Arc<Template>)> = self
            .stage
            .entities()
            .iter()
            .map(|entity| (entity.name.clone(), entity.template.clone()))
            .collect();
        declared
            .into_iter()
            .map(|(name, template)| self.attach(name, template))
            .collect()
    }

    /// Remove an entity and destroy its expansion state
    pub fn detach(&mut self, id: EntityId) -> Result<()> {
        let index = self
            .entities
            .iter()
            .position(|entity| entity.id == id)
            .ok_or(DimensionalError::EntityNotFound(id))?;
        self.entities.remove(index);
        Ok(())
    }

    /// Set a parametric dimension, clamped to its declared bounds
    ///
    /// A change marks the parameter dirty on every attached entity; writing
    /// the value already held is a no-op. Returns the clamped value.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<f64> {
        let bounds = self
            .stage
            .parametric_dimensions()
            .get(name)
            .ok_or_else(|| DimensionalError::UnknownParameter(name.to_string()))?;
        let clamped = bounds.clamp(value);

        if self.parameters.get(name) != Some(&clamped) {
            self.parameters.insert(name.to_string(), clamped);
            for entity in &mut self.entities {
                entity.state.mark_changed(name);
            }
            tracing::debug!(parameter = name, value = clamped, "parameter changed");
        }
        Ok(clamped)
    }

    /// Current value of a parametric dimension
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    /// Run one frame: resolve and expand every dirty entity
    ///
    /// Clean entities are skipped and report their cached result. A
    /// per-entity failure is logged and reported as `NoMatch` for this
    /// frame; its cached state and dirty set stay intact so the entity
    /// retries next frame. One entity failing never aborts the others.
    pub fn update(&mut self) -> Vec<(EntityId, EntityFrame)> {
        self.frame += 1;
        let mut results = Vec::with_capacity(self.entities.len());

        for entity in &mut self.entities {
            if !entity.state.is_dirty() {
                let cached = if entity.state.previous_path().is_empty() {
                    EntityFrame::NoMatch
                } else {
                    EntityFrame::Expanded {
                        values: entity.state.expanded().clone(),
                        identical: true,
                    }
                };
                results.push((entity.id, cached));
                continue;
            }

            let outcome = matcher::resolve(
                &entity.template,
                &self.stage,
                &self.parameters,
                entity.state.previous_path(),
                &self.config,
            )
            .and_then(|matched| entity.state.apply(matched));

            let report = match outcome {
                Ok(FrameResult::NoMatch) => EntityFrame::NoMatch,
                Ok(FrameResult::Expanded { identical }) => EntityFrame::Expanded {
                    values: entity.state.expanded().clone(),
                    identical,
                },
                Err(error) => {
                    tracing::warn!(
                        entity = entity.id.0,
                        name = %entity.name,
                        frame = self.frame,
                        %error,
                        "entity resolve failed; will retry next frame"
                    );
                    EntityFrame::NoMatch
                }
            };
            results.push((entity.id, report));
        }
        results
    }

    /// Number of frames run so far
    pub fn frame(&self) -> Frame {
        self.frame
    }

    /// Last expanded dimension values of an entity
    pub fn expanded(&self, id: EntityId) -> Result<&AHashMap<String, f64>> {
        Ok(self.entity(id)?.state.expanded())
    }

    /// One expanded dimension value; `None` while the entity has no match
    pub fn value(&self, id: EntityId, dimension: &str) -> Result<Option<f64>> {
        if !self.stage.spatial_dimensions().contains_key(dimension) {
            return Err(DimensionalError::UnknownDimension(dimension.to_string()));
        }
        Ok(self.entity(id)?.state.expanded().get(dimension).copied())
    }

    /// The match path committed by an entity's last successful resolve
    pub fn match_path(&self, id: EntityId) -> Result<&[LeafId]> {
        Ok(self.entity(id)?.state.previous_path())
    }

    fn entity(&self, id: EntityId) -> Result<&SpaceEntity> {
        self.entities
            .iter()
            .find(|entity| entity.id == id)
            .ok_or(DimensionalError::EntityNotFound(id))
    }
}
