//! Engine configuration with documented constants
//!
//! The fuses here bound a single `resolve` call against malformed cyclic
//! stage data. Neither is expected to trip on well-formed stages.

/// Configuration for the expansion engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum leaf visits per single resolve call
    ///
    /// Named templates may reference one another, so the data model permits
    /// cycles. A resolve call that visits more leaves than this fails with
    /// `TemplateCycleExceeded` instead of looping. Generous on purpose:
    /// real stages visit a handful of leaves per entity.
    pub max_leaf_visits: usize,

    /// Maximum element inspections per single resolve call
    ///
    /// A cycle of always-true branches makes no leaf progress, so the leaf
    /// ceiling alone cannot guarantee termination. This counts every element
    /// the traversal looks at.
    pub max_steps: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_leaf_visits: 10_000,
            max_steps: 1_000_000,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.max_leaf_visits == 0 {
            return Err("max_leaf_visits must be at least 1".into());
        }
        // Every leaf visit costs at least one step
        if self.max_steps < self.max_leaf_visits {
            return Err(format!(
                "max_steps ({}) must be >= max_leaf_visits ({})",
                self.max_steps, self.max_leaf_visits
            ));
        }
        Ok(())
    }
}
