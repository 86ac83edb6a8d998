//! Per-entity expansion state and dependency-aware recompute
//!
//! This is the memoization half of the engine. When the match path is
//! identical to the previous frame, only expressions whose free variables
//! intersect the dirty parameter set are re-evaluated; when the branch
//! selection changed, every dimension is recomputed because cached values
//! from a different match path are not trustworthy. Steady-state updates
//! therefore cost O(dimensions dependent on changed parameters), not
//! O(dimensions).

use ahash::{AHashMap, AHashSet};

use crate::core::error::Result;
use crate::core::types::LeafId;
use crate::engine::matcher::Match;

/// What one frame's expansion produced for an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameResult {
    /// No active configuration for the current parameters
    NoMatch,
    /// Dimensions resolved; `identical` mirrors the match-path comparison
    /// so consumers can skip derived work when nothing structural changed
    Expanded { identical: bool },
}

/// Expansion cache owned by a single entity
///
/// Created when the entity is attached to its space, destroyed on detach,
/// and mutated exclusively by [`apply`](ExpansionState::apply) during that
/// entity's own resolve cycle.
pub struct ExpansionState {
    previous_match_path: Vec<LeafId>,
    expanded: AHashMap<String, f64>,
    changed_parameters: AHashSet<String>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self {
            previous_match_path: Vec::new(),
            expanded: AHashMap::new(),
            changed_parameters: AHashSet::new(),
        }
    }

    /// Mark a parameter as changed since the last resolve
    pub fn mark_changed(&mut self, name: &str) {
        self.changed_parameters.insert(name.to_string());
    }

    /// Whether any parameter changed since the last resolve
    pub fn is_dirty(&self) -> bool {
        !self.changed_parameters.is_empty()
    }

    /// The match path committed by the last successful resolve
    pub fn previous_path(&self) -> &[LeafId] {
        &self.previous_match_path
    }

    /// Last resolved numeric value per spatial dimension
    pub fn expanded(&self) -> &AHashMap<String, f64> {
        &self.expanded
    }

    /// Commit a matcher outcome, re-evaluating what the dirty set requires
    ///
    /// Fails atomically: an evaluation error leaves the path, cache and
    /// dirty set untouched so the entity can retry next frame.
    pub fn apply(&mut self, matched: Match) -> Result<FrameResult> {
        let resolved = match matched {
            Match::NoMatch => {
                // The next successful match must compare against an empty
                // path and therefore report identical = false. Values from
                // the abandoned path are dropped so accessors never report
                // dimensions of a match that no longer holds.
                self.previous_match_path.clear();
                self.expanded.clear();
                self.changed_parameters.clear();
                return Ok(FrameResult::NoMatch);
            }
            Match::Complete(resolved) => resolved,
        };

        if resolved.identical {
            // Same leaf set: touch only expressions that read a changed
            // parameter. Literals never need re-evaluation once set.
            let mut updates = Vec::new();
            for (key, value) in &resolved.expressions {
                if !value.is_literal() && value.depends_on_any(&self.changed_parameters) {
                    updates.push((key.clone(), value.evaluate(&resolved.bindings)?));
                }
            }
            for (key, number) in updates {
                self.expanded.insert(key, number);
            }
        } else {
            // Branch selection changed: recompute everything
            let mut fresh = AHashMap::with_capacity(resolved.expressions.len());
            for (key, value) in &resolved.expressions {
                fresh.insert(key.clone(), value.evaluate(&resolved.bindings)?);
            }
            self.expanded = fresh;
        }

        let identical = resolved.identical;
        self.previous_match_path = resolved.path;
        self.changed_parameters.clear();
        Ok(FrameResult::Expanded { identical })
    }
}

impl Default for ExpansionState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::DimensionalError;
    use crate::engine::matcher::ResolvedMatch;
    use crate::expr::{Bindings, DimensionValue, Expression};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counted {
        vars: Vec<String>,
        result: f64,
        count: Arc<AtomicUsize>,
    }

    impl Expression for Counted {
        fn evaluate(&self, bindings: &Bindings) -> Result<f64> {
            for var in &self.vars {
                if !bindings.contains_key(var) {
                    return Err(DimensionalError::MissingBinding(var.clone()));
                }
            }
            self.count.fetch_add(1, Ordering::Relaxed);
            Ok(self.result)
        }

        fn free_variables(&self) -> &[String] {
            &self.vars
        }
    }

    fn counted(vars: &[&str], result: f64) -> (DimensionValue, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let expr = Arc::new(Counted {
            vars: vars.iter().map(|v| v.to_string()).collect(),
            result,
            count: count.clone(),
        });
        (DimensionValue::Expr(expr), count)
    }

    fn matched(
        path: Vec<LeafId>,
        expressions: Vec<(&str, DimensionValue)>,
        bindings: Bindings,
        identical: bool,
    ) -> Match {
        Match::Complete(ResolvedMatch {
            path,
            expressions: expressions
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            bindings,
            identical,
            overwrites: Vec::new(),
        })
    }

    fn time_bindings(value: f64) -> Bindings {
        let mut bindings = Bindings::default();
        bindings.insert("time".to_string(), value);
        bindings
    }

    #[test]
    fn test_non_identical_recomputes_everything() {
        let (x, x_count) = counted(&["time"], 3.0);
        let (y, y_count) = counted(&[], 5.0);
        let mut state = ExpansionState::new();
        state.mark_changed("time");

        let result = state
            .apply(matched(
                vec![LeafId(1)],
                vec![("x", x), ("y", y)],
                time_bindings(1.0),
                false,
            ))
            .unwrap();
        assert_eq!(result, FrameResult::Expanded { identical: false });
        assert_eq!(state.expanded()["x"], 3.0);
        assert_eq!(state.expanded()["y"], 5.0);
        assert_eq!(x_count.load(Ordering::Relaxed), 1);
        assert_eq!(y_count.load(Ordering::Relaxed), 1);
        assert_eq!(state.previous_path(), &[LeafId(1)]);
        assert!(!state.is_dirty());
    }

    #[test]
    fn test_identical_recomputes_only_dependent_expressions() {
        let (x, x_count) = counted(&["time"], 3.0);
        let (y, y_count) = counted(&["depth"], 5.0);
        let mut state = ExpansionState::new();
        state.mark_changed("time");

        // Seed the cache via a non-identical pass
        let mut seed = time_bindings(1.0);
        seed.insert("depth".to_string(), 0.0);
        state
            .apply(matched(
                vec![LeafId(1)],
                vec![("x", x.clone()), ("y", y.clone())],
                seed.clone(),
                false,
            ))
            .unwrap();
        assert_eq!(x_count.load(Ordering::Relaxed), 1);
        assert_eq!(y_count.load(Ordering::Relaxed), 1);

        // Only time changed: y's expression must not be touched
        state.mark_changed("time");
        state
            .apply(matched(
                vec![LeafId(1)],
                vec![("x", x), ("y", y)],
                seed,
                true,
            ))
            .unwrap();
        assert_eq!(x_count.load(Ordering::Relaxed), 2);
        assert_eq!(y_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_literals_never_reevaluated() {
        let mut state = ExpansionState::new();
        state.mark_changed("time");
        state
            .apply(matched(
                vec![LeafId(1)],
                vec![("x", DimensionValue::Literal(7.0))],
                time_bindings(1.0),
                false,
            ))
            .unwrap();
        assert_eq!(state.expanded()["x"], 7.0);

        // Identical pass with time dirty: literal stays cached
        state.mark_changed("time");
        state
            .apply(matched(
                vec![LeafId(1)],
                vec![("x", DimensionValue::Literal(7.0))],
                time_bindings(2.0),
                true,
            ))
            .unwrap();
        assert_eq!(state.expanded()["x"], 7.0);
    }

    #[test]
    fn test_no_match_clears_path_values_and_dirty_set() {
        let mut state = ExpansionState::new();
        state.mark_changed("time");
        state
            .apply(matched(
                vec![LeafId(1)],
                vec![("x", DimensionValue::Literal(1.0))],
                time_bindings(1.0),
                false,
            ))
            .unwrap();
        assert_eq!(state.previous_path().len(), 1);

        state.mark_changed("time");
        let result = state.apply(Match::NoMatch).unwrap();
        assert_eq!(result, FrameResult::NoMatch);
        assert!(state.previous_path().is_empty());
        assert!(state.expanded().is_empty());
        assert!(!state.is_dirty());
    }

    #[test]
    fn test_failed_apply_commits_nothing() {
        let mut state = ExpansionState::new();
        state.mark_changed("time");
        state
            .apply(matched(
                vec![LeafId(1)],
                vec![("x", DimensionValue::Literal(1.0))],
                time_bindings(1.0),
                false,
            ))
            .unwrap();

        // Expression reading an unbound variable fails the whole apply
        let (bad, _) = counted(&["unbound"], 0.0);
        state.mark_changed("time");
        let result = state.apply(matched(
            vec![LeafId(2)],
            vec![("x", bad)],
            time_bindings(2.0),
            false,
        ));
        assert!(result.is_err());
        assert_eq!(state.previous_path(), &[LeafId(1)]);
        assert_eq!(state.expanded()["x"], 1.0);
        assert!(state.is_dirty());
    }
}
