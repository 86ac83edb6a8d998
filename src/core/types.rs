//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Unique identifier for a leaf node in a template tree
///
/// Assigned strictly increasing at stage construction time and never reused.
/// Only used for match-path identity comparison, never for lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeafId(pub u64);

/// Unique identifier for an entity attached to a space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Frame counter (one cooperative update cycle)
pub type Frame = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_id_ordering() {
        assert!(LeafId(1) < LeafId(2));
        assert_eq!(LeafId(7), LeafId(7));
    }

    #[test]
    fn test_entity_id_hash() {
        use std::collections::HashMap;
        let mut map: HashMap<EntityId, &str> = HashMap::new();
        map.insert(EntityId(1), "waypoint");
        assert_eq!(map.get(&EntityId(1)), Some(&"waypoint"));
    }
}
