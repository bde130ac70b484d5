use crate::core::{EntityId, EntityKey, TypeTag};
use std::collections::{HashMap, HashSet};

/// Per-operation memo of entities already reconciled.
///
/// Persisted entities are tracked by `(type, id)`. Unsaved ones all share the
/// default id, so they are tracked by instance instead.
#[derive(Debug, Default)]
pub struct VisitedSet {
    persisted: HashMap<TypeTag, HashSet<EntityId>>,
    unsaved: HashSet<usize>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the key was not yet visited.
    pub fn insert_key(&mut self, key: &EntityKey) -> bool {
        self.persisted
            .entry(key.type_tag.clone())
            .or_default()
            .insert(key.id.clone())
    }

    pub fn contains_key(&self, key: &EntityKey) -> bool {
        self.persisted
            .get(key.type_tag.as_str())
            .is_some_and(|ids| ids.contains(&key.id))
    }

    /// Returns `true` if the instance was not yet visited.
    pub fn insert_instance(&mut self, addr: usize) -> bool {
        self.unsaved.insert(addr)
    }

    pub fn contains_instance(&self, addr: usize) -> bool {
        self.unsaved.contains(&addr)
    }

    pub fn len(&self) -> usize {
        self.persisted.values().map(HashSet::len).sum::<usize>() + self.unsaved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
