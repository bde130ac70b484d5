use crate::core::{EntityId, EntityKey, FieldMap};
use crate::schema::RelationKind;
use chrono::{DateTime, Utc};
use im::OrdMap;
use std::collections::BTreeMap;

/// Stored edges of one relation property.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRelation {
    pub kind: RelationKind,
    pub targets: Vec<EntityKey>,
}

/// One committed entity row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: EntityId,
    pub fields: FieldMap,
    pub deleted: bool,
    /// Optimistic-concurrency version, bumped on every effective change.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub relations: BTreeMap<String, StoredRelation>,
}

impl StoredRow {
    pub fn targets(&self, property: &str) -> &[EntityKey] {
        self.relations
            .get(property)
            .map(|r| r.targets.as_slice())
            .unwrap_or(&[])
    }

    /// Removes `related` from `property`; returns whether an edge was removed.
    pub fn remove_edge(&mut self, property: &str, related: &EntityKey) -> bool {
        let Some(relation) = self.relations.get_mut(property) else {
            return false;
        };
        let before = relation.targets.len();
        relation.targets.retain(|t| t != related);
        relation.targets.len() != before
    }

    /// Removes every edge towards `related`, in any property.
    pub fn remove_edges_to(&mut self, related: &EntityKey) -> bool {
        let mut removed = false;
        for relation in self.relations.values_mut() {
            let before = relation.targets.len();
            relation.targets.retain(|t| t != related);
            removed |= relation.targets.len() != before;
        }
        removed
    }

    pub fn points_to(&self, related: &EntityKey) -> bool {
        self.relations
            .values()
            .any(|relation| relation.targets.contains(related))
    }
}

/// Rows of one entity type, ordered by id.
///
/// Backed by a persistent map so the whole store state clones in O(1) and a
/// commit can be prepared on a copy.
#[derive(Debug, Clone, Default)]
pub struct EntityTable {
    rows: OrdMap<EntityId, StoredRow>,
}

impl EntityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &EntityId) -> Option<&StoredRow> {
        self.rows.get(id)
    }

    pub fn get_mut(&mut self, id: &EntityId) -> Option<&mut StoredRow> {
        self.rows.get_mut(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.rows.contains_key(id)
    }

    pub fn insert(&mut self, row: StoredRow) {
        self.rows.insert(row.id.clone(), row);
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<StoredRow> {
        self.rows.remove(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Ids of rows holding at least one edge towards `related`.
    pub fn ids_pointing_to(&self, related: &EntityKey) -> Vec<EntityId> {
        self.rows
            .values()
            .filter(|row| row.points_to(related))
            .map(|row| row.id.clone())
            .collect()
    }
}
