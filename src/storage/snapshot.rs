use crate::core::{EntityKey, FieldMap};
use std::collections::BTreeMap;

/// How much of an entity a snapshot fetch returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScope {
    /// Scalars, deleted flag and version only.
    Scalars,
    /// Scalars plus the keys of direct references and collection members (one level).
    DirectRelations,
}

/// Previously committed state of one entity, fetched untracked for comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub key: EntityKey,
    pub fields: FieldMap,
    pub deleted: bool,
    pub version: u64,
    /// Related keys per relation property, in stored order.
    pub relations: BTreeMap<String, Vec<EntityKey>>,
}

impl StoredSnapshot {
    pub fn related(&self, property: &str) -> &[EntityKey] {
        self.relations
            .get(property)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Target of a reference property.
    pub fn reference(&self, property: &str) -> Option<&EntityKey> {
        self.related(property).first()
    }
}
