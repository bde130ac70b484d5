use super::error::Result;
use super::identity::EntityId;
use super::types::{EntityKey, TypeTag};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, TryLockError};

/// Scalar state of an entity, keyed by field name.
pub type FieldMap = BTreeMap<String, serde_json::Value>;

/// Current members of one relation property.
#[derive(Debug, Clone)]
pub enum RelationValue {
    Reference(Option<EntityRef>),
    Collection(Vec<EntityRef>),
}

impl RelationValue {
    pub fn members(&self) -> Vec<EntityRef> {
        match self {
            Self::Reference(target) => target.iter().cloned().collect(),
            Self::Collection(items) => items.clone(),
        }
    }
}

/// In-memory state of one entity: scalars, relations and the logical-delete flag.
///
/// Records are shared through [`EntityRef`] so that graphs may contain
/// diamonds and cycles.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    type_tag: TypeTag,
    id: EntityId,
    fields: FieldMap,
    relations: BTreeMap<String, RelationValue>,
    deleted: bool,
}

impl EntityRecord {
    pub fn new(type_tag: impl Into<TypeTag>, id: impl Into<EntityId>) -> Self {
        Self {
            type_tag: type_tag.into(),
            id: id.into(),
            fields: FieldMap::new(),
            relations: BTreeMap::new(),
            deleted: false,
        }
    }

    pub fn with_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.set_field(name, value);
        self
    }

    pub fn with_reference(mut self, name: impl Into<String>, target: &EntityRef) -> Self {
        self.set_reference(name, Some(target.clone()));
        self
    }

    pub fn with_collection(mut self, name: impl Into<String>, items: Vec<EntityRef>) -> Self {
        self.set_collection(name, items);
        self
    }

    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.type_tag.clone(), self.id.clone())
    }

    /// Overwrites the id; stores call this when they assign generated keys.
    pub fn assign_id(&mut self, id: EntityId) {
        self.id = id;
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn remove_field(&mut self, name: &str) -> Option<serde_json::Value> {
        self.fields.remove(name)
    }

    pub fn replace_fields(&mut self, fields: FieldMap) {
        self.fields = fields;
    }

    pub fn relations(&self) -> &BTreeMap<String, RelationValue> {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&RelationValue> {
        self.relations.get(name)
    }

    pub fn reference(&self, name: &str) -> Option<&EntityRef> {
        match self.relations.get(name) {
            Some(RelationValue::Reference(target)) => target.as_ref(),
            _ => None,
        }
    }

    pub fn collection(&self, name: &str) -> &[EntityRef] {
        match self.relations.get(name) {
            Some(RelationValue::Collection(items)) => items,
            _ => &[],
        }
    }

    pub fn set_reference(&mut self, name: impl Into<String>, target: Option<EntityRef>) {
        self.relations
            .insert(name.into(), RelationValue::Reference(target));
    }

    pub fn set_collection(&mut self, name: impl Into<String>, items: Vec<EntityRef>) {
        self.relations
            .insert(name.into(), RelationValue::Collection(items));
    }

    /// Appends to a collection, creating it when absent.
    pub fn push(&mut self, name: impl Into<String>, item: EntityRef) {
        let entry = self
            .relations
            .entry(name.into())
            .or_insert_with(|| RelationValue::Collection(Vec::new()));
        match entry {
            RelationValue::Collection(items) => items.push(item),
            other => *other = RelationValue::Collection(vec![item]),
        }
    }

    /// Removes every collection member matching `predicate`; returns how many were removed.
    ///
    /// A member that is currently locked (for instance the record itself in a
    /// self-referencing collection) is kept.
    pub fn remove_where(
        &mut self,
        name: &str,
        mut predicate: impl FnMut(&EntityRecord) -> bool,
    ) -> Result<usize> {
        let Some(RelationValue::Collection(items)) = self.relations.get_mut(name) else {
            return Ok(0);
        };
        let mut kept = Vec::with_capacity(items.len());
        let mut removed = 0;
        for item in items.drain(..) {
            let matches = match item.0.try_read() {
                Ok(record) => predicate(&record),
                Err(TryLockError::WouldBlock) => false,
                Err(TryLockError::Poisoned(err)) => return Err(err.into()),
            };
            if matches {
                removed += 1;
            } else {
                kept.push(item);
            }
        }
        *items = kept;
        Ok(removed)
    }

    pub fn clear_relations(&mut self) {
        self.relations.clear();
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}

/// Shared handle to an [`EntityRecord`].
///
/// Handles compare by instance with [`EntityRef::ptr_eq`]; logical identity
/// is the record's [`EntityKey`]. Cyclic graphs keep their members alive
/// until a relation in the cycle is cleared.
#[derive(Clone)]
pub struct EntityRef(Arc<RwLock<EntityRecord>>);

impl EntityRef {
    pub fn new(record: EntityRecord) -> Self {
        Self(Arc::new(RwLock::new(record)))
    }

    pub fn read(&self) -> Result<RwLockReadGuard<'_, EntityRecord>> {
        Ok(self.0.read()?)
    }

    pub fn write(&self) -> Result<RwLockWriteGuard<'_, EntityRecord>> {
        Ok(self.0.write()?)
    }

    pub fn key(&self) -> Result<EntityKey> {
        Ok(self.read()?.key())
    }

    pub fn id(&self) -> Result<EntityId> {
        Ok(self.read()?.id().clone())
    }

    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable address of this instance, used to track unsaved entities.
    pub(crate) fn instance_addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl From<EntityRecord> for EntityRef {
    fn from(record: EntityRecord) -> Self {
        Self::new(record)
    }
}

impl fmt::Debug for EntityRef {
    // Relations are not followed: graphs may be cyclic.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Ok(record) => write!(f, "EntityRef({})", record.key()),
            Err(_) => write!(f, "EntityRef(<locked>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_push_creates_collection() {
        let line = EntityRef::new(EntityRecord::new("Line", 0i64));
        let mut order = EntityRecord::new("Order", 0i64);
        order.push("lines", line.clone());
        order.push("lines", line.clone());
        assert_eq!(order.collection("lines").len(), 2);
        assert!(order.reference("lines").is_none());
    }

    #[test]
    fn test_remove_where_matches_by_record() {
        let a = EntityRef::new(EntityRecord::new("Line", 1i64).with_field("sku", "A"));
        let b = EntityRef::new(EntityRecord::new("Line", 2i64).with_field("sku", "B"));
        let mut order =
            EntityRecord::new("Order", 1i64).with_collection("lines", vec![a, b.clone()]);

        let removed = order
            .remove_where("lines", |line| line.field("sku") == Some(&json!("A")))
            .unwrap();

        assert_eq!(removed, 1);
        assert_eq!(order.collection("lines").len(), 1);
        assert!(order.collection("lines")[0].ptr_eq(&b));
    }

    #[test]
    fn test_debug_does_not_follow_cycles() {
        let node = EntityRef::new(EntityRecord::new("Node", 4i64));
        let again = node.clone();
        node.write().unwrap().set_reference("next", Some(again));
        assert_eq!(format!("{node:?}"), "EntityRef(Node#4)");
        node.write().unwrap().clear_relations();
    }
}
