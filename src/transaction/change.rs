// ============================================================================
// Staged Changes
// ============================================================================
//
// The instructions a reconciliation produces and a store stages until commit.
// Nothing is applied when a change is created; a store applies the whole
// staged list at commit or discards it.
//
// ============================================================================

use crate::core::{EntityKey, EntityRef, FieldMap};
use crate::storage::StoredSnapshot;
use std::fmt;

/// Stored baseline of an entity being updated.
///
/// Stores diff the entity's current state against it, so an update with no
/// genuine changes touches nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct OriginalValues {
    pub fields: FieldMap,
    pub deleted: bool,
    pub version: u64,
}

impl From<&StoredSnapshot> for OriginalValues {
    fn from(snapshot: &StoredSnapshot) -> Self {
        Self {
            fields: snapshot.fields.clone(),
            deleted: snapshot.deleted,
            version: snapshot.version,
        }
    }
}

/// A single staged instruction.
#[derive(Debug, Clone)]
pub enum Change {
    /// Insert a new entity. `key` is the key at planning time.
    Insert {
        entity: EntityRef,
        key: EntityKey,
        generate_id: bool,
    },

    /// Write the current state of an existing entity over its stored row.
    Update {
        entity: EntityRef,
        key: EntityKey,
        original: OriginalValues,
    },

    /// Physically remove a stored entity.
    Delete { key: EntityKey },

    /// Remove one relationship edge, leaving both entities in place.
    DeleteRelationship {
        owner: EntityKey,
        property: String,
        related: EntityKey,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
    DeleteRelationship,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::DeleteRelationship => "delete_relationship",
        };
        write!(f, "{label}")
    }
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Insert { .. } => ChangeKind::Insert,
            Change::Update { .. } => ChangeKind::Update,
            Change::Delete { .. } => ChangeKind::Delete,
            Change::DeleteRelationship { .. } => ChangeKind::DeleteRelationship,
        }
    }

    /// The entity the change is about; the owner for relationship deletes.
    pub fn key(&self) -> &EntityKey {
        match self {
            Change::Insert { key, .. } => key,
            Change::Update { key, .. } => key,
            Change::Delete { key } => key,
            Change::DeleteRelationship { owner, .. } => owner,
        }
    }

    /// Check if this change removes an entity or an edge
    pub fn is_removal(&self) -> bool {
        matches!(
            self,
            Change::Delete { .. } | Change::DeleteRelationship { .. }
        )
    }
}

/// Counts of staged changes by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
    pub relationship_deletes: usize,
}

impl ChangeSummary {
    pub fn of<'a>(changes: impl IntoIterator<Item = &'a Change>) -> Self {
        let mut summary = Self::default();
        for change in changes {
            summary.record(change.kind());
        }
        summary
    }

    pub fn record(&mut self, kind: ChangeKind) {
        match kind {
            ChangeKind::Insert => self.inserts += 1,
            ChangeKind::Update => self.updates += 1,
            ChangeKind::Delete => self.deletes += 1,
            ChangeKind::DeleteRelationship => self.relationship_deletes += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.inserts + self.updates + self.deletes + self.relationship_deletes
    }

    /// True when nothing but (possibly unchanged) updates were staged.
    pub fn only_updates(&self) -> bool {
        self.inserts == 0 && self.deletes == 0 && self.relationship_deletes == 0
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} insert(s), {} update(s), {} delete(s), {} relationship delete(s)",
            self.inserts, self.updates, self.deletes, self.relationship_deletes
        )
    }
}
