use super::state::EntityState;
use crate::core::EntityKey;
use crate::transaction::{Change, ChangeSummary};

/// One state transition recorded while reconciling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visit {
    pub key: EntityKey,
    pub state: EntityState,
}

/// Everything one save decided, in the order it was decided.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    changes: Vec<Change>,
    visits: Vec<Visit>,
}

impl ReconcilePlan {
    pub(crate) fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub(crate) fn record(&mut self, key: EntityKey, state: EntityState) {
        self.visits.push(Visit { key, state });
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }

    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary::of(&self.changes)
    }

    /// Number of insert/update passes over `key`.
    pub fn passes(&self, key: &EntityKey) -> usize {
        self.visits
            .iter()
            .filter(|v| v.state.is_pass() && &v.key == key)
            .count()
    }

    pub fn state_of(&self, key: &EntityKey) -> Option<EntityState> {
        self.visits.iter().find(|v| &v.key == key).map(|v| v.state)
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
