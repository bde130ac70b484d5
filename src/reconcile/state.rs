use std::fmt;

/// Outcome of reconciling one entity during a save.
///
/// ```text
/// unvisited ──unset id / no snapshot──> New
///     │
///     ├──snapshot found──> MatchedUpdate
///     │
///     └──already visited──> MatchedUnchanged
///
/// stored but no longer referenced ──aggregate root──> OrphanedRootReference
///                                 └──dependent──────> OrphanedDependent
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Staged for insert.
    New,
    /// Reached again in the same operation; nothing staged.
    MatchedUnchanged,
    /// Staged for update against its stored snapshot.
    MatchedUpdate,
    /// Staged for physical deletion together with its own dependents.
    OrphanedDependent,
    /// Only the relationship edge towards it is deleted.
    OrphanedRootReference,
}

impl EntityState {
    /// True for the states that count as a reconciliation pass over the entity.
    pub fn is_pass(&self) -> bool {
        matches!(self, EntityState::New | EntityState::MatchedUpdate)
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityState::New => write!(f, "NEW"),
            EntityState::MatchedUnchanged => write!(f, "MATCHED_UNCHANGED"),
            EntityState::MatchedUpdate => write!(f, "MATCHED_UPDATE"),
            EntityState::OrphanedDependent => write!(f, "ORPHANED_DEPENDENT"),
            EntityState::OrphanedRootReference => write!(f, "ORPHANED_ROOT_REFERENCE"),
        }
    }
}
