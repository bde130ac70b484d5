use crate::core::EntityKey;
use crate::transaction::ChangeKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Committed,
    Failed(String),
}

/// One audited change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub at: DateTime<Utc>,
    pub action: ChangeKind,
    pub entity: EntityKey,
    pub outcome: AuditOutcome,
}

impl AuditRecord {
    pub fn new(action: ChangeKind, entity: EntityKey, outcome: AuditOutcome) -> Self {
        Self {
            at: Utc::now(),
            action,
            entity,
            outcome,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, AuditOutcome::Failed(_))
    }
}
