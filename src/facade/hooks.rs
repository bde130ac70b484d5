use crate::core::{EntityRecord, EntityRef};
use crate::transaction::ChangeSummary;

/// Extension points of a [`DomainContext`](super::DomainContext).
///
/// Entity hooks fire only for the entity handed to `create`/`save`, never for
/// entities reached while walking its graph. Context hooks fire around `commit`.
pub trait ContextHooks: Send + Sync {
    fn on_entity_created(&self, _entity: &EntityRecord) {}

    fn on_entity_saving(&self, _entity: &EntityRef) {}

    fn on_entity_saved(&self, _entity: &EntityRef, _summary: &ChangeSummary) {}

    fn on_context_saving_changes(&self) {}

    fn on_context_saved_changes(&self, _affected: usize) {}
}
