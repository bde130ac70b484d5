use super::snapshot::{FetchScope, StoredSnapshot};
use crate::core::{EntityKey, EntityRef, Result};
use crate::transaction::{Change, OriginalValues};
use async_trait::async_trait;

/// Storage collaborator contract - allows pluggable backends.
///
/// Staging never touches stored state. `commit` applies everything staged
/// so far, or nothing when it fails.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Untracked fetch of one entity's committed state.
    async fn fetch_snapshot(
        &self,
        key: &EntityKey,
        scope: FetchScope,
    ) -> Result<Option<StoredSnapshot>>;

    /// Loads a committed entity together with the graph reachable from it.
    async fn find_by_id(&self, key: &EntityKey) -> Result<Option<EntityRef>>;

    /// Stage an insert; with `generate_id` the store assigns the id at commit.
    async fn stage_insert(&self, entity: &EntityRef, generate_id: bool) -> Result<()>;

    /// Stage an update of an existing entity against its stored baseline.
    async fn stage_update(&self, entity: &EntityRef, original: OriginalValues) -> Result<()>;

    /// Stage physical removal of an entity.
    async fn stage_delete(&self, key: &EntityKey) -> Result<()>;

    /// Stage removal of one relationship edge.
    async fn stage_delete_relationship(
        &self,
        owner: &EntityKey,
        property: &str,
        related: &EntityKey,
    ) -> Result<()>;

    /// Number of changes currently staged.
    async fn staged_len(&self) -> usize;

    /// Drop every staged change.
    async fn discard(&self) -> Result<()>;

    /// Apply all staged changes; returns the number of affected rows.
    async fn commit(&self) -> Result<usize>;

    /// Dispatches one planned change to the matching stage operation.
    async fn stage(&self, change: Change) -> Result<()> {
        match change {
            Change::Insert {
                entity,
                generate_id,
                ..
            } => self.stage_insert(&entity, generate_id).await,
            Change::Update {
                entity, original, ..
            } => self.stage_update(&entity, original).await,
            Change::Delete { key } => self.stage_delete(&key).await,
            Change::DeleteRelationship {
                owner,
                property,
                related,
            } => {
                self.stage_delete_relationship(&owner, &property, &related)
                    .await
            }
        }
    }
}
