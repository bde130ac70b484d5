use super::plan::ReconcilePlan;
use super::state::EntityState;
use crate::core::{EntityId, EntityKey, EntityRef, Result};
use crate::graph::{EntityView, GraphWalker, RelatedProperty, VisitedSet};
use crate::schema::{RelationDef, RelationKind};
use crate::storage::{EntityStore, FetchScope, StoredSnapshot};
use crate::transaction::{Change, OriginalValues};
use async_recursion::async_recursion;
use std::collections::HashSet;
use tracing::debug;

/// A stored dependent no longer referenced by `owner.property`.
#[derive(Debug)]
struct Orphan {
    owner: EntityKey,
    property: String,
    related: EntityKey,
}

/// Mutable state of one reconciliation; dropped when the save returns.
#[derive(Debug, Default)]
struct Run {
    visited: VisitedSet,
    deleted: HashSet<EntityKey>,
    orphans: Vec<Orphan>,
    plan: ReconcilePlan,
}

impl Run {
    fn record(&mut self, key: &EntityKey, state: EntityState) {
        debug!(entity = %key, state = %state, "reconciled");
        self.plan.record(key.clone(), state);
    }
}

/// Diffs an in-memory aggregate against stored snapshots and plans the changes.
///
/// Planning only reads from the store. Nothing is staged until the whole
/// graph has been walked without error.
pub struct Reconciler<'a> {
    walker: &'a GraphWalker,
    store: &'a dyn EntityStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(walker: &'a GraphWalker, store: &'a dyn EntityStore) -> Self {
        Self { walker, store }
    }

    pub async fn plan(&self, root: &EntityRef) -> Result<ReconcilePlan> {
        let mut run = Run::default();
        self.reconcile(root.clone(), &mut run).await?;
        self.resolve_orphans(&mut run).await?;
        Ok(run.plan)
    }

    #[async_recursion]
    async fn reconcile(&self, entity: EntityRef, run: &mut Run) -> Result<()> {
        let view = self.walker.view(&entity)?;
        if !view.enter(&mut run.visited) {
            run.record(&view.key, EntityState::MatchedUnchanged);
            return Ok(());
        }

        if view.is_new {
            return self.insert_graph(view, true, run).await;
        }

        let snapshot = self
            .fetch(&view.key, FetchScope::DirectRelations)
            .await?;
        match snapshot {
            // client-supplied id that was never persisted
            None => self.insert_graph(view, false, run).await,
            Some(snapshot) => self.update_graph(view, snapshot, run).await,
        }
    }

    #[async_recursion]
    async fn insert_graph(&self, view: EntityView, generate_id: bool, run: &mut Run) -> Result<()> {
        run.plan.push(Change::Insert {
            entity: view.entity.clone(),
            key: view.key.clone(),
            generate_id,
        });
        run.record(&view.key, EntityState::New);

        for property in &view.properties {
            for member in &property.members {
                self.reconcile(member.entity.clone(), run).await?;
            }
        }
        Ok(())
    }

    #[async_recursion]
    async fn update_graph(
        &self,
        view: EntityView,
        snapshot: StoredSnapshot,
        run: &mut Run,
    ) -> Result<()> {
        run.plan.push(Change::Update {
            entity: view.entity.clone(),
            key: view.key.clone(),
            original: OriginalValues::from(&snapshot),
        });
        run.record(&view.key, EntityState::MatchedUpdate);

        for property in &view.properties {
            match property.def.kind {
                RelationKind::Reference => {
                    self.reconcile_reference(&view.key, property, &snapshot, run)
                        .await?
                }
                RelationKind::Collection => {
                    self.reconcile_collection(&view.key, property, &snapshot, run)
                        .await?
                }
            }
        }
        Ok(())
    }

    #[async_recursion]
    async fn reconcile_reference(
        &self,
        owner: &EntityKey,
        property: &RelatedProperty,
        snapshot: &StoredSnapshot,
        run: &mut Run,
    ) -> Result<()> {
        let current = property.reference();
        if let Some(member) = current {
            self.reconcile(member.entity.clone(), run).await?;
        }

        if let Some(stored) = snapshot.reference(&property.def.name) {
            let unchanged = current.is_some_and(|m| !m.is_new && m.key.id == stored.id);
            if !unchanged {
                self.orphan(owner, &property.def, stored.clone(), run);
            }
        }
        Ok(())
    }

    #[async_recursion]
    async fn reconcile_collection(
        &self,
        owner: &EntityKey,
        property: &RelatedProperty,
        snapshot: &StoredSnapshot,
        run: &mut Run,
    ) -> Result<()> {
        for member in &property.members {
            self.reconcile(member.entity.clone(), run).await?;
        }

        let current: HashSet<&EntityId> = property
            .members
            .iter()
            .filter(|m| !m.is_new)
            .map(|m| &m.key.id)
            .collect();
        for stored in snapshot.related(&property.def.name) {
            if !current.contains(&stored.id) {
                self.orphan(owner, &property.def, stored.clone(), run);
            }
        }
        Ok(())
    }

    fn orphan(&self, owner: &EntityKey, def: &RelationDef, related: EntityKey, run: &mut Run) {
        if self.walker.classifier().is_aggregate_root(def.target.as_str()) {
            run.record(&related, EntityState::OrphanedRootReference);
            run.plan.push(Change::DeleteRelationship {
                owner: owner.clone(),
                property: def.name.clone(),
                related,
            });
        } else {
            run.orphans.push(Orphan {
                owner: owner.clone(),
                property: def.name.clone(),
                related,
            });
        }
    }

    /// Dependents orphaned somewhere but reconciled elsewhere in the same graph
    /// were moved; they only lose the stale edge.
    async fn resolve_orphans(&self, run: &mut Run) -> Result<()> {
        let orphans = std::mem::take(&mut run.orphans);
        for orphan in orphans {
            if run.visited.contains_key(&orphan.related) {
                debug!(entity = %orphan.related, from = %orphan.owner, "dependent moved");
                run.plan.push(Change::DeleteRelationship {
                    owner: orphan.owner,
                    property: orphan.property,
                    related: orphan.related,
                });
            } else {
                self.delete_dependent(orphan.related, run).await?;
            }
        }
        Ok(())
    }

    /// Deletes a dependent after everything it exclusively owns. Its outgoing
    /// edges go with its row, so roots and still-reachable dependents it points
    /// at need no relationship deletes of their own.
    #[async_recursion]
    async fn delete_dependent(&self, key: EntityKey, run: &mut Run) -> Result<()> {
        if !run.deleted.insert(key.clone()) {
            return Ok(());
        }
        let Some(snapshot) = self.fetch(&key, FetchScope::DirectRelations).await? else {
            // already gone from the store
            return Ok(());
        };
        run.record(&key, EntityState::OrphanedDependent);

        let classifier = self.walker.classifier();
        for def in self.walker.properties(key.type_tag.as_str())? {
            for related in snapshot.related(&def.name) {
                if classifier.is_aggregate_root(def.target.as_str()) {
                    run.record(related, EntityState::OrphanedRootReference);
                } else if !run.visited.contains_key(related) {
                    self.delete_dependent(related.clone(), run).await?;
                }
            }
        }

        run.plan.push(Change::Delete { key });
        Ok(())
    }

    async fn fetch(&self, key: &EntityKey, scope: FetchScope) -> Result<Option<StoredSnapshot>> {
        self.store
            .fetch_snapshot(key, scope)
            .await
            .map_err(|err| err.in_entity(key, None))
    }
}
