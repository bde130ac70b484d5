use super::config::ContextConfig;
use super::hooks::ContextHooks;
use crate::core::{EntityId, EntityKey, EntityRecord, EntityRef, GraphError, Result, TypeTag};
use crate::graph::GraphWalker;
use crate::reconcile::{ReconcilePlan, Reconciler};
use crate::schema::OwnershipClassifier;
use crate::storage::{EntityStore, FetchScope, StoredSnapshot};
use crate::transaction::{ChangeSummary, OriginalValues};
use std::sync::Arc;
use tracing::{Instrument, debug, info_span};

/// Unit-of-work façade over one persistence context.
///
/// `save` and `delete` only stage changes; `commit` applies them.
///
/// # Examples
///
/// ```
/// use memograph::prelude::*;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let registry = SchemaRegistry::builder()
///     .entity(EntitySchema::new("Foo").id(IdDescriptor::integer()).aggregate_root())
///     .build()?;
/// let context = ContextDescriptor::new("app").expose("foos", "Foo");
/// let classifier = Arc::new(OwnershipClassifier::classify(Arc::new(registry), &context)?);
///
/// let db = InMemoryDatabase::new().into_shared();
/// let ctx = DomainContext::new(classifier, Arc::new(db.store()));
///
/// let foo = ctx.create("Foo", |f| f.set_field("name", "x"))?;
/// ctx.save(&foo).await?;
/// ctx.commit().await?;
///
/// let id = foo.id()?;
/// let found = ctx.find_by_id("Foo", id).await?.unwrap();
/// assert_eq!(found.read()?.field("name"), Some(&serde_json::json!("x")));
/// # Ok::<(), memograph::GraphError>(())
/// # }).unwrap();
/// ```
pub struct DomainContext {
    walker: GraphWalker,
    store: Arc<dyn EntityStore>,
    hooks: Vec<Arc<dyn ContextHooks>>,
    config: ContextConfig,
}

impl DomainContext {
    pub fn new(classifier: Arc<OwnershipClassifier>, store: Arc<dyn EntityStore>) -> Self {
        Self::with_config(classifier, store, ContextConfig::default())
    }

    pub fn with_config(
        classifier: Arc<OwnershipClassifier>,
        store: Arc<dyn EntityStore>,
        config: ContextConfig,
    ) -> Self {
        let walker = GraphWalker::new(classifier).strict_relations(config.strict_relations);
        Self {
            walker,
            store,
            hooks: Vec::new(),
            config,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ContextHooks>) -> Self {
        self.hooks.push(hooks);
        self
    }

    pub fn classifier(&self) -> &OwnershipClassifier {
        self.walker.classifier()
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Builds an unsaved instance of `type_tag` with the default id of its kind.
    ///
    /// Natural-key types must get their key from `init` (see [`EntityRecord::assign_id`]).
    pub fn create(
        &self,
        type_tag: impl Into<TypeTag>,
        init: impl FnOnce(&mut EntityRecord),
    ) -> Result<EntityRef> {
        let type_tag = type_tag.into();
        let id = self.classifier().require_identifiable(type_tag.as_str())?;
        let mut record = EntityRecord::new(type_tag, id.default_id());
        init(&mut record);
        for hooks in &self.hooks {
            hooks.on_entity_created(&record);
        }
        Ok(EntityRef::new(record))
    }

    /// Reconciles `entity` and everything reachable from it, then stages the result.
    ///
    /// Configuration problems anywhere in the graph fail the save before
    /// anything is staged.
    pub async fn save(&self, entity: &EntityRef) -> Result<ChangeSummary> {
        let key = entity.key()?;
        let span = info_span!("save", context = %self.config.name, root = %key);
        async {
            for hooks in &self.hooks {
                hooks.on_entity_saving(entity);
            }

            let plan = self.plan(entity).await?;
            let summary = plan.summary();
            for change in plan.into_changes() {
                if let Err(err) = self.store.stage(change).await {
                    self.store.discard().await?;
                    return Err(err.in_entity(&key, None));
                }
            }
            debug!(%summary, "staged");

            for hooks in &self.hooks {
                hooks.on_entity_saved(entity, &summary);
            }
            Ok::<_, GraphError>(summary)
        }
        .instrument(span)
        .await
    }

    /// Computes what `save` would stage, without staging it.
    pub async fn plan(&self, entity: &EntityRef) -> Result<ReconcilePlan> {
        let type_tag = entity.read()?.type_tag().clone();
        self.classifier()
            .require_identifiable_graph(type_tag.as_str())?;
        Reconciler::new(&self.walker, self.store.as_ref())
            .plan(entity)
            .await
    }

    /// Applies everything staged in this unit of work.
    pub async fn commit(&self) -> Result<usize> {
        for hooks in &self.hooks {
            hooks.on_context_saving_changes();
        }
        let affected = self.store.commit().await?;
        for hooks in &self.hooks {
            hooks.on_context_saved_changes(affected);
        }
        Ok(affected)
    }

    /// Drops everything staged and not yet committed.
    pub async fn discard(&self) -> Result<()> {
        self.store.discard().await
    }

    /// Logically deletes an aggregate root: its row stays, flagged as deleted.
    ///
    /// Fails with `NotFound` when the entity has no stored row.
    pub async fn delete(&self, entity: &EntityRef) -> Result<()> {
        let key = entity.key()?;
        self.require_root(&key)?;
        let Some(snapshot) = self.store.fetch_snapshot(&key, FetchScope::Scalars).await? else {
            return Err(GraphError::NotFound(format!("{key} has no stored row")));
        };
        entity.write()?.set_deleted(true);
        self.stage_logical_delete(snapshot).await
    }

    /// Logically deletes an aggregate root by id. A missing id is a no-op returning `false`.
    pub async fn delete_by_id(
        &self,
        type_tag: impl Into<TypeTag>,
        id: impl Into<EntityId>,
    ) -> Result<bool> {
        let key = EntityKey::new(type_tag, id);
        self.require_root(&key)?;
        match self.store.fetch_snapshot(&key, FetchScope::Scalars).await? {
            Some(snapshot) => {
                self.stage_logical_delete(snapshot).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn find_by_id(
        &self,
        type_tag: impl Into<TypeTag>,
        id: impl Into<EntityId>,
    ) -> Result<Option<EntityRef>> {
        let key = EntityKey::new(type_tag, id);
        self.classifier().require_identifiable(key.type_tag.as_str())?;
        self.store.find_by_id(&key).await
    }

    fn require_root(&self, key: &EntityKey) -> Result<()> {
        if self.classifier().is_aggregate_root(key.type_tag.as_str()) {
            Ok(())
        } else {
            Err(GraphError::Configuration(format!(
                "'{}' is not an aggregate root in context '{}'; \
                 dependents are removed by saving their owner",
                key.type_tag,
                self.classifier().context_name()
            )))
        }
    }

    /// Stages the stored row with its deleted flag set, detached from any in-memory graph.
    async fn stage_logical_delete(&self, snapshot: StoredSnapshot) -> Result<()> {
        let original = OriginalValues::from(&snapshot);
        let mut record = EntityRecord::new(snapshot.key.type_tag.clone(), snapshot.key.id.clone());
        record.replace_fields(snapshot.fields);
        record.set_deleted(true);
        debug!(entity = %snapshot.key, "logical delete staged");
        self.store
            .stage_update(&EntityRef::new(record), original)
            .await
    }
}
