use super::audit::{AuditOutcome, AuditRecord};
use super::config::StoreConfig;
use super::engine::EntityStore;
use super::snapshot::{FetchScope, StoredSnapshot};
use super::table::{EntityTable, StoredRelation, StoredRow};
use super::validation::Validator;
use crate::core::{
    EntityId, EntityKey, EntityRecord, EntityRef, FieldMap, GraphError, IdKind, RelationValue,
    Result, TypeTag, ValidationErrors,
};
use crate::schema::RelationKind;
use crate::transaction::{Change, ChangeKind, ChangeSummary, OriginalValues};
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Committed state. Cloning is O(1), so a commit is prepared on a copy and swapped in.
#[derive(Debug, Clone, Default)]
struct StoreState {
    tables: im::HashMap<TypeTag, EntityTable>,
    /// Next generated integer id per type; `None` once the range is used up.
    sequences: im::HashMap<TypeTag, Option<i64>>,
}

impl StoreState {
    fn row(&self, key: &EntityKey) -> Option<&StoredRow> {
        self.tables.get(&key.type_tag)?.get(&key.id)
    }

    fn row_mut(&mut self, key: &EntityKey) -> Option<&mut StoredRow> {
        self.tables.get_mut(&key.type_tag)?.get_mut(&key.id)
    }

    fn next_integer(&mut self, type_tag: &TypeTag, seed: i64) -> Result<i64> {
        let next = self.sequences.entry(type_tag.clone()).or_insert(Some(seed));
        let Some(id) = *next else {
            return Err(GraphError::Storage(format!(
                "generated integer ids for '{type_tag}' are exhausted"
            )));
        };
        *next = id.checked_add(1);
        Ok(id)
    }

    fn observe_integer(&mut self, type_tag: &TypeTag, id: i64, seed: i64) {
        let next = self.sequences.entry(type_tag.clone()).or_insert(Some(seed));
        if let Some(current) = *next {
            if id >= current {
                *next = id.checked_add(1);
            }
        }
    }
}

/// A relation of a staged entity, read at commit time.
struct PreparedRelation {
    name: String,
    kind: RelationKind,
    members: Vec<EntityRef>,
}

/// An insert or update with the entity's state copied out of its lock.
struct PreparedWrite {
    entity: EntityRef,
    key: EntityKey,
    fields: FieldMap,
    deleted: bool,
    relations: Vec<PreparedRelation>,
}

impl PreparedWrite {
    fn read(
        entity: &EntityRef,
        validators: &[Arc<dyn Validator>],
        errors: &mut ValidationErrors,
    ) -> Result<Self> {
        let record = entity.read()?;
        let key = record.key();
        let violations = validators
            .iter()
            .flat_map(|v| v.validate(&record))
            .collect();
        errors.push(key.to_string(), violations);

        let relations = record
            .relations()
            .iter()
            .map(|(name, value)| PreparedRelation {
                name: name.clone(),
                kind: match value {
                    RelationValue::Reference(_) => RelationKind::Reference,
                    RelationValue::Collection(_) => RelationKind::Collection,
                },
                members: value.members(),
            })
            .collect();

        Ok(Self {
            entity: entity.clone(),
            key,
            fields: record.fields().clone(),
            deleted: record.is_deleted(),
            relations,
        })
    }
}

/// Result of preparing a commit on a copy of the state.
struct Applied {
    state: StoreState,
    assigned: Vec<(EntityRef, EntityId)>,
    affected: usize,
    audited: Vec<(ChangeKind, EntityKey)>,
}

/// Shared in-memory entity database.
///
/// Open one [`InMemoryStore`] per unit of work with [`InMemoryDatabase::store`].
pub struct InMemoryDatabase {
    state: RwLock<StoreState>,
    validators: HashMap<TypeTag, Vec<Arc<dyn Validator>>>,
    audit: Mutex<Vec<AuditRecord>>,
    config: StoreConfig,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            validators: HashMap::new(),
            audit: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Registers a scalar validator for one entity type.
    pub fn with_validator(
        mut self,
        type_tag: impl Into<TypeTag>,
        validator: impl Validator + 'static,
    ) -> Self {
        self.validators
            .entry(type_tag.into())
            .or_default()
            .push(Arc::new(validator));
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Opens a unit of work with its own staged changes.
    pub fn store(self: &Arc<Self>) -> InMemoryStore {
        InMemoryStore::new(self.clone())
    }

    pub async fn row(&self, key: &EntityKey) -> Option<StoredRow> {
        self.state.read().await.row(key).cloned()
    }

    pub async fn contains(&self, key: &EntityKey) -> bool {
        self.state.read().await.row(key).is_some()
    }

    pub async fn relation_targets(&self, owner: &EntityKey, property: &str) -> Vec<EntityKey> {
        let state = self.state.read().await;
        state
            .row(owner)
            .map(|row| row.targets(property).to_vec())
            .unwrap_or_default()
    }

    pub async fn row_count(&self, type_tag: &str) -> usize {
        let state = self.state.read().await;
        state.tables.get(type_tag).map(EntityTable::len).unwrap_or(0)
    }

    pub async fn audit_log(&self) -> Vec<AuditRecord> {
        self.audit.lock().await.clone()
    }

    async fn snapshot(&self, key: &EntityKey, scope: FetchScope) -> Option<StoredSnapshot> {
        let state = self.state.read().await;
        let row = state.row(key)?;
        let relations = match scope {
            FetchScope::Scalars => BTreeMap::new(),
            FetchScope::DirectRelations => row
                .relations
                .iter()
                .map(|(name, relation)| (name.clone(), relation.targets.clone()))
                .collect(),
        };
        Some(StoredSnapshot {
            key: key.clone(),
            fields: row.fields.clone(),
            deleted: row.deleted,
            version: row.version,
            relations,
        })
    }

    /// Materializes the graph reachable from `key`; shared and cyclic edges map to one instance.
    async fn load_graph(&self, key: &EntityKey) -> Result<Option<EntityRef>> {
        let state = self.state.read().await;
        if state.row(key).is_none() {
            return Ok(None);
        }

        let mut loaded: HashMap<EntityKey, EntityRef> = HashMap::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([key.clone()]);
        while let Some(next) = queue.pop_front() {
            if loaded.contains_key(&next) {
                continue;
            }
            let Some(row) = state.row(&next) else {
                continue;
            };
            let mut record = EntityRecord::new(next.type_tag.clone(), row.id.clone());
            record.replace_fields(row.fields.clone());
            record.set_deleted(row.deleted);
            loaded.insert(next.clone(), EntityRef::new(record));
            order.push(next);
            for relation in row.relations.values() {
                queue.extend(relation.targets.iter().cloned());
            }
        }

        for key in &order {
            let Some(row) = state.row(key) else { continue };
            let Some(entity) = loaded.get(key) else { continue };
            let mut record = entity.write()?;
            for (name, relation) in &row.relations {
                let members = relation
                    .targets
                    .iter()
                    .filter_map(|t| loaded.get(t).cloned());
                match relation.kind {
                    RelationKind::Reference => {
                        record.set_reference(name.clone(), members.take(1).next())
                    }
                    RelationKind::Collection => {
                        record.set_collection(name.clone(), members.collect())
                    }
                }
            }
        }

        Ok(loaded.get(key).cloned())
    }

    /// Prepares `changes` on a copy of `current`; nothing is mutated on failure.
    fn apply(&self, current: &StoreState, changes: &[Change]) -> Result<Applied> {
        let mut errors = ValidationErrors::default();
        let mut writes = Vec::with_capacity(changes.len());
        for change in changes {
            let write = match change {
                Change::Insert { entity, .. } | Change::Update { entity, .. } => {
                    let validators = self
                        .validators
                        .get(entity.read()?.type_tag())
                        .map(Vec::as_slice)
                        .unwrap_or(&[]);
                    Some(PreparedWrite::read(entity, validators, &mut errors)?)
                }
                _ => None,
            };
            writes.push(write);
        }
        if !errors.is_empty() {
            return Err(GraphError::Validation(errors));
        }

        let mut state = current.clone();
        let seed = self.config.integer_seed;
        let mut assigned: HashMap<usize, EntityId> = HashMap::new();
        let mut assigned_list = Vec::new();

        // ids and conflicts first, so edges can be resolved afterwards
        for (change, write) in changes.iter().zip(&writes) {
            match (change, write) {
                (Change::Insert { generate_id, .. }, Some(write)) => {
                    let mut id = write.key.id.clone();
                    if *generate_id && id.is_default() {
                        id = match id.kind() {
                            IdKind::Integer => {
                                EntityId::Int(state.next_integer(&write.key.type_tag, seed)?)
                            }
                            IdKind::Uuid => EntityId::Uuid(Uuid::new_v4()),
                            IdKind::Text => EntityId::Text(Uuid::new_v4().to_string()),
                        };
                        assigned.insert(write.entity.instance_addr(), id.clone());
                        assigned_list.push((write.entity.clone(), id));
                    } else {
                        if state.row(&write.key).is_some() {
                            return Err(GraphError::Concurrency(format!(
                                "{} was inserted by another unit of work",
                                write.key
                            )));
                        }
                        if let EntityId::Int(value) = id {
                            state.observe_integer(&write.key.type_tag, value, seed);
                        }
                    }
                }
                (Change::Update { original, .. }, Some(write)) => {
                    check_version(&state, write, original)?;
                }
                _ => {}
            }
        }

        let resolve = |member: &EntityRef| -> Result<EntityKey> {
            let mut key = member.key()?;
            if let Some(id) = assigned.get(&member.instance_addr()) {
                key.id = id.clone();
            }
            Ok(key)
        };

        let now = Utc::now();
        let mut affected = 0;
        let mut audited = Vec::new();
        for (change, write) in changes.iter().zip(&writes) {
            match (change, write) {
                (Change::Insert { .. }, Some(write)) => {
                    let key = resolve(&write.entity)?;
                    let mut relations = BTreeMap::new();
                    for relation in &write.relations {
                        let targets = relation
                            .members
                            .iter()
                            .map(&resolve)
                            .collect::<Result<Vec<_>>>()?;
                        relations.insert(
                            relation.name.clone(),
                            StoredRelation {
                                kind: relation.kind,
                                targets,
                            },
                        );
                    }
                    state
                        .tables
                        .entry(key.type_tag.clone())
                        .or_insert_with(EntityTable::new)
                        .insert(StoredRow {
                            id: key.id.clone(),
                            fields: write.fields.clone(),
                            deleted: write.deleted,
                            version: 1,
                            created_at: now,
                            updated_at: now,
                            relations,
                        });
                    affected += 1;
                    audited.push((ChangeKind::Insert, key));
                }
                (Change::Update { original, .. }, Some(write)) => {
                    let mut resolved = Vec::with_capacity(write.relations.len());
                    for relation in &write.relations {
                        let targets = relation
                            .members
                            .iter()
                            .map(&resolve)
                            .collect::<Result<Vec<_>>>()?;
                        resolved.push((relation, targets));
                    }
                    let Some(row) = state.row_mut(&write.key) else {
                        continue;
                    };
                    let mut changed = apply_delta(row, write, original);
                    for (relation, targets) in resolved {
                        changed |= merge_edges(row, relation, targets);
                    }
                    if changed {
                        row.version += 1;
                        row.updated_at = now;
                        affected += 1;
                        audited.push((ChangeKind::Update, write.key.clone()));
                    }
                }
                (Change::DeleteRelationship { owner, property, related }, _) => {
                    if let Some(row) = state.row_mut(owner) {
                        if row.remove_edge(property, related) {
                            affected += 1;
                            audited.push((ChangeKind::DeleteRelationship, owner.clone()));
                        }
                    }
                }
                (Change::Delete { key }, _) => {
                    let removed = state
                        .tables
                        .get_mut(&key.type_tag)
                        .and_then(|table| table.remove(&key.id));
                    if removed.is_some() {
                        remove_incoming_edges(&mut state, key);
                        affected += 1;
                        audited.push((ChangeKind::Delete, key.clone()));
                    }
                }
                _ => {}
            }
        }

        Ok(Applied {
            state,
            assigned: assigned_list,
            affected,
            audited,
        })
    }

    async fn append_audit(&self, records: Vec<AuditRecord>) {
        if records.is_empty() {
            return;
        }
        self.audit.lock().await.extend(records);
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Scalar changes made since the entity was read.
fn has_delta(write: &PreparedWrite, original: &OriginalValues) -> bool {
    write.fields != original.fields || write.deleted != original.deleted
}

/// Writes only what changed since the entity was read, so several updates of
/// one row staged in the same unit of work do not undo each other.
fn apply_delta(row: &mut StoredRow, write: &PreparedWrite, original: &OriginalValues) -> bool {
    let mut changed = false;
    for (name, value) in &write.fields {
        if original.fields.get(name) != Some(value) && row.fields.get(name) != Some(value) {
            row.fields.insert(name.clone(), value.clone());
            changed = true;
        }
    }
    for name in original.fields.keys() {
        if !write.fields.contains_key(name) && row.fields.remove(name).is_some() {
            changed = true;
        }
    }
    if write.deleted != original.deleted && row.deleted != write.deleted {
        row.deleted = write.deleted;
        changed = true;
    }
    changed
}

/// Only updates that carry scalar changes are checked against the stored version.
fn check_version(
    state: &StoreState,
    write: &PreparedWrite,
    original: &OriginalValues,
) -> Result<()> {
    let Some(row) = state.row(&write.key) else {
        return Err(GraphError::Concurrency(format!(
            "{} was deleted after it was read",
            write.key
        )));
    };
    if has_delta(write, original) && row.version != original.version {
        return Err(GraphError::Concurrency(format!(
            "{} changed after it was read (read version {}, stored version {})",
            write.key, original.version, row.version
        )));
    }
    Ok(())
}

/// References are replaced by the current target; collections gain missing members.
fn merge_edges(row: &mut StoredRow, relation: &PreparedRelation, targets: Vec<EntityKey>) -> bool {
    let stored = row
        .relations
        .entry(relation.name.clone())
        .or_insert_with(|| StoredRelation {
            kind: relation.kind,
            targets: Vec::new(),
        });
    match relation.kind {
        RelationKind::Reference => match targets.into_iter().next() {
            Some(target) if stored.targets != [target.clone()] => {
                stored.targets = vec![target];
                true
            }
            _ => false,
        },
        RelationKind::Collection => {
            let mut changed = false;
            for target in targets {
                if !stored.targets.contains(&target) {
                    stored.targets.push(target);
                    changed = true;
                }
            }
            changed
        }
    }
}

fn remove_incoming_edges(state: &mut StoreState, key: &EntityKey) {
    let holders: Vec<(TypeTag, Vec<EntityId>)> = state
        .tables
        .iter()
        .map(|(tag, table)| (tag.clone(), table.ids_pointing_to(key)))
        .filter(|(_, ids)| !ids.is_empty())
        .collect();
    for (tag, ids) in holders {
        if let Some(table) = state.tables.get_mut(&tag) {
            for id in ids {
                if let Some(row) = table.get_mut(&id) {
                    row.remove_edges_to(key);
                }
            }
        }
    }
}

/// A unit of work over an [`InMemoryDatabase`].
pub struct InMemoryStore {
    db: Arc<InMemoryDatabase>,
    staged: Mutex<Vec<Change>>,
}

impl InMemoryStore {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self {
            db,
            staged: Mutex::new(Vec::new()),
        }
    }

    pub fn database(&self) -> &Arc<InMemoryDatabase> {
        &self.db
    }

    pub async fn staged_summary(&self) -> ChangeSummary {
        ChangeSummary::of(self.staged.lock().await.iter())
    }

    async fn push(&self, change: Change) -> Result<()> {
        self.staged.lock().await.push(change);
        Ok(())
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn fetch_snapshot(
        &self,
        key: &EntityKey,
        scope: FetchScope,
    ) -> Result<Option<StoredSnapshot>> {
        Ok(self.db.snapshot(key, scope).await)
    }

    async fn find_by_id(&self, key: &EntityKey) -> Result<Option<EntityRef>> {
        self.db.load_graph(key).await
    }

    async fn stage_insert(&self, entity: &EntityRef, generate_id: bool) -> Result<()> {
        let key = entity.key()?;
        self.push(Change::Insert {
            entity: entity.clone(),
            key,
            generate_id,
        })
        .await
    }

    async fn stage_update(&self, entity: &EntityRef, original: OriginalValues) -> Result<()> {
        let key = entity.key()?;
        self.push(Change::Update {
            entity: entity.clone(),
            key,
            original,
        })
        .await
    }

    async fn stage_delete(&self, key: &EntityKey) -> Result<()> {
        self.push(Change::Delete { key: key.clone() }).await
    }

    async fn stage_delete_relationship(
        &self,
        owner: &EntityKey,
        property: &str,
        related: &EntityKey,
    ) -> Result<()> {
        self.push(Change::DeleteRelationship {
            owner: owner.clone(),
            property: property.to_string(),
            related: related.clone(),
        })
        .await
    }

    async fn staged_len(&self) -> usize {
        self.staged.lock().await.len()
    }

    async fn discard(&self) -> Result<()> {
        self.staged.lock().await.clear();
        Ok(())
    }

    async fn commit(&self) -> Result<usize> {
        let changes = std::mem::take(&mut *self.staged.lock().await);
        if changes.is_empty() {
            return Ok(0);
        }

        let config = &self.db.config;
        let mut state = self.db.state.write().await;
        let applied = match self.db.apply(&state, &changes) {
            Ok(applied) => applied,
            Err(err) => {
                drop(state);
                if config.audit_enabled && config.audit_independent_scope {
                    warn!("commit of {} change(s) failed: {}", changes.len(), err);
                    let reason = err.to_string();
                    let records = changes
                        .iter()
                        .map(|c| {
                            let outcome = AuditOutcome::Failed(reason.clone());
                            AuditRecord::new(c.kind(), c.key().clone(), outcome)
                        })
                        .collect();
                    self.db.append_audit(records).await;
                }
                return Err(err);
            }
        };
        *state = applied.state;
        drop(state);

        for (entity, id) in applied.assigned {
            entity.write()?.assign_id(id);
        }
        if config.audit_enabled {
            let records = applied
                .audited
                .into_iter()
                .map(|(kind, key)| AuditRecord::new(kind, key, AuditOutcome::Committed))
                .collect();
            self.db.append_audit(records).await;
        }

        debug!(
            "committed {} staged change(s), {} row(s) affected",
            changes.len(),
            applied.affected
        );
        Ok(applied.affected)
    }
}
