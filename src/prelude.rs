//! Everything an application needs to declare a schema, open a context and save aggregates.
//!
//! Collaborator authors implementing [`EntityStore`] usually also want
//! `memograph::transaction` and `memograph::storage::StoredSnapshot`.

pub use crate::core::{
    EntityId, EntityKey, EntityRecord, EntityRef, ErrorKind, FieldViolation, GraphError,
    IdDescriptor, IdKind, Result, TypeTag, ValidationErrors,
};
pub use crate::facade::{ContextConfig, ContextHooks, DomainContext};
pub use crate::reconcile::{EntityState, ReconcilePlan};
pub use crate::schema::{ContextDescriptor, EntitySchema, OwnershipClassifier, SchemaRegistry};
pub use crate::storage::{
    EntityStore, FetchScope, InMemoryDatabase, InMemoryStore, RequiredFields, StoreConfig,
    Validator,
};
pub use crate::transaction::ChangeSummary;
