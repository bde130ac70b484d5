// ============================================================================
// memograph Library
// ============================================================================
//
// Reconciles an in-memory object graph (an aggregate) against the state a
// storage collaborator last committed, and stages the inserts, updates,
// entity deletions and relationship deletions that bring storage in line.
//
// ============================================================================

pub mod core;
pub mod facade;
pub mod graph;
pub mod prelude;
pub mod reconcile;
pub mod schema;
pub mod storage;
pub mod transaction;

// Re-export main types for convenience
pub use core::{
    EntityId, EntityKey, EntityRecord, EntityRef, ErrorKind, GraphError, IdDescriptor, Result,
    TypeTag,
};
pub use facade::{ContextConfig, ContextHooks, DomainContext};
pub use schema::{ContextDescriptor, EntitySchema, OwnershipClassifier, SchemaRegistry};
pub use storage::{EntityStore, InMemoryDatabase, InMemoryStore, StoreConfig};
