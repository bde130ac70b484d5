pub mod entity;
pub mod error;
pub mod identity;
pub mod types;

pub use entity::{EntityRecord, EntityRef, FieldMap, RelationValue};
pub use error::{
    EntityViolations, ErrorKind, FieldViolation, GraphError, Result, ValidationErrors,
};
pub use identity::{EntityId, IdDescriptor, IdGeneration, IdKind};
pub use types::{EntityKey, TypeTag};
