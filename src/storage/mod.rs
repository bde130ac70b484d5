pub mod audit;
pub mod config;
pub mod engine;
pub mod memory;
pub mod snapshot;
pub mod table;
pub mod validation;

pub use audit::{AuditOutcome, AuditRecord};
pub use config::StoreConfig;
pub use engine::EntityStore;
pub use memory::{InMemoryDatabase, InMemoryStore};
pub use snapshot::{FetchScope, StoredSnapshot};
pub use table::{EntityTable, StoredRelation, StoredRow};
pub use validation::{RequiredFields, Validator};
