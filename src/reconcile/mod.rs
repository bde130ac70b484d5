//! Graph reconciliation: decides insert, update, entity deletion and
//! relationship deletion for every entity reachable from a saved root.

pub mod plan;
pub mod reconciler;
pub mod state;

pub use plan::{ReconcilePlan, Visit};
pub use reconciler::Reconciler;
pub use state::EntityState;
