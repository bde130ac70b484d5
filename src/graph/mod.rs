pub mod visited;
pub mod walker;

pub use visited::VisitedSet;
pub use walker::{EntityView, GraphWalker, Member, RelatedProperty};
