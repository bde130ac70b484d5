// ============================================================================
// Change Staging Module
// ============================================================================
//
// Two-phase persistence: a save plans and stages changes, a separate commit
// applies everything staged so far or nothing at all.
//
// ============================================================================

pub mod change;

pub use change::{Change, ChangeKind, ChangeSummary, OriginalValues};
