//! Slot and constraint model types
//!
//! Slots are the logical variables (and fixed values) an inference pass
//! solves for; constraints are the relations that must hold between them.

mod constraint;
mod location;
mod slot;

pub use constraint::{ArithmeticOp, ComparisonOp, Constraint, ConstraintManager};
pub use location::Location;
pub use slot::{Annotation, Branch, Slot, SlotId, SlotKind};
