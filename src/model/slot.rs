//! Slot variants
//!
//! A slot stands for the qualifier value at one program location: either an
//! undetermined value the solver assigns (a variable slot) or a value with an
//! intrinsic meaning in the type system (a constant slot). Slots are issued
//! exclusively by the [`SlotManager`](crate::manager::SlotManager), which
//! interns them by structural identity; two structurally equal creation
//! requests always observe the same slot.

use std::fmt;
use std::sync::Arc;

use super::location::Location;
use crate::lattice::Qualifier;

/// Unique identifier of a slot
///
/// Ids are monotonically increasing in creation order. The first issued id
/// is 1; 0 is reserved for use as a serialization delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) u32);

impl SlotId {
    /// Returns the numeric value of this id
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Branch selector for comparison variable slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    /// Refinement on the branch where the comparison holds
    Then,
    /// Refinement on the branch where the comparison does not hold
    Else,
}

/// Discriminant of a [`Slot`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// A type use in source with an undetermined value
    SourceVariable,
    /// A value with intrinsic meaning in the type system
    Constant,
    /// A flow-sensitive refinement of another slot
    RefinementVariable,
    /// The result of combining a receiver and a declared slot
    CombinationVariable,
    /// The join of two slots at a control-flow merge
    LubVariable,
    /// A conditional choice between a potential and an alternative slot
    ExistentialVariable,
    /// The refined value of a comparison operand on one branch
    ComparisonVariable,
    /// The result of an arithmetic operation
    ArithmeticVariable,
}

/// A logical variable or fixed value over which constraints are generated
///
/// Nested slot references are stored by id; the issuing manager resolves
/// them. Slots clone cheaply and compare by structural content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    /// A type use in the source code with an undetermined value
    SourceVariable {
        /// Unique id
        id: SlotId,
        /// Position of the type use
        location: Location,
        /// Name of the underlying unannotated type
        type_name: Arc<str>,
        /// Whether the solved value should be inserted back into source
        insertable: bool,
    },
    /// A qualifier with intrinsic meaning; never insertable
    Constant {
        /// Unique id
        id: SlotId,
        /// The lattice value this slot is fixed to
        value: Qualifier,
    },
    /// A flow-sensitive refinement of another slot
    RefinementVariable {
        /// Unique id
        id: SlotId,
        /// Position of the refining assignment
        location: Location,
        /// The slot being refined
        refined: SlotId,
    },
    /// The result of combining a receiver slot with a declared slot,
    /// e.g. at a member access
    CombinationVariable {
        /// Unique id
        id: SlotId,
        /// Position of the combination
        location: Location,
        /// Receiver operand
        receiver: SlotId,
        /// Declared operand
        declared: SlotId,
    },
    /// The join of two slots at a control-flow merge
    LubVariable {
        /// Unique id
        id: SlotId,
        /// Position of the merge, when known
        location: Location,
        /// One merge input
        left: SlotId,
        /// The other merge input
        right: SlotId,
    },
    /// A variable that conditionally takes one of two slots' values
    ExistentialVariable {
        /// Unique id
        id: SlotId,
        /// The slot chosen when it exists
        potential: SlotId,
        /// The slot chosen otherwise
        alternative: SlotId,
    },
    /// The refined value of a comparison operand on one branch
    ComparisonVariable {
        /// Unique id
        id: SlotId,
        /// Position of the comparison
        location: Location,
        /// The operand slot being refined
        refined: SlotId,
        /// Which branch this refinement applies to
        branch: Branch,
    },
    /// The result of an arithmetic operation
    ArithmeticVariable {
        /// Unique id
        id: SlotId,
        /// Position of the operation
        location: Location,
    },
}

impl Slot {
    /// Returns the unique id of this slot
    pub fn id(&self) -> SlotId {
        match self {
            Slot::SourceVariable { id, .. }
            | Slot::Constant { id, .. }
            | Slot::RefinementVariable { id, .. }
            | Slot::CombinationVariable { id, .. }
            | Slot::LubVariable { id, .. }
            | Slot::ExistentialVariable { id, .. }
            | Slot::ComparisonVariable { id, .. }
            | Slot::ArithmeticVariable { id, .. } => *id,
        }
    }

    /// Returns the kind discriminant of this slot
    pub fn kind(&self) -> SlotKind {
        match self {
            Slot::SourceVariable { .. } => SlotKind::SourceVariable,
            Slot::Constant { .. } => SlotKind::Constant,
            Slot::RefinementVariable { .. } => SlotKind::RefinementVariable,
            Slot::CombinationVariable { .. } => SlotKind::CombinationVariable,
            Slot::LubVariable { .. } => SlotKind::LubVariable,
            Slot::ExistentialVariable { .. } => SlotKind::ExistentialVariable,
            Slot::ComparisonVariable { .. } => SlotKind::ComparisonVariable,
            Slot::ArithmeticVariable { .. } => SlotKind::ArithmeticVariable,
        }
    }

    /// Returns the source location this slot is attached to
    ///
    /// Constant and existential slots have no location of their own and
    /// report the missing sentinel.
    pub fn location(&self) -> &Location {
        match self {
            Slot::SourceVariable { location, .. }
            | Slot::RefinementVariable { location, .. }
            | Slot::CombinationVariable { location, .. }
            | Slot::LubVariable { location, .. }
            | Slot::ComparisonVariable { location, .. }
            | Slot::ArithmeticVariable { location, .. } => location,
            Slot::Constant { .. } | Slot::ExistentialVariable { .. } => &Location::MISSING,
        }
    }

    /// Returns true if this slot stands for an undetermined value
    pub fn is_variable(&self) -> bool {
        !self.is_constant()
    }

    /// Returns true if this slot is fixed to a lattice value
    pub fn is_constant(&self) -> bool {
        matches!(self, Slot::Constant { .. })
    }

    /// Returns the fixed lattice value of a constant slot
    pub fn constant_value(&self) -> Option<Qualifier> {
        match self {
            Slot::Constant { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Returns true if the solved value should be written back into source
    ///
    /// Only source variable slots are ever insertable; derived variables and
    /// constants are not.
    pub fn is_insertable(&self) -> bool {
        matches!(self, Slot::SourceVariable { insertable: true, .. })
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.kind() {
            SlotKind::SourceVariable => "SourceVariable",
            SlotKind::Constant => "Constant",
            SlotKind::RefinementVariable => "RefinementVariable",
            SlotKind::CombinationVariable => "CombinationVariable",
            SlotKind::LubVariable => "LubVariable",
            SlotKind::ExistentialVariable => "ExistentialVariable",
            SlotKind::ComparisonVariable => "ComparisonVariable",
            SlotKind::ArithmeticVariable => "ArithmeticVariable",
        };
        write!(f, "{}({})", name, self.id())
    }
}

/// The opaque external representation of a slot
///
/// The front end stores annotations on its own type representation and
/// round-trips them back through the
/// [`SlotManager`](crate::manager::SlotManager): a variable annotation
/// carries the slot id, a qualifier annotation names a lattice value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Annotation {
    /// A variable annotation carrying a slot id
    Variable(SlotId),
    /// A real qualifier from the lattice
    Qualifier(Qualifier),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let slot = Slot::SourceVariable {
            id: SlotId(3),
            location: Location::source("A.java", 12),
            type_name: Arc::from("java.lang.String"),
            insertable: true,
        };
        assert_eq!(slot.id().get(), 3);
        assert_eq!(slot.kind(), SlotKind::SourceVariable);
        assert!(slot.is_variable());
        assert!(!slot.is_constant());
        assert!(slot.is_insertable());
        assert_eq!(slot.to_string(), "SourceVariable(3)");
    }

    #[test]
    fn constant_is_never_insertable() {
        let lattice = crate::lattice::Lattice::builder()
            .qualifier("Top")
            .top("Top")
            .bottom("Top")
            .build()
            .unwrap();
        let slot = Slot::Constant {
            id: SlotId(1),
            value: lattice.top(),
        };
        assert!(slot.is_constant());
        assert!(!slot.is_insertable());
        assert_eq!(slot.constant_value(), Some(lattice.top()));
        assert!(slot.location().is_missing());
    }
}
