//! Constraint variants and their normalizing factories
//!
//! Constraints are relations over two or three slots. They are only
//! constructed through the [`ConstraintManager`], whose factories normalize
//! trivial cases at construction time: a relation between two constants is
//! decided immediately against the lattice, and a reflexive relation
//! collapses to [`Constraint::AlwaysTrue`]. No tautology or contradiction
//! reaches the encoders undetected.

use std::fmt;

use super::location::Location;
use super::slot::{Slot, SlotKind};
use crate::lattice::Lattice;
use crate::error::{QualError, Result};

/// Operation tag for comparable and comparison constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// `==`
    EqualTo,
    /// `!=`
    NotEqualTo,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEqual,
}

impl ComparisonOp {
    /// Returns the source-level symbol of this operation
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::EqualTo => "==",
            ComparisonOp::NotEqualTo => "!=",
            ComparisonOp::GreaterThan => ">",
            ComparisonOp::GreaterThanEqual => ">=",
            ComparisonOp::LessThan => "<",
            ComparisonOp::LessThanEqual => "<=",
        }
    }
}

/// Operation tag for arithmetic constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Remainder,
    /// `<<`
    LeftShift,
    /// `>>`
    RightShift,
    /// `>>>`
    UnsignedRightShift,
    /// `&`
    AndBits,
    /// `|`
    OrBits,
    /// `^`
    XorBits,
}

impl ArithmeticOp {
    /// Returns the source-level symbol of this operation
    pub fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Plus => "+",
            ArithmeticOp::Minus => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
            ArithmeticOp::Remainder => "%",
            ArithmeticOp::LeftShift => "<<",
            ArithmeticOp::RightShift => ">>",
            ArithmeticOp::UnsignedRightShift => ">>>",
            ArithmeticOp::AndBits => "&",
            ArithmeticOp::OrBits => "|",
            ArithmeticOp::XorBits => "^",
        }
    }
}

/// A relation over slots that must hold in any valid solution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `subtype <: supertype`
    Subtype {
        /// The subtype operand
        subtype: Slot,
        /// The supertype operand
        supertype: Slot,
        /// Where the relation was discovered
        location: Location,
    },
    /// The two operands take the same value
    Equality {
        /// Left operand
        left: Slot,
        /// Right operand
        right: Slot,
        /// Where the relation was discovered
        location: Location,
    },
    /// The two operands are related in at least one direction
    Comparable {
        /// Source operation that induced the relation
        op: ComparisonOp,
        /// Left operand
        left: Slot,
        /// Right operand
        right: Slot,
        /// Where the relation was discovered
        location: Location,
    },
    /// A comparison refining `result` from the comparison of `left` and `right`
    Comparison {
        /// Source operation
        op: ComparisonOp,
        /// Left operand
        left: Slot,
        /// Right operand
        right: Slot,
        /// The comparison variable slot receiving the refinement
        result: Slot,
        /// Where the comparison occurs
        location: Location,
    },
    /// An arithmetic operation whose result slot is bounded by the operands
    Arithmetic {
        /// Source operation
        op: ArithmeticOp,
        /// Left operand
        left: Slot,
        /// Right operand
        right: Slot,
        /// The arithmetic variable slot receiving the result
        result: Slot,
        /// Where the operation occurs
        location: Location,
    },
    /// A conditional choice between a potential and an alternative slot
    Existential {
        /// The slot used when the choice exists
        potential: Slot,
        /// The slot used otherwise
        alternative: Slot,
        /// Where the choice was discovered
        location: Location,
    },
    /// Combination of a target and a declared slot into a result slot
    Combine {
        /// Receiver operand
        target: Slot,
        /// Declared operand
        declared: Slot,
        /// The combination variable slot receiving the result
        result: Slot,
        /// Where the combination occurs
        location: Location,
    },
    /// A soft bias toward a goal value; never mandatory
    Preference {
        /// The variable slot being biased
        variable: Slot,
        /// The constant goal value
        goal: Slot,
        /// Relative weight of the bias
        weight: u32,
    },
    /// Sentinel for a relation decided true at construction time
    AlwaysTrue,
    /// Sentinel for a relation decided false at construction time
    AlwaysFalse,
}

impl Constraint {
    /// Returns the name of this constraint's kind, used to label assertions
    /// in an explanation pass
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constraint::Subtype { .. } => "SubtypeConstraint",
            Constraint::Equality { .. } => "EqualityConstraint",
            Constraint::Comparable { .. } => "ComparableConstraint",
            Constraint::Comparison { .. } => "ComparisonConstraint",
            Constraint::Arithmetic { .. } => "ArithmeticConstraint",
            Constraint::Existential { .. } => "ExistentialConstraint",
            Constraint::Combine { .. } => "CombineConstraint",
            Constraint::Preference { .. } => "PreferenceConstraint",
            Constraint::AlwaysTrue => "AlwaysTrueConstraint",
            Constraint::AlwaysFalse => "AlwaysFalseConstraint",
        }
    }

    /// Returns the location this constraint was discovered at
    pub fn location(&self) -> &Location {
        match self {
            Constraint::Subtype { location, .. }
            | Constraint::Equality { location, .. }
            | Constraint::Comparable { location, .. }
            | Constraint::Comparison { location, .. }
            | Constraint::Arithmetic { location, .. }
            | Constraint::Existential { location, .. }
            | Constraint::Combine { location, .. } => location,
            Constraint::Preference { .. }
            | Constraint::AlwaysTrue
            | Constraint::AlwaysFalse => &Location::MISSING,
        }
    }

    /// Returns the slots this constraint ranges over
    pub fn slots(&self) -> Vec<&Slot> {
        match self {
            Constraint::Subtype {
                subtype, supertype, ..
            } => vec![subtype, supertype],
            Constraint::Equality { left, right, .. } => vec![left, right],
            Constraint::Comparable { left, right, .. } => vec![left, right],
            Constraint::Comparison {
                left,
                right,
                result,
                ..
            }
            | Constraint::Arithmetic {
                left,
                right,
                result,
                ..
            } => vec![left, right, result],
            Constraint::Existential {
                potential,
                alternative,
                ..
            } => vec![potential, alternative],
            Constraint::Combine {
                target,
                declared,
                result,
                ..
            } => vec![target, declared, result],
            Constraint::Preference { variable, goal, .. } => vec![variable, goal],
            Constraint::AlwaysTrue | Constraint::AlwaysFalse => vec![],
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Subtype {
                subtype, supertype, ..
            } => write!(f, "{} <: {}", subtype, supertype),
            Constraint::Equality { left, right, .. } => write!(f, "{} == {}", left, right),
            Constraint::Comparable { op, left, right, .. } => {
                write!(f, "{} <~> {} (from {})", left, right, op.symbol())
            }
            Constraint::Comparison {
                op,
                left,
                right,
                result,
                ..
            } => write!(f, "{} = ({} {} {})", result, left, op.symbol(), right),
            Constraint::Arithmetic {
                op,
                left,
                right,
                result,
                ..
            } => write!(f, "{} = ({} {} {})", result, left, op.symbol(), right),
            Constraint::Existential {
                potential,
                alternative,
                ..
            } => write!(f, "({} | {})", potential, alternative),
            Constraint::Combine {
                target,
                declared,
                result,
                ..
            } => write!(f, "{} = ({} |> {})", result, target, declared),
            Constraint::Preference { variable, goal, weight } => {
                write!(f, "{} ~ {} (weight {})", variable, goal, weight)
            }
            Constraint::AlwaysTrue => write!(f, "true"),
            Constraint::AlwaysFalse => write!(f, "false"),
        }
    }
}

/// Factory for constraints, normalizing trivial cases at construction time
///
/// Holds the lattice so that relations between two constant slots can be
/// decided immediately. Operand equality for normalization purposes uses
/// slot identity (ids), except when both operands are constants, where the
/// lattice's subtype predicate decides.
#[derive(Clone)]
pub struct ConstraintManager {
    lattice: Lattice,
}

impl ConstraintManager {
    /// Creates a constraint manager over the given lattice
    pub fn new(lattice: Lattice) -> Self {
        Self { lattice }
    }

    /// Returns the lattice constraints are normalized against
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Creates a subtype constraint `sub <: sup`
    ///
    /// Two constant operands are decided immediately against the lattice; a
    /// reflexive relation is always true.
    pub fn subtype(&self, sub: Slot, sup: Slot, location: Location) -> Constraint {
        if let (Some(a), Some(b)) = (sub.constant_value(), sup.constant_value()) {
            return if self.lattice.is_subtype(a, b) {
                Constraint::AlwaysTrue
            } else {
                Constraint::AlwaysFalse
            };
        }
        if sub.id() == sup.id() {
            return Constraint::AlwaysTrue;
        }
        Constraint::Subtype {
            subtype: sub,
            supertype: sup,
            location,
        }
    }

    /// Creates an equality constraint
    ///
    /// Two constant operands are decided by value equality; a reflexive
    /// relation is always true.
    pub fn equality(&self, left: Slot, right: Slot, location: Location) -> Constraint {
        if let (Some(a), Some(b)) = (left.constant_value(), right.constant_value()) {
            return if a == b {
                Constraint::AlwaysTrue
            } else {
                Constraint::AlwaysFalse
            };
        }
        if left.id() == right.id() {
            return Constraint::AlwaysTrue;
        }
        Constraint::Equality {
            left,
            right,
            location,
        }
    }

    /// Creates a comparable constraint: the operands must be related in at
    /// least one direction
    ///
    /// Two constant operands are decided immediately: true iff the subtype
    /// predicate holds in either direction. Every slot is comparable to
    /// itself.
    ///
    /// # Errors
    /// Fails if the location is missing; a comparable constraint is
    /// meaningless without one.
    pub fn comparable(
        &self,
        op: ComparisonOp,
        left: Slot,
        right: Slot,
        location: Location,
    ) -> Result<Constraint> {
        if location.is_missing() {
            return Err(QualError::MissingLocation(format!(
                "cannot create a comparable constraint over {} and {} without a location",
                left, right
            )));
        }
        if let (Some(a), Some(b)) = (left.constant_value(), right.constant_value()) {
            return Ok(if self.lattice.are_comparable(a, b) {
                Constraint::AlwaysTrue
            } else {
                Constraint::AlwaysFalse
            });
        }
        if left.id() == right.id() {
            return Ok(Constraint::AlwaysTrue);
        }
        Ok(Constraint::Comparable {
            op,
            left,
            right,
            location,
        })
    }

    /// Creates a comparison constraint refining `result` from the comparison
    /// of `left` and `right`
    ///
    /// # Errors
    /// Fails if the location is missing or `result` is not a comparison
    /// variable slot.
    pub fn comparison(
        &self,
        op: ComparisonOp,
        left: Slot,
        right: Slot,
        result: Slot,
        location: Location,
    ) -> Result<Constraint> {
        if location.is_missing() {
            return Err(QualError::MissingLocation(format!(
                "cannot create a comparison constraint over {} and {} without a location",
                left, right
            )));
        }
        if result.kind() != SlotKind::ComparisonVariable {
            return Err(QualError::InvalidArgument(format!(
                "comparison constraint result must be a comparison variable slot, got {}",
                result
            )));
        }
        if let (Some(a), Some(b)) = (left.constant_value(), right.constant_value()) {
            return Ok(if self.lattice.are_comparable(a, b) {
                Constraint::AlwaysTrue
            } else {
                Constraint::AlwaysFalse
            });
        }
        Ok(Constraint::Comparison {
            op,
            left,
            right,
            result,
            location,
        })
    }

    /// Creates an arithmetic constraint bounding `result` by the operands
    ///
    /// # Errors
    /// Fails if the location is missing or `result` is not an arithmetic
    /// variable slot.
    pub fn arithmetic(
        &self,
        op: ArithmeticOp,
        left: Slot,
        right: Slot,
        result: Slot,
        location: Location,
    ) -> Result<Constraint> {
        if location.is_missing() {
            return Err(QualError::MissingLocation(format!(
                "cannot create an arithmetic constraint over {} and {} without a location",
                left, right
            )));
        }
        if result.kind() != SlotKind::ArithmeticVariable {
            return Err(QualError::InvalidArgument(format!(
                "arithmetic constraint result must be an arithmetic variable slot, got {}",
                result
            )));
        }
        Ok(Constraint::Arithmetic {
            op,
            left,
            right,
            result,
            location,
        })
    }

    /// Creates an existential constraint choosing between two slots
    ///
    /// A choice between a slot and itself is always true.
    pub fn existential(&self, potential: Slot, alternative: Slot, location: Location) -> Constraint {
        if potential.id() == alternative.id() {
            return Constraint::AlwaysTrue;
        }
        Constraint::Existential {
            potential,
            alternative,
            location,
        }
    }

    /// Creates a combine constraint over a target, a declared slot, and the
    /// combination variable slot receiving the result
    ///
    /// # Errors
    /// Fails if `result` is not a combination variable slot.
    pub fn combine(
        &self,
        target: Slot,
        declared: Slot,
        result: Slot,
        location: Location,
    ) -> Result<Constraint> {
        if result.kind() != SlotKind::CombinationVariable {
            return Err(QualError::InvalidArgument(format!(
                "combine constraint result must be a combination variable slot, got {}",
                result
            )));
        }
        Ok(Constraint::Combine {
            target,
            declared,
            result,
            location,
        })
    }

    /// Creates a soft preference biasing `variable` toward the constant
    /// `goal`
    ///
    /// # Errors
    /// Fails unless `variable` is a variable slot and `goal` is a constant.
    pub fn preference(&self, variable: Slot, goal: Slot, weight: u32) -> Result<Constraint> {
        if variable.is_constant() {
            return Err(QualError::InvalidArgument(format!(
                "preference target must be a variable slot, got {}",
                variable
            )));
        }
        if !goal.is_constant() {
            return Err(QualError::InvalidArgument(format!(
                "preference goal must be a constant slot, got {}",
                goal
            )));
        }
        Ok(Constraint::Preference {
            variable,
            goal,
            weight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lattice::Lattice;
    use crate::manager::SlotManager;

    fn diamond() -> Lattice {
        Lattice::builder()
            .qualifier("Top")
            .qualifier("A")
            .qualifier("B")
            .qualifier("Bottom")
            .edge("A", "Top")
            .edge("B", "Top")
            .edge("Bottom", "A")
            .edge("Bottom", "B")
            .top("Top")
            .bottom("Bottom")
            .build()
            .unwrap()
    }

    #[test]
    fn constant_subtype_normalizes() {
        let lattice = diamond();
        let mut slots = SlotManager::new(lattice.clone());
        let manager = ConstraintManager::new(lattice.clone());

        let a = slots.create_constant(lattice.qualifier("A").unwrap());
        let top = slots.create_constant(lattice.top());

        assert_eq!(
            manager.subtype(a.clone(), top.clone(), Location::missing()),
            Constraint::AlwaysTrue
        );
        assert_eq!(
            manager.subtype(top, a, Location::missing()),
            Constraint::AlwaysFalse
        );
    }

    #[test]
    fn reflexive_relations_are_true() {
        let lattice = diamond();
        let mut slots = SlotManager::new(lattice.clone());
        let manager = ConstraintManager::new(lattice);

        let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);
        assert_eq!(
            manager.subtype(v.clone(), v.clone(), Location::missing()),
            Constraint::AlwaysTrue
        );
        assert_eq!(
            manager.equality(v.clone(), v.clone(), Location::missing()),
            Constraint::AlwaysTrue
        );
        assert_eq!(
            manager
                .comparable(
                    ComparisonOp::EqualTo,
                    v.clone(),
                    v,
                    Location::source("A.java", 1)
                )
                .unwrap(),
            Constraint::AlwaysTrue
        );
    }

    #[test]
    fn comparable_requires_location() {
        let lattice = diamond();
        let mut slots = SlotManager::new(lattice.clone());
        let manager = ConstraintManager::new(lattice);

        let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);
        let w = slots.create_source_variable(Location::source("A.java", 2), "int", true);
        assert!(manager
            .comparable(ComparisonOp::LessThan, v, w, Location::missing())
            .is_err());
    }

    #[test]
    fn comparable_constants_decided_by_lattice() {
        let lattice = diamond();
        let mut slots = SlotManager::new(lattice.clone());
        let manager = ConstraintManager::new(lattice.clone());
        let loc = Location::source("A.java", 4);

        let a = slots.create_constant(lattice.qualifier("A").unwrap());
        let b = slots.create_constant(lattice.qualifier("B").unwrap());
        let bottom = slots.create_constant(lattice.bottom());

        assert_eq!(
            manager
                .comparable(ComparisonOp::EqualTo, a.clone(), b, loc.clone())
                .unwrap(),
            Constraint::AlwaysFalse
        );
        assert_eq!(
            manager
                .comparable(ComparisonOp::EqualTo, a, bottom, loc)
                .unwrap(),
            Constraint::AlwaysTrue
        );
    }

    #[test]
    fn preference_operand_kinds() {
        let lattice = diamond();
        let mut slots = SlotManager::new(lattice.clone());
        let manager = ConstraintManager::new(lattice.clone());

        let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);
        let top = slots.create_constant(lattice.top());

        assert!(manager.preference(v.clone(), top.clone(), 1).is_ok());
        assert!(manager.preference(top.clone(), top.clone(), 1).is_err());
        assert!(manager.preference(v.clone(), v, 1).is_err());
    }

    #[test]
    fn constraint_display() {
        let lattice = diamond();
        let mut slots = SlotManager::new(lattice.clone());
        let manager = ConstraintManager::new(lattice.clone());

        let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);
        let top = slots.create_constant(lattice.top());
        let c = manager.subtype(v, top, Location::missing());
        assert_eq!(c.to_string(), "SourceVariable(1) <: Constant(2)");
        assert_eq!(c.kind_name(), "SubtypeConstraint");
    }
}
