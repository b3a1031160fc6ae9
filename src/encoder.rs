//! Constraint-to-backend encoding framework
//!
//! The encoding of a constraint depends on two independent axes: its
//! semantic kind, and the concrete kind of each operand (free variable vs.
//! fixed constant). Each constraint kind has its own encoder trait with one
//! method per operand-kind combination; [`encode_constraint`] performs both
//! dispatches, matching on the constraint kind first and on the operand
//! kinds second.
//!
//! Every method defaults to `None`, the explicit "unsupported" sentinel: a
//! backend implements only the combinations it can encode. The
//! constant/constant combinations are frequently unreachable because
//! construction-time normalization eliminates them earlier.

use crate::lattice::Qualifier;
use crate::model::{ArithmeticOp, ComparisonOp, Constraint, Slot};

/// The operand-kind combination of a binary constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotSlotCombo {
    /// Both operands are free variables
    VariableVariable,
    /// Left operand free, right operand fixed
    VariableConstant,
    /// Left operand fixed, right operand free
    ConstantVariable,
    /// Both operands fixed
    ConstantConstant,
}

impl SlotSlotCombo {
    /// Determines the combination of the two operands
    pub fn of(first: &Slot, second: &Slot) -> SlotSlotCombo {
        match (first.is_constant(), second.is_constant()) {
            (false, false) => SlotSlotCombo::VariableVariable,
            (false, true) => SlotSlotCombo::VariableConstant,
            (true, false) => SlotSlotCombo::ConstantVariable,
            (true, true) => SlotSlotCombo::ConstantConstant,
        }
    }
}

/// Result of encoding one constraint for a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encoded<E> {
    /// The backend's native representation of the constraint
    Value(E),
    /// The constraint was decided true at construction time
    TriviallyTrue,
    /// The constraint was decided false at construction time
    TriviallyFalse,
    /// The backend does not support this constraint or combination
    Unsupported,
}

impl<E> Encoded<E> {
    /// Returns the encoded value, if any
    pub fn value(self) -> Option<E> {
        match self {
            Encoded::Value(e) => Some(e),
            _ => None,
        }
    }
}

fn supported<E>(result: Option<E>) -> Encoded<E> {
    match result {
        Some(e) => Encoded::Value(e),
        None => Encoded::Unsupported,
    }
}

/// Encoder for subtype constraints
pub trait SubtypeEncoder<E> {
    /// Encodes `sub <: sup` over two variables
    fn subtype_variable_variable(&mut self, _sub: &Slot, _sup: &Slot) -> Option<E> {
        None
    }
    /// Encodes `sub <: sup` with a constant supertype
    fn subtype_variable_constant(&mut self, _sub: &Slot, _sup: Qualifier) -> Option<E> {
        None
    }
    /// Encodes `sub <: sup` with a constant subtype
    fn subtype_constant_variable(&mut self, _sub: Qualifier, _sup: &Slot) -> Option<E> {
        None
    }
    /// Encodes `sub <: sup` over two constants
    fn subtype_constant_constant(&mut self, _sub: Qualifier, _sup: Qualifier) -> Option<E> {
        None
    }
}

/// Encoder for equality constraints
pub trait EqualityEncoder<E> {
    /// Encodes equality over two variables
    fn equality_variable_variable(&mut self, _left: &Slot, _right: &Slot) -> Option<E> {
        None
    }
    /// Encodes equality of a variable with a constant
    fn equality_variable_constant(&mut self, _left: &Slot, _right: Qualifier) -> Option<E> {
        None
    }
    /// Encodes equality of a constant with a variable
    fn equality_constant_variable(&mut self, _left: Qualifier, _right: &Slot) -> Option<E> {
        None
    }
    /// Encodes equality over two constants
    fn equality_constant_constant(&mut self, _left: Qualifier, _right: Qualifier) -> Option<E> {
        None
    }
}

/// Encoder for comparable constraints
pub trait ComparableEncoder<E> {
    /// Encodes comparability over two variables
    fn comparable_variable_variable(
        &mut self,
        _op: ComparisonOp,
        _left: &Slot,
        _right: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes comparability of a variable with a constant
    fn comparable_variable_constant(
        &mut self,
        _op: ComparisonOp,
        _left: &Slot,
        _right: Qualifier,
    ) -> Option<E> {
        None
    }
    /// Encodes comparability of a constant with a variable
    fn comparable_constant_variable(
        &mut self,
        _op: ComparisonOp,
        _left: Qualifier,
        _right: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes comparability over two constants
    fn comparable_constant_constant(
        &mut self,
        _op: ComparisonOp,
        _left: Qualifier,
        _right: Qualifier,
    ) -> Option<E> {
        None
    }
}

/// Encoder for comparison constraints
pub trait ComparisonEncoder<E> {
    /// Encodes a comparison over two variables
    fn comparison_variable_variable(
        &mut self,
        _op: ComparisonOp,
        _left: &Slot,
        _right: &Slot,
        _result: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes a comparison of a variable with a constant
    fn comparison_variable_constant(
        &mut self,
        _op: ComparisonOp,
        _left: &Slot,
        _right: Qualifier,
        _result: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes a comparison of a constant with a variable
    fn comparison_constant_variable(
        &mut self,
        _op: ComparisonOp,
        _left: Qualifier,
        _right: &Slot,
        _result: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes a comparison over two constants
    fn comparison_constant_constant(
        &mut self,
        _op: ComparisonOp,
        _left: Qualifier,
        _right: Qualifier,
        _result: &Slot,
    ) -> Option<E> {
        None
    }
}

/// Encoder for arithmetic constraints
pub trait ArithmeticEncoder<E> {
    /// Encodes an arithmetic operation over two variables
    fn arithmetic_variable_variable(
        &mut self,
        _op: ArithmeticOp,
        _left: &Slot,
        _right: &Slot,
        _result: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes an arithmetic operation of a variable with a constant
    fn arithmetic_variable_constant(
        &mut self,
        _op: ArithmeticOp,
        _left: &Slot,
        _right: Qualifier,
        _result: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes an arithmetic operation of a constant with a variable
    fn arithmetic_constant_variable(
        &mut self,
        _op: ArithmeticOp,
        _left: Qualifier,
        _right: &Slot,
        _result: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes an arithmetic operation over two constants
    fn arithmetic_constant_constant(
        &mut self,
        _op: ArithmeticOp,
        _left: Qualifier,
        _right: Qualifier,
        _result: &Slot,
    ) -> Option<E> {
        None
    }
}

/// Encoder for existential constraints
pub trait ExistentialEncoder<E> {
    /// Encodes a choice between two variables
    fn existential_variable_variable(
        &mut self,
        _potential: &Slot,
        _alternative: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes a choice between a variable and a constant
    fn existential_variable_constant(
        &mut self,
        _potential: &Slot,
        _alternative: Qualifier,
    ) -> Option<E> {
        None
    }
    /// Encodes a choice between a constant and a variable
    fn existential_constant_variable(
        &mut self,
        _potential: Qualifier,
        _alternative: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes a choice between two constants
    fn existential_constant_constant(
        &mut self,
        _potential: Qualifier,
        _alternative: Qualifier,
    ) -> Option<E> {
        None
    }
}

/// Encoder for combine constraints
///
/// The result is always a combination variable slot, so there are no
/// combinations over the result operand.
pub trait CombineEncoder<E> {
    /// Encodes a combination of two variables
    fn combine_variable_variable(
        &mut self,
        _target: &Slot,
        _declared: &Slot,
        _result: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes a combination of a variable with a constant
    fn combine_variable_constant(
        &mut self,
        _target: &Slot,
        _declared: Qualifier,
        _result: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes a combination of a constant with a variable
    fn combine_constant_variable(
        &mut self,
        _target: Qualifier,
        _declared: &Slot,
        _result: &Slot,
    ) -> Option<E> {
        None
    }
    /// Encodes a combination of two constants
    fn combine_constant_constant(
        &mut self,
        _target: Qualifier,
        _declared: Qualifier,
        _result: &Slot,
    ) -> Option<E> {
        None
    }
}

/// Encoder for soft preference constraints
pub trait PreferenceEncoder<E> {
    /// Encodes a soft bias of a variable toward a constant goal
    fn preference(&mut self, _variable: &Slot, _goal: Qualifier, _weight: u32) -> Option<E> {
        None
    }
}

/// Encoder for per-slot structural constraints, consumed by the solver
/// driver rather than by constraint dispatch
pub trait SlotEncoder<E> {
    /// Encodes the well-formedness constraint forcing the slot's encoding
    /// to select exactly one lattice value
    fn encode_wellformedness(&mut self, slot: &Slot) -> E;

    /// Encodes a soft preference biasing the slot toward a default value,
    /// used in optimizing mode; `None` when the backend has no soft form
    fn encode_preference(&mut self, _slot: &Slot) -> Option<E> {
        None
    }
}

/// Marker for the full set of per-kind encoder traits a backend implements
pub trait ConstraintEncoder<E>:
    SubtypeEncoder<E>
    + EqualityEncoder<E>
    + ComparableEncoder<E>
    + ComparisonEncoder<E>
    + ArithmeticEncoder<E>
    + ExistentialEncoder<E>
    + CombineEncoder<E>
    + PreferenceEncoder<E>
{
}

impl<T, E> ConstraintEncoder<E> for T where
    T: SubtypeEncoder<E>
        + EqualityEncoder<E>
        + ComparableEncoder<E>
        + ComparisonEncoder<E>
        + ArithmeticEncoder<E>
        + ExistentialEncoder<E>
        + CombineEncoder<E>
        + PreferenceEncoder<E>
{
}

impl Constraint {
    /// Serializes this constraint for a backend
    ///
    /// Equivalent to [`encode_constraint`]; the method form is the entry
    /// point the solver drivers use.
    pub fn serialize<B, E>(&self, backend: &mut B) -> Encoded<E>
    where
        B: ConstraintEncoder<E>,
    {
        encode_constraint(backend, self)
    }
}

/// Serializes one constraint for a backend
///
/// The first dispatch selects the per-kind trait from the constraint's
/// variant; the second inspects each operand's kind and selects the
/// matching method.
pub fn encode_constraint<B, E>(backend: &mut B, constraint: &Constraint) -> Encoded<E>
where
    B: ConstraintEncoder<E>,
{
    match constraint {
        Constraint::AlwaysTrue => Encoded::TriviallyTrue,
        Constraint::AlwaysFalse => Encoded::TriviallyFalse,

        Constraint::Subtype {
            subtype, supertype, ..
        } => supported(
            match (subtype.constant_value(), supertype.constant_value()) {
                (None, None) => backend.subtype_variable_variable(subtype, supertype),
                (None, Some(sup)) => backend.subtype_variable_constant(subtype, sup),
                (Some(sub), None) => backend.subtype_constant_variable(sub, supertype),
                (Some(sub), Some(sup)) => backend.subtype_constant_constant(sub, sup),
            },
        ),

        Constraint::Equality { left, right, .. } => {
            supported(match (left.constant_value(), right.constant_value()) {
                (None, None) => backend.equality_variable_variable(left, right),
                (None, Some(r)) => backend.equality_variable_constant(left, r),
                (Some(l), None) => backend.equality_constant_variable(l, right),
                (Some(l), Some(r)) => backend.equality_constant_constant(l, r),
            })
        }

        Constraint::Comparable { op, left, right, .. } => {
            supported(match (left.constant_value(), right.constant_value()) {
                (None, None) => backend.comparable_variable_variable(*op, left, right),
                (None, Some(r)) => backend.comparable_variable_constant(*op, left, r),
                (Some(l), None) => backend.comparable_constant_variable(*op, l, right),
                (Some(l), Some(r)) => backend.comparable_constant_constant(*op, l, r),
            })
        }

        Constraint::Comparison {
            op,
            left,
            right,
            result,
            ..
        } => supported(match (left.constant_value(), right.constant_value()) {
            (None, None) => backend.comparison_variable_variable(*op, left, right, result),
            (None, Some(r)) => backend.comparison_variable_constant(*op, left, r, result),
            (Some(l), None) => backend.comparison_constant_variable(*op, l, right, result),
            (Some(l), Some(r)) => backend.comparison_constant_constant(*op, l, r, result),
        }),

        Constraint::Arithmetic {
            op,
            left,
            right,
            result,
            ..
        } => supported(match (left.constant_value(), right.constant_value()) {
            (None, None) => backend.arithmetic_variable_variable(*op, left, right, result),
            (None, Some(r)) => backend.arithmetic_variable_constant(*op, left, r, result),
            (Some(l), None) => backend.arithmetic_constant_variable(*op, l, right, result),
            (Some(l), Some(r)) => backend.arithmetic_constant_constant(*op, l, r, result),
        }),

        Constraint::Existential {
            potential,
            alternative,
            ..
        } => supported(
            match (potential.constant_value(), alternative.constant_value()) {
                (None, None) => backend.existential_variable_variable(potential, alternative),
                (None, Some(a)) => backend.existential_variable_constant(potential, a),
                (Some(p), None) => backend.existential_constant_variable(p, alternative),
                (Some(p), Some(a)) => backend.existential_constant_constant(p, a),
            },
        ),

        Constraint::Combine {
            target,
            declared,
            result,
            ..
        } => supported(match (target.constant_value(), declared.constant_value()) {
            (None, None) => backend.combine_variable_variable(target, declared, result),
            (None, Some(d)) => backend.combine_variable_constant(target, d, result),
            (Some(t), None) => backend.combine_constant_variable(t, declared, result),
            (Some(t), Some(d)) => backend.combine_constant_constant(t, d, result),
        }),

        Constraint::Preference {
            variable,
            goal,
            weight,
        } => supported(
            goal.constant_value()
                .and_then(|g| backend.preference(variable, g, *weight)),
        ),
    }
}
