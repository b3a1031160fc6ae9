//! SMT backend
//!
//! Encodes constraints directly as logical formulas over an integer sort:
//! each variable slot is one SMT `Int` whose value is the index of the
//! chosen lattice qualifier, and each constraint becomes a formula over
//! those integers. The [`crate::driver`] wraps the formulas into assertions
//! and drives the external solver process.

use crate::encoder::{
    ArithmeticEncoder, CombineEncoder, ComparableEncoder, ComparisonEncoder, EqualityEncoder,
    ExistentialEncoder, PreferenceEncoder, SlotEncoder, SubtypeEncoder,
};
use crate::lattice::{Lattice, Qualifier};
use crate::model::{ArithmeticOp, ComparisonOp, Slot};

/// Encoder from constraints to SMT formula strings
pub struct SmtEncoder {
    lattice: Lattice,
}

impl SmtEncoder {
    /// Creates an SMT encoder over the given lattice
    pub fn new(lattice: Lattice) -> Self {
        Self { lattice }
    }

    /// Returns the declaration of the integer standing for a variable slot
    pub fn declaration(&self, slot: &Slot) -> String {
        format!("(declare-fun |{}| () Int)", slot.id())
    }

    fn term(slot: &Slot) -> String {
        format!("|{}|", slot.id())
    }

    fn eq_value(slot: &Slot, value: Qualifier) -> String {
        format!("(= |{}| {})", slot.id(), value.index())
    }

    fn or_all(mut parts: Vec<String>) -> String {
        match parts.len() {
            0 => "false".to_string(),
            1 => parts.remove(0),
            _ => format!("(or {})", parts.join(" ")),
        }
    }

    fn and_all(mut parts: Vec<String>) -> String {
        match parts.len() {
            0 => "true".to_string(),
            1 => parts.remove(0),
            _ => format!("(and {})", parts.join(" ")),
        }
    }

    /// Disjunction over all value pairs related by the given predicate
    fn related_pairs<F>(&self, left: &Slot, right: &Slot, related: F) -> String
    where
        F: Fn(Qualifier, Qualifier) -> bool,
    {
        let mut parts = Vec::new();
        for a in self.lattice.qualifiers() {
            for b in self.lattice.qualifiers() {
                if related(a, b) {
                    parts.push(Self::and_all(vec![
                        Self::eq_value(left, a),
                        Self::eq_value(right, b),
                    ]));
                }
            }
        }
        Self::or_all(parts)
    }

    /// Restricts a variable to the given value set
    fn value_set(slot: &Slot, values: &[Qualifier]) -> String {
        Self::or_all(
            values
                .iter()
                .map(|&q| Self::eq_value(slot, q))
                .collect(),
        )
    }

    /// Constrains `result` to the least upper bound of two variables
    fn lub_table_vv(&self, left: &Slot, right: &Slot, result: &Slot) -> String {
        let mut parts = Vec::new();
        for a in self.lattice.qualifiers() {
            for b in self.lattice.qualifiers() {
                let join = self.lattice.lub(a, b);
                parts.push(format!(
                    "(=> {} {})",
                    Self::and_all(vec![Self::eq_value(left, a), Self::eq_value(right, b)]),
                    Self::eq_value(result, join)
                ));
            }
        }
        Self::and_all(parts)
    }

    /// Constrains `result` to the least upper bound of a variable and a
    /// constant
    fn lub_table_vc(&self, left: &Slot, right: Qualifier, result: &Slot) -> String {
        let mut parts = Vec::new();
        for a in self.lattice.qualifiers() {
            let join = self.lattice.lub(a, right);
            parts.push(format!(
                "(=> {} {})",
                Self::eq_value(left, a),
                Self::eq_value(result, join)
            ));
        }
        Self::and_all(parts)
    }
}

impl SubtypeEncoder<String> for SmtEncoder {
    fn subtype_variable_variable(&mut self, sub: &Slot, sup: &Slot) -> Option<String> {
        Some(self.related_pairs(sub, sup, |a, b| self.lattice.is_subtype(a, b)))
    }

    fn subtype_variable_constant(&mut self, sub: &Slot, sup: Qualifier) -> Option<String> {
        Some(Self::value_set(sub, self.lattice.subtypes_of(sup)))
    }

    fn subtype_constant_variable(&mut self, sub: Qualifier, sup: &Slot) -> Option<String> {
        Some(Self::value_set(sup, self.lattice.supertypes_of(sub)))
    }
}

impl EqualityEncoder<String> for SmtEncoder {
    fn equality_variable_variable(&mut self, left: &Slot, right: &Slot) -> Option<String> {
        Some(format!("(= {} {})", Self::term(left), Self::term(right)))
    }

    fn equality_variable_constant(&mut self, left: &Slot, right: Qualifier) -> Option<String> {
        Some(Self::eq_value(left, right))
    }

    fn equality_constant_variable(&mut self, left: Qualifier, right: &Slot) -> Option<String> {
        Some(Self::eq_value(right, left))
    }
}

impl ComparableEncoder<String> for SmtEncoder {
    fn comparable_variable_variable(
        &mut self,
        _op: ComparisonOp,
        left: &Slot,
        right: &Slot,
    ) -> Option<String> {
        Some(self.related_pairs(left, right, |a, b| self.lattice.are_comparable(a, b)))
    }

    fn comparable_variable_constant(
        &mut self,
        _op: ComparisonOp,
        left: &Slot,
        right: Qualifier,
    ) -> Option<String> {
        let comparable: Vec<Qualifier> = self
            .lattice
            .qualifiers()
            .filter(|&q| self.lattice.are_comparable(q, right))
            .collect();
        Some(Self::value_set(left, &comparable))
    }

    fn comparable_constant_variable(
        &mut self,
        op: ComparisonOp,
        left: Qualifier,
        right: &Slot,
    ) -> Option<String> {
        self.comparable_variable_constant(op, right, left)
    }
}

impl ComparisonEncoder<String> for SmtEncoder {
    fn comparison_variable_variable(
        &mut self,
        op: ComparisonOp,
        left: &Slot,
        right: &Slot,
        result: &Slot,
    ) -> Option<String> {
        // the result refines the left operand, so it may only narrow
        let comparable = self.comparable_variable_variable(op, left, right)?;
        let refines = self.related_pairs(result, left, |a, b| self.lattice.is_subtype(a, b));
        Some(Self::and_all(vec![comparable, refines]))
    }

    fn comparison_variable_constant(
        &mut self,
        op: ComparisonOp,
        left: &Slot,
        right: Qualifier,
        result: &Slot,
    ) -> Option<String> {
        let comparable = self.comparable_variable_constant(op, left, right)?;
        let refines = self.related_pairs(result, left, |a, b| self.lattice.is_subtype(a, b));
        Some(Self::and_all(vec![comparable, refines]))
    }

    fn comparison_constant_variable(
        &mut self,
        op: ComparisonOp,
        left: Qualifier,
        right: &Slot,
        result: &Slot,
    ) -> Option<String> {
        let comparable = self.comparable_constant_variable(op, left, right)?;
        let refines = Self::value_set(result, self.lattice.subtypes_of(left));
        Some(Self::and_all(vec![comparable, refines]))
    }
}

impl ArithmeticEncoder<String> for SmtEncoder {
    fn arithmetic_variable_variable(
        &mut self,
        _op: ArithmeticOp,
        left: &Slot,
        right: &Slot,
        result: &Slot,
    ) -> Option<String> {
        Some(self.lub_table_vv(left, right, result))
    }

    fn arithmetic_variable_constant(
        &mut self,
        _op: ArithmeticOp,
        left: &Slot,
        right: Qualifier,
        result: &Slot,
    ) -> Option<String> {
        Some(self.lub_table_vc(left, right, result))
    }

    fn arithmetic_constant_variable(
        &mut self,
        _op: ArithmeticOp,
        left: Qualifier,
        right: &Slot,
        result: &Slot,
    ) -> Option<String> {
        Some(self.lub_table_vc(right, left, result))
    }

    fn arithmetic_constant_constant(
        &mut self,
        _op: ArithmeticOp,
        left: Qualifier,
        right: Qualifier,
        result: &Slot,
    ) -> Option<String> {
        Some(Self::eq_value(result, self.lattice.lub(left, right)))
    }
}

// Existential choices depend on insertion decisions the solver cannot see;
// they stay unsupported here.
impl ExistentialEncoder<String> for SmtEncoder {}

impl CombineEncoder<String> for SmtEncoder {
    fn combine_variable_variable(
        &mut self,
        target: &Slot,
        declared: &Slot,
        result: &Slot,
    ) -> Option<String> {
        Some(self.lub_table_vv(target, declared, result))
    }

    fn combine_variable_constant(
        &mut self,
        target: &Slot,
        declared: Qualifier,
        result: &Slot,
    ) -> Option<String> {
        Some(self.lub_table_vc(target, declared, result))
    }

    fn combine_constant_variable(
        &mut self,
        target: Qualifier,
        declared: &Slot,
        result: &Slot,
    ) -> Option<String> {
        Some(self.lub_table_vc(declared, target, result))
    }

    fn combine_constant_constant(
        &mut self,
        target: Qualifier,
        declared: Qualifier,
        result: &Slot,
    ) -> Option<String> {
        Some(Self::eq_value(result, self.lattice.lub(target, declared)))
    }
}

impl PreferenceEncoder<String> for SmtEncoder {
    fn preference(&mut self, variable: &Slot, goal: Qualifier, _weight: u32) -> Option<String> {
        Some(Self::eq_value(variable, goal))
    }
}

impl SlotEncoder<String> for SmtEncoder {
    fn encode_wellformedness(&mut self, slot: &Slot) -> String {
        format!(
            "(and (>= |{}| 0) (< |{}| {}))",
            slot.id(),
            slot.id(),
            self.lattice.size()
        )
    }

    fn encode_preference(&mut self, slot: &Slot) -> Option<String> {
        Some(Self::eq_value(slot, self.lattice.top()))
    }
}
