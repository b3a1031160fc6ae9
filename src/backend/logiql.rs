//! Fact-based backend
//!
//! Encodes constraints as fact-insertion statements for a Datalog-style
//! relational solver. Constants are named by their canonical short name and
//! variables by id; the solving rules live on the solver side, so only the
//! subtype, equality, and comparable relations are emitted here.

use crate::encoder::{
    ArithmeticEncoder, CombineEncoder, ComparableEncoder, ComparisonEncoder, EqualityEncoder,
    ExistentialEncoder, PreferenceEncoder, SlotEncoder, SubtypeEncoder,
};
use crate::lattice::{Lattice, Qualifier};
use crate::model::{ComparisonOp, Slot};

/// Encoder from constraints to fact-insertion statements
pub struct LogiQlEncoder {
    lattice: Lattice,
}

impl LogiQlEncoder {
    /// Creates a fact-based encoder over the given lattice
    pub fn new(lattice: Lattice) -> Self {
        Self { lattice }
    }

    fn constant_name(&self, value: Qualifier) -> &str {
        self.lattice.name(value)
    }
}

impl SubtypeEncoder<String> for LogiQlEncoder {
    fn subtype_variable_variable(&mut self, sub: &Slot, sup: &Slot) -> Option<String> {
        Some(format!(
            "+subtypeConstraint(v1, v2), +variable(v1), +hasvariableName[v1] = {}, \
             +variable(v2), +hasvariableName[v2] = {}.\n",
            sub.id(),
            sup.id()
        ))
    }

    fn subtype_variable_constant(&mut self, sub: &Slot, sup: Qualifier) -> Option<String> {
        Some(format!(
            "+subtypeConstraintRightConstant(v, c), +variable(v), +hasvariableName[v] = {}, \
             +constant(c), +hasconstantName[c] = \"{}\".\n",
            sub.id(),
            self.constant_name(sup)
        ))
    }

    fn subtype_constant_variable(&mut self, sub: Qualifier, sup: &Slot) -> Option<String> {
        Some(format!(
            "+subtypeConstraintLeftConstant(c, v), +constant(c), +hasconstantName[c] = \"{}\", \
             +variable(v), +hasvariableName[v] = {}.\n",
            self.constant_name(sub),
            sup.id()
        ))
    }
}

impl EqualityEncoder<String> for LogiQlEncoder {
    fn equality_variable_variable(&mut self, left: &Slot, right: &Slot) -> Option<String> {
        Some(format!(
            "+equalityConstraint(v1, v2), +variable(v1), +hasvariableName[v1] = {}, \
             +variable(v2), +hasvariableName[v2] = {}.\n",
            left.id(),
            right.id()
        ))
    }

    fn equality_variable_constant(&mut self, left: &Slot, right: Qualifier) -> Option<String> {
        Some(format!(
            "+equalityConstraintContainsConstant(v, c), +variable(v), +hasvariableName[v] = {}, \
             +constant(c), +hasconstantName[c] = \"{}\".\n",
            left.id(),
            self.constant_name(right)
        ))
    }

    fn equality_constant_variable(&mut self, left: Qualifier, right: &Slot) -> Option<String> {
        self.equality_variable_constant(right, left)
    }
}

impl ComparableEncoder<String> for LogiQlEncoder {
    fn comparable_variable_variable(
        &mut self,
        _op: ComparisonOp,
        left: &Slot,
        right: &Slot,
    ) -> Option<String> {
        Some(format!(
            "+comparableConstraint(v1, v2), +variable(v1), +hasvariableName[v1] = {}, \
             +variable(v2), +hasvariableName[v2] = {}.\n",
            left.id(),
            right.id()
        ))
    }

    fn comparable_variable_constant(
        &mut self,
        _op: ComparisonOp,
        left: &Slot,
        right: Qualifier,
    ) -> Option<String> {
        Some(format!(
            "+comparableConstraintContainsConstant(v, c), +variable(v), +hasvariableName[v] = {}, \
             +constant(c), +hasconstantName[c] = \"{}\".\n",
            left.id(),
            self.constant_name(right)
        ))
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

// The relational rule set covers only the binary relations above.
impl ComparisonEncoder<String> for LogiQlEncoder {}
impl ArithmeticEncoder<String> for LogiQlEncoder {}
impl ExistentialEncoder<String> for LogiQlEncoder {}
impl CombineEncoder<String> for LogiQlEncoder {}
impl PreferenceEncoder<String> for LogiQlEncoder {}

impl SlotEncoder<String> for LogiQlEncoder {
    fn encode_wellformedness(&mut self, slot: &Slot) -> String {
        format!(
            "+variable(v), +hasvariableName[v] = {}.\n",
            slot.id()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::SlotManager;
    use crate::model::Location;

    fn two_point() -> Lattice {
        Lattice::builder()
            .qualifier("Tainted")
            .qualifier("Untainted")
            .edge("Untainted", "Tainted")
            .top("Tainted")
            .bottom("Untainted")
            .build()
            .unwrap()
    }

    #[test]
    fn subtype_facts() {
        let lattice = two_point();
        let mut slots = SlotManager::new(lattice.clone());
        let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);
        let w = slots.create_source_variable(Location::source("A.java", 2), "int", true);

        let mut encoder = LogiQlEncoder::new(lattice.clone());
        let fact = encoder.subtype_variable_variable(&v, &w).unwrap();
        assert!(fact.starts_with("+subtypeConstraint(v1, v2)"));
        assert!(fact.contains("+hasvariableName[v1] = 1"));
        assert!(fact.contains("+hasvariableName[v2] = 2"));
    }

    #[test]
    fn constant_facts_use_short_names() {
        let lattice = two_point();
        let mut slots = SlotManager::new(lattice.clone());
        let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);

        let mut encoder = LogiQlEncoder::new(lattice.clone());
        let fact = encoder
            .subtype_variable_constant(&v, lattice.qualifier("Untainted").unwrap())
            .unwrap();
        assert!(fact.contains("+hasconstantName[c] = \"Untainted\""));
    }
}
