//! Boolean-satisfiability backend
//!
//! Represents each slot as one indicator variable per lattice value,
//! conceptually one row per slot in a slot-by-value matrix. Constraints
//! become CNF clauses over the indicators; well-formedness forces exactly
//! one indicator per row. Solving and unsat-core extraction run in process
//! through the [`crate::engine`] solver abstraction.

use log::{debug, warn};
use rustc_hash::FxHashSet;

use crate::cnf::{Clause, Cnf};
use crate::driver::Solution;
use crate::encoder::{
    ArithmeticEncoder, CombineEncoder, ComparableEncoder, ComparisonEncoder, Encoded,
    EqualityEncoder, ExistentialEncoder, PreferenceEncoder, SlotEncoder, SubtypeEncoder,
};
use crate::engine::rustsat_adapter::RustSatAdapter;
use crate::engine::{SATProver, SATSolver};
use crate::error::{QualError, Result};
use crate::lattice::{Lattice, Qualifier};
use crate::manager::SlotManager;
use crate::model::{ComparisonOp, Constraint, Slot, SlotId};

/// Encoder from constraints to CNF clause groups
pub struct SatEncoder {
    lattice: Lattice,
}

impl SatEncoder {
    /// Creates a SAT encoder over the given lattice
    pub fn new(lattice: Lattice) -> Self {
        Self { lattice }
    }

    /// Maps a slot and a lattice value to the indicator variable for
    /// "this slot takes this value"
    ///
    /// Slot ids are 1-based, so slot `n` occupies the matrix row starting
    /// at variable `(n - 1) * size + 1`.
    pub fn indicator(&self, slot: SlotId, value: Qualifier) -> i32 {
        ((slot.get() - 1) as i32) * self.lattice.size() as i32 + value.index() as i32 + 1
    }

    /// Number of indicator variables spanned by `num_slots` slots
    pub fn matrix_size(&self, num_slots: usize) -> u32 {
        (num_slots * self.lattice.size()) as u32
    }
}

impl SubtypeEncoder<Vec<Clause>> for SatEncoder {
    fn subtype_variable_variable(&mut self, sub: &Slot, sup: &Slot) -> Option<Vec<Clause>> {
        // sub = q forces sup into the supertypes of q
        let mut clauses = Vec::new();
        for q in self.lattice.qualifiers() {
            let mut clause = vec![-self.indicator(sub.id(), q)];
            for &s in self.lattice.supertypes_of(q) {
                clause.push(self.indicator(sup.id(), s));
            }
            clauses.push(clause);
        }
        Some(clauses)
    }

    fn subtype_variable_constant(&mut self, sub: &Slot, sup: Qualifier) -> Option<Vec<Clause>> {
        let clause = self
            .lattice
            .subtypes_of(sup)
            .iter()
            .map(|&q| self.indicator(sub.id(), q))
            .collect();
        Some(vec![clause])
    }

    fn subtype_constant_variable(&mut self, sub: Qualifier, sup: &Slot) -> Option<Vec<Clause>> {
        let clause = self
            .lattice
            .supertypes_of(sub)
            .iter()
            .map(|&q| self.indicator(sup.id(), q))
            .collect();
        Some(vec![clause])
    }
}

impl EqualityEncoder<Vec<Clause>> for SatEncoder {
    fn equality_variable_variable(&mut self, left: &Slot, right: &Slot) -> Option<Vec<Clause>> {
        // indicator biconditional per lattice value
        let mut clauses = Vec::new();
        for q in self.lattice.qualifiers() {
            let l = self.indicator(left.id(), q);
            let r = self.indicator(right.id(), q);
            clauses.push(vec![-l, r]);
            clauses.push(vec![-r, l]);
        }
        Some(clauses)
    }

    fn equality_variable_constant(&mut self, left: &Slot, right: Qualifier) -> Option<Vec<Clause>> {
        Some(vec![vec![self.indicator(left.id(), right)]])
    }

    fn equality_constant_variable(&mut self, left: Qualifier, right: &Slot) -> Option<Vec<Clause>> {
        self.equality_variable_constant(right, left)
    }
}

impl ComparableEncoder<Vec<Clause>> for SatEncoder {
    fn comparable_variable_variable(
        &mut self,
        _op: ComparisonOp,
        left: &Slot,
        right: &Slot,
    ) -> Option<Vec<Clause>> {
        // the operands may never take incomparable values simultaneously
        let mut clauses = Vec::new();
        for q in self.lattice.qualifiers() {
            for &u in self.lattice.incomparable_with(q) {
                clauses.push(vec![
                    -self.indicator(left.id(), q),
                    -self.indicator(right.id(), u),
                ]);
            }
        }
        Some(clauses)
    }

    fn comparable_variable_constant(
        &mut self,
        _op: ComparisonOp,
        left: &Slot,
        right: Qualifier,
    ) -> Option<Vec<Clause>> {
        let clauses = self
            .lattice
            .incomparable_with(right)
            .iter()
            .map(|&u| vec![-self.indicator(left.id(), u)])
            .collect();
        Some(clauses)
    }

    fn comparable_constant_variable(
        &mut self,
        op: ComparisonOp,
        left: Qualifier,
        right: &Slot,
    ) -> Option<Vec<Clause>> {
        self.comparable_variable_constant(op, right, left)
    }
}

// Comparison, arithmetic, existential, and combine constraints need richer
// value reasoning than indicator clauses give; the SMT backend handles them.
impl ComparisonEncoder<Vec<Clause>> for SatEncoder {}
impl ArithmeticEncoder<Vec<Clause>> for SatEncoder {}
impl ExistentialEncoder<Vec<Clause>> for SatEncoder {}
impl CombineEncoder<Vec<Clause>> for SatEncoder {}

// No soft clauses in the in-process solver.
impl PreferenceEncoder<Vec<Clause>> for SatEncoder {}

impl SlotEncoder<Vec<Clause>> for SatEncoder {
    fn encode_wellformedness(&mut self, slot: &Slot) -> Vec<Clause> {
        let indicators: Vec<i32> = self
            .lattice
            .qualifiers()
            .map(|q| self.indicator(slot.id(), q))
            .collect();

        // at least one value, at most one value
        let mut clauses = vec![indicators.clone()];
        for (i, &a) in indicators.iter().enumerate() {
            for &b in &indicators[i + 1..] {
                clauses.push(vec![-a, -b]);
            }
        }
        clauses
    }
}

/// In-process boolean-satisfiability solving over the SAT encoder
///
/// Every hard constraint is guarded by a fresh selector literal and the
/// problem is solved under the selectors as assumptions, so an
/// unsatisfiable outcome directly yields the implicated constraints from
/// the failed-assumption core.
pub struct SatBackend {
    lattice: Lattice,
}

struct SatProblem {
    cnf: Cnf,
    /// Selector literal per encoded hard constraint, aligned with `origins`
    selectors: Vec<i32>,
    origins: Vec<Constraint>,
    referenced: FxHashSet<SlotId>,
}

impl SatBackend {
    /// Creates a SAT backend over the given lattice
    pub fn new(lattice: Lattice) -> Self {
        Self { lattice }
    }

    fn encode(&self, manager: &SlotManager, constraints: &[Constraint]) -> Result<SatProblem> {
        let mut encoder = SatEncoder::new(self.lattice.clone());
        let mut cnf = Cnf::new();

        // reserve the full slot-by-value matrix before selectors
        let matrix = encoder.matrix_size(manager.num_slots());
        if matrix > cnf.num_variables {
            cnf.num_variables = matrix;
        }

        for slot in manager.variable_slots() {
            cnf.add_clauses(encoder.encode_wellformedness(slot));
        }

        let mut selectors = Vec::new();
        let mut origins = Vec::new();
        let mut referenced = FxHashSet::default();
        let mut next_selector = matrix as i32;
        let mut trivially_true = 0usize;

        for constraint in constraints {
            match constraint.serialize::<_, Vec<Clause>>(&mut encoder) {
                Encoded::TriviallyTrue => trivially_true += 1,
                Encoded::TriviallyFalse => {
                    return Err(QualError::ImpossibleConstraint(constraint.to_string()));
                }
                Encoded::Unsupported => {
                    warn!(
                        "sat backend cannot encode {}: {}",
                        constraint.kind_name(),
                        constraint
                    );
                }
                Encoded::Value(clauses) => {
                    for slot in constraint.slots() {
                        if slot.is_variable() {
                            referenced.insert(slot.id());
                        }
                    }
                    // a constraint with no clauses is vacuously satisfied
                    // and gets no selector
                    if clauses.is_empty() {
                        trivially_true += 1;
                        continue;
                    }
                    next_selector += 1;
                    for mut clause in clauses {
                        clause.push(-next_selector);
                        cnf.add_clause(clause);
                    }
                    selectors.push(next_selector);
                    origins.push(constraint.clone());
                }
            }
        }

        debug!(
            "sat encoding: {} clauses, {} variables, {} constraints kept, {} trivially true",
            cnf.num_clauses(),
            cnf.num_variables,
            selectors.len(),
            trivially_true
        );

        Ok(SatProblem {
            cnf,
            selectors,
            origins,
            referenced,
        })
    }

    /// Solves the constraint set in process
    ///
    /// Returns `None` when the constraint set is unsatisfiable. The decoded
    /// solution maps every variable slot referenced by at least one
    /// constraint; unreferenced slots default to the lattice top.
    ///
    /// # Errors
    /// Fails if a hard constraint simplifies to false during encoding.
    pub fn solve(
        &self,
        manager: &SlotManager,
        constraints: &[Constraint],
    ) -> Result<Option<Solution>> {
        let problem = self.encode(manager, constraints)?;
        let mut solver = RustSatAdapter::new(rustsat_batsat::BasicSolver::default());
        solver.add_variables(problem.cnf.num_variables);
        for clause in &problem.cnf.clauses {
            solver.add_clause(clause);
        }

        if !solver.solve_with_assumptions(&problem.selectors) {
            return Ok(None);
        }

        let encoder = SatEncoder::new(self.lattice.clone());
        let mut solution = Solution::new(self.lattice.clone());
        for slot in manager.variable_slots() {
            if !problem.referenced.contains(&slot.id()) {
                continue;
            }
            for q in self.lattice.qualifiers() {
                if solver.value_of(encoder.indicator(slot.id(), q) as u32) {
                    solution.assign(slot.id(), q);
                    break;
                }
            }
        }
        Ok(Some(solution))
    }

    /// Explains an unsatisfiable constraint set
    ///
    /// Re-encodes the identical constraint set and returns the hard
    /// constraints implicated by the failed-assumption core. Returns an
    /// empty set when the constraints are in fact satisfiable.
    ///
    /// # Errors
    /// Fails if a hard constraint simplifies to false during encoding.
    pub fn explain_unsatisfiable(
        &self,
        manager: &SlotManager,
        constraints: &[Constraint],
    ) -> Result<Vec<Constraint>> {
        let problem = self.encode(manager, constraints)?;
        let mut solver = RustSatAdapter::new(rustsat_batsat::BasicSolver::default());
        solver.add_variables(problem.cnf.num_variables);
        for clause in &problem.cnf.clauses {
            solver.add_clause(clause);
        }

        if solver.solve_with_assumptions(&problem.selectors) {
            return Ok(Vec::new());
        }

        let core: FxHashSet<i32> = solver.unsat_core().into_iter().collect();
        let mut implicated = Vec::new();
        for (selector, origin) in problem.selectors.iter().zip(&problem.origins) {
            if core.contains(selector) {
                implicated.push(origin.clone());
            }
        }
        Ok(implicated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConstraintManager, Location};

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
    fn indicator_matrix_layout() {
        let lattice = diamond();
        let encoder = SatEncoder::new(lattice.clone());
        let top = lattice.top();
        assert_eq!(encoder.indicator(SlotId(1), top), 1);
        let last = lattice.qualifier("Bottom").unwrap();
        assert_eq!(encoder.indicator(SlotId(1), last), 4);
        assert_eq!(encoder.indicator(SlotId(2), top), 5);
    }

    #[test]
    fn wellformedness_is_exactly_one() {
        let lattice = diamond();
        let mut slots = SlotManager::new(lattice.clone());
        let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);

        let mut encoder = SatEncoder::new(lattice);
        let clauses = encoder.encode_wellformedness(&v);
        // 1 at-least-one clause + C(4,2) at-most-one clauses
        assert_eq!(clauses.len(), 1 + 6);
        assert_eq!(clauses[0], vec![1, 2, 3, 4]);
    }

    #[test]
    fn subtype_of_constant_allows_only_its_subtypes() {
        let lattice = diamond();
        let mut slots = SlotManager::new(lattice.clone());
        let constraints = ConstraintManager::new(lattice.clone());

        let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);
        let a = slots.create_constant(lattice.qualifier("A").unwrap());

        let backend = SatBackend::new(lattice.clone());
        let c = constraints.subtype(v.clone(), a, Location::missing());
        let solution = backend.solve(&slots, &[c]).unwrap().unwrap();

        let value = solution.value_of(v.id());
        assert!(lattice.is_subtype(value, lattice.qualifier("A").unwrap()));
    }

    #[test]
    fn equality_with_constant_pins_the_value() {
        let lattice = diamond();
        let mut slots = SlotManager::new(lattice.clone());
        let constraints = ConstraintManager::new(lattice.clone());

        let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);
        let b = slots.create_constant(lattice.qualifier("B").unwrap());

        let backend = SatBackend::new(lattice.clone());
        let c = constraints.equality(v.clone(), b, Location::missing());
        let solution = backend.solve(&slots, &[c]).unwrap().unwrap();
        assert_eq!(solution.value_of(v.id()), lattice.qualifier("B").unwrap());
    }

    #[test]
    fn contradictory_constants_are_unsatisfiable() {
        let lattice = diamond();
        let mut slots = SlotManager::new(lattice.clone());
        let constraints = ConstraintManager::new(lattice.clone());

        let v = slots.create_source_variable(Location::source("A.java", 1), "int", true);
        let a = slots.create_constant(lattice.qualifier("A").unwrap());
        let b = slots.create_constant(lattice.qualifier("B").unwrap());

        let c1 = constraints.equality(v.clone(), a, Location::missing());
        let c2 = constraints.equality(v.clone(), b, Location::missing());

        let backend = SatBackend::new(lattice);
        assert!(backend.solve(&slots, &[c1, c2]).unwrap().is_none());
    }

    #[test]
    fn impossible_constraint_aborts() {
        let lattice = diamond();
        let mut slots = SlotManager::new(lattice.clone());
        let constraints = ConstraintManager::new(lattice.clone());

        let a = slots.create_constant(lattice.qualifier("A").unwrap());
        let b = slots.create_constant(lattice.qualifier("B").unwrap());
        let c = constraints.subtype(a, b, Location::missing());
        assert_eq!(c, Constraint::AlwaysFalse);

        let backend = SatBackend::new(lattice);
        assert!(matches!(
            backend.solve(&slots, &[c]),
            Err(QualError::ImpossibleConstraint(_))
        ));
    }
}
