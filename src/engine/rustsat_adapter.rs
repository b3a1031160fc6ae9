//! Adapters for rustsat solver backends
//!
//! Provides adapters to use rustsat-compatible SAT solvers with the
//! boolean-satisfiability backend.

use super::{SATProver, SATSolver};
use rustsat::types::{Lit, Var};

fn lit_from_i32(lit: i32) -> Lit {
    let var = Var::new((lit.unsigned_abs() - 1) as u32);
    if lit > 0 {
        var.pos_lit()
    } else {
        var.neg_lit()
    }
}

fn lit_to_i32(lit: Lit) -> i32 {
    let value = lit.var().idx() as i32 + 1;
    if lit.is_pos() {
        value
    } else {
        -value
    }
}

/// Adapter that wraps rustsat solvers to implement our SATSolver trait
///
/// This allows any rustsat-compatible solver to be used with the
/// boolean-satisfiability backend.
///
/// # Example
///
/// ```ignore
/// use rustsat_batsat::BasicSolver;
/// let solver = RustSatAdapter::new(BasicSolver::default());
/// ```
pub struct RustSatAdapter<S> {
    solver: S,
    num_vars: u32,
    num_clauses: u32,
    last_core: Vec<i32>,
}

impl<S> RustSatAdapter<S> {
    /// Creates a new adapter wrapping the given solver
    pub fn new(solver: S) -> Self {
        Self {
            solver,
            num_vars: 0,
            num_clauses: 0,
            last_core: Vec::new(),
        }
    }
}

impl<S: rustsat::solvers::Solve> SATSolver for RustSatAdapter<S> {
    fn add_variables(&mut self, num_vars: u32) {
        // RustSat auto-creates variables as needed when clauses are added.
        // Just track the count for our interface.
        self.num_vars += num_vars;
    }

    fn add_clause(&mut self, lits: &[i32]) -> bool {
        use rustsat::types::Clause;

        let lits_vec: Vec<Lit> = lits.iter().map(|&lit| lit_from_i32(lit)).collect();
        let clause = Clause::from(&lits_vec[..]);
        self.num_clauses += 1;
        self.solver.add_clause(clause).is_ok()
    }

    fn solve(&mut self) -> bool {
        use rustsat::solvers::SolverResult;
        matches!(self.solver.solve(), Ok(SolverResult::Sat))
    }

    fn value_of(&self, var: u32) -> bool {
        use rustsat::types::TernaryVal;
        if var == 0 || var > self.num_vars {
            return false;
        }
        let v = Var::new(var - 1);
        match self.solver.solution(v) {
            Ok(assignment) => matches!(assignment.var_value(v), TernaryVal::True),
            Err(_) => false,
        }
    }

    fn num_variables(&self) -> u32 {
        self.num_vars
    }

    fn num_clauses(&self) -> u32 {
        self.num_clauses
    }
}

impl<S: rustsat::solvers::SolveIncremental> SATProver for RustSatAdapter<S> {
    fn solve_with_assumptions(&mut self, assumptions: &[i32]) -> bool {
        use rustsat::solvers::SolverResult;

        let assumps: Vec<Lit> = assumptions.iter().map(|&lit| lit_from_i32(lit)).collect();
        match self.solver.solve_assumps(&assumps) {
            Ok(SolverResult::Sat) => {
                self.last_core.clear();
                true
            }
            _ => {
                // The solver reports the core as a clause over the negations
                // of the failed assumptions; map back to assumption literals.
                self.last_core = self
                    .solver
                    .core()
                    .map(|core| core.into_iter().map(|lit| lit_to_i32(!lit)).collect())
                    .unwrap_or_default();
                false
            }
        }
    }

    fn unsat_core(&self) -> Vec<i32> {
        self.last_core.clone()
    }
}
