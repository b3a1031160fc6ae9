//! SAT solver trait and implementations

pub mod rustsat_adapter;

/// Core SAT solver trait
///
/// This trait defines the interface that SAT solver backends must implement.
/// Variables are 1-indexed, and literals are represented as signed integers
/// (positive for true, negative for false).
pub trait SATSolver {
    /// Adds the given number of variables to the solver
    fn add_variables(&mut self, num_vars: u32);

    /// Adds a clause to the solver
    ///
    /// Returns false if the clause could not be added
    ///
    /// # Arguments
    /// * `lits` - Slice of literals (1-indexed, negated by sign)
    fn add_clause(&mut self, lits: &[i32]) -> bool;

    /// Solves the current formula
    ///
    /// Returns true if satisfiable, false if unsatisfiable
    fn solve(&mut self) -> bool;

    /// Returns the assignment of a variable in the solution
    ///
    /// Only valid after solve() returns true.
    /// Variables are 1-indexed.
    fn value_of(&self, var: u32) -> bool;

    /// Returns the number of variables in the solver
    fn num_variables(&self) -> u32;

    /// Returns the number of clauses added
    fn num_clauses(&self) -> u32;
}

/// Extension for solvers that support assumption-based core extraction
pub trait SATProver: SATSolver {
    /// Solves under the given assumption literals
    ///
    /// Returns true if satisfiable. On an unsatisfiable outcome the failed
    /// assumptions are retained and available from [`SATProver::unsat_core`].
    fn solve_with_assumptions(&mut self, assumptions: &[i32]) -> bool;

    /// Returns the assumption literals implicated in the last
    /// unsatisfiable [`SATProver::solve_with_assumptions`] call
    fn unsat_core(&self) -> Vec<i32>;
}

/// A simple mock SAT solver for testing
///
/// This solver doesn't actually solve anything - it just tracks
/// variables and clauses. Useful for testing the encoding pipeline.
pub struct MockSolver {
    num_vars: u32,
    clauses: Vec<Vec<i32>>,
    solution: Vec<bool>,
}

impl MockSolver {
    /// Creates a new mock solver
    pub fn new() -> Self {
        Self {
            num_vars: 0,
            clauses: Vec::new(),
            solution: Vec::new(),
        }
    }
}

impl Default for MockSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SATSolver for MockSolver {
    fn add_variables(&mut self, num_vars: u32) {
        self.num_vars += num_vars;
        for _ in 0..num_vars {
            self.solution.push(false);
        }
    }

    fn add_clause(&mut self, lits: &[i32]) -> bool {
        self.clauses.push(lits.to_vec());
        true
    }

    fn solve(&mut self) -> bool {
        self.num_vars > 0
    }

    fn value_of(&self, var: u32) -> bool {
        if var == 0 || var > self.num_vars {
            false
        } else {
            self.solution[(var - 1) as usize]
        }
    }

    fn num_variables(&self) -> u32 {
        self.num_vars
    }

    fn num_clauses(&self) -> u32 {
        self.clauses.len() as u32
    }
}
