//! # qualsolve
//!
//! The constraint core of a type-qualifier inference tool.
//!
//! A program analysis front end discovers relations between the unknown
//! qualifiers at individual program locations. This crate models those
//! unknowns as interned slots, normalizes the relations into constraints,
//! encodes the constraint set into a target solver's native representation,
//! drives the solver, and decodes its answer back into a slot-to-qualifier
//! assignment.
//!
//! ## Example
//!
//! ```rust,ignore
//! use qualsolve::lattice::Lattice;
//! use qualsolve::manager::SlotManager;
//! use qualsolve::model::{ConstraintManager, Location};
//! use qualsolve::driver::{DriverOptions, SolverDriver};
//!
//! // Build the qualifier lattice
//! let lattice = Lattice::builder()
//!     .qualifier("Top")
//!     .qualifier("Bottom")
//!     .edge("Bottom", "Top")
//!     .top("Top")
//!     .bottom("Bottom")
//!     .build()?;
//!
//! // Create slots and constraints
//! let mut slots = SlotManager::new(lattice.clone());
//! let v = slots.create_source_variable(Location::missing(), "java.lang.String", true);
//! let top = slots.create_constant(lattice.top());
//!
//! let constraints = ConstraintManager::new(lattice.clone());
//! let c = constraints.subtype(v.clone(), top.clone(), Location::missing())?;
//!
//! // Solve
//! let driver = SolverDriver::new(DriverOptions::default(), lattice);
//! let solution = driver.solve(&slots, &[c])?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2024_compatibility)]

/// The qualifier value lattice
pub mod lattice;

/// Slot and constraint model types
pub mod model;

/// Slot factory and interning cache
pub mod manager;

/// Constraint-to-backend encoding framework
pub mod encoder;

/// CNF representation for the boolean-satisfiability backend
pub mod cnf;

/// Solver backends: boolean-satisfiability, SMT, fact-based
pub mod backend;

/// SAT solver trait and adapters
pub mod engine;

/// External SMT solver driver
pub mod driver;

/// Error types
pub mod error {
    //! Error types for qualsolve

    use thiserror::Error;

    /// Errors that can occur during constraint construction and solving
    #[derive(Error, Debug)]
    pub enum QualError {
        /// A slot or constraint that requires a source location was created without one
        #[error("missing location: {0}")]
        MissingLocation(String),

        /// An id or external annotation does not resolve to a tracked slot
        #[error("unknown slot: {0}")]
        UnknownSlot(String),

        /// The qualifier lattice is malformed
        #[error("invalid lattice: {0}")]
        InvalidLattice(String),

        /// A hard constraint simplified to false during encoding
        #[error("impossible constraint: {0}")]
        ImpossibleConstraint(String),

        /// The external solver process could not be launched or crashed
        #[error("solver process failure: {0}")]
        SolverProcess(String),

        /// The external solver produced output this crate cannot parse
        #[error("malformed solver output: {0}")]
        MalformedOutput(String),

        /// Invalid argument
        #[error("invalid argument: {0}")]
        InvalidArgument(String),

        /// Problem-file I/O failure
        #[error("io error: {0}")]
        Io(#[from] std::io::Error),
    }

    /// Result type for qualsolve operations
    pub type Result<T> = std::result::Result<T, QualError>;
}

// Re-export commonly used types
pub use error::{QualError, Result};
