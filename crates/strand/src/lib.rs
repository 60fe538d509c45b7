//! strand - an automata-based satisfiability solver for string and linear
//! integer constraints.
//!
//! This is the umbrella crate that re-exports all components.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use strand_automata as automata;
pub use strand_core as core;
pub use strand_solver as solver;

pub use strand_core::{ConstraintInformation, Script, SolverConfig, Sort, TermStore};
pub use strand_solver::{ConstraintSolver, SymbolTable, Value};
