//! Core types for the strand constraint solver.
//!
//! This crate holds the term arena the solver walks, the script wrapper for a
//! sequence of assertions, the constraint-information oracle that marks solver
//! components, and the read-only solver configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod info;
pub mod script;
pub mod term;

pub use config::SolverConfig;
pub use info::ConstraintInformation;
pub use script::Script;
pub use term::{Constant, Sort, SubStringMode, TermData, TermId, TermStore};
