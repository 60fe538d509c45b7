//! Automata for the strand constraint solver.
//!
//! Four symbolic domains back the solver's values: string automata over the
//! byte alphabet, integer automata in the unary (semilinear) view, binary
//! relational automata for linear integer arithmetic, and multi-track
//! automata for relational string constraints.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binary_automaton;
pub mod error;
pub mod formula;
pub mod int_automaton;
pub mod multitrack;
mod nfa;
mod regex;
pub mod semilinear;
pub mod string_automaton;

pub use binary_automaton::BinaryIntAutomaton;
pub use error::{AutomatonError, Result};
pub use formula::{ArithmeticFormula, FormulaKind};
pub use int_automaton::{IntAutomaton, UnaryAutomaton};
pub use multitrack::{MultiTrackAutomaton, StringRelation, VariableTrackMap};
pub use semilinear::SemilinearSet;
pub use string_automaton::StringAutomaton;
