//! Solver error type.
//!
//! Unsatisfiability is a normal result carried by values; errors here are
//! the fatal conditions: operations outside the supported fragment and
//! operand kinds the dispatch cannot accept. The solver never surfaces a
//! partial result after one of these.

use strand_automata::AutomatonError;

/// Fatal evaluation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SolverError {
    /// The formula uses an operation outside the supported fragment.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    /// A handler received a value kind it has no semantics for.
    #[error("unexpected {operand} operand in {context}")]
    UnexpectedOperand {
        /// Rendering of the offending AST node
        context: String,
        /// Kind of the offending value
        operand: &'static str,
    },
    /// Automaton construction failed.
    #[error(transparent)]
    Automaton(#[from] AutomatonError),
}

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, SolverError>;
