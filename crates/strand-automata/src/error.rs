//! Error type for automaton construction.

/// Error during automaton construction.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AutomatonError {
    /// A regular-expression literal could not be compiled.
    #[error("invalid regular expression: {0}")]
    Regex(String),
    /// A relational constraint mentions more variables than the bit-tuple
    /// alphabet can encode.
    #[error("too many variables for a binary encoding: {0}")]
    TooManyTracks(usize),
}

/// Result type for automaton operations.
pub type Result<T> = std::result::Result<T, AutomatonError>;
