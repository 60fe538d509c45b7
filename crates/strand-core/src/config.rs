//! Solver configuration.
//!
//! The flags are read once when evaluation starts; nothing mutates them
//! mid-run.

/// Read-only evaluation options.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Solve linear integer arithmetic components with the binary-automaton
    /// engine.
    pub lia_engine_enabled: bool,
    /// Solve relational string components with multi-track automata.
    pub enable_relational_string_automata: bool,
    /// Restrict the arithmetic domain to the naturals.
    pub lia_natural_numbers_only: bool,
    /// Keep walking every disjunct so a model counter can read all branches;
    /// disables the `or` short-circuit.
    pub model_counter_enabled: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            lia_engine_enabled: true,
            enable_relational_string_automata: false,
            lia_natural_numbers_only: true,
            model_counter_enabled: false,
        }
    }
}
