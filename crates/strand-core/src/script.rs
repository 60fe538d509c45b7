//! A parsed script: the ordered list of top-level assertions.

use crate::term::TermId;

/// The root the evaluator walks. Satisfiability of the script is the
/// conjunction of the per-assertion verdicts.
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Top-level assertion bodies, in source order.
    pub asserts: Vec<TermId>,
}

impl Script {
    /// An empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an assertion body.
    pub fn assert(&mut self, term: TermId) {
        self.asserts.push(term);
    }
}
