//! Symbolic values computed at AST nodes.
//!
//! A [`Value`] is the tagged union the evaluator produces at every node:
//! known Booleans and integers, integer and string automata, and the two
//! relational payloads. Operations are total over the compatible tag pairs
//! and never mutate their operands; `Clone` is the deep clone. Ownership is
//! plain Rust ownership: a value moved into the term-value map or the symbol
//! table is disposed when its container is cleared.

use strand_automata::{
    BinaryIntAutomaton, IntAutomaton, MultiTrackAutomaton, StringAutomaton,
};

use crate::error::{Result, SolverError};

/// A computed symbolic result.
#[derive(Debug, Clone)]
pub enum Value {
    /// A known truth value
    Bool(bool),
    /// A known integer
    Int(i64),
    /// A set of possible integers
    IntAutomaton(IntAutomaton),
    /// A set of possible strings
    StringAutomaton(StringAutomaton),
    /// A relational constraint over string variables
    MultiTrack(MultiTrackAutomaton),
    /// A relational constraint over integer variables
    BinaryInt(BinaryIntAutomaton),
}

impl Value {
    /// Kind tag for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool constant",
            Value::Int(_) => "int constant",
            Value::IntAutomaton(_) => "int automaton",
            Value::StringAutomaton(_) => "string automaton",
            Value::MultiTrack(_) => "multi-track automaton",
            Value::BinaryInt(_) => "binary int automaton",
        }
    }

    /// False iff the payload denotes the empty language, empty relation, or
    /// the Boolean false.
    #[must_use]
    pub fn is_satisfiable(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(_) => true,
            Value::IntAutomaton(a) => !a.is_empty_language(),
            Value::StringAutomaton(a) => !a.is_empty_language(),
            Value::MultiTrack(a) => a.is_satisfiable(),
            Value::BinaryInt(a) => a.is_satisfiable(),
        }
    }

    /// Whether the payload denotes exactly one concrete value.
    #[must_use]
    pub fn is_single_value(&self) -> bool {
        match self {
            Value::Bool(_) | Value::Int(_) => true,
            Value::IntAutomaton(a) => a.is_accepting_single_int(),
            Value::StringAutomaton(a) => a.is_accepting_single_string(),
            Value::MultiTrack(a) => a.language().is_accepting_single_string(),
            Value::BinaryInt(_) => false,
        }
    }

    /// The known Boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The known integer, if this is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The string-automaton view: direct payload, or the track language of
    /// a relational value.
    #[must_use]
    pub fn as_string_automaton(&self) -> Option<&StringAutomaton> {
        match self {
            Value::StringAutomaton(a) => Some(a),
            Value::MultiTrack(m) => Some(m.language()),
            _ => None,
        }
    }

    /// The integer-automaton view, widening a constant.
    #[must_use]
    pub fn to_int_automaton(&self) -> Option<IntAutomaton> {
        match self {
            Value::Int(i) => Some(IntAutomaton::from_int(*i)),
            Value::IntAutomaton(a) => Some(a.clone()),
            _ => None,
        }
    }

    /// The relational string payload, if present.
    #[must_use]
    pub fn as_multi_track(&self) -> Option<&MultiTrackAutomaton> {
        match self {
            Value::MultiTrack(m) => Some(m),
            _ => None,
        }
    }

    /// The relational arithmetic payload, if present.
    #[must_use]
    pub fn as_binary_int(&self) -> Option<&BinaryIntAutomaton> {
        match self {
            Value::BinaryInt(b) => Some(b),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // operations

    /// Language complement, where the payload supports it.
    pub fn complement(&self) -> Result<Value> {
        match self {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            Value::Int(i) => Ok(Value::IntAutomaton(IntAutomaton::from_int(*i).complement())),
            Value::IntAutomaton(a) => Ok(Value::IntAutomaton(a.complement())),
            Value::StringAutomaton(a) => Ok(Value::StringAutomaton(a.complement())),
            Value::MultiTrack(_) | Value::BinaryInt(_) => Err(SolverError::Unsupported(format!(
                "complement of a {}",
                self.kind_name()
            ))),
        }
    }

    /// Intersection over compatible tag pairs.
    pub fn intersect(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            // truth-value equality
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a == b)),
            (Value::Int(a), Value::Int(b)) => {
                if a == b {
                    Ok(Value::Int(*a))
                } else {
                    Ok(Value::IntAutomaton(IntAutomaton::empty()))
                }
            }
            (Value::Int(i), Value::IntAutomaton(a))
            | (Value::IntAutomaton(a), Value::Int(i)) => {
                if a.contains(*i) {
                    Ok(Value::Int(*i))
                } else {
                    Ok(Value::IntAutomaton(IntAutomaton::empty()))
                }
            }
            (Value::IntAutomaton(a), Value::IntAutomaton(b)) => {
                Ok(Value::IntAutomaton(a.intersect(b)))
            }
            (Value::StringAutomaton(a), Value::StringAutomaton(b)) => {
                Ok(Value::StringAutomaton(a.intersect(b)))
            }
            (Value::MultiTrack(m), Value::StringAutomaton(a))
            | (Value::StringAutomaton(a), Value::MultiTrack(m)) => {
                Ok(Value::MultiTrack(m.intersect_single_track(a)))
            }
            (Value::MultiTrack(a), Value::MultiTrack(b)) => {
                Ok(Value::MultiTrack(a.intersect(b)))
            }
            (Value::BinaryInt(a), Value::BinaryInt(b)) => {
                Ok(Value::BinaryInt(a.intersect(b)?))
            }
            _ => Err(SolverError::Unsupported(format!(
                "intersection of {} and {}",
                self.kind_name(),
                other.kind_name()
            ))),
        }
    }

    /// Set difference over compatible tag pairs.
    pub fn difference(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::StringAutomaton(a), Value::StringAutomaton(b)) => {
                Ok(Value::StringAutomaton(a.difference(b)))
            }
            (Value::MultiTrack(m), Value::StringAutomaton(a)) => {
                Ok(Value::MultiTrack(m.difference_single_track(a)))
            }
            (Value::IntAutomaton(a), Value::IntAutomaton(b)) => {
                Ok(Value::IntAutomaton(a.difference(b)))
            }
            (Value::BinaryInt(a), Value::BinaryInt(b)) => {
                Ok(Value::BinaryInt(a.difference(b)?))
            }
            _ => Err(SolverError::Unsupported(format!(
                "difference of {} and {}",
                self.kind_name(),
                other.kind_name()
            ))),
        }
    }

    /// Numeric addition.
    pub fn plus(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            _ => self.int_binop(other, "addition", IntAutomaton::plus),
        }
    }

    /// Numeric subtraction.
    pub fn minus(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a - b)),
            _ => self.int_binop(other, "subtraction", IntAutomaton::minus),
        }
    }

    /// Numeric multiplication.
    pub fn times(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a * b)),
            _ => self.int_binop(other, "multiplication", IntAutomaton::times),
        }
    }

    fn int_binop(
        &self,
        other: &Value,
        what: &str,
        op: impl Fn(&IntAutomaton, &IntAutomaton) -> IntAutomaton,
    ) -> Result<Value> {
        match (self.to_int_automaton(), other.to_int_automaton()) {
            (Some(a), Some(b)) => {
                let result = op(&a, &b);
                if let Some(single) = result
                    .is_accepting_single_int()
                    .then(|| result.an_accepting_int())
                    .flatten()
                {
                    Ok(Value::Int(single))
                } else {
                    Ok(Value::IntAutomaton(result))
                }
            }
            _ => Err(SolverError::Unsupported(format!(
                "{what} of {} and {}",
                self.kind_name(),
                other.kind_name()
            ))),
        }
    }

    /// String concatenation; relational operands contribute their track
    /// language.
    pub fn concat(&self, other: &Value) -> Result<Value> {
        match (self.as_string_automaton(), other.as_string_automaton()) {
            (Some(a), Some(b)) => Ok(Value::StringAutomaton(a.concat(b))),
            _ => Err(SolverError::Unsupported(format!(
                "concatenation of {} and {}",
                self.kind_name(),
                other.kind_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfiability_per_tag() {
        assert!(Value::Bool(true).is_satisfiable());
        assert!(!Value::Bool(false).is_satisfiable());
        assert!(Value::Int(-5).is_satisfiable());
        assert!(!Value::IntAutomaton(IntAutomaton::empty()).is_satisfiable());
        assert!(!Value::StringAutomaton(StringAutomaton::make_phi()).is_satisfiable());
        assert!(Value::StringAutomaton(StringAutomaton::make_string("a")).is_satisfiable());
    }

    #[test]
    fn intersect_constant_with_automaton() {
        let lengths = Value::IntAutomaton(IntAutomaton::from_set(
            strand_automata::SemilinearSet::at_least(3),
            false,
        ));
        assert!(matches!(
            Value::Int(5).intersect(&lengths),
            Ok(Value::Int(5))
        ));
        let below = Value::Int(2).intersect(&lengths).unwrap();
        assert!(!below.is_satisfiable());
    }

    #[test]
    fn string_intersection_and_difference() {
        let a = Value::StringAutomaton(StringAutomaton::make_regex("ab*").unwrap());
        let b = Value::StringAutomaton(StringAutomaton::make_regex("a*b").unwrap());
        let both = a.intersect(&b).unwrap();
        assert!(both.as_string_automaton().unwrap().accepts("ab"));
        let gone = a.difference(&a).unwrap();
        assert!(!gone.is_satisfiable());
    }

    #[test]
    fn arithmetic_collapses_singletons() {
        let sum = Value::Int(2)
            .plus(&Value::IntAutomaton(IntAutomaton::from_int(3)))
            .unwrap();
        assert_eq!(sum.as_int(), Some(5));
        let product = Value::Int(6).times(&Value::Int(7)).unwrap();
        assert_eq!(product.as_int(), Some(42));
    }

    #[test]
    fn incompatible_pairs_error() {
        let s = Value::StringAutomaton(StringAutomaton::make_string("x"));
        assert!(s.plus(&Value::Int(1)).is_err());
        assert!(Value::Int(1).intersect(&s).is_err());
        assert!(Value::Bool(true).concat(&s).is_err());
    }

    #[test]
    fn complement_of_singletons() {
        let c = Value::StringAutomaton(StringAutomaton::make_string("a"))
            .complement()
            .unwrap();
        let auto = c.as_string_automaton().unwrap();
        assert!(!auto.accepts("a"));
        assert!(auto.accepts("b"));

        let ci = Value::Int(3).complement().unwrap();
        match ci {
            Value::IntAutomaton(a) => {
                assert!(!a.contains(3));
                assert!(a.contains(4));
            }
            other => panic!("unexpected {}", other.kind_name()),
        }
    }
}
