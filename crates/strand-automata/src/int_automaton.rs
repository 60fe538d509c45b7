//! Integer automata over the unary view.
//!
//! [`IntAutomaton`] is the solver-facing set of integer values: an ultimately
//! periodic set of naturals plus the `-1` "not found" sentinel that
//! `indexOf`-style operations admit. [`UnaryAutomaton`] is the thin bridge
//! between this view and the binary relational world.

use tracing::warn;

use crate::binary_automaton::BinaryIntAutomaton;
use crate::formula::ArithmeticFormula;
use crate::semilinear::SemilinearSet;
use crate::Result;

/// A set of possible integer values: naturals plus the `-1` sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntAutomaton {
    set: SemilinearSet,
    has_minus_one: bool,
}

impl IntAutomaton {
    /// The empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            set: SemilinearSet::empty(),
            has_minus_one: false,
        }
    }

    /// Every natural.
    #[must_use]
    pub fn any_natural() -> Self {
        Self {
            set: SemilinearSet::any_natural(),
            has_minus_one: false,
        }
    }

    /// A single value. Values below `-1` cannot arise from the string
    /// theory; they map to the empty set.
    #[must_use]
    pub fn from_int(value: i64) -> Self {
        if value >= 0 {
            Self {
                set: SemilinearSet::singleton(value as u64),
                has_minus_one: false,
            }
        } else if value == -1 {
            Self {
                set: SemilinearSet::empty(),
                has_minus_one: true,
            }
        } else {
            warn!("integer automaton cannot represent {value}, yielding the empty set");
            Self::empty()
        }
    }

    /// Wrap a natural-number set.
    #[must_use]
    pub fn from_set(set: SemilinearSet, has_minus_one: bool) -> Self {
        Self { set, has_minus_one }
    }

    /// The natural-number part.
    #[must_use]
    pub fn set(&self) -> &SemilinearSet {
        &self.set
    }

    /// Whether `-1` is a possible value.
    #[must_use]
    pub fn has_negative_1(&self) -> bool {
        self.has_minus_one
    }

    /// Membership test.
    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        if value == -1 {
            self.has_minus_one
        } else {
            value >= 0 && self.set.contains(value as u64)
        }
    }

    /// Whether no value is possible.
    #[must_use]
    pub fn is_empty_language(&self) -> bool {
        self.set.is_empty() && !self.has_minus_one
    }

    /// Whether exactly one value is possible.
    #[must_use]
    pub fn is_accepting_single_int(&self) -> bool {
        if self.has_minus_one {
            self.set.is_empty()
        } else {
            self.set.as_singleton().is_some()
        }
    }

    /// Some possible value, smallest natural first, `-1` if only the
    /// sentinel remains.
    #[must_use]
    pub fn an_accepting_int(&self) -> Option<i64> {
        match self.set.min() {
            Some(v) => Some(v as i64),
            None if self.has_minus_one => Some(-1),
            None => None,
        }
    }

    /// The possible naturals when finitely many, `None` when unbounded.
    #[must_use]
    pub fn finite_values(&self) -> Option<Vec<i64>> {
        self.set
            .finite_values()
            .map(|vs| vs.into_iter().map(|v| v as i64).collect())
    }

    // ------------------------------------------------------------------
    // algebra

    /// Set intersection; the sentinel survives only in both operands.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            set: self.set.intersect(&other.set),
            has_minus_one: self.has_minus_one && other.has_minus_one,
        }
    }

    /// Set union.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            set: self.set.union(&other.set),
            has_minus_one: self.has_minus_one || other.has_minus_one,
        }
    }

    /// Set difference.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            set: self.set.difference(&other.set),
            has_minus_one: self.has_minus_one && !other.has_minus_one,
        }
    }

    /// Complement over the naturals and the sentinel.
    #[must_use]
    pub fn complement(&self) -> Self {
        Self {
            set: self.set.complement(),
            has_minus_one: !self.has_minus_one,
        }
    }

    /// Minkowski sum. The sentinel does not participate in arithmetic.
    #[must_use]
    pub fn plus(&self, other: &Self) -> Self {
        if self.has_minus_one || other.has_minus_one {
            warn!("dropping -1 sentinel in integer addition");
        }
        Self {
            set: self.set.add(&other.set),
            has_minus_one: false,
        }
    }

    /// Minkowski difference clamped at zero.
    #[must_use]
    pub fn minus(&self, other: &Self) -> Self {
        if self.has_minus_one || other.has_minus_one {
            warn!("dropping -1 sentinel in integer subtraction");
        }
        Self {
            set: self.set.subtract(&other.set),
            has_minus_one: false,
        }
    }

    /// Product. Exact when either side is a constant; otherwise the result
    /// over-approximates to every natural.
    #[must_use]
    pub fn times(&self, other: &Self) -> Self {
        let scaled = match (self.set.as_singleton(), other.set.as_singleton()) {
            (Some(c), _) => other.set.scale(c),
            (_, Some(c)) => self.set.scale(c),
            (None, None) => {
                warn!("product of two non-constant integer sets, over-approximating");
                SemilinearSet::any_natural()
            }
        };
        Self {
            set: scaled,
            has_minus_one: false,
        }
    }

    /// Negation is representable only for singletons; other shapes
    /// over-approximate to the operand itself.
    #[must_use]
    pub fn uminus(&self) -> Self {
        warn!("unary minus over a non-constant integer set, over-approximating");
        self.clone()
    }

    // ------------------------------------------------------------------
    // order predicates ("can the relation hold"); the sentinel is not
    // ordered

    /// `∃ a ∈ self: a < bound`.
    #[must_use]
    pub fn is_less_than(&self, bound: i64) -> bool {
        match self.set.min() {
            Some(min) => (min as i64) < bound,
            None => false,
        }
    }

    /// `∃ a ∈ self: a <= bound`.
    #[must_use]
    pub fn is_less_than_or_equal(&self, bound: i64) -> bool {
        match self.set.min() {
            Some(min) => (min as i64) <= bound,
            None => false,
        }
    }

    /// `∃ a ∈ self: a > bound`.
    #[must_use]
    pub fn is_greater_than(&self, bound: i64) -> bool {
        if self.set.is_empty() {
            return false;
        }
        match self.set.max_finite() {
            Some(max) => (max as i64) > bound,
            None => true,
        }
    }

    /// `∃ a ∈ self: a >= bound`.
    #[must_use]
    pub fn is_greater_than_or_equal(&self, bound: i64) -> bool {
        if self.set.is_empty() {
            return false;
        }
        match self.set.max_finite() {
            Some(max) => (max as i64) >= bound,
            None => true,
        }
    }

    /// `∃ a ∈ self, b ∈ other: a < b`.
    #[must_use]
    pub fn is_less_than_auto(&self, other: &Self) -> bool {
        match (self.set.min(), other.set.max_finite()) {
            (None, _) => false,
            (Some(_), None) => !other.set.is_empty(),
            (Some(min), Some(max)) => min < max,
        }
    }

    /// `∃ a ∈ self, b ∈ other: a <= b`.
    #[must_use]
    pub fn is_less_than_or_equal_auto(&self, other: &Self) -> bool {
        match (self.set.min(), other.set.max_finite()) {
            (None, _) => false,
            (Some(_), None) => !other.set.is_empty(),
            (Some(min), Some(max)) => min <= max,
        }
    }

    /// `∃ a ∈ self, b ∈ other: a > b`.
    #[must_use]
    pub fn is_greater_than_auto(&self, other: &Self) -> bool {
        other.is_less_than_auto(self)
    }

    /// `∃ a ∈ self, b ∈ other: a >= b`.
    #[must_use]
    pub fn is_greater_than_or_equal_auto(&self, other: &Self) -> bool {
        other.is_less_than_or_equal_auto(self)
    }

    /// The unary view of the natural part.
    #[must_use]
    pub fn to_unary_automaton(&self) -> UnaryAutomaton {
        UnaryAutomaton {
            set: self.set.clone(),
        }
    }
}

/// Unary automaton: the conversion pivot between the integer and binary
/// worlds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnaryAutomaton {
    set: SemilinearSet,
}

impl UnaryAutomaton {
    /// Wrap a natural-number set.
    #[must_use]
    pub fn from_set(set: SemilinearSet) -> Self {
        Self { set }
    }

    /// The underlying set.
    #[must_use]
    pub fn set(&self) -> &SemilinearSet {
        &self.set
    }

    /// Back to the solver-facing integer automaton.
    #[must_use]
    pub fn to_int_automaton(&self, has_minus_one: bool) -> IntAutomaton {
        IntAutomaton::from_set(self.set.clone(), has_minus_one)
    }

    /// A binary automaton over `formula`'s track universe constraining
    /// `variable` to this set (and to `-1` when `has_minus_one`).
    pub fn to_binary_int_automaton(
        &self,
        variable: &str,
        formula: ArithmeticFormula,
        has_minus_one: bool,
    ) -> Result<BinaryIntAutomaton> {
        BinaryIntAutomaton::from_semilinear(variable, &self.set, has_minus_one, formula)
    }
}
