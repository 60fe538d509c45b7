//! Ultimately periodic sets of naturals.
//!
//! This is the Chrobak-normal-form view of a unary automaton: a finite set of
//! exceptional members below a threshold, then residue classes modulo a
//! period. Every set the solver derives from regular languages or linear
//! constraints has this shape, so the operations here are exact.

use std::collections::BTreeSet;

/// An ultimately periodic subset of the naturals.
///
/// `n < threshold` is a member iff `n ∈ initial`; `n >= threshold` is a
/// member iff `period > 0` and `n % period ∈ residues`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemilinearSet {
    initial: BTreeSet<u64>,
    threshold: u64,
    period: u64,
    residues: BTreeSet<u64>,
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        a.max(b)
    } else {
        a / gcd(a, b) * b
    }
}

impl SemilinearSet {
    /// The empty set.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            initial: BTreeSet::new(),
            threshold: 0,
            period: 0,
            residues: BTreeSet::new(),
        }
    }

    /// All naturals.
    #[must_use]
    pub fn any_natural() -> Self {
        Self {
            initial: BTreeSet::new(),
            threshold: 0,
            period: 1,
            residues: [0].into_iter().collect(),
        }
    }

    /// A singleton.
    #[must_use]
    pub fn singleton(value: u64) -> Self {
        Self::finite([value].into_iter().collect())
    }

    /// A finite set.
    #[must_use]
    pub fn finite(values: BTreeSet<u64>) -> Self {
        let threshold = values.iter().max().map_or(0, |&m| m + 1);
        Self {
            initial: values,
            threshold,
            period: 0,
            residues: BTreeSet::new(),
        }
        .normalized()
    }

    /// All naturals greater than or equal to `low`.
    #[must_use]
    pub fn at_least(low: u64) -> Self {
        Self {
            initial: BTreeSet::new(),
            threshold: low,
            period: 1,
            residues: [0].into_iter().collect(),
        }
        .normalized()
    }

    /// Assemble from the raw representation. Callers guarantee the tail
    /// really is `period`-periodic from `threshold` on.
    #[must_use]
    pub fn from_parts(
        initial: BTreeSet<u64>,
        threshold: u64,
        period: u64,
        residues: BTreeSet<u64>,
    ) -> Self {
        debug_assert!(initial.iter().all(|&n| n < threshold));
        debug_assert!(residues.iter().all(|&r| period > 0 && r < period));
        Self {
            initial,
            threshold,
            period,
            residues,
        }
        .normalized()
    }

    /// The raw representation `(initial, threshold, period, residues)`.
    #[must_use]
    pub fn parts(&self) -> (&BTreeSet<u64>, u64, u64, &BTreeSet<u64>) {
        (&self.initial, self.threshold, self.period, &self.residues)
    }

    fn normalized(mut self) -> Self {
        if self.residues.is_empty() {
            self.period = 0;
        }
        if self.period > 0 {
            // minimal divisor of the period that still separates the residues
            for d in 1..=self.period {
                if self.period % d != 0 {
                    continue;
                }
                let folded: BTreeSet<u64> = self.residues.iter().map(|&r| r % d).collect();
                let consistent = (0..self.period)
                    .all(|r| self.residues.contains(&r) == folded.contains(&(r % d)));
                if consistent {
                    self.period = d;
                    self.residues = folded;
                    break;
                }
            }
        }
        // pull initial members that already match the tail pattern into it
        while self.threshold > 0 {
            let n = self.threshold - 1;
            let tail_member = self.period > 0 && self.residues.contains(&(n % self.period));
            if self.initial.contains(&n) == tail_member {
                self.initial.remove(&n);
                self.threshold -= 1;
            } else {
                break;
            }
        }
        if self.period == 0 {
            self.threshold = self.initial.iter().max().map_or(0, |&m| m + 1);
        }
        self
    }

    /// Membership test.
    #[must_use]
    pub fn contains(&self, n: u64) -> bool {
        if n < self.threshold {
            self.initial.contains(&n)
        } else {
            self.period > 0 && self.residues.contains(&(n % self.period))
        }
    }

    /// Whether no natural is a member.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.initial.is_empty() && self.residues.is_empty()
    }

    /// Whether the set is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.residues.is_empty()
    }

    /// The members of a finite set, `None` when infinite.
    #[must_use]
    pub fn finite_values(&self) -> Option<Vec<u64>> {
        if self.is_finite() {
            Some(self.initial.iter().copied().collect())
        } else {
            None
        }
    }

    /// The single member, if there is exactly one.
    #[must_use]
    pub fn as_singleton(&self) -> Option<u64> {
        if self.is_finite() && self.initial.len() == 1 {
            self.initial.iter().next().copied()
        } else {
            None
        }
    }

    /// The smallest member.
    #[must_use]
    pub fn min(&self) -> Option<u64> {
        let from_initial = self.initial.iter().next().copied();
        let from_tail = if self.period > 0 {
            (self.threshold..self.threshold + self.period).find(|&n| self.contains(n))
        } else {
            None
        };
        match (from_initial, from_tail) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// The largest member of a finite set, `None` when unbounded or empty.
    #[must_use]
    pub fn max_finite(&self) -> Option<u64> {
        if self.is_finite() {
            self.initial.iter().max().copied()
        } else {
            None
        }
    }

    /// Whether the set is unbounded.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        !self.residues.is_empty()
    }

    // ------------------------------------------------------------------
    // combinators

    /// Build a set from a membership oracle known to be `period`-periodic
    /// beyond `threshold` (`period == 0` means empty beyond `threshold`).
    fn materialize(member: impl Fn(u64) -> bool, threshold: u64, period: u64) -> Self {
        let mut initial = BTreeSet::new();
        for n in 0..threshold {
            if member(n) {
                initial.insert(n);
            }
        }
        let mut residues = BTreeSet::new();
        if period > 0 {
            for n in threshold..threshold + period {
                if member(n) {
                    residues.insert(n % period);
                }
            }
        }
        Self::from_parts(initial, threshold, period, residues)
    }

    fn pointwise(&self, other: &Self, op: impl Fn(bool, bool) -> bool) -> Self {
        let period = lcm(self.period, other.period);
        let threshold = self.threshold.max(other.threshold);
        Self::materialize(
            |n| op(self.contains(n), other.contains(n)),
            threshold,
            period,
        )
    }

    /// Set intersection.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        self.pointwise(other, |a, b| a && b)
    }

    /// Set union.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.pointwise(other, |a, b| a || b)
    }

    /// Set difference.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        self.pointwise(other, |a, b| a && !b)
    }

    /// Complement within the naturals.
    #[must_use]
    pub fn complement(&self) -> Self {
        let period = self.period.max(1);
        Self::materialize(|n| !self.contains(n), self.threshold, period)
    }

    /// Minkowski sum `{ a + b }`.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::empty();
        }
        // the sum is ultimately periodic with period gcd of the operand
        // periods; the pattern settles within one Frobenius span
        let period = match (self.period, other.period) {
            (0, 0) => 0,
            (0, p) | (p, 0) => p,
            (p, q) => gcd(p, q),
        };
        let span = self.period.max(1) * other.period.max(1);
        let threshold = self.threshold + other.threshold + span + period;
        let member = |n: u64| {
            (0..=n).any(|a| self.contains(a) && other.contains(n - a))
        };
        Self::materialize(member, threshold, period)
    }

    /// Minkowski difference clamped to the naturals: `{ a - b : a - b >= 0 }`.
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        if self.is_empty() || other.is_empty() {
            return Self::empty();
        }
        let period = if self.period > 0 { self.period } else { 0 };
        let probe = self.threshold
            + other.threshold
            + lcm(self.period.max(1), other.period.max(1))
            + 1;
        let member = |n: u64| {
            (0..probe).any(|b| other.contains(b) && self.contains(n + b))
        };
        let threshold = self.threshold + period;
        Self::materialize(member, threshold, period)
    }

    /// Scale every member by a constant.
    #[must_use]
    pub fn scale(&self, factor: u64) -> Self {
        if self.is_empty() {
            return Self::empty();
        }
        if factor == 0 {
            return Self::singleton(0);
        }
        let initial: BTreeSet<u64> = self.initial.iter().map(|&n| n * factor).collect();
        let residues: BTreeSet<u64> = self.residues.iter().map(|&r| r * factor).collect();
        // scaled tail members n*factor keep n*factor % (period*factor)
        // = (n % period) * factor
        Self::from_parts(
            initial,
            self.threshold * factor,
            self.period * factor,
            residues,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_membership() {
        let set = SemilinearSet::finite([1, 3, 5].into_iter().collect());
        assert!(set.contains(3));
        assert!(!set.contains(2));
        assert!(!set.contains(100));
        assert!(set.is_finite());
        assert_eq!(set.finite_values(), Some(vec![1, 3, 5]));
    }

    #[test]
    fn periodic_membership_and_normalization() {
        // evens from 4 on, expressed with a redundant period of 6
        let set = SemilinearSet::from_parts(
            BTreeSet::new(),
            4,
            6,
            [0, 2, 4].into_iter().collect(),
        );
        assert_eq!(set.parts().2, 2);
        assert!(set.contains(4));
        assert!(set.contains(100));
        assert!(!set.contains(5));
        assert!(!set.contains(2));
    }

    #[test]
    fn threshold_shrinks_into_tail() {
        // {0, 2} ∪ evens >= 4 is just the evens
        let set = SemilinearSet::from_parts(
            [0, 2].into_iter().collect(),
            4,
            2,
            [0].into_iter().collect(),
        );
        assert_eq!(set.parts().1, 0);
        assert!(set.contains(0));
        assert!(!set.contains(1));
    }

    #[test]
    fn boolean_algebra() {
        let evens = SemilinearSet::from_parts(
            BTreeSet::new(),
            0,
            2,
            [0].into_iter().collect(),
        );
        let small = SemilinearSet::finite([0, 1, 2, 3].into_iter().collect());
        let both = evens.intersect(&small);
        assert_eq!(both.finite_values(), Some(vec![0, 2]));
        let either = evens.union(&small);
        assert!(either.contains(1));
        assert!(either.contains(100));
        assert!(!either.contains(5));
        let odd = evens.complement();
        assert!(odd.contains(7));
        assert!(!odd.contains(8));
        let gone = evens.difference(&evens);
        assert!(gone.is_empty());
    }

    #[test]
    fn minkowski_sum() {
        let a = SemilinearSet::finite([1, 2].into_iter().collect());
        let b = SemilinearSet::at_least(3);
        let sum = a.add(&b);
        assert!(!sum.contains(3));
        assert!(sum.contains(4));
        assert!(sum.contains(77));

        let evens = SemilinearSet::from_parts(
            BTreeSet::new(),
            0,
            2,
            [0].into_iter().collect(),
        );
        let shifted = evens.add(&SemilinearSet::singleton(1));
        assert!(shifted.contains(1));
        assert!(shifted.contains(9));
        assert!(!shifted.contains(4));
    }

    #[test]
    fn minkowski_difference() {
        let a = SemilinearSet::finite([5, 9].into_iter().collect());
        let b = SemilinearSet::finite([2].into_iter().collect());
        let diff = a.subtract(&b);
        assert_eq!(diff.finite_values(), Some(vec![3, 7]));

        // subtracting an unbounded set floors at zero
        let c = SemilinearSet::at_least(0).subtract(&SemilinearSet::at_least(0));
        assert!(c.contains(0));
        assert!(c.contains(41));
    }

    #[test]
    fn scaling() {
        let set = SemilinearSet::at_least(1).scale(3);
        assert!(set.contains(3));
        assert!(set.contains(6));
        assert!(!set.contains(4));
        assert!(!set.contains(0));
    }

    #[test]
    fn min_and_bounds() {
        let set = SemilinearSet::from_parts(
            [2].into_iter().collect(),
            5,
            3,
            [1].into_iter().collect(),
        );
        assert_eq!(set.min(), Some(2));
        assert!(set.is_unbounded());
        assert_eq!(set.max_finite(), None);
        assert_eq!(SemilinearSet::finite([4, 8].into_iter().collect()).max_finite(), Some(8));
    }
}
