//! Relational linear-arithmetic automata.
//!
//! A [`BinaryIntAutomaton`] accepts words over bit-tuple symbols: track `i`
//! of the tuple stream spells variable `i` in two's complement, least
//! significant bit first, with the final tuple read as the sign tuple.
//! Repeating the sign tuple does not change the encoded value, and every
//! automaton built here is closed under that repetition, so the Boolean
//! operations are sound at the level of solution sets.
//!
//! The constraint builders use the classic carry construction: a state is
//! the remaining constant of the constraint, paired with the flag "the tuple
//! just read satisfies the relation when taken as the sign tuple".

use std::collections::BTreeMap;

use tracing::warn;

use crate::formula::{ArithmeticFormula, FormulaKind};
use crate::semilinear::SemilinearSet;
use crate::{AutomatonError, Result};

/// Most tracks a bit-tuple alphabet may carry.
const MAX_TRACKS: usize = 12;

/// How far value extraction probes a single-track automaton, and the largest
/// period/threshold it recognizes.
const EXTRACT_PROBE: u64 = 1024;
const EXTRACT_MAX_PERIOD: u64 = 64;
const EXTRACT_MAX_THRESHOLD: u64 = 512;

/// A set of integer tuples, as a DFA over bit-tuple symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryIntAutomaton {
    formula: ArithmeticFormula,
    /// `transitions[state][symbol] -> state`; symbols below `1 << tracks`
    transitions: Vec<BTreeMap<u32, u32>>,
    accepting: Vec<bool>,
}

impl BinaryIntAutomaton {
    // ------------------------------------------------------------------
    // constructors

    /// The empty relation over the formula's track universe.
    #[must_use]
    pub fn make_phi(formula: ArithmeticFormula) -> Self {
        Self {
            formula,
            transitions: vec![BTreeMap::new()],
            accepting: vec![false],
        }
    }

    /// Every tuple over the formula's track universe.
    pub fn make_universal(formula: ArithmeticFormula) -> Result<Self> {
        let tracks = check_tracks(formula.track_count())?;
        let mut edges = BTreeMap::new();
        for symbol in 0..(1u32 << tracks) {
            edges.insert(symbol, 0);
        }
        Ok(Self {
            formula,
            transitions: vec![edges],
            accepting: vec![true],
        })
    }

    /// The solutions of a relational formula.
    pub fn from_formula(formula: ArithmeticFormula) -> Result<Self> {
        check_tracks(formula.track_count())?;
        let coefficients: Vec<i64> = formula.variable_coefficients().values().copied().collect();
        let negated: Vec<i64> = coefficients.iter().map(|&a| -a).collect();
        let constant = formula.constant();
        match formula.kind() {
            // Σ a·x = -c
            FormulaKind::Eq => Ok(Self::make_equality(formula.clone(), &coefficients, -constant)),
            FormulaKind::NotEq => {
                let mut eq = formula.clone();
                eq.set_kind(FormulaKind::Eq);
                Ok(Self::make_equality(eq, &coefficients, -constant).complement())
            }
            // Σ a·x <= -c
            FormulaKind::Le => Ok(Self::make_le(formula.clone(), &coefficients, -constant)),
            FormulaKind::Lt => Ok(Self::make_le(formula.clone(), &coefficients, -constant - 1)),
            // Σ a·x >= -c  ⟺  Σ (-a)·x <= c
            FormulaKind::Ge => Ok(Self::make_le(formula.clone(), &negated, constant)),
            FormulaKind::Gt => Ok(Self::make_le(formula.clone(), &negated, constant - 1)),
            FormulaKind::Intersect | FormulaKind::Var => {
                panic!("formula kind {:?} has no constraint automaton", formula.kind())
            }
        }
    }

    /// `variable ∈ set` (plus `-1` when `has_minus_one`), extended to the
    /// track universe of `context`.
    pub fn from_semilinear(
        variable: &str,
        set: &SemilinearSet,
        has_minus_one: bool,
        context: ArithmeticFormula,
    ) -> Result<Self> {
        let mut single = ArithmeticFormula::new(FormulaKind::Var);
        single.ensure_variable(variable);

        let mut result = Self::make_phi(single);
        let (initial, threshold, period, residues) = set.parts();
        for &value in initial {
            result = result.union(&Self::value_automaton(variable, value as i64)?)?;
        }
        if period > 0 {
            let mut low = ArithmeticFormula::new(FormulaKind::Ge);
            low.add_variable(variable, 1);
            low.set_constant(-(threshold as i64));
            let low_auto = Self::from_formula(low)?;
            for &residue in residues {
                let congruent = Self::make_congruence(variable, residue, period);
                result = result.union(&congruent.intersect(&low_auto)?)?;
            }
        }
        if has_minus_one {
            result = result.union(&Self::value_automaton(variable, -1)?)?;
        }

        let mut context = context;
        context.ensure_variable(variable);
        let universe = Self::make_universal(context)?;
        result.intersect(&universe)
    }

    /// `variable = value` over a single track.
    pub fn value_automaton(variable: &str, value: i64) -> Result<Self> {
        let mut formula = ArithmeticFormula::new(FormulaKind::Eq);
        formula.add_variable(variable, 1);
        formula.set_constant(-value);
        Self::from_formula(formula)
    }

    /// Equality carry construction: `Σ a·x = target`.
    fn make_equality(formula: ArithmeticFormula, coefficients: &[i64], target: i64) -> Self {
        let tracks = coefficients.len();
        let moves = explore_carries(target, |gamma, symbol| {
            let contribution = tuple_sum(coefficients, symbol);
            let numerator = gamma - contribution;
            if numerator % 2 != 0 {
                return None;
            }
            Some((numerator / 2, gamma == -contribution))
        }, tracks);
        materialize_carries(formula, target, &moves)
    }

    /// Inequality carry construction: `Σ a·x <= bound`.
    fn make_le(formula: ArithmeticFormula, coefficients: &[i64], bound: i64) -> Self {
        let tracks = coefficients.len();
        let moves = explore_carries(bound, |gamma, symbol| {
            let contribution = tuple_sum(coefficients, symbol);
            Some(((gamma - contribution).div_euclid(2), -contribution <= gamma))
        }, tracks);
        materialize_carries(formula, bound, &moves)
    }

    /// `variable ≡ residue (mod modulus)` over a single track.
    fn make_congruence(variable: &str, residue: u64, modulus: u64) -> Self {
        let mut formula = ArithmeticFormula::new(FormulaKind::Var);
        formula.ensure_variable(variable);
        let m = modulus as i64;
        let r = (residue as i64).rem_euclid(m);
        // carry = (value so far mod m, bit weight mod m); the sign-accept
        // flag is the per-transition acceptance bit
        let moves = explore_carries((0i64, 1 % m), |(value, weight), symbol| {
            let bit = symbol as i64;
            let next = ((value + weight * bit).rem_euclid(m), (weight * 2).rem_euclid(m));
            // taking this bit as the sign: total ≡ value - weight·bit
            let accept = (value - weight * bit).rem_euclid(m) == r;
            Some((next, accept))
        }, 1);
        materialize_carries(formula, (0i64, 1 % m), &moves)
    }

    // ------------------------------------------------------------------
    // accessors

    /// The formula describing this automaton.
    #[must_use]
    pub fn formula(&self) -> &ArithmeticFormula {
        &self.formula
    }

    /// Number of tracks.
    #[must_use]
    pub fn track_count(&self) -> usize {
        self.formula.track_count()
    }

    /// Number of states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.transitions.len()
    }

    // ------------------------------------------------------------------
    // predicates

    /// Whether any tuple is accepted.
    #[must_use]
    pub fn is_satisfiable(&self) -> bool {
        let mut seen = vec![false; self.state_count()];
        seen[0] = true;
        let mut stack = vec![0u32];
        while let Some(state) = stack.pop() {
            if self.accepting[state as usize] {
                return true;
            }
            for target in self.transitions[state as usize].values() {
                if !seen[*target as usize] {
                    seen[*target as usize] = true;
                    stack.push(*target);
                }
            }
        }
        false
    }

    /// Whether the relation is empty.
    #[must_use]
    pub fn is_empty_language(&self) -> bool {
        !self.is_satisfiable()
    }

    /// Whether the assignment (one value per track, in track order for
    /// missing names) satisfies the relation.
    #[must_use]
    pub fn accepts_assignment(&self, assignment: &BTreeMap<String, i64>) -> bool {
        let tracks = self.track_count();
        let values: Vec<i64> = self
            .formula
            .variable_coefficients()
            .keys()
            .map(|name| assignment.get(name).copied().unwrap_or(0))
            .collect();
        let width = encoding_width(&values);
        let mut state = 0u32;
        for position in 0..width {
            let mut symbol = 0u32;
            for (track, &value) in values.iter().enumerate().take(tracks) {
                if bit_at(value, position) {
                    symbol |= 1 << track;
                }
            }
            match self.transitions[state as usize].get(&symbol) {
                Some(&next) => state = next,
                None => return false,
            }
        }
        self.accepting[state as usize]
    }

    /// Whether `variable` can take `value` in some solution.
    #[must_use]
    pub fn admits_value(&self, variable: &str, value: i64) -> bool {
        match Self::value_automaton(variable, value) {
            Ok(eq) => match self.intersect(&eq) {
                Ok(product) => product.is_satisfiable(),
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    /// Whether `variable` can be the `-1` sentinel in some solution.
    #[must_use]
    pub fn has_negative_1(&self, variable: &str) -> bool {
        self.admits_value(variable, -1)
    }

    // ------------------------------------------------------------------
    // boolean algebra

    /// Extend to a superset universe, preserving the solution set.
    fn align_to(&self, universe: &ArithmeticFormula) -> Self {
        if universe.variable_track_map() == self.formula.variable_track_map() {
            return self.clone();
        }
        let own_tracks = self.formula.variable_track_map();
        let target_tracks = universe.variable_track_map();
        let tracks = target_tracks.len();
        // position of each of our tracks inside the wider symbol
        let mut source_bits: Vec<usize> = vec![0; own_tracks.len()];
        for (name, own_index) in &own_tracks {
            source_bits[*own_index] = target_tracks.get(name).copied().unwrap_or_else(|| {
                panic!("aligning to a universe missing track {name}");
            });
        }
        let mut transitions: Vec<BTreeMap<u32, u32>> =
            vec![BTreeMap::new(); self.state_count()];
        for (state, edges) in self.transitions.iter().enumerate() {
            for symbol in 0..(1u32 << tracks) {
                let mut narrow = 0u32;
                for (own_index, target_index) in source_bits.iter().enumerate() {
                    if symbol & (1 << target_index) != 0 {
                        narrow |= 1 << own_index;
                    }
                }
                if let Some(&next) = edges.get(&narrow) {
                    transitions[state].insert(symbol, next);
                }
            }
        }
        let mut formula = self.formula.clone();
        for name in universe.variable_coefficients().keys() {
            formula.ensure_variable(name.clone());
        }
        Self {
            formula,
            transitions,
            accepting: self.accepting.clone(),
        }
    }

    fn merged_universe(&self, other: &Self) -> Result<ArithmeticFormula> {
        let merged = self.formula.merge_for_intersect(&other.formula);
        check_tracks(merged.track_count())?;
        Ok(merged)
    }

    /// Relation intersection. Universes are merged; you can intersect
    /// automata over different variable sets.
    pub fn intersect(&self, other: &Self) -> Result<Self> {
        let universe = self.merged_universe(other)?;
        let a = self.align_to(&universe);
        let b = other.align_to(&universe);
        Ok(a.product(&b, universe, |x, y| x && y))
    }

    /// Relation union.
    pub fn union(&self, other: &Self) -> Result<Self> {
        let universe = self.merged_universe(other)?;
        let a = self.align_to(&universe).completed();
        let b = other.align_to(&universe).completed();
        let mut out = a.product(&b, universe, |x, y| x || y);
        out.formula.set_kind(FormulaKind::Intersect);
        Ok(out)
    }

    /// Relation difference.
    pub fn difference(&self, other: &Self) -> Result<Self> {
        self.intersect(&other.complement())
    }

    /// Relation complement over all tuples.
    #[must_use]
    pub fn complement(&self) -> Self {
        let mut out = self.completed();
        for accept in &mut out.accepting {
            *accept = !*accept;
        }
        out.formula.set_kind(match self.formula.kind() {
            FormulaKind::Eq => FormulaKind::NotEq,
            FormulaKind::NotEq => FormulaKind::Eq,
            FormulaKind::Lt => FormulaKind::Ge,
            FormulaKind::Le => FormulaKind::Gt,
            FormulaKind::Gt => FormulaKind::Le,
            FormulaKind::Ge => FormulaKind::Lt,
            other => other,
        });
        out
    }

    fn completed(&self) -> Self {
        let tracks = self.track_count();
        let sink = self.state_count() as u32;
        let mut transitions = self.transitions.clone();
        transitions.push(BTreeMap::new());
        for state in transitions.iter_mut() {
            for symbol in 0..(1u32 << tracks) {
                state.entry(symbol).or_insert(sink);
            }
        }
        let mut accepting = self.accepting.clone();
        accepting.push(false);
        Self {
            formula: self.formula.clone(),
            transitions,
            accepting,
        }
    }

    fn product(&self, other: &Self, formula: ArithmeticFormula, op: impl Fn(bool, bool) -> bool) -> Self {
        let mut ids: hashbrown::HashMap<(u32, u32), u32> = hashbrown::HashMap::new();
        let mut pairs = vec![(0u32, 0u32)];
        ids.insert((0, 0), 0);
        let mut transitions: Vec<BTreeMap<u32, u32>> = vec![BTreeMap::new()];
        let mut accepting = vec![false];
        let mut frontier = vec![0u32];
        while let Some(id) = frontier.pop() {
            let (a, b) = pairs[id as usize];
            accepting[id as usize] = op(
                self.accepting[a as usize],
                other.accepting[b as usize],
            );
            for (symbol, ta) in &self.transitions[a as usize] {
                if let Some(tb) = other.transitions[b as usize].get(symbol) {
                    let key = (*ta, *tb);
                    let next = match ids.get(&key) {
                        Some(&existing) => existing,
                        None => {
                            let fresh = pairs.len() as u32;
                            ids.insert(key, fresh);
                            pairs.push(key);
                            transitions.push(BTreeMap::new());
                            accepting.push(false);
                            frontier.push(fresh);
                            fresh
                        }
                    };
                    transitions[id as usize].insert(*symbol, next);
                }
            }
        }
        Self {
            formula,
            transitions,
            accepting,
        }
    }

    // ------------------------------------------------------------------
    // projection and extraction

    /// Existentially project every track but `variable` away.
    pub fn project_onto(&self, variable: &str) -> Result<Self> {
        let tracks = self.formula.variable_track_map();
        let keep = *tracks
            .get(variable)
            .unwrap_or_else(|| panic!("projection onto unknown track {variable}"));
        // NFA over the single remaining bit, then subset construction
        let mut subset_ids: hashbrown::HashMap<Vec<u32>, u32> = hashbrown::HashMap::new();
        let initial = vec![0u32];
        subset_ids.insert(initial.clone(), 0);
        let mut subsets = vec![initial];
        let mut transitions: Vec<BTreeMap<u32, u32>> = vec![BTreeMap::new()];
        let mut accepting = vec![false];
        let mut frontier = vec![0u32];
        while let Some(id) = frontier.pop() {
            let subset = subsets[id as usize].clone();
            accepting[id as usize] = subset.iter().any(|&s| self.accepting[s as usize]);
            for bit in 0..=1u32 {
                let mut targets: std::collections::BTreeSet<u32> = std::collections::BTreeSet::new();
                for &state in &subset {
                    for (symbol, target) in &self.transitions[state as usize] {
                        if (symbol >> keep) & 1 == bit {
                            targets.insert(*target);
                        }
                    }
                }
                if targets.is_empty() {
                    continue;
                }
                let key: Vec<u32> = targets.into_iter().collect();
                let next = match subset_ids.get(&key) {
                    Some(&existing) => existing,
                    None => {
                        let fresh = subsets.len() as u32;
                        subset_ids.insert(key.clone(), fresh);
                        subsets.push(key);
                        transitions.push(BTreeMap::new());
                        accepting.push(false);
                        frontier.push(fresh);
                        fresh
                    }
                };
                transitions[id as usize].insert(bit, next);
            }
        }
        let mut formula = ArithmeticFormula::new(FormulaKind::Var);
        formula.ensure_variable(variable);
        Ok(Self {
            formula,
            transitions,
            accepting,
        })
    }

    /// Restrict `variable` to non-negative values.
    pub fn get_positive_values_for(&self, variable: &str) -> Result<Self> {
        let mut bound = ArithmeticFormula::new(FormulaKind::Ge);
        bound.add_variable(variable, 1);
        self.intersect(&Self::from_formula(bound)?)
    }

    /// Extract the natural value set of a single-track automaton.
    ///
    /// Values are probed up to a fixed bound and the smallest stable period
    /// is detected; the sets reaching this point are projections of linear
    /// constraints intersected with semilinear sets, so a period within the
    /// bound always exists for them. If detection fails the probed members
    /// are returned as a finite set, with a warning.
    #[must_use]
    pub fn to_unary_automaton(&self) -> crate::int_automaton::UnaryAutomaton {
        assert_eq!(
            self.track_count(),
            1,
            "value extraction requires a single-track automaton"
        );
        let variable = self
            .formula
            .variable_coefficients()
            .keys()
            .next()
            .cloned()
            .expect("single-track automaton has a variable");
        let mut member = Vec::with_capacity(EXTRACT_PROBE as usize);
        for n in 0..EXTRACT_PROBE {
            let mut assignment = BTreeMap::new();
            assignment.insert(variable.clone(), n as i64);
            member.push(self.accepts_assignment(&assignment));
        }
        if let Some((threshold, period)) = detect_period(&member) {
            let mut initial = std::collections::BTreeSet::new();
            for (n, &m) in member.iter().enumerate().take(threshold as usize) {
                if m {
                    initial.insert(n as u64);
                }
            }
            let mut residues = std::collections::BTreeSet::new();
            for n in threshold..threshold + period {
                if member[n as usize] {
                    residues.insert(n % period);
                }
            }
            return crate::int_automaton::UnaryAutomaton::from_set(SemilinearSet::from_parts(
                initial, threshold, period, residues,
            ));
        }
        warn!("no period within probe bound, falling back to the sampled members");
        let values: std::collections::BTreeSet<u64> = member
            .iter()
            .enumerate()
            .filter(|(_, &m)| m)
            .map(|(n, _)| n as u64)
            .collect();
        crate::int_automaton::UnaryAutomaton::from_set(SemilinearSet::finite(values))
    }
}

fn check_tracks(count: usize) -> Result<usize> {
    if count > MAX_TRACKS {
        Err(AutomatonError::TooManyTracks(count))
    } else {
        Ok(count)
    }
}

fn tuple_sum(coefficients: &[i64], symbol: u32) -> i64 {
    coefficients
        .iter()
        .enumerate()
        .map(|(track, &a)| if symbol & (1 << track) != 0 { a } else { 0 })
        .sum()
}

fn bit_at(value: i64, position: u64) -> bool {
    if position >= 63 {
        value < 0
    } else {
        (value >> position) & 1 == 1
    }
}

/// Tuples are fed LSB first; the width covers magnitude plus one sign bit.
fn encoding_width(values: &[i64]) -> u64 {
    let mut width = 1;
    for &v in values {
        let magnitude = if v < 0 { (-(v + 1)) as u64 } else { v as u64 };
        let bits = 64 - magnitude.leading_zeros() as u64 + 1;
        width = width.max(bits);
    }
    width + 1
}

/// Smallest `(threshold, period)` under which the probed membership pattern
/// is periodic, with a verification margin of four periods.
fn detect_period(member: &[bool]) -> Option<(u64, u64)> {
    let n = member.len();
    for period in 1..=EXTRACT_MAX_PERIOD as usize {
        if n < 4 * period {
            break;
        }
        // smallest threshold from which the pattern repeats with this period
        let mut threshold = 0;
        for i in (0..n - period).rev() {
            if member[i] != member[i + period] {
                threshold = i + 1;
                break;
            }
        }
        if threshold as u64 <= EXTRACT_MAX_THRESHOLD && n - threshold >= 4 * period {
            return Some((threshold as u64, period as u64));
        }
    }
    None
}

/// Phase one of the carry construction: explore the carry graph. The result
/// maps each carry to its moves, `(symbol, next carry, sign-accept bit)`.
fn explore_carries<C: Copy + Eq + std::hash::Hash>(
    start: C,
    step: impl Fn(C, u32) -> Option<(C, bool)>,
    tracks: usize,
) -> hashbrown::HashMap<C, Vec<(u32, C, bool)>> {
    let mut moves: hashbrown::HashMap<C, Vec<(u32, C, bool)>> = hashbrown::HashMap::new();
    let mut frontier = vec![start];
    while let Some(carry) = frontier.pop() {
        if moves.contains_key(&carry) {
            continue;
        }
        let mut edges = Vec::new();
        for symbol in 0..(1u32 << tracks) {
            if let Some((next, accept)) = step(carry, symbol) {
                edges.push((symbol, next, accept));
                if !moves.contains_key(&next) {
                    frontier.push(next);
                }
            }
        }
        moves.insert(carry, edges);
    }
    moves
}

/// Phase two: materialize the DFA over `(carry, accept-bit)` states. Both
/// bit variants of a carry share the carry's moves, so acceptance tracks
/// exactly "the last tuple read was a valid sign tuple".
fn materialize_carries<C: Copy + Eq + std::hash::Hash>(
    formula: ArithmeticFormula,
    start: C,
    moves: &hashbrown::HashMap<C, Vec<(u32, C, bool)>>,
) -> BinaryIntAutomaton {
    let mut ids: hashbrown::HashMap<(C, bool), u32> = hashbrown::HashMap::new();
    let mut order: Vec<(C, bool)> = Vec::new();
    let mut transitions: Vec<BTreeMap<u32, u32>> = Vec::new();
    let mut accepting: Vec<bool> = Vec::new();

    ids.insert((start, false), 0);
    order.push((start, false));
    transitions.push(BTreeMap::new());
    accepting.push(false);

    let mut frontier = vec![0u32];
    while let Some(id) = frontier.pop() {
        let (carry, _) = order[id as usize];
        for &(symbol, next_carry, accept) in &moves[&carry] {
            let key = (next_carry, accept);
            let next = match ids.get(&key) {
                Some(&existing) => existing,
                None => {
                    let fresh = order.len() as u32;
                    ids.insert(key, fresh);
                    order.push(key);
                    transitions.push(BTreeMap::new());
                    accepting.push(accept);
                    frontier.push(fresh);
                    fresh
                }
            };
            transitions[id as usize].insert(symbol, next);
        }
    }
    BinaryIntAutomaton {
        formula,
        transitions,
        accepting,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assign(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn eq_formula(pairs: &[(&str, i64)], constant: i64) -> ArithmeticFormula {
        let mut f = ArithmeticFormula::new(FormulaKind::Eq);
        for (name, coefficient) in pairs {
            f.add_variable(*name, *coefficient);
        }
        f.set_constant(constant);
        f
    }

    #[test]
    fn make_phi_is_empty() {
        let auto = BinaryIntAutomaton::make_phi(eq_formula(&[("x", 1)], -7));
        assert!(auto.is_empty_language());
        assert_eq!(auto.state_count(), 1);
    }

    #[test]
    fn equality_single_variable() {
        // x - 3 = 0
        let auto = BinaryIntAutomaton::from_formula(eq_formula(&[("x", 1)], -3)).unwrap();
        assert!(auto.accepts_assignment(&assign(&[("x", 3)])));
        assert!(!auto.accepts_assignment(&assign(&[("x", 2)])));
        assert!(!auto.accepts_assignment(&assign(&[("x", -3)])));
        assert!(auto.is_satisfiable());
    }

    #[test]
    fn equality_negative_constant_side() {
        // x + 3 = 0, i.e. x = -3
        let auto = BinaryIntAutomaton::from_formula(eq_formula(&[("x", 1)], 3)).unwrap();
        assert!(auto.accepts_assignment(&assign(&[("x", -3)])));
        assert!(!auto.accepts_assignment(&assign(&[("x", 3)])));
    }

    #[test]
    fn equality_two_variables() {
        // x + 2y - 6 = 0
        let auto =
            BinaryIntAutomaton::from_formula(eq_formula(&[("x", 1), ("y", 2)], -6)).unwrap();
        for (x, y) in [(6, 0), (4, 1), (2, 2), (0, 3), (-2, 4), (8, -1)] {
            assert!(
                auto.accepts_assignment(&assign(&[("x", x), ("y", y)])),
                "expected ({x},{y})"
            );
        }
        assert!(!auto.accepts_assignment(&assign(&[("x", 1), ("y", 2)])));
    }

    #[test]
    fn inequalities_and_difference() {
        let mut le = eq_formula(&[("x", 1)], -3);
        le.set_kind(FormulaKind::Le);
        let mut lt = eq_formula(&[("x", 1)], -3);
        lt.set_kind(FormulaKind::Lt);
        let le_auto = BinaryIntAutomaton::from_formula(le).unwrap();
        let lt_auto = BinaryIntAutomaton::from_formula(lt).unwrap();
        assert!(le_auto.accepts_assignment(&assign(&[("x", 3)])));
        assert!(!lt_auto.accepts_assignment(&assign(&[("x", 3)])));
        assert!(lt_auto.accepts_assignment(&assign(&[("x", -10)])));

        // (x <= 3) \ (x < 3) is exactly x = 3
        let only_three = le_auto.difference(&lt_auto).unwrap();
        let eq_three = BinaryIntAutomaton::from_formula(eq_formula(&[("x", 1)], -3)).unwrap();
        assert!(only_three.difference(&eq_three).unwrap().is_empty_language());
        assert!(eq_three.difference(&only_three).unwrap().is_empty_language());
    }

    #[test]
    fn greater_than_shapes() {
        let mut ge = eq_formula(&[("x", 1)], -3);
        ge.set_kind(FormulaKind::Ge);
        let auto = BinaryIntAutomaton::from_formula(ge).unwrap();
        assert!(auto.accepts_assignment(&assign(&[("x", 3)])));
        assert!(auto.accepts_assignment(&assign(&[("x", 300)])));
        assert!(!auto.accepts_assignment(&assign(&[("x", 2)])));

        let mut gt = eq_formula(&[("x", 1)], -3);
        gt.set_kind(FormulaKind::Gt);
        let auto = BinaryIntAutomaton::from_formula(gt).unwrap();
        assert!(!auto.accepts_assignment(&assign(&[("x", 3)])));
        assert!(auto.accepts_assignment(&assign(&[("x", 4)])));
    }

    #[test]
    fn not_equality_is_complement() {
        let mut ne = eq_formula(&[("x", 1)], -3);
        ne.set_kind(FormulaKind::NotEq);
        let auto = BinaryIntAutomaton::from_formula(ne).unwrap();
        assert!(!auto.accepts_assignment(&assign(&[("x", 3)])));
        assert!(auto.accepts_assignment(&assign(&[("x", 4)])));
        assert_eq!(auto.formula().kind(), FormulaKind::NotEq);
        let back = auto.complement();
        assert_eq!(back.formula().kind(), FormulaKind::Eq);
        assert!(back.accepts_assignment(&assign(&[("x", 3)])));
    }

    #[test]
    fn intersect_across_universes() {
        // x >= 3 over {x}, y <= 2 over {y}: intersection relates both tracks
        let mut ge = eq_formula(&[("x", 1)], -3);
        ge.set_kind(FormulaKind::Ge);
        let mut le = eq_formula(&[("y", 1)], -2);
        le.set_kind(FormulaKind::Le);
        let a = BinaryIntAutomaton::from_formula(ge).unwrap();
        let b = BinaryIntAutomaton::from_formula(le).unwrap();
        let both = a.intersect(&b).unwrap();
        assert_eq!(both.track_count(), 2);
        assert_eq!(both.formula().kind(), FormulaKind::Intersect);
        assert!(both.accepts_assignment(&assign(&[("x", 5), ("y", 1)])));
        assert!(!both.accepts_assignment(&assign(&[("x", 2), ("y", 1)])));
        assert!(!both.accepts_assignment(&assign(&[("x", 5), ("y", 3)])));
    }

    #[test]
    fn projection_drops_tracks() {
        // x - 2y = 0, y >= 1  =>  x ∈ {2, 4, 6, ...}
        let eq = BinaryIntAutomaton::from_formula(eq_formula(&[("x", 1), ("y", -2)], 0)).unwrap();
        let mut ge = eq_formula(&[("y", 1)], -1);
        ge.set_kind(FormulaKind::Ge);
        let bound = BinaryIntAutomaton::from_formula(ge).unwrap();
        let solution = eq.intersect(&bound).unwrap();
        assert_eq!(solution.track_count(), 2);
        let x_only = solution.project_onto("x").unwrap();
        assert_eq!(x_only.track_count(), 1);
        assert!(x_only.accepts_assignment(&assign(&[("x", 2)])));
        assert!(x_only.accepts_assignment(&assign(&[("x", 40)])));
        assert!(!x_only.accepts_assignment(&assign(&[("x", 3)])));
        assert!(!x_only.accepts_assignment(&assign(&[("x", 0)])));
    }

    #[test]
    fn extraction_recovers_semilinear_set() {
        let eq = BinaryIntAutomaton::from_formula(eq_formula(&[("x", 1), ("y", -2)], 0)).unwrap();
        let mut ge = eq_formula(&[("y", 1)], -1);
        ge.set_kind(FormulaKind::Ge);
        let bound = BinaryIntAutomaton::from_formula(ge).unwrap();
        let x_only = eq.intersect(&bound).unwrap().project_onto("x").unwrap();
        let unary = x_only.to_unary_automaton();
        let ints = unary.to_int_automaton(false);
        assert!(ints.contains(2));
        assert!(ints.contains(998));
        assert!(!ints.contains(3));
        assert!(!ints.contains(0));
    }

    #[test]
    fn from_semilinear_round_trip() {
        let set = SemilinearSet::from_parts(
            [1u64].into_iter().collect(),
            3,
            2,
            [1u64].into_iter().collect(),
        );
        let context = {
            let mut f = ArithmeticFormula::new(FormulaKind::Intersect);
            f.ensure_variable("n");
            f
        };
        let auto = BinaryIntAutomaton::from_semilinear("n", &set, false, context).unwrap();
        for n in [1i64, 3, 5, 7, 99] {
            assert!(auto.accepts_assignment(&assign(&[("n", n)])), "expected {n}");
        }
        for n in [0i64, 2, 4, -1] {
            assert!(!auto.accepts_assignment(&assign(&[("n", n)])), "rejected {n}");
        }
    }

    #[test]
    fn sentinel_and_positive_restriction() {
        let set = SemilinearSet::singleton(5);
        let context = {
            let mut f = ArithmeticFormula::new(FormulaKind::Intersect);
            f.ensure_variable("n");
            f
        };
        let auto = BinaryIntAutomaton::from_semilinear("n", &set, true, context).unwrap();
        assert!(auto.has_negative_1("n"));
        assert!(auto.accepts_assignment(&assign(&[("n", -1)])));
        let positive = auto.get_positive_values_for("n").unwrap();
        assert!(!positive.has_negative_1("n"));
        assert!(positive.accepts_assignment(&assign(&[("n", 5)])));
    }

    #[test]
    fn too_many_tracks_is_an_error() {
        let mut formula = ArithmeticFormula::new(FormulaKind::Eq);
        for i in 0..(MAX_TRACKS + 1) {
            formula.add_variable(format!("v{i}"), 1);
        }
        assert!(matches!(
            BinaryIntAutomaton::from_formula(formula),
            Err(AutomatonError::TooManyTracks(_))
        ));
    }
}
