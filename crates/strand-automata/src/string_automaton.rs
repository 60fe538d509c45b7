//! Deterministic string automata over the byte alphabet.
//!
//! The representation is a trim partial DFA: state 0 is the start state,
//! missing transitions reject, and every kept state lies on some path from
//! the start to an accepting state. The empty language is the one-state
//! automaton with no accepting states.

use std::collections::BTreeMap;

use tracing::warn;

use crate::int_automaton::IntAutomaton;
use crate::nfa::Nfa;
use crate::regex;
use crate::semilinear::SemilinearSet;
use crate::Result;

/// Longest decimal literal `parse_to_int_automaton` converts exactly.
const MAX_PARSE_DIGITS: usize = 18;

/// A set of strings, represented as a trim partial DFA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringAutomaton {
    /// `transitions[state][byte] -> target`
    transitions: Vec<BTreeMap<u8, u32>>,
    accepting: Vec<bool>,
}

impl StringAutomaton {
    // ------------------------------------------------------------------
    // factories

    /// The empty language.
    #[must_use]
    pub fn make_phi() -> Self {
        Self {
            transitions: vec![BTreeMap::new()],
            accepting: vec![false],
        }
    }

    /// The language containing only the empty string.
    #[must_use]
    pub fn make_empty_string() -> Self {
        Self {
            transitions: vec![BTreeMap::new()],
            accepting: vec![true],
        }
    }

    /// The singleton language `{s}`.
    #[must_use]
    pub fn make_string(s: &str) -> Self {
        let bytes = s.as_bytes();
        let mut transitions: Vec<BTreeMap<u8, u32>> = Vec::with_capacity(bytes.len() + 1);
        let mut accepting = vec![false; bytes.len() + 1];
        for (i, &b) in bytes.iter().enumerate() {
            let mut edges = BTreeMap::new();
            edges.insert(b, (i + 1) as u32);
            transitions.push(edges);
        }
        transitions.push(BTreeMap::new());
        accepting[bytes.len()] = true;
        Self {
            transitions,
            accepting,
        }
    }

    /// The universal language `Σ*`.
    #[must_use]
    pub fn make_any_string() -> Self {
        let mut edges = BTreeMap::new();
        for b in 0..=255u8 {
            edges.insert(b, 0);
        }
        Self {
            transitions: vec![edges],
            accepting: vec![true],
        }
    }

    /// The language of a regular-expression literal.
    pub fn make_regex(pattern: &str) -> Result<Self> {
        let nfa = regex::compile(pattern)?;
        Ok(nfa.determinize())
    }

    /// Build from raw parts, trimming dead states. Internal to the crate;
    /// the [`Nfa`] subset construction lands here.
    pub(crate) fn from_parts(transitions: Vec<BTreeMap<u8, u32>>, accepting: Vec<bool>) -> Self {
        let n = transitions.len();
        debug_assert_eq!(n, accepting.len());
        debug_assert!(n > 0);

        // forward reachability from the start
        let mut reachable = vec![false; n];
        reachable[0] = true;
        let mut stack = vec![0usize];
        while let Some(state) = stack.pop() {
            for target in transitions[state].values() {
                let t = *target as usize;
                if !reachable[t] {
                    reachable[t] = true;
                    stack.push(t);
                }
            }
        }

        // backward reachability from accepting states
        let mut reverse: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (state, edges) in transitions.iter().enumerate() {
            for target in edges.values() {
                reverse[*target as usize].push(state);
            }
        }
        let mut productive = vec![false; n];
        let mut stack: Vec<usize> = (0..n).filter(|&s| accepting[s]).collect();
        for &s in &stack {
            productive[s] = true;
        }
        while let Some(state) = stack.pop() {
            for &source in &reverse[state] {
                if !productive[source] {
                    productive[source] = true;
                    stack.push(source);
                }
            }
        }

        if !(reachable[0] && productive[0]) {
            return Self::make_phi();
        }

        let mut renumber = vec![u32::MAX; n];
        let mut kept = 0u32;
        for state in 0..n {
            if reachable[state] && productive[state] {
                renumber[state] = kept;
                kept += 1;
            }
        }
        let mut new_transitions: Vec<BTreeMap<u8, u32>> = vec![BTreeMap::new(); kept as usize];
        let mut new_accepting = vec![false; kept as usize];
        for state in 0..n {
            if renumber[state] == u32::MAX {
                continue;
            }
            let id = renumber[state] as usize;
            new_accepting[id] = accepting[state];
            for (symbol, target) in &transitions[state] {
                let t = renumber[*target as usize];
                if t != u32::MAX {
                    new_transitions[id].insert(*symbol, t);
                }
            }
        }
        Self {
            transitions: new_transitions,
            accepting: new_accepting,
        }
    }

    // ------------------------------------------------------------------
    // structural accessors

    /// Number of states.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.transitions.len()
    }

    pub(crate) fn is_accepting_state(&self, state: usize) -> bool {
        self.accepting[state]
    }

    pub(crate) fn transitions_from(&self, state: usize) -> impl Iterator<Item = (u8, &u32)> {
        self.transitions[state].iter().map(|(b, t)| (*b, t))
    }

    // ------------------------------------------------------------------
    // predicates

    /// Whether the language is empty.
    #[must_use]
    pub fn is_empty_language(&self) -> bool {
        !self.accepting.iter().any(|&a| a)
    }

    /// Whether the word is accepted.
    #[must_use]
    pub fn accepts(&self, word: &str) -> bool {
        let mut state = 0u32;
        for b in word.bytes() {
            match self.transitions[state as usize].get(&b) {
                Some(&next) => state = next,
                None => return false,
            }
        }
        self.accepting[state as usize]
    }

    /// Whether some live state lies on a cycle, i.e. the language is
    /// infinite.
    fn has_cycle(&self) -> bool {
        if self.is_empty_language() {
            return false;
        }
        // colors: 0 unvisited, 1 on stack, 2 done
        let mut color = vec![0u8; self.state_count()];
        let mut stack: Vec<(usize, bool)> = vec![(0, false)];
        while let Some((state, leaving)) = stack.pop() {
            if leaving {
                color[state] = 2;
                continue;
            }
            if color[state] == 2 {
                continue;
            }
            color[state] = 1;
            stack.push((state, true));
            for target in self.transitions[state].values() {
                match color[*target as usize] {
                    0 => stack.push((*target as usize, false)),
                    1 => return true,
                    _ => {}
                }
            }
        }
        false
    }

    /// Count accepted words, saturating at `cap`.
    fn count_words(&self, cap: usize) -> usize {
        if self.is_empty_language() {
            return 0;
        }
        if self.has_cycle() {
            return cap;
        }
        // acyclic: count paths to acceptance, memoized
        fn go(auto: &StringAutomaton, state: usize, memo: &mut [Option<usize>], cap: usize) -> usize {
            if let Some(c) = memo[state] {
                return c;
            }
            let mut count = usize::from(auto.accepting[state]);
            for target in auto.transitions[state].values() {
                count = count.saturating_add(go(auto, *target as usize, memo, cap));
                if count >= cap {
                    count = cap;
                    break;
                }
            }
            memo[state] = Some(count);
            count
        }
        let mut memo = vec![None; self.state_count()];
        go(self, 0, &mut memo, cap)
    }

    /// Whether the language is exactly one string.
    #[must_use]
    pub fn is_accepting_single_string(&self) -> bool {
        self.count_words(2) == 1
    }

    /// A shortest accepted string, if any.
    #[must_use]
    pub fn an_accepting_string(&self) -> Option<String> {
        // BFS over states; the automaton is trim so the first accepting
        // state found closes a shortest word
        let mut seen = vec![false; self.state_count()];
        let mut queue: std::collections::VecDeque<(u32, Vec<u8>)> =
            std::collections::VecDeque::new();
        queue.push_back((0, Vec::new()));
        seen[0] = true;
        while let Some((state, word)) = queue.pop_front() {
            if self.accepting[state as usize] {
                return Some(String::from_utf8_lossy(&word).into_owned());
            }
            for (symbol, target) in &self.transitions[state as usize] {
                if !seen[*target as usize] {
                    seen[*target as usize] = true;
                    let mut next = word.clone();
                    next.push(*symbol);
                    queue.push_back((*target, next));
                }
            }
        }
        None
    }

    /// Every accepted word when the language is finite, `None` otherwise.
    fn words_if_finite(&self) -> Option<Vec<Vec<u8>>> {
        if self.is_empty_language() {
            return Some(Vec::new());
        }
        if self.has_cycle() {
            return None;
        }
        let mut out = Vec::new();
        let mut path: Vec<u8> = Vec::new();
        fn go(auto: &StringAutomaton, state: usize, path: &mut Vec<u8>, out: &mut Vec<Vec<u8>>) {
            if auto.accepting[state] {
                out.push(path.clone());
            }
            for (symbol, target) in &auto.transitions[state] {
                path.push(*symbol);
                go(auto, *target as usize, path, out);
                path.pop();
            }
        }
        go(self, 0, &mut path, &mut out);
        Some(out)
    }

    // ------------------------------------------------------------------
    // boolean algebra

    /// Language intersection.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let mut pair_ids: hashbrown::HashMap<(u32, u32), u32> = hashbrown::HashMap::new();
        let mut pairs: Vec<(u32, u32)> = vec![(0, 0)];
        pair_ids.insert((0, 0), 0);
        let mut transitions: Vec<BTreeMap<u8, u32>> = vec![BTreeMap::new()];
        let mut accepting: Vec<bool> = vec![false];

        let mut frontier = vec![0u32];
        while let Some(id) = frontier.pop() {
            let (a, b) = pairs[id as usize];
            accepting[id as usize] =
                self.accepting[a as usize] && other.accepting[b as usize];
            for (symbol, ta) in &self.transitions[a as usize] {
                if let Some(tb) = other.transitions[b as usize].get(symbol) {
                    let key = (*ta, *tb);
                    let next = match pair_ids.get(&key) {
                        Some(&existing) => existing,
                        None => {
                            let fresh = pairs.len() as u32;
                            pair_ids.insert(key, fresh);
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
        Self::from_parts(transitions, accepting)
    }

    /// Language union.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut nfa = Nfa::new();
        let a = nfa.import(self, true);
        let b = nfa.import(other, true);
        nfa.add_start(a);
        nfa.add_start(b);
        nfa.determinize()
    }

    /// Language complement over `Σ*`.
    #[must_use]
    pub fn complement(&self) -> Self {
        // complete with a sink, then flip acceptance
        let n = self.state_count();
        let sink = n as u32;
        let mut transitions = self.transitions.clone();
        transitions.push(BTreeMap::new());
        for state in 0..=n {
            for b in 0..=255u8 {
                transitions[state].entry(b).or_insert(sink);
            }
        }
        let mut accepting: Vec<bool> = self.accepting.iter().map(|&a| !a).collect();
        accepting.push(true);
        Self::from_parts(transitions, accepting)
    }

    /// Language difference `self \ other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        self.intersect(&other.complement())
    }

    // ------------------------------------------------------------------
    // concatenation and factor languages

    /// Language concatenation.
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        let mut nfa = Nfa::new();
        let a = nfa.import(self, false);
        let b = nfa.import(other, true);
        nfa.add_start(a);
        for state in 0..self.state_count() {
            if self.accepting[state] {
                nfa.add_edge(a + state, None, b);
            }
        }
        nfa.determinize()
    }

    /// The prefixes of accepted words.
    #[must_use]
    pub fn prefixes(&self) -> Self {
        if self.is_empty_language() {
            return Self::make_phi();
        }
        // trim already removed unproductive states, so every state closes
        // some accepted word
        let mut out = self.clone();
        for a in &mut out.accepting {
            *a = true;
        }
        out
    }

    /// The suffixes of accepted words.
    #[must_use]
    pub fn suffixes(&self) -> Self {
        if self.is_empty_language() {
            return Self::make_phi();
        }
        let mut nfa = Nfa::new();
        let offset = nfa.import(self, true);
        let start = nfa.add_state();
        nfa.add_start(start);
        for state in 0..self.state_count() {
            nfa.add_edge(start, None, offset + state);
        }
        nfa.determinize()
    }

    /// The factors (contiguous substrings) of accepted words.
    #[must_use]
    pub fn sub_strings(&self) -> Self {
        self.suffixes().prefixes()
    }

    /// For every state `q`, whether the language from `q` intersects
    /// `other`: co-reachability of a jointly-accepting pair in the product.
    fn live_intersection_marks(&self, other: &Self) -> Vec<bool> {
        let n = self.state_count();
        let m = other.state_count();
        let mut good = vec![false; n * m];
        for q in 0..n {
            for s in 0..m {
                if self.accepting[q] && other.accepting[s] {
                    good[q * m + s] = true;
                }
            }
        }
        let mut changed = true;
        while changed {
            changed = false;
            for q in 0..n {
                for s in 0..m {
                    if good[q * m + s] {
                        continue;
                    }
                    for (symbol, target) in &self.transitions[q] {
                        if let Some(starget) = other.transitions[s].get(symbol) {
                            if good[*target as usize * m + *starget as usize] {
                                good[q * m + s] = true;
                                changed = true;
                                break;
                            }
                        }
                    }
                }
            }
        }
        (0..n).map(|q| good[q * m]).collect()
    }

    /// Right quotient `{ w : ∃ s ∈ suffixes, w·s ∈ self }`.
    #[must_use]
    pub fn right_quotient(&self, suffixes: &Self) -> Self {
        if self.is_empty_language() || suffixes.is_empty_language() {
            return Self::make_phi();
        }
        // a state becomes accepting when some suffix word leads it to
        // acceptance
        let accepting = self.live_intersection_marks(suffixes);
        Self::from_parts(self.transitions.clone(), accepting)
    }

    /// Left quotient `{ w : ∃ p ∈ prefixes, p·w ∈ self }`.
    #[must_use]
    pub fn left_quotient(&self, prefixes: &Self) -> Self {
        if self.is_empty_language() || prefixes.is_empty_language() {
            return Self::make_phi();
        }
        // states of self reachable under some prefix word become NFA starts
        let m = prefixes.state_count();
        let mut seen = vec![false; self.state_count() * m];
        seen[0] = true;
        let mut stack: Vec<(u32, u32)> = vec![(0, 0)];
        let mut starts: Vec<bool> = vec![false; self.state_count()];
        while let Some((q, p)) = stack.pop() {
            if prefixes.accepting[p as usize] {
                starts[q as usize] = true;
            }
            for (symbol, target) in &self.transitions[q as usize] {
                if let Some(ptarget) = prefixes.transitions[p as usize].get(symbol) {
                    let index = *target as usize * m + *ptarget as usize;
                    if !seen[index] {
                        seen[index] = true;
                        stack.push((*target, *ptarget));
                    }
                }
            }
        }
        let mut nfa = Nfa::new();
        let offset = nfa.import(self, true);
        let fresh = nfa.add_state();
        nfa.add_start(fresh);
        for (state, &is_start) in starts.iter().enumerate() {
            if is_start {
                nfa.add_edge(fresh, None, offset + state);
            }
        }
        nfa.determinize()
    }

    // ------------------------------------------------------------------
    // string predicates as refinements of the subject

    /// The accepted words that contain a word of `search`.
    #[must_use]
    pub fn contains(&self, search: &Self) -> Self {
        let any = Self::make_any_string();
        self.intersect(&any.concat(search).concat(&any))
    }

    /// The accepted words that begin with a word of `search`.
    #[must_use]
    pub fn begins(&self, search: &Self) -> Self {
        self.intersect(&search.concat(&Self::make_any_string()))
    }

    /// The accepted words that end with a word of `search`.
    #[must_use]
    pub fn ends(&self, search: &Self) -> Self {
        self.intersect(&Self::make_any_string().concat(search))
    }

    // ------------------------------------------------------------------
    // positional operations

    /// The states reachable by words of exactly `depth` symbols.
    fn layer_at(&self, depth: i64) -> Vec<u32> {
        if depth < 0 || self.is_empty_language() {
            return Vec::new();
        }
        let mut layer: Vec<u32> = vec![0];
        for _ in 0..depth {
            let mut next: Vec<u32> = Vec::new();
            let mut seen = vec![false; self.state_count()];
            for state in layer {
                for target in self.transitions[state as usize].values() {
                    if !seen[*target as usize] {
                        seen[*target as usize] = true;
                        next.push(*target);
                    }
                }
            }
            if next.is_empty() {
                return Vec::new();
            }
            layer = next;
        }
        layer
    }

    /// The single characters that occur at `index` in accepted words.
    #[must_use]
    pub fn char_at(&self, index: i64) -> Self {
        let mut symbols: std::collections::BTreeSet<u8> = std::collections::BTreeSet::new();
        for state in self.layer_at(index) {
            for symbol in self.transitions[state as usize].keys() {
                symbols.insert(*symbol);
            }
        }
        if symbols.is_empty() {
            return Self::make_phi();
        }
        let mut edges = BTreeMap::new();
        for symbol in symbols {
            edges.insert(symbol, 1u32);
        }
        Self::from_parts(vec![edges, BTreeMap::new()], vec![false, true])
    }

    /// The suffixes starting at `start` in accepted words.
    #[must_use]
    pub fn sub_string_from(&self, start: i64) -> Self {
        let layer = self.layer_at(start);
        if layer.is_empty() {
            return Self::make_phi();
        }
        let mut nfa = Nfa::new();
        let offset = nfa.import(self, true);
        let fresh = nfa.add_state();
        nfa.add_start(fresh);
        for state in layer {
            nfa.add_edge(fresh, None, offset + state as usize);
        }
        nfa.determinize()
    }

    /// The slices `w[start..end]` of accepted words `w` with `|w| >= end`.
    #[must_use]
    pub fn sub_string_range(&self, start: i64, end: i64) -> Self {
        if start < 0 || end < start {
            return Self::make_phi();
        }
        let layer = self.layer_at(start);
        if layer.is_empty() {
            return Self::make_phi();
        }
        let width = (end - start) as usize;
        // product of the automaton with a step counter; accept after
        // exactly `width` steps from any start-layer state
        let mut nfa = Nfa::new();
        let mut ids: hashbrown::HashMap<(u32, usize), usize> = hashbrown::HashMap::new();
        let fresh = nfa.add_state();
        nfa.add_start(fresh);
        let mut frontier: Vec<(u32, usize)> = Vec::new();
        for state in layer {
            let id = *ids.entry((state, 0)).or_insert_with(|| nfa.add_state());
            nfa.add_edge(fresh, None, id);
            frontier.push((state, 0));
        }
        while let Some((state, step)) = frontier.pop() {
            let id = ids[&(state, step)];
            if step == width {
                nfa.set_accepting(id);
                continue;
            }
            let targets: Vec<(u8, u32)> = self.transitions[state as usize]
                .iter()
                .map(|(b, t)| (*b, *t))
                .collect();
            for (symbol, target) in targets {
                let key = (target, step + 1);
                let next = match ids.get(&key) {
                    Some(&existing) => existing,
                    None => {
                        let created = nfa.add_state();
                        ids.insert(key, created);
                        frontier.push(key);
                        created
                    }
                };
                nfa.add_edge(id, Some(symbol), next);
            }
        }
        nfa.determinize()
    }

    /// The slices `w[start..end]` for every end index in `ends`. Exact when
    /// the end-index set is finite, otherwise over-approximated by every
    /// slice starting at `start`.
    #[must_use]
    pub fn sub_string_range_upto(&self, start: i64, ends: &IntAutomaton) -> Self {
        match ends.finite_values() {
            Some(values) => {
                let mut result = Self::make_phi();
                for end in values {
                    if end >= start {
                        result = result.union(&self.sub_string_range(start, end));
                    }
                }
                result
            }
            None => self.sub_string_from(start).prefixes(),
        }
    }

    /// The suffixes beginning at an occurrence of `search`.
    #[must_use]
    pub fn sub_string_first_of(&self, search: &Self) -> Self {
        self.suffixes().begins(search)
    }

    /// The suffixes beginning at an occurrence of `search`, anchored at the
    /// last occurrence. Shares the first-occurrence approximation.
    #[must_use]
    pub fn sub_string_last_of(&self, search: &Self) -> Self {
        self.suffixes().begins(search)
    }

    // ------------------------------------------------------------------
    // character mappings

    /// Relabel every transition through `f`; merged labels make the result
    /// nondeterministic, so it goes back through the subset construction.
    fn map_bytes(&self, f: impl Fn(u8) -> u8) -> Self {
        let mut nfa = Nfa::new();
        for state in 0..self.state_count() {
            let id = nfa.add_state();
            debug_assert_eq!(id, state);
            if self.accepting[state] {
                nfa.set_accepting(state);
            }
        }
        for state in 0..self.state_count() {
            for (symbol, target) in &self.transitions[state] {
                nfa.add_edge(state, Some(f(*symbol)), *target as usize);
            }
        }
        nfa.add_start(0);
        nfa.determinize()
    }

    /// The images of accepted words under ASCII uppercasing.
    #[must_use]
    pub fn to_upper_case(&self) -> Self {
        self.map_bytes(|b| b.to_ascii_uppercase())
    }

    /// The images of accepted words under ASCII lowercasing.
    #[must_use]
    pub fn to_lower_case(&self) -> Self {
        self.map_bytes(|b| b.to_ascii_lowercase())
    }

    /// The images of accepted words with leading and trailing spaces removed.
    #[must_use]
    pub fn trim(&self) -> Self {
        if self.is_empty_language() {
            return Self::make_phi();
        }
        const SPACE: u8 = b' ';
        // new starts: states reachable from the start by spaces only;
        // new accepting: states from which spaces alone reach acceptance
        let mut start_closure = vec![false; self.state_count()];
        start_closure[0] = true;
        let mut stack = vec![0u32];
        while let Some(state) = stack.pop() {
            if let Some(target) = self.transitions[state as usize].get(&SPACE) {
                if !start_closure[*target as usize] {
                    start_closure[*target as usize] = true;
                    stack.push(*target);
                }
            }
        }
        let mut accept_closure: Vec<bool> = self.accepting.clone();
        let mut changed = true;
        while changed {
            changed = false;
            for state in 0..self.state_count() {
                if accept_closure[state] {
                    continue;
                }
                if let Some(target) = self.transitions[state].get(&SPACE) {
                    if accept_closure[*target as usize] {
                        accept_closure[state] = true;
                        changed = true;
                    }
                }
            }
        }
        let mut nfa = Nfa::new();
        let offset = nfa.import(self, false);
        for (state, &a) in accept_closure.iter().enumerate() {
            if a {
                nfa.set_accepting(offset + state);
            }
        }
        let fresh = nfa.add_state();
        nfa.add_start(fresh);
        for (state, &s) in start_closure.iter().enumerate() {
            if s {
                nfa.add_edge(fresh, None, offset + state);
            }
        }
        let stripped = nfa.determinize();
        // a trimmed result neither starts nor ends with a space
        let space = Self::make_string(" ");
        let any = Self::make_any_string();
        let edge_spaces = space.concat(&any).union(&any.concat(&space));
        stripped.difference(&edge_spaces)
    }

    /// Replacement of `search` by `replacement` inside the subject.
    /// Exact when all three languages are singletons; otherwise the result
    /// over-approximates to `Σ*`.
    #[must_use]
    pub fn replace(&self, search: &Self, replacement: &Self) -> Self {
        if self.is_empty_language() {
            return Self::make_phi();
        }
        let subject = self.single_word();
        let needle = search.single_word();
        let rep = replacement.single_word();
        match (subject, needle, rep) {
            (Some(s), Some(n), Some(r)) if !n.is_empty() => {
                Self::make_string(&s.replace(&n, &r))
            }
            _ => {
                warn!("replace over non-singleton languages, over-approximating");
                Self::make_any_string()
            }
        }
    }

    fn single_word(&self) -> Option<String> {
        if self.is_accepting_single_string() {
            self.an_accepting_string()
        } else {
            None
        }
    }

    // ------------------------------------------------------------------
    // integer views

    /// The depths at which a marked state is reachable. The reachable state
    /// subsets form an eventually periodic sequence, so the depth set is
    /// semilinear and computed exactly.
    fn depth_set(&self, marked: impl Fn(usize) -> bool) -> SemilinearSet {
        let mut seen: hashbrown::HashMap<Vec<u32>, usize> = hashbrown::HashMap::new();
        let mut member_at: Vec<bool> = Vec::new();
        let mut subset: Vec<u32> = vec![0];
        loop {
            if let Some(&first) = seen.get(&subset) {
                let threshold = first as u64;
                let period = (member_at.len() - first) as u64;
                let mut initial = std::collections::BTreeSet::new();
                for (i, &m) in member_at.iter().enumerate().take(first) {
                    if m {
                        initial.insert(i as u64);
                    }
                }
                let mut residues = std::collections::BTreeSet::new();
                for (i, &m) in member_at.iter().enumerate().skip(first) {
                    if m {
                        residues.insert((i as u64) % period);
                    }
                }
                return SemilinearSet::from_parts(initial, threshold, period, residues);
            }
            seen.insert(subset.clone(), member_at.len());
            member_at.push(subset.iter().any(|&s| marked(s as usize)));
            let mut next: std::collections::BTreeSet<u32> = std::collections::BTreeSet::new();
            for &state in &subset {
                for target in self.transitions[state as usize].values() {
                    next.insert(*target);
                }
            }
            if next.is_empty() {
                // every path ends: finitely many depths
                let mut initial = std::collections::BTreeSet::new();
                for (i, &m) in member_at.iter().enumerate() {
                    if m {
                        initial.insert(i as u64);
                    }
                }
                return SemilinearSet::finite(initial);
            }
            subset = next.into_iter().collect();
        }
    }

    /// The set of lengths of accepted words.
    #[must_use]
    pub fn length(&self) -> IntAutomaton {
        if self.is_empty_language() {
            return IntAutomaton::empty();
        }
        let set = self.depth_set(|state| self.accepting[state]);
        IntAutomaton::from_set(set, false)
    }

    /// The possible start positions of an occurrence of `search` in
    /// accepted words, with the `-1` sentinel when some accepted word has no
    /// occurrence. The position set over-approximates "first occurrence".
    #[must_use]
    pub fn index_of(&self, search: &Self) -> IntAutomaton {
        if self.is_empty_language() {
            return IntAutomaton::empty();
        }
        if search.is_empty_language() {
            return IntAutomaton::from_int(-1);
        }
        let has_minus_one = !self.difference(&self.contains(search)).is_empty_language();
        let pattern = search.concat(&Self::make_any_string());
        let marks = self.live_intersection_marks(&pattern);
        let positions = self.depth_set(|state| marks[state]);
        IntAutomaton::from_set(positions, has_minus_one)
    }

    /// The possible start positions of the last occurrence of `search`.
    /// Shares the occurrence-position over-approximation of [`Self::index_of`].
    #[must_use]
    pub fn last_index_of(&self, search: &Self) -> IntAutomaton {
        self.index_of(search)
    }

    /// The integers denoted by accepted decimal literals. Parse failure of a
    /// non-numeric word is the `-1` sentinel.
    #[must_use]
    pub fn parse_to_int_automaton(&self) -> IntAutomaton {
        let digits = {
            let mut edges = BTreeMap::new();
            for b in b'0'..=b'9' {
                edges.insert(b, 1u32);
            }
            let mut loop_edges = BTreeMap::new();
            for b in b'0'..=b'9' {
                loop_edges.insert(b, 1u32);
            }
            Self::from_parts(vec![edges, loop_edges], vec![false, true])
        };
        let numeric = self.intersect(&digits);
        let has_minus_one = !self.difference(&digits).is_empty_language();
        if numeric.is_empty_language() {
            return IntAutomaton::from_set(SemilinearSet::empty(), has_minus_one);
        }
        match numeric.words_if_finite() {
            Some(words) => {
                let mut values = std::collections::BTreeSet::new();
                let mut overflowed = false;
                for word in words {
                    if word.len() > MAX_PARSE_DIGITS {
                        overflowed = true;
                        continue;
                    }
                    let text = String::from_utf8_lossy(&word).into_owned();
                    if let Ok(v) = text.parse::<u64>() {
                        values.insert(v);
                    }
                }
                if overflowed {
                    warn!("numeric literals beyond {MAX_PARSE_DIGITS} digits, over-approximating");
                    IntAutomaton::from_set(SemilinearSet::any_natural(), has_minus_one)
                } else {
                    IntAutomaton::from_set(SemilinearSet::finite(values), has_minus_one)
                }
            }
            None => IntAutomaton::from_set(SemilinearSet::any_natural(), has_minus_one),
        }
    }

    /// The accepted words whose length lies in `lengths`.
    #[must_use]
    pub fn restrict_length_to(&self, lengths: &IntAutomaton) -> Self {
        self.intersect(&Self::any_string_with_length_in(lengths.set()))
    }

    /// `{ w : |w| ∈ set }`.
    pub(crate) fn any_string_with_length_in(set: &SemilinearSet) -> Self {
        if set.is_empty() {
            return Self::make_phi();
        }
        let (initial, threshold, period, residues) = set.parts();
        if period == 0 {
            // finite set: a chain of states up to the maximum
            let max = initial.iter().max().copied().unwrap_or(0);
            let n = (max + 1) as usize;
            let mut transitions: Vec<BTreeMap<u8, u32>> = Vec::with_capacity(n);
            let mut accepting = vec![false; n];
            for k in 0..n {
                let mut edges = BTreeMap::new();
                if k + 1 < n {
                    for b in 0..=255u8 {
                        edges.insert(b, (k + 1) as u32);
                    }
                }
                transitions.push(edges);
                accepting[k] = initial.contains(&(k as u64));
            }
            return Self::from_parts(transitions, accepting);
        }
        // chain up to the threshold, then a cycle of one period
        let chain_len = (threshold + period) as usize;
        let mut transitions: Vec<BTreeMap<u8, u32>> = Vec::with_capacity(chain_len);
        let mut accepting = vec![false; chain_len];
        for k in 0..chain_len {
            let target = if k + 1 < chain_len {
                (k + 1) as u32
            } else {
                threshold as u32
            };
            let mut edges = BTreeMap::new();
            for b in 0..=255u8 {
                edges.insert(b, target);
            }
            transitions.push(edges);
            accepting[k] = if (k as u64) < threshold {
                initial.contains(&(k as u64))
            } else {
                residues.contains(&((k as u64 - threshold) % period))
            };
        }
        Self::from_parts(transitions, accepting)
    }
}

impl std::fmt::Display for StringAutomaton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "StringAutomaton({} states{})",
            self.state_count(),
            if self.is_empty_language() { ", empty" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singleton_accepts_exactly_its_word() {
        let auto = StringAutomaton::make_string("foo");
        assert!(auto.accepts("foo"));
        assert!(!auto.accepts("fo"));
        assert!(!auto.accepts("fooo"));
        assert!(auto.is_accepting_single_string());
        assert_eq!(auto.an_accepting_string().as_deref(), Some("foo"));
    }

    #[test]
    fn phi_and_any_string() {
        let phi = StringAutomaton::make_phi();
        assert!(phi.is_empty_language());
        let any = StringAutomaton::make_any_string();
        assert!(any.accepts(""));
        assert!(any.accepts("anything at all"));
    }

    #[test]
    fn intersect_and_difference() {
        let a = StringAutomaton::make_string("abc");
        let b = StringAutomaton::make_regex("ab.").unwrap();
        let both = a.intersect(&b);
        assert!(both.accepts("abc"));
        assert!(both.is_accepting_single_string());
        let gone = a.difference(&b);
        assert!(gone.is_empty_language());
    }

    #[test]
    fn complement_flips_membership() {
        let a = StringAutomaton::make_string("x");
        let c = a.complement();
        assert!(!c.accepts("x"));
        assert!(c.accepts(""));
        assert!(c.accepts("xx"));
    }

    #[test]
    fn concat_joins_languages() {
        let hello = StringAutomaton::make_string("hello");
        let world = StringAutomaton::make_string("world");
        let joined = hello.concat(&world);
        assert!(joined.accepts("helloworld"));
        assert!(!joined.accepts("hello"));
    }

    #[test]
    fn contains_begins_ends() {
        let any = StringAutomaton::make_any_string();
        let bad = StringAutomaton::make_string("bad");
        let with_bad = any.contains(&bad);
        assert!(with_bad.accepts("sobad"));
        assert!(with_bad.accepts("bad"));
        assert!(!with_bad.accepts("good"));
        let avoiding = any.difference(&with_bad);
        assert!(avoiding.accepts("good"));
        assert!(!avoiding.accepts("xbady"));

        let pre = StringAutomaton::make_string("ab");
        assert!(any.begins(&pre).accepts("abc"));
        assert!(!any.begins(&pre).accepts("ba"));
        assert!(any.ends(&pre).accepts("cab"));
        assert!(!any.ends(&pre).accepts("abc"));
    }

    #[test]
    fn factor_languages() {
        let auto = StringAutomaton::make_string("abc");
        let prefixes = auto.prefixes();
        for p in ["", "a", "ab", "abc"] {
            assert!(prefixes.accepts(p), "missing prefix {p:?}");
        }
        assert!(!prefixes.accepts("b"));
        let suffixes = auto.suffixes();
        for s in ["", "c", "bc", "abc"] {
            assert!(suffixes.accepts(s), "missing suffix {s:?}");
        }
        assert!(!suffixes.accepts("ab"));
        let factors = auto.sub_strings();
        assert!(factors.accepts("b"));
        assert!(!factors.accepts("ac"));
    }

    #[test]
    fn quotients() {
        let hello = StringAutomaton::make_string("helloworld");
        let world = StringAutomaton::make_string("world");
        let left_part = hello.right_quotient(&world);
        assert!(left_part.accepts("hello"));
        assert!(!left_part.accepts("helloworld"));
        let right_part = hello.left_quotient(&StringAutomaton::make_string("hello"));
        assert!(right_part.accepts("world"));
        assert!(!right_part.accepts("hello"));

        // quotient by a language, not just a word
        let subject = StringAutomaton::make_regex("ab|aab").unwrap();
        let b = StringAutomaton::make_string("b");
        let stems = subject.right_quotient(&b);
        assert!(stems.accepts("a"));
        assert!(stems.accepts("aa"));
        assert!(!stems.accepts("ab"));
    }

    #[test]
    fn char_at_and_ranges() {
        let auto = StringAutomaton::make_regex("ab|cd").unwrap();
        let first = auto.char_at(0);
        assert!(first.accepts("a"));
        assert!(first.accepts("c"));
        assert!(!first.accepts("b"));
        let second = auto.char_at(1);
        assert!(second.accepts("b"));
        assert!(second.accepts("d"));
        assert!(auto.char_at(2).is_empty_language());

        let hello = StringAutomaton::make_string("hello");
        let slice = hello.sub_string_range(1, 4);
        assert!(slice.accepts("ell"));
        assert!(slice.is_accepting_single_string());
        let tail = hello.sub_string_from(3);
        assert!(tail.accepts("lo"));
    }

    #[test]
    fn case_mapping_and_trim() {
        let mixed = StringAutomaton::make_string("AbC");
        assert!(mixed.to_upper_case().accepts("ABC"));
        assert!(mixed.to_lower_case().accepts("abc"));

        let padded = StringAutomaton::make_string("  hi ");
        let trimmed = padded.trim();
        assert!(trimmed.accepts("hi"));
        assert!(!trimmed.accepts("  hi "));
    }

    #[test]
    fn replace_on_singletons() {
        let subject = StringAutomaton::make_string("aXbXc");
        let search = StringAutomaton::make_string("X");
        let rep = StringAutomaton::make_string("-");
        let replaced = subject.replace(&search, &rep);
        assert!(replaced.accepts("a-b-c"));
        assert!(replaced.is_accepting_single_string());
    }

    #[test]
    fn length_of_regular_language() {
        let auto = StringAutomaton::make_regex("a*b").unwrap();
        let lengths = auto.length();
        assert!(!lengths.contains(0));
        assert!(lengths.contains(1));
        assert!(lengths.contains(2));
        assert!(lengths.contains(100));
        assert!(!lengths.has_negative_1());

        let fixed = StringAutomaton::make_string("hello").length();
        assert_eq!(fixed.an_accepting_int(), Some(5));
        assert!(fixed.is_accepting_single_int());
    }

    #[test]
    fn restrict_length() {
        let auto = StringAutomaton::make_regex("a*b").unwrap();
        let three = StringAutomaton::make_string("aab").length();
        let restricted = auto.restrict_length_to(&three);
        assert!(restricted.accepts("aab"));
        assert!(!restricted.accepts("ab"));
        assert!(restricted.is_accepting_single_string());
    }

    #[test]
    fn index_of_positions_and_sentinel() {
        let any = StringAutomaton::make_any_string();
        let x = StringAutomaton::make_string("x");
        let indices = any.index_of(&x);
        assert!(indices.has_negative_1());
        assert!(indices.contains(0));
        assert!(indices.contains(17));

        let fixed = StringAutomaton::make_string("abxcd");
        let indices = fixed.index_of(&x);
        assert!(!indices.has_negative_1());
        assert!(indices.contains(2));
        assert!(!indices.contains(0));
        assert!(!indices.contains(3));

        let absent = StringAutomaton::make_string("abcd").index_of(&x);
        assert!(absent.has_negative_1());
        assert_eq!(absent.an_accepting_int(), Some(-1));
        assert!(absent.is_accepting_single_int());
    }

    #[test]
    fn parse_to_int() {
        let nums = StringAutomaton::make_regex("12|345").unwrap();
        let parsed = nums.parse_to_int_automaton();
        assert!(parsed.contains(12));
        assert!(parsed.contains(345));
        assert!(!parsed.contains(13));
        assert!(!parsed.has_negative_1());

        let junk = StringAutomaton::make_string("abc").parse_to_int_automaton();
        assert!(junk.has_negative_1());
        assert_eq!(junk.an_accepting_int(), Some(-1));
    }
}
