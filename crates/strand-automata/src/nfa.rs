//! Thompson NFA scratch space.
//!
//! Builders assemble their result here and hand it to [`Nfa::determinize`],
//! which runs the subset construction and trims. Not part of the public API.

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap;

use crate::string_automaton::StringAutomaton;

/// An epsilon-NFA over the byte alphabet.
#[derive(Debug, Clone, Default)]
pub(crate) struct Nfa {
    /// Per-state edge list; `None` labels are epsilon moves.
    edges: Vec<Vec<(Option<u8>, usize)>>,
    accepting: Vec<bool>,
    starts: Vec<usize>,
}

impl Nfa {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_state(&mut self) -> usize {
        self.edges.push(Vec::new());
        self.accepting.push(false);
        self.edges.len() - 1
    }

    pub(crate) fn add_edge(&mut self, from: usize, label: Option<u8>, to: usize) {
        self.edges[from].push((label, to));
    }

    pub(crate) fn add_start(&mut self, state: usize) {
        self.starts.push(state);
    }

    pub(crate) fn set_accepting(&mut self, state: usize) {
        self.accepting[state] = true;
    }

    /// Import every state and transition of a DFA; returns the offset of its
    /// start state. Acceptance is carried over only when `keep_accepting`.
    pub(crate) fn import(&mut self, dfa: &StringAutomaton, keep_accepting: bool) -> usize {
        let offset = self.edges.len();
        for state in 0..dfa.state_count() {
            self.add_state();
            if keep_accepting && dfa.is_accepting_state(state) {
                self.accepting[offset + state] = true;
            }
        }
        for state in 0..dfa.state_count() {
            for (symbol, target) in dfa.transitions_from(state) {
                self.edges[offset + state].push((Some(symbol), offset + *target as usize));
            }
        }
        offset
    }

    fn epsilon_closure(&self, set: &mut BTreeSet<usize>) {
        let mut stack: Vec<usize> = set.iter().copied().collect();
        while let Some(state) = stack.pop() {
            for (label, target) in &self.edges[state] {
                if label.is_none() && set.insert(*target) {
                    stack.push(*target);
                }
            }
        }
    }

    /// Subset construction; the result is trimmed.
    pub(crate) fn determinize(&self) -> StringAutomaton {
        let mut initial: BTreeSet<usize> = self.starts.iter().copied().collect();
        self.epsilon_closure(&mut initial);

        let mut subset_ids: HashMap<Vec<usize>, u32> = HashMap::new();
        let mut subsets: Vec<BTreeSet<usize>> = Vec::new();
        let mut transitions: Vec<BTreeMap<u8, u32>> = Vec::new();
        let mut accepting: Vec<bool> = Vec::new();

        let initial_key: Vec<usize> = initial.iter().copied().collect();
        subset_ids.insert(initial_key, 0);
        subsets.push(initial);
        transitions.push(BTreeMap::new());
        accepting.push(false);

        let mut frontier = vec![0u32];
        while let Some(id) = frontier.pop() {
            let subset = subsets[id as usize].clone();
            accepting[id as usize] = subset.iter().any(|&s| self.accepting[s]);

            let mut by_symbol: BTreeMap<u8, BTreeSet<usize>> = BTreeMap::new();
            for &state in &subset {
                for (label, target) in &self.edges[state] {
                    if let Some(symbol) = label {
                        by_symbol.entry(*symbol).or_default().insert(*target);
                    }
                }
            }
            for (symbol, mut targets) in by_symbol {
                self.epsilon_closure(&mut targets);
                let key: Vec<usize> = targets.iter().copied().collect();
                let next = match subset_ids.get(&key) {
                    Some(&existing) => existing,
                    None => {
                        let fresh = subsets.len() as u32;
                        subset_ids.insert(key, fresh);
                        subsets.push(targets);
                        transitions.push(BTreeMap::new());
                        accepting.push(false);
                        frontier.push(fresh);
                        fresh
                    }
                };
                transitions[id as usize].insert(symbol, next);
            }
        }

        StringAutomaton::from_parts(transitions, accepting)
    }
}
