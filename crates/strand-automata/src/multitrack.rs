//! Relational string automata.
//!
//! A multi-track automaton relates several string variables at once: each
//! variable owns a track of the tuple alphabet. The relational engine fuses
//! variables that are forced equal onto their representative's track, so the
//! relation realized here is aligned equality: every mapped variable carries
//! the same word, drawn from one track language. The [`StringRelation`]
//! summary records which variable sits on which track.

use std::collections::BTreeMap;

use crate::string_automaton::StringAutomaton;

/// Variable name to track index.
pub type VariableTrackMap = BTreeMap<String, usize>;

/// Summary of the relation a multi-track automaton encodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringRelation {
    trackmap: VariableTrackMap,
}

impl StringRelation {
    /// A relation over the given tracks.
    #[must_use]
    pub fn new(trackmap: VariableTrackMap) -> Self {
        Self { trackmap }
    }

    /// The track map.
    #[must_use]
    pub fn variable_trackmap(&self) -> &VariableTrackMap {
        &self.trackmap
    }

    /// Replace the track map.
    pub fn set_variable_trackmap(&mut self, trackmap: VariableTrackMap) {
        self.trackmap = trackmap;
    }

    /// The track a variable rides on.
    #[must_use]
    pub fn track_of(&self, name: &str) -> Option<usize> {
        self.trackmap.get(name).copied()
    }

    /// Whether the variable participates in the relation.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.trackmap.contains_key(name)
    }
}

/// A relational constraint over several string variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiTrackAutomaton {
    dfa: StringAutomaton,
    relation: StringRelation,
}

impl MultiTrackAutomaton {
    /// Wrap a track language and its relation summary.
    #[must_use]
    pub fn new(dfa: StringAutomaton, relation: StringRelation) -> Self {
        Self { dfa, relation }
    }

    /// The aligned track language.
    #[must_use]
    pub fn language(&self) -> &StringAutomaton {
        &self.dfa
    }

    /// The relation summary.
    #[must_use]
    pub fn relation(&self) -> &StringRelation {
        &self.relation
    }

    /// Mutable access to the relation summary. Callers refreshing a track
    /// map clone the whole value first, so engine-owned automata are never
    /// aliased.
    pub fn relation_mut(&mut self) -> &mut StringRelation {
        &mut self.relation
    }

    /// Whether any tuple satisfies the relation.
    #[must_use]
    pub fn is_satisfiable(&self) -> bool {
        !self.dfa.is_empty_language()
    }

    /// The single-track value of a participating variable.
    #[must_use]
    pub fn value_of(&self, name: &str) -> Option<StringAutomaton> {
        self.relation.contains(name).then(|| self.dfa.clone())
    }

    /// Intersect with another relation; the track maps merge.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        let mut trackmap = self.relation.trackmap.clone();
        for (name, track) in &other.relation.trackmap {
            trackmap.entry(name.clone()).or_insert(*track);
        }
        Self {
            dfa: self.dfa.intersect(&other.dfa),
            relation: StringRelation::new(trackmap),
        }
    }

    /// Intersect the track language with a single-track constraint.
    #[must_use]
    pub fn intersect_single_track(&self, other: &StringAutomaton) -> Self {
        Self {
            dfa: self.dfa.intersect(other),
            relation: self.relation.clone(),
        }
    }

    /// Difference against a single-track language.
    #[must_use]
    pub fn difference_single_track(&self, other: &StringAutomaton) -> Self {
        Self {
            dfa: self.dfa.difference(other),
            relation: self.relation.clone(),
        }
    }
}
