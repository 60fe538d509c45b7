//! Relational string component solver.
//!
//! Started once per component. Variable-variable string equalities build
//! equivalence classes (the representative is the smallest member name, and
//! the class rides one track of a multi-track automaton); variable-constant
//! and variable-regex equalities refine the class language. Conjuncts the
//! engine takes over get multi-track term values, which the evaluator later
//! collapses to their satisfiability.

use hashbrown::HashMap;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use strand_automata::{MultiTrackAutomaton, StringAutomaton, StringRelation};
use strand_core::{Constant, Sort, TermData, TermId, TermStore};

use crate::error::Result;
use crate::symbol_table::SymbolTable;
use crate::value::Value;

/// Solver for the relational string conjuncts of a component.
#[derive(Debug, Default)]
pub struct StringRelationSolver {
    representative_of: HashMap<String, String>,
    class_values: HashMap<String, MultiTrackAutomaton>,
    term_classes: HashMap<TermId, String>,
}

impl StringRelationSolver {
    /// A fresh engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the equivalence classes of `and_node` and solve them.
    pub fn start(
        &mut self,
        store: &TermStore,
        symbol_table: &mut SymbolTable,
        and_node: TermId,
    ) -> Result<()> {
        let TermData::And(conjuncts) = store.get(and_node) else {
            return Ok(());
        };

        // first pass: fuse variables related by equality
        let mut parent: HashMap<String, String> = HashMap::new();
        let mut fused: Vec<TermId> = Vec::new();
        for &conjunct in conjuncts {
            if let TermData::Eq(left, right) = store.get(conjunct) {
                if let (Some(a), Some(b)) = (
                    string_variable(store, symbol_table, *left),
                    string_variable(store, symbol_table, *right),
                ) {
                    union(&mut parent, a, b);
                    fused.push(conjunct);
                }
            }
        }
        if parent.is_empty() {
            return Ok(());
        }

        // classes, with the smallest member as representative
        let mut members_of: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let names: Vec<String> = parent.keys().cloned().collect();
        for name in names {
            let root = find(&mut parent, name.clone());
            members_of.entry(root).or_default().insert(name);
        }
        let scope = symbol_table.top_scope();
        for members in members_of.values() {
            let representative = members.iter().next().expect("class has a member").clone();
            for member in members {
                self.representative_of
                    .insert(member.clone(), representative.clone());
                symbol_table.set_representative(scope, member.clone(), representative.clone());
            }
            let trackmap: BTreeMap<String, usize> = members
                .iter()
                .enumerate()
                .map(|(track, name)| (name.clone(), track))
                .collect();
            // the class language starts from the members' current values
            let mut language = StringAutomaton::make_any_string();
            for member in members {
                if let Some(current) = symbol_table
                    .get_value(member)
                    .and_then(Value::as_string_automaton)
                {
                    language = language.intersect(current);
                }
            }
            debug!("string class {members:?} on track of {representative}");
            self.class_values.insert(
                representative,
                MultiTrackAutomaton::new(language, StringRelation::new(trackmap)),
            );
        }

        // second pass: constant and regex conjuncts refine their class
        let mut handled: Vec<(TermId, String)> = Vec::new();
        for &conjunct in conjuncts {
            if let TermData::Eq(left, right) = store.get(conjunct) {
                let (variable, literal) = match (
                    string_variable(store, symbol_table, *left),
                    string_variable(store, symbol_table, *right),
                ) {
                    (Some(_), Some(_)) => continue,
                    (Some(v), None) => (v, *right),
                    (None, Some(v)) => (v, *left),
                    (None, None) => continue,
                };
                let Some(representative) = self.representative_of.get(&variable).cloned() else {
                    continue;
                };
                let Some(constant) = literal_automaton(store, literal)? else {
                    continue;
                };
                let class = self
                    .class_values
                    .get_mut(&representative)
                    .expect("tracked class has a value");
                *class = class.intersect_single_track(&constant);
                handled.push((conjunct, representative));
            }
        }

        for conjunct in fused {
            if let TermData::Eq(left, _) = store.get(conjunct) {
                if let Some(variable) = string_variable(store, symbol_table, *left) {
                    let representative = self.representative_of[&variable].clone();
                    handled.push((conjunct, representative));
                }
            }
        }
        for (conjunct, representative) in handled {
            self.term_classes.insert(conjunct, representative);
        }
        Ok(())
    }

    /// Whether the engine tracks this variable.
    #[must_use]
    pub fn is_tracked(&self, name: &str) -> bool {
        self.representative_of.contains_key(name)
    }

    /// The relational value of a tracked variable.
    #[must_use]
    pub fn get_variable_value(&self, name: &str) -> Option<Value> {
        let representative = self.representative_of.get(name)?;
        self.class_values
            .get(representative)
            .map(|class| Value::MultiTrack(class.clone()))
    }

    /// Refine a tracked variable's class with a new value. Returns whether
    /// the variable is tracked (and the refinement applied).
    pub fn update_variable_value(&mut self, name: &str, value: &Value) -> bool {
        let Some(representative) = self.representative_of.get(name) else {
            return false;
        };
        let Some(language) = value.as_string_automaton() else {
            return false;
        };
        let class = self
            .class_values
            .get_mut(representative)
            .expect("tracked class has a value");
        *class = class.intersect_single_track(language);
        true
    }

    /// The value of a conjunct this engine took over: the current (not the
    /// start-time) refinement of the conjunct's class. Callers own the
    /// returned clone.
    #[must_use]
    pub fn get_term_value(&self, term: TermId) -> Option<Value> {
        let representative = self.term_classes.get(&term)?;
        self.class_values
            .get(representative)
            .map(|class| Value::MultiTrack(class.clone()))
    }
}

fn string_variable(
    store: &TermStore,
    symbol_table: &SymbolTable,
    term: TermId,
) -> Option<String> {
    match store.get(term) {
        TermData::Variable(name) if symbol_table.sort_of(name) == Some(Sort::Str) => {
            Some(name.clone())
        }
        _ => None,
    }
}

fn literal_automaton(store: &TermStore, term: TermId) -> Result<Option<StringAutomaton>> {
    match store.get(term) {
        TermData::Constant(Constant::Str(s)) => Ok(Some(StringAutomaton::make_string(s))),
        TermData::Constant(Constant::Regex(pattern)) => {
            Ok(Some(StringAutomaton::make_regex(pattern)?))
        }
        _ => Ok(None),
    }
}

fn find(parent: &mut HashMap<String, String>, name: String) -> String {
    let next = parent
        .entry(name.clone())
        .or_insert_with(|| name.clone())
        .clone();
    if next == name {
        return name;
    }
    let root = find(parent, next);
    parent.insert(name, root.clone());
    root
}

fn union(parent: &mut HashMap<String, String>, a: String, b: String) {
    let ra = find(parent, a);
    let rb = find(parent, b);
    if ra != rb {
        parent.insert(ra, rb);
    }
}
