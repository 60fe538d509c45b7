//! Refinement of variable values from recorded paths.
//!
//! After a satisfiable non-disjunctive sub-formula, the evaluator hands over
//! the recorded variable paths (leaf to root) together with the term-value
//! map. For each path this component finds the deepest ancestor holding a
//! non-Boolean domain value, then walks back down toward the variable leaf,
//! inverting one operator per step: the refined set of child values is the
//! set that could have contributed to the parent's already-computed value.
//! At the leaf the variable's symbol-table entry shrinks to the intersection
//! of its previous value and the derived context. Operators with no sound
//! inversion stop the walk, leaving the variable unchanged.

use hashbrown::HashMap;
use tracing::debug;

use strand_automata::StringAutomaton;
use strand_core::{TermData, TermId, TermStore};

use crate::error::Result;
use crate::symbol_table::SymbolTable;
use crate::value::Value;

/// One refinement pass over the recorded variable paths.
pub struct VariableValueComputer<'a> {
    store: &'a TermStore,
    symbol_table: &'a mut SymbolTable,
    paths: &'a [Vec<TermId>],
    term_values: &'a HashMap<TermId, Value>,
}

impl<'a> VariableValueComputer<'a> {
    /// Bind a pass to its inputs.
    pub fn new(
        store: &'a TermStore,
        symbol_table: &'a mut SymbolTable,
        paths: &'a [Vec<TermId>],
        term_values: &'a HashMap<TermId, Value>,
    ) -> Self {
        Self {
            store,
            symbol_table,
            paths,
            term_values,
        }
    }

    /// Tighten the symbol table in place. Returns whether every refined
    /// variable still has a satisfiable value; a `false` means the paths
    /// proved the enclosing sub-formula unsatisfiable.
    pub fn start(mut self) -> Result<bool> {
        let mut still_satisfiable = true;
        for path in self.paths {
            still_satisfiable = self.refine_path(path)? && still_satisfiable;
        }
        Ok(still_satisfiable)
    }

    fn refine_path(&mut self, path: &[TermId]) -> Result<bool> {
        let Some((&leaf, ancestors)) = path.split_first() else {
            return Ok(true);
        };
        let TermData::Variable(name) = self.store.get(leaf) else {
            return Ok(true);
        };
        let name = name.clone();

        // deepest ancestor with a non-Boolean domain value anchors the walk
        let mut anchor = None;
        for (index, node) in ancestors.iter().enumerate().rev() {
            match self.term_values.get(node) {
                Some(Value::Bool(_)) | None => continue,
                Some(value) => {
                    anchor = Some((index, value.clone()));
                    break;
                }
            }
        }
        let Some((anchor_index, mut context)) = anchor else {
            return Ok(true);
        };

        // invert operator by operator back down to the leaf
        for step in (0..=anchor_index).rev() {
            let parent = ancestors[step];
            let child = if step == 0 { leaf } else { ancestors[step - 1] };
            match self.invert(parent, child, &context)? {
                Some(refined) => context = refined,
                None => return Ok(true),
            }
        }

        let Some(previous) = self.symbol_table.get_value(&name) else {
            return Ok(true);
        };
        match previous.intersect(&context) {
            Ok(refined) => {
                let satisfiable = refined.is_satisfiable();
                debug!("refined {name}: satisfiable={satisfiable}");
                self.symbol_table.set_value(&name, refined);
                Ok(satisfiable)
            }
            Err(_) => {
                // kind mismatch along an over-approximated chain; leave the
                // variable as it was
                Ok(true)
            }
        }
    }

    /// The set of child values compatible with the parent's refined value.
    /// `None` means the operator has no sound inversion here.
    fn invert(&self, parent: TermId, child: TermId, context: &Value) -> Result<Option<Value>> {
        match self.store.get(parent) {
            // the intersection at an equality or membership is exactly the
            // feasible set of either side
            TermData::Eq(_, _) | TermData::In(_, _) => Ok(Some(context.clone())),
            // a negation's value is the complement only when its operand was
            // single-valued; the over-approximating clone must not flow back
            TermData::Not(inner) => match self.term_values.get(inner) {
                Some(operand) if operand.is_single_value() => Ok(Some(context.clone())),
                _ => Ok(None),
            },

            TermData::Concat(parts) => self.invert_concat(parts, child, context),

            TermData::Plus(parts) => {
                let mut siblings: Option<Value> = None;
                for part in parts {
                    if *part == child {
                        continue;
                    }
                    let value = match self.term_values.get(part) {
                        Some(v) => v.clone(),
                        None => return Ok(None),
                    };
                    siblings = Some(match siblings {
                        None => value,
                        Some(acc) => acc.plus(&value)?,
                    });
                }
                match siblings {
                    Some(total) => Ok(Some(context.minus(&total)?)),
                    None => Ok(Some(context.clone())),
                }
            }
            TermData::Minus(left, right) => {
                if child == *left {
                    match self.term_values.get(right) {
                        Some(rhs) => Ok(Some(context.plus(rhs)?)),
                        None => Ok(None),
                    }
                } else {
                    match self.term_values.get(left) {
                        Some(lhs) => Ok(Some(lhs.minus(context)?)),
                        None => Ok(None),
                    }
                }
            }
            TermData::Times(parts) => {
                // only a constant co-factor inverts exactly
                let mut factor = 1i64;
                for part in parts {
                    if *part == child {
                        continue;
                    }
                    match self.term_values.get(part).and_then(Value::as_int) {
                        Some(c) => factor *= c,
                        None => return Ok(None),
                    }
                }
                match (context.as_int(), factor) {
                    (_, 0) => Ok(None),
                    (Some(value), f) if value % f == 0 => Ok(Some(Value::Int(value / f))),
                    (Some(_), _) => Ok(Some(Value::IntAutomaton(
                        strand_automata::IntAutomaton::empty(),
                    ))),
                    (None, _) => Ok(None),
                }
            }
            TermData::UMinus(_) => match context.as_int() {
                Some(value) => Ok(Some(Value::Int(-value))),
                None => Ok(None),
            },

            TermData::Len(_) => {
                let Some(lengths) = context.to_int_automaton() else {
                    return Ok(None);
                };
                Ok(Some(Value::StringAutomaton(
                    StringAutomaton::make_any_string().restrict_length_to(&lengths),
                )))
            }

            TermData::Contains(subject, _)
            | TermData::Begins(subject, _)
            | TermData::Ends(subject, _)
            | TermData::NotContains(subject, _)
            | TermData::NotBegins(subject, _)
            | TermData::NotEnds(subject, _) => {
                // the computed value is already the refined subject language
                if child == *subject {
                    Ok(Some(context.clone()))
                } else {
                    Ok(None)
                }
            }

            TermData::IndexOf(subject, search) | TermData::LastIndexOf(subject, search) => {
                if child != *subject {
                    return Ok(None);
                }
                let Some(indices) = context.to_int_automaton() else {
                    return Ok(None);
                };
                let Some(search_value) = self
                    .term_values
                    .get(search)
                    .and_then(Value::as_string_automaton)
                else {
                    return Ok(None);
                };
                let containing = StringAutomaton::make_any_string().contains(search_value);
                if indices.has_negative_1() && indices.set().is_empty() {
                    // index is exactly -1: the subject avoids the search
                    Ok(Some(Value::StringAutomaton(containing.complement())))
                } else if !indices.has_negative_1() {
                    // -1 ruled out: an occurrence is mandatory
                    Ok(Some(Value::StringAutomaton(containing)))
                } else {
                    Ok(None)
                }
            }

            // no sound inversion in this fragment
            _ => Ok(None),
        }
    }

    fn invert_concat(
        &self,
        parts: &[TermId],
        child: TermId,
        context: &Value,
    ) -> Result<Option<Value>> {
        let Some(language) = context.as_string_automaton() else {
            return Ok(None);
        };
        let position = match parts.iter().position(|&p| p == child) {
            Some(p) => p,
            None => return Ok(None),
        };
        let mut prefix = StringAutomaton::make_empty_string();
        for part in &parts[..position] {
            match self.term_values.get(part).and_then(Value::as_string_automaton) {
                Some(value) => prefix = prefix.concat(value),
                None => return Ok(None),
            }
        }
        let mut suffix = StringAutomaton::make_empty_string();
        for part in &parts[position + 1..] {
            match self.term_values.get(part).and_then(Value::as_string_automaton) {
                Some(value) => suffix = suffix.concat(value),
                None => return Ok(None),
            }
        }
        let refined = language.right_quotient(&suffix).left_quotient(&prefix);
        Ok(Some(Value::StringAutomaton(refined)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::Sort;

    fn refine(
        store: &TermStore,
        table: &mut SymbolTable,
        paths: Vec<Vec<TermId>>,
        values: HashMap<TermId, Value>,
    ) {
        VariableValueComputer::new(store, table, &paths, &values)
            .start()
            .unwrap();
    }

    #[test]
    fn equality_context_narrows_the_variable() {
        let mut store = TermStore::new();
        let mut table = SymbolTable::new();
        table.declare_variable("x", Sort::Str);

        let x = store.mk_var("x");
        let foo = store.mk_str("foo");
        let eq = store.mk_eq(x, foo);

        let mut values = HashMap::new();
        values.insert(
            eq,
            Value::StringAutomaton(StringAutomaton::make_string("foo")),
        );
        refine(&store, &mut table, vec![vec![x, eq]], values);

        let refined = table.get_value("x").unwrap().as_string_automaton().unwrap().clone();
        assert!(refined.accepts("foo"));
        assert!(refined.is_accepting_single_string());
    }

    #[test]
    fn concat_inverts_by_quotient() {
        let mut store = TermStore::new();
        let mut table = SymbolTable::new();
        table.declare_variable("x", Sort::Str);

        // (= (concat x "world") "helloworld")  =>  x = "hello"
        let x = store.mk_var("x");
        let world = store.mk_str("world");
        let concat = store.mk_concat(vec![x, world]);
        let lit = store.mk_str("helloworld");
        let eq = store.mk_eq(concat, lit);

        let mut values = HashMap::new();
        values.insert(
            world,
            Value::StringAutomaton(StringAutomaton::make_string("world")),
        );
        values.insert(
            eq,
            Value::StringAutomaton(StringAutomaton::make_string("helloworld")),
        );
        refine(&store, &mut table, vec![vec![x, concat, eq]], values);

        let refined = table.get_value("x").unwrap().as_string_automaton().unwrap().clone();
        assert!(refined.accepts("hello"));
        assert!(refined.is_accepting_single_string());
    }

    #[test]
    fn length_context_restricts_lengths() {
        let mut store = TermStore::new();
        let mut table = SymbolTable::new();
        table.declare_variable("x", Sort::Str);
        table.set_value(
            "x",
            Value::StringAutomaton(StringAutomaton::make_regex("a*b").unwrap()),
        );

        let x = store.mk_var("x");
        let len = store.mk_len(x);
        let mut values = HashMap::new();
        values.insert(len, Value::Int(3));
        refine(&store, &mut table, vec![vec![x, len]], values);

        let refined = table.get_value("x").unwrap().as_string_automaton().unwrap().clone();
        assert!(refined.accepts("aab"));
        assert!(!refined.accepts("ab"));
        assert!(refined.is_accepting_single_string());
    }

    #[test]
    fn plus_inverts_arithmetically() {
        let mut store = TermStore::new();
        let mut table = SymbolTable::new();
        table.declare_variable("n", Sort::Int);

        // context 10 over (+ n 4) refines n to 6
        let n = store.mk_var("n");
        let four = store.mk_int(4);
        let plus = store.mk_plus(vec![n, four]);
        let mut values = HashMap::new();
        values.insert(four, Value::Int(4));
        values.insert(plus, Value::Int(10));
        refine(&store, &mut table, vec![vec![n, plus]], values);

        match table.get_value("n").unwrap() {
            Value::Int(v) => assert_eq!(*v, 6),
            Value::IntAutomaton(a) => {
                assert!(a.contains(6));
                assert!(!a.contains(5));
            }
            other => panic!("unexpected {}", other.kind_name()),
        }
    }

    #[test]
    fn index_of_minus_one_excludes_the_needle() {
        let mut store = TermStore::new();
        let mut table = SymbolTable::new();
        table.declare_variable("s", Sort::Str);

        // (= (indexOf s "x") -1)
        let s = store.mk_var("s");
        let needle = store.mk_str("x");
        let index_of = store.mk_index_of(s, needle);
        let mut values = HashMap::new();
        values.insert(
            needle,
            Value::StringAutomaton(StringAutomaton::make_string("x")),
        );
        values.insert(index_of, Value::Int(-1));
        refine(&store, &mut table, vec![vec![s, index_of]], values);

        let refined = table.get_value("s").unwrap().as_string_automaton().unwrap().clone();
        assert!(refined.accepts("abc"));
        assert!(refined.accepts(""));
        assert!(!refined.accepts("axc"));
    }

    #[test]
    fn unsupported_parents_leave_the_variable_alone() {
        let mut store = TermStore::new();
        let mut table = SymbolTable::new();
        table.declare_variable("s", Sort::Str);

        let s = store.mk_var("s");
        let upper = store.mk_to_upper(s);
        let mut values = HashMap::new();
        values.insert(
            upper,
            Value::StringAutomaton(StringAutomaton::make_string("ABC")),
        );
        refine(&store, &mut table, vec![vec![s, upper]], values);

        // still the top universe
        let kept = table.get_value("s").unwrap().as_string_automaton().unwrap();
        assert!(kept.accepts("anything"));
    }
}
