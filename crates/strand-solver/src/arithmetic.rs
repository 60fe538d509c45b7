//! Linear-arithmetic component solver.
//!
//! Started once per component, before the evaluator walks the conjuncts. It
//! linearizes the component's integer atoms, builds one binary automaton per
//! atom over the component's variable universe, and intersects them into the
//! component solution. String-derived integer subterms (`len`, `indexOf`,
//! `lastIndexOf`, `toInt`) are abstracted into generated aggregate variables
//! and remembered per atom so the mixed bridge can re-run them later.

use hashbrown::HashMap;
use tracing::debug;

use strand_automata::{ArithmeticFormula, BinaryIntAutomaton, FormulaKind};
use strand_core::{Constant, Sort, TermData, TermId, TermStore};

use crate::error::Result;
use crate::symbol_table::SymbolTable;
use crate::value::Value;

/// One linearized side: coefficients, constant, string-derived subterms.
#[derive(Debug, Default, Clone)]
struct LinearForm {
    coefficients: Vec<(String, i64)>,
    constant: i64,
    string_terms: Vec<TermId>,
}

impl LinearForm {
    fn scaled(mut self, factor: i64) -> Self {
        for (_, coefficient) in &mut self.coefficients {
            *coefficient *= factor;
        }
        self.constant *= factor;
        self
    }

    fn merge(mut self, other: Self) -> Self {
        self.coefficients.extend(other.coefficients);
        self.constant += other.constant;
        self.string_terms.extend(other.string_terms);
        self
    }
}

/// Solver for the linear-integer conjuncts of a component.
#[derive(Debug, Default)]
pub struct ArithmeticConstraintSolver {
    natural_numbers_only: bool,
    term_values: HashMap<TermId, Value>,
    component_of: HashMap<TermId, TermId>,
    string_terms: HashMap<TermId, Vec<TermId>>,
    component_names: HashMap<TermId, String>,
}

impl ArithmeticConstraintSolver {
    /// A fresh engine.
    #[must_use]
    pub fn new(natural_numbers_only: bool) -> Self {
        Self {
            natural_numbers_only,
            ..Self::default()
        }
    }

    /// Solve the arithmetic conjuncts of `and_node` and cache per-atom and
    /// per-component values.
    pub fn start(
        &mut self,
        store: &TermStore,
        symbol_table: &mut SymbolTable,
        and_node: TermId,
    ) -> Result<()> {
        let TermData::And(conjuncts) = store.get(and_node) else {
            return Ok(());
        };
        let conjuncts = conjuncts.clone();

        let mut atoms: Vec<(TermId, ArithmeticFormula, Vec<TermId>)> = Vec::new();
        for conjunct in conjuncts {
            if let Some((formula, string_terms)) =
                self.linearize_atom(store, symbol_table, conjunct)
            {
                atoms.push((conjunct, formula, string_terms));
            }
        }
        if atoms.is_empty() {
            return Ok(());
        }
        debug!("arithmetic component with {} atoms", atoms.len());

        // one track universe for the whole component
        let mut universe = ArithmeticFormula::new(FormulaKind::Intersect);
        for (_, formula, _) in &atoms {
            for name in formula.variable_coefficients().keys() {
                universe.ensure_variable(name.clone());
            }
        }

        let mut component = BinaryIntAutomaton::make_universal(universe.clone())?;
        let mut string_term_aliases: Vec<String> = Vec::new();
        for (_, _, terms) in &atoms {
            for term in terms {
                string_term_aliases
                    .push(symbol_table.get_var_name_for_expression(*term, Sort::Int));
            }
        }
        for (_, formula, _) in &atoms {
            if formula.gcd_infeasible() {
                debug!("gcd screen refutes {formula}");
                component = BinaryIntAutomaton::make_phi(universe.clone());
                break;
            }
            component = component.intersect(&BinaryIntAutomaton::from_formula(formula.clone())?)?;
        }

        // domain bounds: declared variables to the naturals when configured,
        // string-derived aliases down to the -1 sentinel
        if component.is_satisfiable() {
            for name in universe.variable_coefficients().keys() {
                let is_alias = string_term_aliases.iter().any(|a| a == name);
                let mut bound = ArithmeticFormula::new(FormulaKind::Ge);
                bound.add_variable(name.clone(), 1);
                if is_alias {
                    bound.set_constant(1); // name >= -1
                } else if self.natural_numbers_only {
                    bound.set_constant(0); // name >= 0
                } else {
                    continue;
                }
                component = component.intersect(&BinaryIntAutomaton::from_formula(bound)?)?;
            }
        }

        let name = symbol_table.get_var_name_for_expression(and_node, Sort::Int);
        self.component_names.insert(and_node, name);
        for (atom, _, terms) in &atoms {
            self.term_values
                .insert(*atom, Value::BinaryInt(component.clone()));
            self.component_of.insert(*atom, and_node);
            if !terms.is_empty() {
                self.string_terms.insert(*atom, terms.clone());
            }
        }
        self.term_values
            .insert(and_node, Value::BinaryInt(component));
        Ok(())
    }

    /// The cached value of an atom or component, if this engine owns one.
    #[must_use]
    pub fn get_term_value(&self, term: TermId) -> Option<&Value> {
        self.term_values.get(&term)
    }

    /// Whether the atom contains string-derived integer subterms.
    #[must_use]
    pub fn has_string_terms(&self, term: TermId) -> bool {
        self.string_terms.contains_key(&term)
    }

    /// The string-derived subterms of an atom.
    #[must_use]
    pub fn get_string_terms_in(&self, term: TermId) -> &[TermId] {
        self.string_terms.get(&term).map_or(&[], Vec::as_slice)
    }

    /// Replace an atom's cached value; the component entry follows.
    pub fn update_term_value(&mut self, term: TermId, value: Value) {
        if let Some(component) = self.component_of.get(&term).copied() {
            self.term_values.insert(component, value.clone());
        }
        self.term_values.insert(term, value);
    }

    /// The aggregate variable name chosen for a component.
    #[must_use]
    pub fn get_int_variable_name(&self, and_node: TermId) -> Option<&str> {
        self.component_names.get(&and_node).map(String::as_str)
    }

    // ------------------------------------------------------------------

    /// Try to read a conjunct as a linear-integer atom.
    fn linearize_atom(
        &self,
        store: &TermStore,
        symbol_table: &mut SymbolTable,
        term: TermId,
    ) -> Option<(ArithmeticFormula, Vec<TermId>)> {
        let (kind, left, right) = match store.get(term) {
            TermData::Eq(l, r) => (FormulaKind::Eq, *l, *r),
            TermData::NotEq(l, r) => (FormulaKind::NotEq, *l, *r),
            TermData::Lt(l, r) => (FormulaKind::Lt, *l, *r),
            TermData::Le(l, r) => (FormulaKind::Le, *l, *r),
            TermData::Gt(l, r) => (FormulaKind::Gt, *l, *r),
            TermData::Ge(l, r) => (FormulaKind::Ge, *l, *r),
            _ => return None,
        };
        let lhs = self.linearize(store, symbol_table, left)?;
        let rhs = self.linearize(store, symbol_table, right)?;
        let form = lhs.merge(rhs.scaled(-1));
        if form.coefficients.is_empty() {
            // ground comparison, the plain dispatch settles it
            return None;
        }
        let mut formula = ArithmeticFormula::new(kind);
        for (name, coefficient) in &form.coefficients {
            formula.add_variable(name.clone(), *coefficient);
        }
        formula.set_constant(form.constant);
        Some((formula, form.string_terms))
    }

    /// Linear form of an integer term: `Σ coeff·var + constant`.
    fn linearize(
        &self,
        store: &TermStore,
        symbol_table: &mut SymbolTable,
        term: TermId,
    ) -> Option<LinearForm> {
        match store.get(term) {
            TermData::Constant(Constant::Int(value)) => Some(LinearForm {
                constant: *value,
                ..LinearForm::default()
            }),
            TermData::Variable(name) => {
                if symbol_table.sort_of(name)? != Sort::Int {
                    return None;
                }
                Some(LinearForm {
                    coefficients: vec![(name.clone(), 1)],
                    ..LinearForm::default()
                })
            }
            TermData::Plus(terms) => {
                let mut acc = LinearForm::default();
                for part in terms {
                    acc = acc.merge(self.linearize(store, symbol_table, *part)?);
                }
                Some(acc)
            }
            TermData::Minus(left, right) => {
                let lhs = self.linearize(store, symbol_table, *left)?;
                let rhs = self.linearize(store, symbol_table, *right)?;
                Some(lhs.merge(rhs.scaled(-1)))
            }
            TermData::UMinus(inner) => {
                Some(self.linearize(store, symbol_table, *inner)?.scaled(-1))
            }
            TermData::Times(terms) => {
                // at most one non-constant factor keeps the form linear
                let mut factor = 1i64;
                let mut symbolic: Option<LinearForm> = None;
                for part in terms {
                    let form = self.linearize(store, symbol_table, *part)?;
                    if form.coefficients.is_empty() && form.string_terms.is_empty() {
                        factor *= form.constant;
                    } else if symbolic.is_none() {
                        symbolic = Some(form);
                    } else {
                        return None;
                    }
                }
                Some(match symbolic {
                    Some(form) => form.scaled(factor),
                    None => LinearForm {
                        constant: factor,
                        ..LinearForm::default()
                    },
                })
            }
            TermData::Len(_)
            | TermData::IndexOf(_, _)
            | TermData::LastIndexOf(_, _)
            | TermData::ToInt(_) => {
                let name = symbol_table.get_var_name_for_expression(term, Sort::Int);
                Some(LinearForm {
                    coefficients: vec![(name, 1)],
                    string_terms: vec![term],
                    ..LinearForm::default()
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn assignment(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn solves_a_pure_integer_component() {
        let mut store = TermStore::new();
        let mut table = SymbolTable::new();
        table.declare_variable("a", Sort::Int);
        table.declare_variable("b", Sort::Int);

        // (and (= (+ a b) 10) (>= a 0) (>= b 0) (<= a 3))
        let a1 = store.mk_var("a");
        let b1 = store.mk_var("b");
        let sum = store.mk_plus(vec![a1, b1]);
        let ten = store.mk_int(10);
        let eq = store.mk_eq(sum, ten);
        let a2 = store.mk_var("a");
        let zero1 = store.mk_int(0);
        let ge_a = store.mk_ge(a2, zero1);
        let b2 = store.mk_var("b");
        let zero2 = store.mk_int(0);
        let ge_b = store.mk_ge(b2, zero2);
        let a3 = store.mk_var("a");
        let three = store.mk_int(3);
        let le_a = store.mk_le(a3, three);
        let and = store.mk_and(vec![eq, ge_a, ge_b, le_a]);

        let mut engine = ArithmeticConstraintSolver::new(true);
        engine.start(&store, &mut table, and).unwrap();

        let component = engine.get_term_value(and).unwrap();
        assert!(component.is_satisfiable());
        let auto = component.as_binary_int().unwrap();
        assert!(auto.accepts_assignment(&assignment(&[("a", 3), ("b", 7)])));
        assert!(auto.accepts_assignment(&assignment(&[("a", 0), ("b", 10)])));
        assert!(!auto.accepts_assignment(&assignment(&[("a", 4), ("b", 6)])));
        assert!(!auto.accepts_assignment(&assignment(&[("a", -1), ("b", 11)])));

        // the per-atom entries share the component solution
        assert!(engine.get_term_value(eq).is_some());
        assert!(engine.get_term_value(le_a).is_some());
        assert!(!engine.has_string_terms(eq));
        assert!(engine.get_int_variable_name(and).is_some());
    }

    #[test]
    fn detects_string_terms() {
        let mut store = TermStore::new();
        let mut table = SymbolTable::new();
        table.declare_variable("x", Sort::Str);
        table.declare_variable("y", Sort::Int);

        // (and (= y (len x)) (<= y 10))
        let y1 = store.mk_var("y");
        let x = store.mk_var("x");
        let len = store.mk_len(x);
        let eq = store.mk_eq(y1, len);
        let y2 = store.mk_var("y");
        let ten = store.mk_int(10);
        let le = store.mk_le(y2, ten);
        let and = store.mk_and(vec![eq, le]);

        let mut engine = ArithmeticConstraintSolver::new(true);
        engine.start(&store, &mut table, and).unwrap();

        assert!(engine.has_string_terms(eq));
        assert_eq!(engine.get_string_terms_in(eq), &[len]);
        assert!(!engine.has_string_terms(le));
        assert!(engine.get_term_value(eq).unwrap().is_satisfiable());
    }

    #[test]
    fn unsatisfiable_component() {
        let mut store = TermStore::new();
        let mut table = SymbolTable::new();
        table.declare_variable("n", Sort::Int);

        // (and (>= n 5) (<= n 3))
        let n1 = store.mk_var("n");
        let five = store.mk_int(5);
        let ge = store.mk_ge(n1, five);
        let n2 = store.mk_var("n");
        let three = store.mk_int(3);
        let le = store.mk_le(n2, three);
        let and = store.mk_and(vec![ge, le]);

        let mut engine = ArithmeticConstraintSolver::new(true);
        engine.start(&store, &mut table, and).unwrap();
        assert!(!engine.get_term_value(and).unwrap().is_satisfiable());
        assert!(!engine.get_term_value(ge).unwrap().is_satisfiable());
    }

    #[test]
    fn gcd_screen_short_circuits() {
        let mut store = TermStore::new();
        let mut table = SymbolTable::new();
        table.declare_variable("n", Sort::Int);
        table.declare_variable("m", Sort::Int);

        // 2n + 4m = 7 has no integer solution
        let n = store.mk_var("n");
        let two = store.mk_int(2);
        let two_n = store.mk_times(vec![two, n]);
        let m = store.mk_var("m");
        let four = store.mk_int(4);
        let four_m = store.mk_times(vec![four, m]);
        let sum = store.mk_plus(vec![two_n, four_m]);
        let seven = store.mk_int(7);
        let eq = store.mk_eq(sum, seven);
        let and = store.mk_and(vec![eq]);

        let mut engine = ArithmeticConstraintSolver::new(true);
        engine.start(&store, &mut table, and).unwrap();
        assert!(!engine.get_term_value(and).unwrap().is_satisfiable());
    }

    #[test]
    fn ignores_non_arithmetic_conjuncts() {
        let mut store = TermStore::new();
        let mut table = SymbolTable::new();
        table.declare_variable("x", Sort::Str);

        let x = store.mk_var("x");
        let foo = store.mk_str("foo");
        let eq = store.mk_eq(x, foo);
        let and = store.mk_and(vec![eq]);

        let mut engine = ArithmeticConstraintSolver::new(true);
        engine.start(&store, &mut table, and).unwrap();
        assert!(engine.get_term_value(and).is_none());
        assert!(engine.get_term_value(eq).is_none());
    }
}
