//! End-to-end solver scenarios over the full stack.

use std::collections::BTreeMap;

use strand::{ConstraintSolver, ConstraintInformation, Script, SolverConfig, Sort, SymbolTable, TermStore};
use strand_solver::Value;

struct Harness {
    store: TermStore,
    script: Script,
    info: ConstraintInformation,
    table: SymbolTable,
    config: SolverConfig,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: TermStore::new(),
            script: Script::new(),
            info: ConstraintInformation::new(),
            table: SymbolTable::new(),
            config: SolverConfig::default(),
        }
    }

    fn solver(&mut self) -> ConstraintSolver<'_> {
        ConstraintSolver::new(
            &self.store,
            &self.script,
            std::mem::take(&mut self.table),
            &self.info,
            self.config,
        )
    }
}

fn string_value<'a>(table: &'a SymbolTable, name: &str) -> &'a strand::automata::StringAutomaton {
    table
        .get_value(name)
        .unwrap_or_else(|| panic!("no value for {name}"))
        .as_string_automaton()
        .unwrap_or_else(|| panic!("{name} is not a string value"))
}

fn assignment(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// `assert (= x "foo")` pins a free string variable.
#[test]
fn equality_with_a_literal() {
    let mut h = Harness::new();
    h.table.declare_variable("x", Sort::Str);
    let x = h.store.mk_var("x");
    let foo = h.store.mk_str("foo");
    let eq = h.store.mk_eq(x, foo);
    h.script.assert(eq);

    let mut solver = h.solver();
    solver.start().unwrap();
    assert!(solver.is_satisfiable());
    let x_value = string_value(solver.symbol_table(), "x");
    assert!(x_value.accepts("foo"));
    assert!(x_value.is_accepting_single_string());
}

/// `assert (and (in x "a*b") (= (len x) 3))`: the mixed bridge narrows the
/// regex language down to the only word of length three.
#[test]
fn regex_membership_with_length_constraint() {
    let mut h = Harness::new();
    h.table.declare_variable("x", Sort::Str);
    let x1 = h.store.mk_var("x");
    let re = h.store.mk_regex("a*b");
    let member = h.store.mk_in(x1, re);
    let x2 = h.store.mk_var("x");
    let len = h.store.mk_len(x2);
    let three = h.store.mk_int(3);
    let len_eq = h.store.mk_eq(len, three);
    let and = h.store.mk_and(vec![member, len_eq]);
    h.info.add_component(and);
    h.script.assert(and);

    let mut solver = h.solver();
    solver.start().unwrap();
    assert!(solver.is_satisfiable());
    let x_value = string_value(solver.symbol_table(), "x");
    assert!(x_value.accepts("aab"));
    assert!(!x_value.accepts("ab"));
    assert!(!x_value.accepts("aaab"));
    assert!(x_value.is_accepting_single_string());
}

/// `assert (and (>= y 0) (<= y 10) (= y (len x)) (= x "hello"))`: two
/// passes let the bridge squeeze `y` from `[0, 10]` down to `5`.
#[test]
fn mixed_bridge_reaches_a_fixed_point() {
    let mut h = Harness::new();
    h.table.declare_variable("x", Sort::Str);
    h.table.declare_variable("y", Sort::Int);
    let y1 = h.store.mk_var("y");
    let zero = h.store.mk_int(0);
    let ge = h.store.mk_ge(y1, zero);
    let y2 = h.store.mk_var("y");
    let ten = h.store.mk_int(10);
    let le = h.store.mk_le(y2, ten);
    let y3 = h.store.mk_var("y");
    let x1 = h.store.mk_var("x");
    let len = h.store.mk_len(x1);
    let len_eq = h.store.mk_eq(y3, len);
    let x2 = h.store.mk_var("x");
    let hello = h.store.mk_str("hello");
    let str_eq = h.store.mk_eq(x2, hello);
    let and = h.store.mk_and(vec![ge, le, len_eq, str_eq]);
    h.info.add_component(and);
    h.script.assert(and);

    let mut solver = h.solver();
    solver.start_iterations(2).unwrap();
    assert!(solver.is_satisfiable());

    let x_value = string_value(solver.symbol_table(), "x");
    assert!(x_value.accepts("hello"));
    assert!(x_value.is_accepting_single_string());

    let component = solver
        .arithmetic_solver()
        .get_term_value(and)
        .and_then(Value::as_binary_int)
        .cloned()
        .expect("the component was solved arithmetically");
    let y_only = component.project_onto("y").unwrap();
    let y_values = y_only.to_unary_automaton().to_int_automaton(false);
    assert!(y_values.contains(5));
    assert!(y_values.is_accepting_single_int());
}

/// `assert (and (= x "a") (not (= x "a")))` refutes itself at the second
/// conjunct.
#[test]
fn contradictory_conjunction_is_unsat() {
    let mut h = Harness::new();
    h.table.declare_variable("x", Sort::Str);
    let x1 = h.store.mk_var("x");
    let a1 = h.store.mk_str("a");
    let eq = h.store.mk_eq(x1, a1);
    let x2 = h.store.mk_var("x");
    let a2 = h.store.mk_str("a");
    let inner = h.store.mk_eq(x2, a2);
    let negated = h.store.mk_not(inner);
    let and = h.store.mk_and(vec![eq, negated]);
    h.script.assert(and);

    let mut solver = h.solver();
    solver.start().unwrap();
    assert!(!solver.is_satisfiable());
}

/// `assert (or (= x "a") (= x "b"))`: with counting off only the first
/// branch runs; with counting on both branch scopes hold their refinement.
#[test]
fn disjunction_with_and_without_counting() {
    let mut h = Harness::new();
    h.table.declare_variable("x", Sort::Str);
    let x1 = h.store.mk_var("x");
    let a = h.store.mk_str("a");
    let eq_a = h.store.mk_eq(x1, a);
    let x2 = h.store.mk_var("x");
    let b = h.store.mk_str("b");
    let eq_b = h.store.mk_eq(x2, b);
    let or = h.store.mk_or(vec![eq_a, eq_b]);
    h.script.assert(or);

    let mut solver = h.solver();
    solver.start().unwrap();
    assert!(solver.is_satisfiable());
    let table = solver.symbol_table();
    assert!(table
        .get_value_at_scope(eq_a, "x")
        .and_then(Value::as_string_automaton)
        .is_some_and(|auto| auto.accepts("a")));
    assert!(table.get_value_at_scope(eq_b, "x").is_none());

    // counting on: both branches evaluated
    let mut h2 = Harness::new();
    h2.config.model_counter_enabled = true;
    h2.table.declare_variable("x", Sort::Str);
    let x1 = h2.store.mk_var("x");
    let a = h2.store.mk_str("a");
    let eq_a = h2.store.mk_eq(x1, a);
    let x2 = h2.store.mk_var("x");
    let b = h2.store.mk_str("b");
    let eq_b = h2.store.mk_eq(x2, b);
    let or = h2.store.mk_or(vec![eq_a, eq_b]);
    h2.script.assert(or);

    let mut solver = h2.solver();
    solver.start().unwrap();
    assert!(solver.is_satisfiable());
    let table = solver.symbol_table();
    assert!(table
        .get_value_at_scope(eq_a, "x")
        .and_then(Value::as_string_automaton)
        .is_some_and(|auto| auto.accepts("a")));
    assert!(table
        .get_value_at_scope(eq_b, "x")
        .and_then(Value::as_string_automaton)
        .is_some_and(|auto| auto.accepts("b")));
}

/// `assert (notContains s "bad")` refines `s` to the bad-free language.
#[test]
fn negated_containment_refines_the_subject() {
    let mut h = Harness::new();
    h.table.declare_variable("s", Sort::Str);
    let s = h.store.mk_var("s");
    let bad = h.store.mk_str("bad");
    let not_contains = h.store.mk_not_contains(s, bad);
    h.script.assert(not_contains);

    let mut solver = h.solver();
    solver.start().unwrap();
    assert!(solver.is_satisfiable());
    let s_value = string_value(solver.symbol_table(), "s");
    assert!(s_value.accepts(""));
    assert!(s_value.accepts("good"));
    assert!(s_value.accepts("ba d"));
    assert!(!s_value.accepts("bad"));
    assert!(!s_value.accepts("so bad indeed"));
}

/// `assert (= (indexOf s "x") -1)` refines `s` to strings without `"x"`.
#[test]
fn index_of_not_found() {
    let mut h = Harness::new();
    h.table.declare_variable("s", Sort::Str);
    let s = h.store.mk_var("s");
    let needle = h.store.mk_str("x");
    let index_of = h.store.mk_index_of(s, needle);
    let minus_one = h.store.mk_int(-1);
    let eq = h.store.mk_eq(index_of, minus_one);
    h.script.assert(eq);

    let mut solver = h.solver();
    solver.start().unwrap();
    assert!(solver.is_satisfiable());
    let s_value = string_value(solver.symbol_table(), "s");
    assert!(s_value.accepts("abc"));
    assert!(s_value.accepts(""));
    assert!(!s_value.accepts("axc"));
    assert!(!s_value.accepts("x"));
}

/// `assert (and (= (+ a b) 10) (>= a 0) (>= b 0) (<= a 3))`: the arithmetic
/// engine produces the relational automaton over `(a, b)`.
#[test]
fn relational_integer_component() {
    let mut h = Harness::new();
    h.table.declare_variable("a", Sort::Int);
    h.table.declare_variable("b", Sort::Int);
    let a1 = h.store.mk_var("a");
    let b1 = h.store.mk_var("b");
    let sum = h.store.mk_plus(vec![a1, b1]);
    let ten = h.store.mk_int(10);
    let eq = h.store.mk_eq(sum, ten);
    let a2 = h.store.mk_var("a");
    let zero1 = h.store.mk_int(0);
    let ge_a = h.store.mk_ge(a2, zero1);
    let b2 = h.store.mk_var("b");
    let zero2 = h.store.mk_int(0);
    let ge_b = h.store.mk_ge(b2, zero2);
    let a3 = h.store.mk_var("a");
    let three = h.store.mk_int(3);
    let le_a = h.store.mk_le(a3, three);
    let and = h.store.mk_and(vec![eq, ge_a, ge_b, le_a]);
    h.info.add_component(and);
    h.script.assert(and);

    let mut solver = h.solver();
    solver.start().unwrap();
    assert!(solver.is_satisfiable());

    let component = solver
        .arithmetic_solver()
        .get_term_value(and)
        .and_then(Value::as_binary_int)
        .cloned()
        .expect("the component was solved arithmetically");
    for (a, b) in [(0, 10), (1, 9), (2, 8), (3, 7)] {
        assert!(
            component.accepts_assignment(&assignment(&[("a", a), ("b", b)])),
            "expected ({a},{b})"
        );
    }
    assert!(!component.accepts_assignment(&assignment(&[("a", 4), ("b", 6)])));
    assert!(!component.accepts_assignment(&assignment(&[("a", 2), ("b", 9)])));

    let a_values = component
        .project_onto("a")
        .unwrap()
        .to_unary_automaton()
        .to_int_automaton(false);
    for v in 0..=3 {
        assert!(a_values.contains(v));
    }
    assert!(!a_values.contains(4));

    let b_values = component
        .project_onto("b")
        .unwrap()
        .to_unary_automaton()
        .to_int_automaton(false);
    assert!(b_values.contains(7));
    assert!(b_values.contains(10));
    assert!(!b_values.contains(6));
    assert!(!b_values.contains(11));
}

/// An unsatisfiable arithmetic component refutes the whole script.
#[test]
fn unsatisfiable_bounds_are_reported() {
    let mut h = Harness::new();
    h.table.declare_variable("n", Sort::Int);
    let n1 = h.store.mk_var("n");
    let five = h.store.mk_int(5);
    let ge = h.store.mk_ge(n1, five);
    let n2 = h.store.mk_var("n");
    let three = h.store.mk_int(3);
    let le = h.store.mk_le(n2, three);
    let and = h.store.mk_and(vec![ge, le]);
    h.info.add_component(and);
    h.script.assert(and);

    let mut solver = h.solver();
    solver.start().unwrap();
    assert!(!solver.is_satisfiable());
}

/// Variable equality classes: with the relational engine on, fused
/// variables share one refined track value, written back under both names.
#[test]
fn relational_string_component() {
    let mut h = Harness::new();
    h.config.enable_relational_string_automata = true;
    h.table.declare_variable("x", Sort::Str);
    h.table.declare_variable("y", Sort::Str);
    h.table.set_symbolic_variable(Some("y".to_string()));

    let x = h.store.mk_var("x");
    let y1 = h.store.mk_var("y");
    let eq_xy = h.store.mk_eq(x, y1);
    let y2 = h.store.mk_var("y");
    let abc = h.store.mk_str("abc");
    let eq_yc = h.store.mk_eq(y2, abc);
    let and = h.store.mk_and(vec![eq_xy, eq_yc]);
    h.info.add_component(and);
    h.script.assert(and);

    let mut solver = h.solver();
    solver.start().unwrap();
    assert!(solver.is_satisfiable());

    let table = solver.symbol_table();
    for name in ["x", "y"] {
        let value = table.get_value(name).unwrap();
        let multi = value.as_multi_track().unwrap_or_else(|| {
            panic!("{name} should hold a relational value")
        });
        assert!(multi.language().accepts("abc"));
        assert!(multi.language().is_accepting_single_string());
        assert!(multi.relation().contains("x"));
        assert!(multi.relation().contains("y"));
    }
    // the symbolic variable rides its representative's track
    let y_value = table.get_value("y").unwrap().as_multi_track().unwrap().clone();
    assert_eq!(
        y_value.relation().track_of("y"),
        y_value.relation().track_of("x")
    );
}

/// A disequality against a literal refines the relational class directly.
#[test]
fn relational_disequality_refinement() {
    let mut h = Harness::new();
    h.config.enable_relational_string_automata = true;
    h.table.declare_variable("x", Sort::Str);
    h.table.declare_variable("y", Sort::Str);
    h.table.set_symbolic_variable(Some("x".to_string()));

    let x = h.store.mk_var("x");
    let y1 = h.store.mk_var("y");
    let eq_xy = h.store.mk_eq(x, y1);
    let y2 = h.store.mk_var("y");
    let bad = h.store.mk_str("bad");
    let not_eq = h.store.mk_not_eq(y2, bad);
    let and = h.store.mk_and(vec![eq_xy, not_eq]);
    h.info.add_component(and);
    h.script.assert(and);

    let mut solver = h.solver();
    solver.start().unwrap();
    assert!(solver.is_satisfiable());

    let value = solver.symbol_table().get_value("x").unwrap();
    let multi = value.as_multi_track().unwrap();
    assert!(multi.language().accepts("ok"));
    assert!(!multi.language().accepts("bad"));
}

/// Several assertions conjoin: a later assertion can refute the script.
#[test]
fn assertions_conjoin_across_the_script() {
    let mut h = Harness::new();
    h.table.declare_variable("x", Sort::Str);
    let x1 = h.store.mk_var("x");
    let re = h.store.mk_regex("a+");
    let member = h.store.mk_in(x1, re);
    h.script.assert(member);
    let x2 = h.store.mk_var("x");
    let b = h.store.mk_str("b");
    let eq = h.store.mk_eq(x2, b);
    h.script.assert(eq);

    let mut solver = h.solver();
    solver.start().unwrap();
    assert!(!solver.is_satisfiable());
}
