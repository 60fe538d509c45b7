//! Tree-directed constraint evaluator.
//!
//! Walks each assertion of a script and computes a [`Value`] at every node.
//! Conjunctions marked as components first go through the arithmetic and
//! relational string engines; the conjuncts are then walked left to right
//! with refinement after every satisfiable one and a short-circuit on the
//! first unsatisfiable one. Disjuncts run in their own scopes. The mixed
//! integer-string bridge re-runs both engines when an arithmetic atom
//! depends on a string-derived quantity.

use hashbrown::HashMap;
use tracing::{debug, warn};

use strand_automata::{IntAutomaton, StringAutomaton};
use strand_core::{
    Constant, ConstraintInformation, Script, SolverConfig, Sort, SubStringMode, TermData, TermId,
    TermStore,
};

use crate::arithmetic::ArithmeticConstraintSolver;
use crate::error::{Result, SolverError};
use crate::string_relation::StringRelationSolver;
use crate::symbol_table::SymbolTable;
use crate::value::Value;
use crate::variable_value::VariableValueComputer;

/// Integer comparison operators the evaluator dispatches on.
#[derive(Debug, Clone, Copy)]
enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
}

/// The recursive dispatcher over assertion ASTs.
pub struct ConstraintSolver<'s> {
    store: &'s TermStore,
    script: &'s Script,
    symbol_table: SymbolTable,
    constraint_information: &'s ConstraintInformation,
    config: SolverConfig,
    arithmetic_solver: ArithmeticConstraintSolver,
    string_solver: StringRelationSolver,
    term_values: HashMap<TermId, Value>,
    path_trace: Vec<TermId>,
    variable_path_table: Vec<Vec<TermId>>,
    tagged_variables: Vec<String>,
    still_sat: bool,
    iteration: usize,
}

impl<'s> ConstraintSolver<'s> {
    /// Bind the evaluator to a script and a seeded symbol table.
    pub fn new(
        store: &'s TermStore,
        script: &'s Script,
        symbol_table: SymbolTable,
        constraint_information: &'s ConstraintInformation,
        config: SolverConfig,
    ) -> Self {
        Self {
            store,
            script,
            symbol_table,
            constraint_information,
            config,
            arithmetic_solver: ArithmeticConstraintSolver::new(config.lia_natural_numbers_only),
            string_solver: StringRelationSolver::new(),
            term_values: HashMap::new(),
            path_trace: Vec::new(),
            variable_path_table: Vec::new(),
            tagged_variables: Vec::new(),
            still_sat: false,
            iteration: 0,
        }
    }

    /// Evaluate the script once.
    pub fn start(&mut self) -> Result<()> {
        self.start_iterations(1)
    }

    /// Evaluate the script a fixed number of times; later passes let mixed
    /// integer-string refinements reach a fixed point.
    pub fn start_iterations(&mut self, iterations: usize) -> Result<()> {
        let asserts = self.script.asserts.clone();
        for iteration in 0..iterations {
            self.iteration = iteration;
            for &assertion in &asserts {
                self.visit_assert(assertion)?;
            }
        }
        Ok(())
    }

    /// The global verdict after evaluation.
    #[must_use]
    pub fn is_satisfiable(&self) -> bool {
        self.symbol_table.is_satisfiable()
    }

    /// The symbol table with its per-variable refinements.
    #[must_use]
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbol_table
    }

    /// Take the symbol table out of the evaluator.
    #[must_use]
    pub fn into_symbol_table(self) -> SymbolTable {
        self.symbol_table
    }

    /// The arithmetic component solutions (for reading back projections).
    #[must_use]
    pub fn arithmetic_solver(&self) -> &ArithmeticConstraintSolver {
        &self.arithmetic_solver
    }

    // ------------------------------------------------------------------
    // assertion walk

    fn visit_assert(&mut self, term: TermId) -> Result<()> {
        debug!("assert: {}", self.store.display(term));
        self.check_and_visit(term)?;

        let result = self
            .lookup_term_value(term)
            .unwrap_or_else(|| panic!("value is not computed for term {}", self.store.display(term)));
        let mut is_satisfiable = result.is_satisfiable();
        if !self.store.is_and(term) && !self.store.is_or(term) && is_satisfiable {
            // refinement can empty a variable, which refutes the assertion
            self.still_sat = true;
            self.update_variables()?;
            is_satisfiable = is_satisfiable && self.still_sat;
        }
        self.symbol_table.update_satisfiability(is_satisfiable);
        self.symbol_table.set_scope_satisfiability(is_satisfiable);
        self.clear_term_values_and_local_let_vars();
        Ok(())
    }

    /// Visit unless a sub-engine already owns the term's value; run the
    /// mixed bridge when the cached value depends on string-derived terms.
    fn check_and_visit(&mut self, term: TermId) -> Result<bool> {
        if !self.store.is_and(term) && !self.store.is_or(term) {
            let cached = self.lookup_term_value(term);
            if let Some(result) = cached {
                if self.arithmetic_solver.has_string_terms(term) && result.is_satisfiable() {
                    debug!("mixed linear integer and string constraint");
                    self.process_mixed_integer_string_constraints_in(term)?;
                    let updated = self
                        .arithmetic_solver
                        .get_term_value(term)
                        .expect("bridged atom keeps its arithmetic value")
                        .is_satisfiable();
                    self.set_term_value(term, Value::Bool(updated));
                }
                if let Some(relational) = self.string_solver.get_term_value(term) {
                    debug!("mixed multi-track and single-track string constraint");
                    self.set_term_value(term, Value::Bool(relational.is_satisfiable()));
                }
                return Ok(false);
            }
        }
        self.visit(term)?;
        Ok(true)
    }

    /// The mixed integer-string bridge: for every string-derived subterm of
    /// the atom, evaluate it, push its value into the arithmetic solution,
    /// project the tightened solution back, and propagate to the string side.
    fn process_mixed_integer_string_constraints_in(&mut self, term: TermId) -> Result<()> {
        let string_terms = self.arithmetic_solver.get_string_terms_in(term).to_vec();
        for string_term in string_terms {
            let result = self
                .arithmetic_solver
                .get_term_value(term)
                .expect("bridged atom keeps its arithmetic value")
                .clone();
            let Some(arithmetic) = result.as_binary_int() else {
                return Err(SolverError::UnexpectedOperand {
                    context: self.store.display(term),
                    operand: result.kind_name(),
                });
            };

            self.visit(string_term)?;
            let string_term_result = self.own_value(string_term).clone();
            let name = self
                .symbol_table
                .get_var_name_for_expression(string_term, Sort::Int);

            let (unary, mut has_minus_one) = match &string_term_result {
                Value::IntAutomaton(auto) => (auto.to_unary_automaton(), auto.has_negative_1()),
                Value::Int(value) => (
                    IntAutomaton::from_int(*value).to_unary_automaton(),
                    *value < 0,
                ),
                other => {
                    return Err(SolverError::UnexpectedOperand {
                        context: self.store.display(string_term),
                        operand: other.kind_name(),
                    })
                }
            };
            let string_term_binary =
                unary.to_binary_int_automaton(&name, arithmetic.formula().clone(), has_minus_one)?;

            let updated = arithmetic.intersect(&string_term_binary)?;
            let satisfiable = updated.is_satisfiable();
            self.arithmetic_solver
                .update_term_value(term, Value::BinaryInt(updated.clone()));
            if !satisfiable {
                break;
            }

            let mut projection = updated.project_onto(&name)?;
            if has_minus_one {
                has_minus_one = projection.has_negative_1(&name);
                projection = projection.get_positive_values_for(&name)?;
            }
            let refined_ints = projection.to_unary_automaton().to_int_automaton(has_minus_one);
            self.clear_term_value(string_term);
            self.set_term_value(string_term, Value::IntAutomaton(refined_ints));

            self.update_variables()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // dispatch

    fn visit(&mut self, term: TermId) -> Result<()> {
        match self.store.get(term).clone() {
            TermData::And(conjuncts) => self.visit_and(term, &conjuncts),
            TermData::Or(disjuncts) => self.visit_or(term, &disjuncts),
            TermData::Not(child) => self.visit_not(term, child),
            TermData::Eq(left, right) => self.visit_eq(term, left, right),
            TermData::NotEq(left, right) => self.visit_not_eq(term, left, right),
            TermData::Lt(left, right) => self.visit_comparison(term, left, right, Comparison::Lt),
            TermData::Le(left, right) => self.visit_comparison(term, left, right, Comparison::Le),
            TermData::Gt(left, right) => self.visit_comparison(term, left, right, Comparison::Gt),
            TermData::Ge(left, right) => self.visit_comparison(term, left, right, Comparison::Ge),
            TermData::Plus(parts) => self.visit_fold(term, &parts, Value::plus),
            TermData::Minus(left, right) => self.visit_minus(term, left, right),
            TermData::Times(parts) => self.visit_fold(term, &parts, Value::times),
            TermData::UMinus(child) => self.visit_uminus(term, child),
            TermData::Concat(parts) => self.visit_fold(term, &parts, Value::concat),
            TermData::In(left, right) => self.visit_in(term, left, right),
            TermData::NotIn(left, right) => self.visit_not_in(term, left, right),
            TermData::Len(child) => self.visit_len(term, child),
            TermData::Contains(subject, search) => self.visit_contains(term, subject, search),
            TermData::NotContains(subject, search) => {
                self.visit_not_contains(term, subject, search)
            }
            TermData::Begins(subject, search) => self.visit_begins(term, subject, search),
            TermData::NotBegins(subject, search) => self.visit_not_begins(term, subject, search),
            TermData::Ends(subject, search) => self.visit_ends(term, subject, search),
            TermData::NotEnds(subject, search) => self.visit_not_ends(term, subject, search),
            TermData::IndexOf(subject, search) => {
                self.visit_index_of(term, subject, search, false)
            }
            TermData::LastIndexOf(subject, search) => {
                self.visit_index_of(term, subject, search, true)
            }
            TermData::CharAt(subject, index) => self.visit_char_at(term, subject, index),
            TermData::SubString {
                mode,
                subject,
                start,
                end,
            } => self.visit_sub_string(term, mode, subject, start, end),
            TermData::ToUpper(child) => self.visit_string_map(term, child, StringAutomaton::to_upper_case),
            TermData::ToLower(child) => self.visit_string_map(term, child, StringAutomaton::to_lower_case),
            TermData::Trim(child) => self.visit_string_map(term, child, StringAutomaton::trim),
            TermData::ToString(child) => self.visit_to_string(term, child),
            TermData::ToInt(child) => self.visit_to_int(term, child),
            TermData::Replace(subject, search, replacement) => {
                self.visit_replace(term, subject, search, replacement)
            }
            TermData::Count(_, _) => Err(SolverError::Unsupported(format!(
                "count is not implemented: {}",
                self.store.display(term)
            ))),
            TermData::Let { bindings, body } => self.visit_let(term, &bindings, body),
            TermData::Variable(name) => self.visit_variable(term, &name),
            TermData::Constant(constant) => self.visit_constant(term, &constant),
            TermData::Unknown { args, .. } => self.visit_unknown(term, &args),
            // quantifiers and if-then-else are inert in this evaluator
            TermData::Ite(_, _, _) | TermData::Forall(_) | TermData::Exists(_) => Ok(()),
        }
    }

    fn visit_children_of(&mut self, term: TermId) -> Result<()> {
        self.path_trace.push(term);
        for child in self.store.children(term) {
            self.visit(child)?;
        }
        self.path_trace.pop();
        Ok(())
    }

    // ------------------------------------------------------------------
    // connectives

    fn visit_and(&mut self, term: TermId, conjuncts: &[TermId]) -> Result<()> {
        debug!("and: {} conjuncts", conjuncts.len());

        // components are solved by the engines once, before the walk
        if self.constraint_information.is_component(term) && self.iteration == 0 {
            if self.config.lia_engine_enabled {
                self.arithmetic_solver
                    .start(self.store, &mut self.symbol_table, term)?;
            }
            if self.config.enable_relational_string_automata {
                self.string_solver
                    .start(self.store, &mut self.symbol_table, term)?;
            }
        }

        let mut is_satisfiable = true;
        for &conjunct in conjuncts {
            self.check_and_visit(conjunct)?;
            let param = self.lookup_term_value(conjunct).unwrap_or_else(|| {
                panic!("value is not computed for term {}", self.store.display(conjunct))
            });
            is_satisfiable = is_satisfiable && param.is_satisfiable();
            if is_satisfiable {
                // refinement can flip satisfiability when relational
                // variables are written back
                self.still_sat = true;
                self.update_variables()?;
                is_satisfiable = is_satisfiable && self.still_sat;
            }
            self.clear_term_values_and_local_let_vars();
            if !is_satisfiable {
                break;
            }
        }
        self.set_term_value(term, Value::Bool(is_satisfiable));

        if self.config.lia_engine_enabled && self.constraint_information.is_component(term) {
            if let Some(value) = self.arithmetic_solver.get_term_value(term).cloned() {
                if let Some(name) = self.arithmetic_solver.get_int_variable_name(term) {
                    let name = name.to_string();
                    self.symbol_table.set_value(&name, value);
                }
            }
        }

        if self.config.enable_relational_string_automata
            && self.constraint_information.is_component(term)
        {
            let Some(variable) = self.symbol_table.get_symbolic_variable() else {
                return Ok(());
            };
            let scope = self.symbol_table.top_scope();
            let Some(representative) = self
                .symbol_table
                .get_representative_variable_of_at_scope(scope, &variable.name)
            else {
                return Ok(());
            };
            if let Some(mut value) = self.string_solver.get_variable_value(&representative.name) {
                // the engine's value is cloned before the track map is
                // rewritten, so the symbolic variable also appears on its
                // representative's track
                if let Value::MultiTrack(ref mut multi) = value {
                    let mut trackmap = multi.relation().variable_trackmap().clone();
                    if let Some(track) = trackmap.get(&representative.name).copied() {
                        trackmap.insert(variable.name.clone(), track);
                        multi.relation_mut().set_variable_trackmap(trackmap);
                    }
                }
                self.symbol_table
                    .set_value(&representative.name, value.clone());
                self.symbol_table.set_value(&variable.name, value);
            }
        }
        Ok(())
    }

    fn visit_or(&mut self, term: TermId, disjuncts: &[TermId]) -> Result<()> {
        debug!("or: {} disjuncts", disjuncts.len());

        let mut is_satisfiable = false;
        for &disjunct in disjuncts {
            self.symbol_table.push_scope(disjunct);
            self.check_and_visit(disjunct)?;

            let param = self.lookup_term_value(disjunct).unwrap_or_else(|| {
                panic!("value is not computed for term {}", self.store.display(disjunct))
            });
            let mut scope_satisfiable = param.is_satisfiable();

            if !self.store.is_and(disjunct) {
                if scope_satisfiable {
                    self.still_sat = true;
                    self.update_variables()?;
                    scope_satisfiable = scope_satisfiable && self.still_sat;
                }
                self.clear_term_values_and_local_let_vars();
            }

            self.symbol_table.set_scope_satisfiability(scope_satisfiable);
            is_satisfiable = is_satisfiable || scope_satisfiable;

            self.symbol_table.pop_scope();
            if is_satisfiable && !self.config.model_counter_enabled {
                break;
            }
        }
        self.set_term_value(term, Value::Bool(is_satisfiable));
        Ok(())
    }

    fn visit_let(
        &mut self,
        term: TermId,
        bindings: &[(String, TermId)],
        body: TermId,
    ) -> Result<()> {
        self.symbol_table.push_let_scope();
        for (symbol, bound) in bindings {
            self.path_trace.push(term);
            self.check_and_visit(*bound)?;
            self.path_trace.pop();
            let param = self.lookup_term_value(*bound).unwrap_or_else(|| {
                panic!("value is not computed for term {}", self.store.display(*bound))
            });
            self.symbol_table.set_let_value(symbol.clone(), param);
        }
        self.path_trace.push(term);
        self.check_and_visit(body)?;
        self.path_trace.pop();
        let result = self.lookup_term_value(body).unwrap_or_else(|| {
            panic!("value is not computed for term {}", self.store.display(body))
        });
        self.symbol_table.pop_let_scope();
        self.set_term_value(term, result);
        Ok(())
    }

    // ------------------------------------------------------------------
    // boolean and numeric nodes

    fn visit_not(&mut self, term: TermId, child: TermId) -> Result<()> {
        self.visit_children_of(term)?;
        let param = self.own_value(child).clone();
        let result = match &param {
            Value::Bool(_) => param.complement()?,
            Value::IntAutomaton(auto) if !auto.is_accepting_single_int() => param.clone(),
            Value::StringAutomaton(auto) if !auto.is_accepting_single_string() => param.clone(),
            // singletons complement precisely; everything else must support
            // complement or the formula leaves the fragment
            _ => param.complement()?,
        };
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_uminus(&mut self, term: TermId, child: TermId) -> Result<()> {
        self.visit_children_of(term)?;
        let param = self.own_value(child).clone();
        let result = match &param {
            Value::Int(value) => Value::Int(-value),
            Value::IntAutomaton(auto) => match auto.is_accepting_single_int() {
                true => Value::Int(-auto.an_accepting_int().expect("singleton has a member")),
                false => Value::IntAutomaton(auto.uminus()),
            },
            other => {
                return Err(SolverError::UnexpectedOperand {
                    context: self.store.display(term),
                    operand: other.kind_name(),
                })
            }
        };
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_minus(&mut self, term: TermId, left: TermId, right: TermId) -> Result<()> {
        self.visit_children_of(term)?;
        let result = self.own_value(left).minus(self.own_value(right))?;
        self.set_term_value(term, result);
        Ok(())
    }

    /// Left fold over an n-ary list: `+`, `*`, `concat`.
    fn visit_fold(
        &mut self,
        term: TermId,
        parts: &[TermId],
        op: fn(&Value, &Value) -> Result<Value>,
    ) -> Result<()> {
        self.path_trace.push(term);
        let mut result: Option<Value> = None;
        for &part in parts {
            self.visit(part)?;
            let param = self.own_value(part);
            result = Some(match result {
                None => param.clone(),
                Some(acc) => op(&acc, param)?,
            });
        }
        self.path_trace.pop();
        let result = result.unwrap_or_else(|| {
            panic!("empty operand list in {}", self.store.display(term))
        });
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_eq(&mut self, term: TermId, left: TermId, right: TermId) -> Result<()> {
        self.visit_children_of(term)?;
        let lhs = self.own_value(left);
        let rhs = self.own_value(right);
        let result = match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Value::Bool(a == b),
            (Value::Int(a), Value::Int(b)) => Value::Bool(a == b),
            _ => lhs.intersect(rhs)?,
        };
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_not_eq(&mut self, term: TermId, left: TermId, right: TermId) -> Result<()> {
        // `var != "literal"` refines the variable's relational class
        if let (TermData::Variable(name), TermData::Constant(Constant::Str(literal))) =
            (self.store.get(left), self.store.get(right))
        {
            if self.symbol_table.sort_of(name) == Some(Sort::Str) {
                let complement = StringAutomaton::make_string(literal).complement();
                let value = Value::StringAutomaton(complement);
                if self.string_solver.update_variable_value(name, &value) {
                    self.set_term_value(term, value);
                    return Ok(());
                }
            }
        }

        self.visit_children_of(term)?;
        let lhs = self.own_value(left);
        let rhs = self.own_value(right);
        let result = match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Value::Bool(a != b),
            (Value::Int(a), Value::Int(b)) => Value::Bool(a != b),
            _ if !(lhs.is_satisfiable() && rhs.is_satisfiable()) => Value::Bool(false),
            _ => {
                // an empty intersection proves the disequality; a non-empty
                // one over-approximates it
                let intersection = lhs.intersect(rhs)?;
                if intersection.is_satisfiable() {
                    intersection
                } else {
                    Value::Bool(true)
                }
            }
        };
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_comparison(
        &mut self,
        term: TermId,
        left: TermId,
        right: TermId,
        comparison: Comparison,
    ) -> Result<()> {
        self.visit_children_of(term)?;
        let lhs = self.own_value(left);
        let rhs = self.own_value(right);
        let verdict = match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => match comparison {
                Comparison::Lt => a < b,
                Comparison::Le => a <= b,
                Comparison::Gt => a > b,
                Comparison::Ge => a >= b,
            },
            (Value::Int(constant), Value::IntAutomaton(auto)) => match comparison {
                Comparison::Lt => auto.is_greater_than(*constant),
                Comparison::Le => auto.is_greater_than_or_equal(*constant),
                Comparison::Gt => auto.is_less_than(*constant),
                Comparison::Ge => auto.is_less_than_or_equal(*constant),
            },
            (Value::IntAutomaton(auto), Value::Int(constant)) => match comparison {
                Comparison::Lt => auto.is_less_than(*constant),
                Comparison::Le => auto.is_less_than_or_equal(*constant),
                Comparison::Gt => auto.is_greater_than(*constant),
                Comparison::Ge => auto.is_greater_than_or_equal(*constant),
            },
            (Value::IntAutomaton(a), Value::IntAutomaton(b)) => match comparison {
                Comparison::Lt => a.is_less_than_auto(b),
                Comparison::Le => a.is_less_than_or_equal_auto(b),
                Comparison::Gt => a.is_greater_than_auto(b),
                Comparison::Ge => a.is_greater_than_or_equal_auto(b),
            },
            (unexpected, _) if !matches!(unexpected, Value::Int(_) | Value::IntAutomaton(_)) => {
                return Err(SolverError::UnexpectedOperand {
                    context: self.store.display(term),
                    operand: unexpected.kind_name(),
                })
            }
            (_, unexpected) => {
                return Err(SolverError::UnexpectedOperand {
                    context: self.store.display(term),
                    operand: unexpected.kind_name(),
                })
            }
        };
        self.set_term_value(term, Value::Bool(verdict));
        Ok(())
    }

    // ------------------------------------------------------------------
    // string nodes

    fn visit_in(&mut self, term: TermId, left: TermId, right: TermId) -> Result<()> {
        // `var in literal` refines the variable's relational class
        if let TermData::Variable(name) = self.store.get(left) {
            let automaton = match self.store.get(right) {
                TermData::Constant(Constant::Regex(pattern)) => {
                    Some(StringAutomaton::make_regex(pattern)?)
                }
                TermData::Constant(Constant::Str(literal)) => {
                    Some(StringAutomaton::make_string(literal))
                }
                _ => None,
            };
            if let Some(automaton) = automaton {
                let value = Value::StringAutomaton(automaton);
                if self.string_solver.update_variable_value(name, &value) {
                    self.set_term_value(term, value);
                    return Ok(());
                }
            }
        }

        self.visit_children_of(term)?;
        let lhs = self.own_value(left);
        let rhs = self.own_value(right);
        match (lhs.as_string_automaton(), rhs.as_string_automaton()) {
            (Some(_), Some(_)) => {
                let result = lhs.intersect(rhs)?;
                self.set_term_value(term, result);
                Ok(())
            }
            _ => Err(SolverError::UnexpectedOperand {
                context: self.store.display(term),
                operand: lhs.kind_name(),
            }),
        }
    }

    fn visit_not_in(&mut self, term: TermId, left: TermId, right: TermId) -> Result<()> {
        self.visit_children_of(term)?;
        let lhs = self.own_value(left);
        let rhs = self.own_value(right);
        if lhs.as_string_automaton().is_none() || rhs.as_string_automaton().is_none() {
            return Err(SolverError::UnexpectedOperand {
                context: self.store.display(term),
                operand: lhs.kind_name(),
            });
        }
        let result = lhs.difference(rhs)?;
        if let TermData::Variable(name) = self.store.get(left) {
            let name = name.clone();
            self.symbol_table.update_value(&name, &result);
        }
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_len(&mut self, term: TermId, child: TermId) -> Result<()> {
        self.visit_children_of(term)?;
        let param = self.own_value(child);
        let Some(automaton) = param.as_string_automaton() else {
            return Err(SolverError::UnexpectedOperand {
                context: self.store.display(term),
                operand: param.kind_name(),
            });
        };
        let lengths = automaton.length();
        let result = match lengths.is_accepting_single_int() {
            true => Value::Int(lengths.an_accepting_int().expect("singleton has a member")),
            false => Value::IntAutomaton(lengths),
        };
        self.set_term_value(term, result);
        Ok(())
    }

    fn subject_and_search(
        &self,
        term: TermId,
        subject: TermId,
        search: TermId,
    ) -> Result<(StringAutomaton, StringAutomaton)> {
        let subject_value = self.own_value(subject);
        let search_value = self.own_value(search);
        match (
            subject_value.as_string_automaton(),
            search_value.as_string_automaton(),
        ) {
            (Some(a), Some(b)) => Ok((a.clone(), b.clone())),
            (None, _) => Err(SolverError::UnexpectedOperand {
                context: self.store.display(term),
                operand: subject_value.kind_name(),
            }),
            (_, None) => Err(SolverError::UnexpectedOperand {
                context: self.store.display(term),
                operand: search_value.kind_name(),
            }),
        }
    }

    fn visit_contains(&mut self, term: TermId, subject: TermId, search: TermId) -> Result<()> {
        self.visit_children_of(term)?;
        let (subject_auto, search_auto) = self.subject_and_search(term, subject, search)?;
        self.set_term_value(term, Value::StringAutomaton(subject_auto.contains(&search_auto)));
        Ok(())
    }

    fn visit_begins(&mut self, term: TermId, subject: TermId, search: TermId) -> Result<()> {
        self.visit_children_of(term)?;
        let (subject_auto, search_auto) = self.subject_and_search(term, subject, search)?;
        self.set_term_value(term, Value::StringAutomaton(subject_auto.begins(&search_auto)));
        Ok(())
    }

    fn visit_ends(&mut self, term: TermId, subject: TermId, search: TermId) -> Result<()> {
        self.visit_children_of(term)?;
        let (subject_auto, search_auto) = self.subject_and_search(term, subject, search)?;
        self.set_term_value(term, Value::StringAutomaton(subject_auto.ends(&search_auto)));
        Ok(())
    }

    /// Shared shape of the three negated string predicates: a single-valued
    /// search side subtracts the positive language from the subject; a
    /// single-valued subject checks whether the search can still avoid it;
    /// anything else keeps the subject unchanged.
    fn visit_negated_predicate(
        &mut self,
        term: TermId,
        subject: TermId,
        search: TermId,
        positive: fn(&StringAutomaton, &StringAutomaton) -> StringAutomaton,
        factors: fn(&StringAutomaton) -> StringAutomaton,
    ) -> Result<()> {
        self.visit_children_of(term)?;
        let subject_value = self.own_value(subject).clone();
        let search_value = self.own_value(search).clone();
        if !(subject_value.is_satisfiable() && search_value.is_satisfiable()) {
            self.set_term_value(term, Value::Bool(false));
            return Ok(());
        }
        let (subject_auto, search_auto) = self.subject_and_search(term, subject, search)?;
        let result = if search_value.is_single_value() {
            let positive_auto = positive(&subject_auto, &search_auto);
            Value::StringAutomaton(subject_auto.difference(&positive_auto))
        } else if subject_value.is_single_value() {
            let viable = search_auto.difference(&factors(&subject_auto));
            if viable.is_empty_language() {
                Value::StringAutomaton(StringAutomaton::make_phi())
            } else {
                subject_value
            }
        } else {
            subject_value
        };
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_not_contains(&mut self, term: TermId, subject: TermId, search: TermId) -> Result<()> {
        self.visit_negated_predicate(
            term,
            subject,
            search,
            StringAutomaton::contains,
            StringAutomaton::sub_strings,
        )
    }

    fn visit_not_begins(&mut self, term: TermId, subject: TermId, search: TermId) -> Result<()> {
        self.visit_negated_predicate(
            term,
            subject,
            search,
            StringAutomaton::begins,
            StringAutomaton::prefixes,
        )
    }

    fn visit_not_ends(&mut self, term: TermId, subject: TermId, search: TermId) -> Result<()> {
        self.visit_negated_predicate(
            term,
            subject,
            search,
            StringAutomaton::ends,
            StringAutomaton::suffixes,
        )
    }

    fn visit_index_of(
        &mut self,
        term: TermId,
        subject: TermId,
        search: TermId,
        last: bool,
    ) -> Result<()> {
        self.visit_children_of(term)?;
        let (subject_auto, search_auto) = self.subject_and_search(term, subject, search)?;
        let indices = if last {
            subject_auto.last_index_of(&search_auto)
        } else {
            subject_auto.index_of(&search_auto)
        };
        let result = match indices.is_accepting_single_int() {
            true => Value::Int(indices.an_accepting_int().expect("singleton has a member")),
            false => Value::IntAutomaton(indices),
        };
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_char_at(&mut self, term: TermId, subject: TermId, index: TermId) -> Result<()> {
        self.visit_children_of(term)?;
        let subject_value = self.own_value(subject);
        let Some(automaton) = subject_value.as_string_automaton() else {
            return Err(SolverError::UnexpectedOperand {
                context: self.store.display(term),
                operand: subject_value.kind_name(),
            });
        };
        let index_value = self.own_value(index);
        let Some(position) = index_value.as_int() else {
            return Err(SolverError::UnexpectedOperand {
                context: self.store.display(term),
                operand: index_value.kind_name(),
            });
        };
        let result = Value::StringAutomaton(automaton.char_at(position));
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_sub_string(
        &mut self,
        term: TermId,
        mode: SubStringMode,
        subject: TermId,
        start: TermId,
        end: Option<TermId>,
    ) -> Result<()> {
        self.visit_children_of(term)?;
        let subject_value = self.own_value(subject);
        let Some(subject_auto) = subject_value.as_string_automaton().cloned() else {
            return Err(SolverError::UnexpectedOperand {
                context: self.store.display(term),
                operand: subject_value.kind_name(),
            });
        };
        let start_value = self.own_value(start).clone();
        let result = match mode {
            SubStringMode::FromIndex => {
                debug!("subString mode: FromIndex");
                let Some(from) = start_value.as_int() else {
                    return Err(SolverError::UnexpectedOperand {
                        context: self.store.display(term),
                        operand: start_value.kind_name(),
                    });
                };
                Value::StringAutomaton(subject_auto.sub_string_from(from))
            }
            SubStringMode::FromFirstOf => {
                debug!("subString mode: FromFirstOf");
                let Some(of) = start_value.as_string_automaton() else {
                    return Err(SolverError::UnexpectedOperand {
                        context: self.store.display(term),
                        operand: start_value.kind_name(),
                    });
                };
                Value::StringAutomaton(subject_auto.sub_string_first_of(of))
            }
            SubStringMode::FromLastOf => {
                debug!("subString mode: FromLastOf");
                let Some(of) = start_value.as_string_automaton() else {
                    return Err(SolverError::UnexpectedOperand {
                        context: self.store.display(term),
                        operand: start_value.kind_name(),
                    });
                };
                Value::StringAutomaton(subject_auto.sub_string_last_of(of))
            }
            SubStringMode::FromIndexToIndex => {
                debug!("subString mode: FromIndexToIndex");
                let end = end.unwrap_or_else(|| {
                    panic!("subString without an end index: {}", self.store.display(term))
                });
                let end_value = self.own_value(end).clone();
                match (&start_value, &end_value) {
                    (_, Value::IntAutomaton(ends)) => {
                        if ends.is_empty_language() {
                            Value::StringAutomaton(StringAutomaton::make_phi())
                        } else if let Some(from) = start_value.as_int() {
                            Value::StringAutomaton(subject_auto.sub_string_range_upto(from, ends))
                        } else {
                            return Err(SolverError::Unsupported(format!(
                                "subString with a symbolic start index: {}",
                                self.store.display(term)
                            )));
                        }
                    }
                    (Value::Int(from), Value::Int(to)) => {
                        Value::StringAutomaton(subject_auto.sub_string_range(*from, *to))
                    }
                    _ => {
                        return Err(SolverError::UnexpectedOperand {
                            context: self.store.display(term),
                            operand: end_value.kind_name(),
                        })
                    }
                }
            }
            other => {
                return Err(SolverError::Unsupported(format!(
                    "subString mode {other:?}: {}",
                    self.store.display(term)
                )))
            }
        };
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_string_map(
        &mut self,
        term: TermId,
        child: TermId,
        op: fn(&StringAutomaton) -> StringAutomaton,
    ) -> Result<()> {
        self.visit_children_of(term)?;
        let param = self.own_value(child);
        let Some(automaton) = param.as_string_automaton() else {
            return Err(SolverError::UnexpectedOperand {
                context: self.store.display(term),
                operand: param.kind_name(),
            });
        };
        let result = Value::StringAutomaton(op(automaton));
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_to_string(&mut self, term: TermId, child: TermId) -> Result<()> {
        self.visit_children_of(term)?;
        let param = self.own_value(child).clone();
        let result = match &param {
            Value::Int(value) => {
                Value::StringAutomaton(StringAutomaton::make_string(&value.to_string()))
            }
            Value::IntAutomaton(auto) => match auto.finite_values() {
                Some(values) => {
                    let mut result = StringAutomaton::make_phi();
                    for value in values {
                        result = result.union(&StringAutomaton::make_string(&value.to_string()));
                    }
                    Value::StringAutomaton(result)
                }
                None => {
                    warn!("toString over an unbounded integer set, over-approximating");
                    Value::StringAutomaton(StringAutomaton::make_regex("\\d+")?)
                }
            },
            other => {
                return Err(SolverError::UnexpectedOperand {
                    context: self.store.display(term),
                    operand: other.kind_name(),
                })
            }
        };
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_to_int(&mut self, term: TermId, child: TermId) -> Result<()> {
        self.visit_children_of(term)?;
        let param = self.own_value(child);
        let Some(automaton) = param.as_string_automaton() else {
            return Err(SolverError::UnexpectedOperand {
                context: self.store.display(term),
                operand: param.kind_name(),
            });
        };
        let parsed = automaton.parse_to_int_automaton();
        let result = match parsed.is_accepting_single_int() {
            true => Value::Int(parsed.an_accepting_int().expect("singleton has a member")),
            false => Value::IntAutomaton(parsed),
        };
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_replace(
        &mut self,
        term: TermId,
        subject: TermId,
        search: TermId,
        replacement: TermId,
    ) -> Result<()> {
        self.visit_children_of(term)?;
        let (subject_auto, search_auto) = self.subject_and_search(term, subject, search)?;
        let replacement_value = self.own_value(replacement);
        let Some(replacement_auto) = replacement_value.as_string_automaton() else {
            return Err(SolverError::UnexpectedOperand {
                context: self.store.display(term),
                operand: replacement_value.kind_name(),
            });
        };
        let result = Value::StringAutomaton(subject_auto.replace(&search_auto, replacement_auto));
        self.set_term_value(term, result);
        Ok(())
    }

    fn visit_unknown(&mut self, term: TermId, args: &[TermId]) -> Result<()> {
        warn!(
            "unknown operation, over-approximating: {}",
            self.store.display(term)
        );
        self.path_trace.push(term);
        for &arg in args {
            self.visit(arg)?;
        }
        self.path_trace.pop();
        self.set_term_value(term, Value::StringAutomaton(StringAutomaton::make_any_string()));
        Ok(())
    }

    // ------------------------------------------------------------------
    // leaves

    fn visit_variable(&mut self, term: TermId, name: &str) -> Result<()> {
        debug!("variable: {name}");
        // relational variables live in the string engine; pull the freshest
        // value into the symbol table and tag the variable for write-back
        // after refinement
        let mut relational = None;
        if self.config.enable_relational_string_automata {
            relational = self.string_solver.get_variable_value(name);
        }
        let result = match relational {
            Some(value) => {
                self.symbol_table.set_value(name, value.clone());
                self.tagged_variables.push(name.to_string());
                value
            }
            None => self
                .symbol_table
                .get_value(name)
                .cloned()
                .unwrap_or_else(|| panic!("no value for variable {name}")),
        };
        self.set_term_value(term, result);
        self.set_variable_path(term);
        Ok(())
    }

    fn visit_constant(&mut self, term: TermId, constant: &Constant) -> Result<()> {
        let result = match constant {
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(i) => Value::Int(*i),
            Constant::Str(s) => Value::StringAutomaton(StringAutomaton::make_string(s)),
            Constant::Regex(pattern) => {
                Value::StringAutomaton(StringAutomaton::make_regex(pattern)?)
            }
        };
        self.set_term_value(term, result);
        Ok(())
    }

    // ------------------------------------------------------------------
    // bookkeeping

    /// The value computed for a term: sub-engines first (except for the
    /// connectives, whose engine entries are component solutions rather
    /// than verdicts), then the evaluator's own map. Callers own the clone.
    fn lookup_term_value(&self, term: TermId) -> Option<Value> {
        if !self.store.is_and(term) && !self.store.is_or(term) {
            if let Some(value) = self.arithmetic_solver.get_term_value(term) {
                return Some(value.clone());
            }
            if let Some(value) = self.string_solver.get_term_value(term) {
                return Some(value);
            }
        }
        self.term_values.get(&term).cloned()
    }

    /// The evaluator's own value for a node it just visited.
    fn own_value(&self, term: TermId) -> &Value {
        self.term_values.get(&term).unwrap_or_else(|| {
            panic!("value is not computed for term {}", self.store.display(term))
        })
    }

    fn set_term_value(&mut self, term: TermId, value: Value) {
        if self.term_values.insert(term, value).is_some() {
            panic!("value is already computed for term {}", self.store.display(term));
        }
    }

    fn clear_term_value(&mut self, term: TermId) {
        self.term_values.remove(&term);
    }

    fn clear_term_values_and_local_let_vars(&mut self) {
        self.term_values.clear();
        self.symbol_table.clear_let_scopes();
    }

    /// Record the reversed ancestor path of a variable occurrence.
    fn set_variable_path(&mut self, term: TermId) {
        self.path_trace.push(term);
        let path: Vec<TermId> = self.path_trace.iter().rev().copied().collect();
        self.path_trace.pop();
        self.variable_path_table.push(path);
    }

    /// Run the variable value computer over the recorded paths, then write
    /// tagged relational variables back to the string engine and fold any
    /// satisfiability change into `still_sat`.
    fn update_variables(&mut self) -> Result<()> {
        if self.variable_path_table.is_empty() {
            return Ok(());
        }
        let refinements_satisfiable = VariableValueComputer::new(
            self.store,
            &mut self.symbol_table,
            &self.variable_path_table,
            &self.term_values,
        )
        .start()?;
        self.still_sat = self.still_sat && refinements_satisfiable;
        self.variable_path_table.clear();

        let tagged = std::mem::take(&mut self.tagged_variables);
        for name in tagged {
            let Some(value) = self.symbol_table.get_value(&name).cloned() else {
                debug!("inconsistent value for variable {name}");
                continue;
            };
            self.string_solver.update_variable_value(&name, &value);
            self.still_sat = self.still_sat && value.is_satisfiable();
            self.symbol_table.clear_value(&name);
        }
        Ok(())
    }
}
