//! Scoped variable bindings.
//!
//! The table keeps one value per variable per scope. Scopes are keyed by the
//! AST node that opened them and their value maps persist after the scope is
//! popped, so a model-counting pass can read every disjunct's refinements
//! after evaluation; the active stack only governs lookup. Let bindings live
//! on a separate transient stack that is dropped wholesale at clear points.

use hashbrown::HashMap;

use strand_core::{Sort, TermId};

use crate::value::Value;

/// A declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Variable name
    pub name: String,
    /// Declared sort
    pub sort: Sort,
}

/// Scoped mapping from variable names to symbolic values.
#[derive(Debug, Default)]
pub struct SymbolTable {
    variables: HashMap<String, Variable>,
    global_values: HashMap<String, Value>,
    scope_values: HashMap<TermId, HashMap<String, Value>>,
    scope_satisfiable: HashMap<TermId, bool>,
    stack: Vec<TermId>,
    let_stack: Vec<HashMap<String, Value>>,
    global_satisfiable: bool,
    symbolic_variable: Option<String>,
    representatives: HashMap<(Option<TermId>, String), String>,
    expression_names: HashMap<TermId, String>,
}

impl SymbolTable {
    /// An empty table; satisfiability starts true.
    #[must_use]
    pub fn new() -> Self {
        Self {
            global_satisfiable: true,
            ..Self::default()
        }
    }

    // ------------------------------------------------------------------
    // declarations

    /// Declare a variable and seed it with the top universe of its sort.
    ///
    /// Booleans have no automaton payload in this fragment; they are seeded
    /// with the true constant, an over-approximation.
    pub fn declare_variable(&mut self, name: impl Into<String>, sort: Sort) {
        let name = name.into();
        let seed = match sort {
            Sort::Str => Value::StringAutomaton(
                strand_automata::StringAutomaton::make_any_string(),
            ),
            Sort::Int => Value::IntAutomaton(strand_automata::IntAutomaton::any_natural()),
            Sort::Bool => Value::Bool(true),
        };
        self.global_values.insert(name.clone(), seed);
        self.variables.insert(name.clone(), Variable { name, sort });
    }

    /// Look up a declared variable.
    #[must_use]
    pub fn get_variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// Sort of a declared variable.
    #[must_use]
    pub fn sort_of(&self, name: &str) -> Option<Sort> {
        self.variables.get(name).map(|v| v.sort)
    }

    // ------------------------------------------------------------------
    // scopes

    /// Enter the scope keyed by `node`, reattaching its archived values.
    pub fn push_scope(&mut self, node: TermId) {
        self.stack.push(node);
        self.scope_values.entry(node).or_default();
    }

    /// Leave the innermost scope. Its values stay archived.
    pub fn pop_scope(&mut self) {
        self.stack.pop();
    }

    /// The innermost active scope, if any.
    #[must_use]
    pub fn top_scope(&self) -> Option<TermId> {
        self.stack.last().copied()
    }

    /// Open a transient let scope.
    pub fn push_let_scope(&mut self) {
        self.let_stack.push(HashMap::new());
    }

    /// Close the innermost let scope.
    pub fn pop_let_scope(&mut self) {
        self.let_stack.pop();
    }

    /// Drop every let binding.
    pub fn clear_let_scopes(&mut self) {
        self.let_stack.clear();
    }

    /// Bind a let symbol in the innermost let scope.
    pub fn set_let_value(&mut self, name: impl Into<String>, value: Value) {
        self.let_stack
            .last_mut()
            .expect("let binding outside a let scope")
            .insert(name.into(), value);
    }

    // ------------------------------------------------------------------
    // values

    /// The value visible for `name`: let bindings first, then the active
    /// scope chain, then the global seed.
    #[must_use]
    pub fn get_value(&self, name: &str) -> Option<&Value> {
        for frame in self.let_stack.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Some(value);
            }
        }
        for scope in self.stack.iter().rev() {
            if let Some(value) = self.scope_values[scope].get(name) {
                return Some(value);
            }
        }
        self.global_values.get(name)
    }

    /// The value recorded in one archived scope.
    #[must_use]
    pub fn get_value_at_scope(&self, scope: TermId, name: &str) -> Option<&Value> {
        self.scope_values.get(&scope)?.get(name)
    }

    /// Install a value for `name`, taking ownership. Let-bound symbols stay
    /// in their let frame; everything else lands in the innermost scope, or
    /// the global map outside any scope.
    pub fn set_value(&mut self, name: &str, value: Value) {
        for frame in self.let_stack.iter_mut().rev() {
            if frame.contains_key(name) {
                frame.insert(name.to_string(), value);
                return;
            }
        }
        match self.stack.last() {
            Some(scope) => {
                self.scope_values
                    .get_mut(scope)
                    .expect("active scope is archived")
                    .insert(name.to_string(), value);
            }
            None => {
                self.global_values.insert(name.to_string(), value);
            }
        }
    }

    /// Install a deep copy of `value` for `name`.
    pub fn update_value(&mut self, name: &str, value: &Value) {
        self.set_value(name, value.clone());
    }

    /// Remove the visible binding of `name`, if any.
    pub fn clear_value(&mut self, name: &str) {
        for frame in self.let_stack.iter_mut().rev() {
            if frame.remove(name).is_some() {
                return;
            }
        }
        for scope in self.stack.iter().rev() {
            if self
                .scope_values
                .get_mut(scope)
                .is_some_and(|values| values.remove(name).is_some())
            {
                return;
            }
        }
        self.global_values.remove(name);
    }

    // ------------------------------------------------------------------
    // satisfiability

    /// Fold a verdict into global satisfiability.
    pub fn update_satisfiability(&mut self, satisfiable: bool) {
        self.global_satisfiable = self.global_satisfiable && satisfiable;
    }

    /// Record the verdict of the innermost scope.
    pub fn set_scope_satisfiability(&mut self, satisfiable: bool) {
        if let Some(scope) = self.stack.last() {
            self.scope_satisfiable.insert(*scope, satisfiable);
        }
    }

    /// The global verdict.
    #[must_use]
    pub fn is_satisfiable(&self) -> bool {
        self.global_satisfiable
    }

    /// The recorded verdict of an archived scope.
    #[must_use]
    pub fn scope_satisfiability(&self, scope: TermId) -> Option<bool> {
        self.scope_satisfiable.get(&scope).copied()
    }

    // ------------------------------------------------------------------
    // relational bookkeeping

    /// Designate the variable of interest for component write-back.
    pub fn set_symbolic_variable(&mut self, name: Option<String>) {
        self.symbolic_variable = name;
    }

    /// The designated variable of interest.
    #[must_use]
    pub fn get_symbolic_variable(&self) -> Option<Variable> {
        self.symbolic_variable
            .as_ref()
            .and_then(|name| self.variables.get(name).cloned())
    }

    /// Register the representative of `name`'s equivalence class at a scope.
    pub fn set_representative(
        &mut self,
        scope: Option<TermId>,
        name: impl Into<String>,
        representative: impl Into<String>,
    ) {
        self.representatives
            .insert((scope, name.into()), representative.into());
    }

    /// The canonical member of `name`'s equivalence class at a scope.
    #[must_use]
    pub fn get_representative_variable_of_at_scope(
        &self,
        scope: Option<TermId>,
        name: &str,
    ) -> Option<Variable> {
        let representative = self.representatives.get(&(scope, name.to_string()))?;
        self.variables.get(representative).cloned()
    }

    /// A stable generated variable name for a string-derived integer
    /// expression such as a length or an index.
    pub fn get_var_name_for_expression(&mut self, term: TermId, sort: Sort) -> String {
        if let Some(name) = self.expression_names.get(&term) {
            return name.clone();
        }
        let prefix = match sort {
            Sort::Int => "__int_expr",
            Sort::Str => "__str_expr",
            Sort::Bool => "__bool_expr",
        };
        let name = format!("{prefix}_{term}");
        self.expression_names.insert(term, name.clone());
        name
    }
}
