//! Term arena for assertion ASTs.
//!
//! Terms live in a [`TermStore`] and are addressed by [`TermId`]. The store
//! deliberately does *not* hash-cons: the evaluator keys its term-value map
//! and its path traces on node identity, so every occurrence of a subterm is
//! a distinct node, exactly as the parser produced it.

use std::fmt;

/// Index of a term in a [`TermStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(u32);

impl TermId {
    /// The raw index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Sort of a variable or term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    /// Boolean sort
    Bool,
    /// Integer sort
    Int,
    /// String sort
    Str,
}

/// A literal constant at an AST leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Boolean literal
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// String literal
    Str(String),
    /// Regular-expression literal (already normalized by the parser)
    Regex(String),
}

/// Addressing mode of a `subString` application.
///
/// Only the first four modes are implemented; the evaluator rejects the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubStringMode {
    /// `(subString s i)` - suffix from index
    FromIndex,
    /// `(subString s t)` - suffix from the first occurrence of `t`
    FromFirstOf,
    /// `(subString s t)` - suffix from the last occurrence of `t`
    FromLastOf,
    /// `(subString s i j)` - between two indices
    FromIndexToIndex,
    /// `(subString s i t)` - unimplemented
    FromIndexToFirstOf,
    /// `(subString s i t)` - unimplemented
    FromIndexToLastOf,
    /// `(subString s t j)` - unimplemented
    FromFirstOfToIndex,
    /// `(subString s t u)` - unimplemented
    FromFirstOfToFirstOf,
    /// `(subString s t u)` - unimplemented
    FromFirstOfToLastOf,
    /// `(subString s t j)` - unimplemented
    FromLastOfToIndex,
    /// `(subString s t u)` - unimplemented
    FromLastOfToFirstOf,
    /// `(subString s t u)` - unimplemented
    FromLastOfToLastOf,
}

/// One AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum TermData {
    /// Conjunction
    And(Vec<TermId>),
    /// Disjunction
    Or(Vec<TermId>),
    /// Negation
    Not(TermId),
    /// Equality
    Eq(TermId, TermId),
    /// Disequality
    NotEq(TermId, TermId),
    /// Strictly less
    Lt(TermId, TermId),
    /// Less or equal
    Le(TermId, TermId),
    /// Strictly greater
    Gt(TermId, TermId),
    /// Greater or equal
    Ge(TermId, TermId),
    /// n-ary sum
    Plus(Vec<TermId>),
    /// Binary subtraction
    Minus(TermId, TermId),
    /// n-ary product
    Times(Vec<TermId>),
    /// Unary minus
    UMinus(TermId),
    /// n-ary string concatenation
    Concat(Vec<TermId>),
    /// Regular-language membership
    In(TermId, TermId),
    /// Negated membership
    NotIn(TermId, TermId),
    /// String length
    Len(TermId),
    /// `(contains subject search)`
    Contains(TermId, TermId),
    /// Negated contains
    NotContains(TermId, TermId),
    /// `(begins subject search)`
    Begins(TermId, TermId),
    /// Negated begins
    NotBegins(TermId, TermId),
    /// `(ends subject search)`
    Ends(TermId, TermId),
    /// Negated ends
    NotEnds(TermId, TermId),
    /// `(indexOf subject search)`, -1 when absent
    IndexOf(TermId, TermId),
    /// `(lastIndexOf subject search)`, -1 when absent
    LastIndexOf(TermId, TermId),
    /// `(charAt subject index)`
    CharAt(TermId, TermId),
    /// `(subString subject start [end])`
    SubString {
        /// Addressing mode
        mode: SubStringMode,
        /// The string being sliced
        subject: TermId,
        /// Start index or search term, depending on mode
        start: TermId,
        /// End index or search term, for the two-argument modes
        end: Option<TermId>,
    },
    /// Uppercase conversion
    ToUpper(TermId),
    /// Lowercase conversion
    ToLower(TermId),
    /// Whitespace trim
    Trim(TermId),
    /// Integer-to-string conversion
    ToString(TermId),
    /// String-to-integer conversion, -1 on parse failure
    ToInt(TermId),
    /// `(replace subject search replacement)`
    Replace(TermId, TermId, TermId),
    /// Occurrence count (declared, not implemented by the evaluator)
    Count(TermId, TermId),
    /// If-then-else (inert in the evaluator)
    Ite(TermId, TermId, TermId),
    /// Universal quantifier (inert)
    Forall(TermId),
    /// Existential quantifier (inert)
    Exists(TermId),
    /// Let binding
    Let {
        /// `(symbol, bound term)` pairs, installed in order
        bindings: Vec<(String, TermId)>,
        /// Body evaluated under the bindings
        body: TermId,
    },
    /// A variable reference (qualified identifier)
    Variable(String),
    /// A literal constant
    Constant(Constant),
    /// An opaque function application the solver over-approximates
    Unknown {
        /// Function symbol
        name: String,
        /// Argument terms, visited for side effects only
        args: Vec<TermId>,
    },
}

/// Arena of AST nodes.
#[derive(Debug, Default, Clone)]
pub struct TermStore {
    terms: Vec<TermData>,
}

impl TermStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes allocated.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Allocate a node.
    pub fn add(&mut self, data: TermData) -> TermId {
        let id = TermId(u32::try_from(self.terms.len()).expect("term arena overflow"));
        self.terms.push(data);
        id
    }

    /// Read a node.
    #[must_use]
    pub fn get(&self, id: TermId) -> &TermData {
        &self.terms[id.index()]
    }

    /// The immediate children of a node, in source order.
    #[must_use]
    pub fn children(&self, id: TermId) -> Vec<TermId> {
        match self.get(id) {
            TermData::And(ts)
            | TermData::Or(ts)
            | TermData::Plus(ts)
            | TermData::Times(ts)
            | TermData::Concat(ts) => ts.clone(),
            TermData::Not(t)
            | TermData::UMinus(t)
            | TermData::Len(t)
            | TermData::ToUpper(t)
            | TermData::ToLower(t)
            | TermData::Trim(t)
            | TermData::ToString(t)
            | TermData::ToInt(t)
            | TermData::Forall(t)
            | TermData::Exists(t) => vec![*t],
            TermData::Eq(a, b)
            | TermData::NotEq(a, b)
            | TermData::Lt(a, b)
            | TermData::Le(a, b)
            | TermData::Gt(a, b)
            | TermData::Ge(a, b)
            | TermData::Minus(a, b)
            | TermData::In(a, b)
            | TermData::NotIn(a, b)
            | TermData::Contains(a, b)
            | TermData::NotContains(a, b)
            | TermData::Begins(a, b)
            | TermData::NotBegins(a, b)
            | TermData::Ends(a, b)
            | TermData::NotEnds(a, b)
            | TermData::IndexOf(a, b)
            | TermData::LastIndexOf(a, b)
            | TermData::CharAt(a, b)
            | TermData::Count(a, b) => vec![*a, *b],
            TermData::Replace(a, b, c) | TermData::Ite(a, b, c) => vec![*a, *b, *c],
            TermData::SubString {
                subject, start, end, ..
            } => {
                let mut out = vec![*subject, *start];
                if let Some(e) = end {
                    out.push(*e);
                }
                out
            }
            TermData::Let { bindings, body } => {
                let mut out: Vec<TermId> = bindings.iter().map(|(_, t)| *t).collect();
                out.push(*body);
                out
            }
            TermData::Unknown { args, .. } => args.clone(),
            TermData::Variable(_) | TermData::Constant(_) => Vec::new(),
        }
    }

    /// Whether the node is a conjunction.
    #[must_use]
    pub fn is_and(&self, id: TermId) -> bool {
        matches!(self.get(id), TermData::And(_))
    }

    /// Whether the node is a disjunction.
    #[must_use]
    pub fn is_or(&self, id: TermId) -> bool {
        matches!(self.get(id), TermData::Or(_))
    }

    /// A short s-expression rendering for diagnostics.
    #[must_use]
    pub fn display(&self, id: TermId) -> String {
        match self.get(id) {
            TermData::And(ts) => self.display_list("and", ts),
            TermData::Or(ts) => self.display_list("or", ts),
            TermData::Not(t) => format!("(not {})", self.display(*t)),
            TermData::Eq(a, b) => self.display_pair("=", *a, *b),
            TermData::NotEq(a, b) => self.display_pair("!=", *a, *b),
            TermData::Lt(a, b) => self.display_pair("<", *a, *b),
            TermData::Le(a, b) => self.display_pair("<=", *a, *b),
            TermData::Gt(a, b) => self.display_pair(">", *a, *b),
            TermData::Ge(a, b) => self.display_pair(">=", *a, *b),
            TermData::Plus(ts) => self.display_list("+", ts),
            TermData::Minus(a, b) => self.display_pair("-", *a, *b),
            TermData::Times(ts) => self.display_list("*", ts),
            TermData::UMinus(t) => format!("(- {})", self.display(*t)),
            TermData::Concat(ts) => self.display_list("concat", ts),
            TermData::In(a, b) => self.display_pair("in", *a, *b),
            TermData::NotIn(a, b) => self.display_pair("notIn", *a, *b),
            TermData::Len(t) => format!("(len {})", self.display(*t)),
            TermData::Contains(a, b) => self.display_pair("contains", *a, *b),
            TermData::NotContains(a, b) => self.display_pair("notContains", *a, *b),
            TermData::Begins(a, b) => self.display_pair("begins", *a, *b),
            TermData::NotBegins(a, b) => self.display_pair("notBegins", *a, *b),
            TermData::Ends(a, b) => self.display_pair("ends", *a, *b),
            TermData::NotEnds(a, b) => self.display_pair("notEnds", *a, *b),
            TermData::IndexOf(a, b) => self.display_pair("indexOf", *a, *b),
            TermData::LastIndexOf(a, b) => self.display_pair("lastIndexOf", *a, *b),
            TermData::CharAt(a, b) => self.display_pair("charAt", *a, *b),
            TermData::SubString {
                subject, start, end, ..
            } => match end {
                Some(e) => format!(
                    "(subString {} {} {})",
                    self.display(*subject),
                    self.display(*start),
                    self.display(*e)
                ),
                None => format!(
                    "(subString {} {})",
                    self.display(*subject),
                    self.display(*start)
                ),
            },
            TermData::ToUpper(t) => format!("(toUpper {})", self.display(*t)),
            TermData::ToLower(t) => format!("(toLower {})", self.display(*t)),
            TermData::Trim(t) => format!("(trim {})", self.display(*t)),
            TermData::ToString(t) => format!("(toString {})", self.display(*t)),
            TermData::ToInt(t) => format!("(toInt {})", self.display(*t)),
            TermData::Replace(a, b, c) => format!(
                "(replace {} {} {})",
                self.display(*a),
                self.display(*b),
                self.display(*c)
            ),
            TermData::Count(a, b) => self.display_pair("count", *a, *b),
            TermData::Ite(a, b, c) => format!(
                "(ite {} {} {})",
                self.display(*a),
                self.display(*b),
                self.display(*c)
            ),
            TermData::Forall(t) => format!("(forall {})", self.display(*t)),
            TermData::Exists(t) => format!("(exists {})", self.display(*t)),
            TermData::Let { bindings, body } => {
                let bs: Vec<String> = bindings
                    .iter()
                    .map(|(name, t)| format!("({} {})", name, self.display(*t)))
                    .collect();
                format!("(let ({}) {})", bs.join(" "), self.display(*body))
            }
            TermData::Variable(name) => name.clone(),
            TermData::Constant(Constant::Bool(b)) => b.to_string(),
            TermData::Constant(Constant::Int(i)) => i.to_string(),
            TermData::Constant(Constant::Str(s)) => format!("{s:?}"),
            TermData::Constant(Constant::Regex(r)) => format!("/{r}/"),
            TermData::Unknown { name, args } => self.display_list(name, args),
        }
    }

    fn display_list(&self, head: &str, ts: &[TermId]) -> String {
        let parts: Vec<String> = ts.iter().map(|t| self.display(*t)).collect();
        format!("({} {})", head, parts.join(" "))
    }

    fn display_pair(&self, head: &str, a: TermId, b: TermId) -> String {
        format!("({} {} {})", head, self.display(a), self.display(b))
    }
}

/// Builder shorthands used by tests and by front ends feeding the solver.
impl TermStore {
    /// A variable reference.
    pub fn mk_var(&mut self, name: impl Into<String>) -> TermId {
        self.add(TermData::Variable(name.into()))
    }

    /// A string literal.
    pub fn mk_str(&mut self, s: impl Into<String>) -> TermId {
        self.add(TermData::Constant(Constant::Str(s.into())))
    }

    /// A regex literal.
    pub fn mk_regex(&mut self, pattern: impl Into<String>) -> TermId {
        self.add(TermData::Constant(Constant::Regex(pattern.into())))
    }

    /// An integer literal.
    pub fn mk_int(&mut self, value: i64) -> TermId {
        self.add(TermData::Constant(Constant::Int(value)))
    }

    /// A Boolean literal.
    pub fn mk_bool(&mut self, value: bool) -> TermId {
        self.add(TermData::Constant(Constant::Bool(value)))
    }

    /// A conjunction.
    pub fn mk_and(&mut self, terms: Vec<TermId>) -> TermId {
        self.add(TermData::And(terms))
    }

    /// A disjunction.
    pub fn mk_or(&mut self, terms: Vec<TermId>) -> TermId {
        self.add(TermData::Or(terms))
    }

    /// A negation.
    pub fn mk_not(&mut self, term: TermId) -> TermId {
        self.add(TermData::Not(term))
    }

    /// An equality.
    pub fn mk_eq(&mut self, left: TermId, right: TermId) -> TermId {
        self.add(TermData::Eq(left, right))
    }

    /// A disequality.
    pub fn mk_not_eq(&mut self, left: TermId, right: TermId) -> TermId {
        self.add(TermData::NotEq(left, right))
    }

    /// Strictly-less comparison.
    pub fn mk_lt(&mut self, left: TermId, right: TermId) -> TermId {
        self.add(TermData::Lt(left, right))
    }

    /// Less-or-equal comparison.
    pub fn mk_le(&mut self, left: TermId, right: TermId) -> TermId {
        self.add(TermData::Le(left, right))
    }

    /// Strictly-greater comparison.
    pub fn mk_gt(&mut self, left: TermId, right: TermId) -> TermId {
        self.add(TermData::Gt(left, right))
    }

    /// Greater-or-equal comparison.
    pub fn mk_ge(&mut self, left: TermId, right: TermId) -> TermId {
        self.add(TermData::Ge(left, right))
    }

    /// An n-ary sum.
    pub fn mk_plus(&mut self, terms: Vec<TermId>) -> TermId {
        self.add(TermData::Plus(terms))
    }

    /// A binary subtraction.
    pub fn mk_minus(&mut self, left: TermId, right: TermId) -> TermId {
        self.add(TermData::Minus(left, right))
    }

    /// An n-ary product.
    pub fn mk_times(&mut self, terms: Vec<TermId>) -> TermId {
        self.add(TermData::Times(terms))
    }

    /// A unary minus.
    pub fn mk_uminus(&mut self, term: TermId) -> TermId {
        self.add(TermData::UMinus(term))
    }

    /// A string concatenation.
    pub fn mk_concat(&mut self, terms: Vec<TermId>) -> TermId {
        self.add(TermData::Concat(terms))
    }

    /// Regular-language membership.
    pub fn mk_in(&mut self, subject: TermId, language: TermId) -> TermId {
        self.add(TermData::In(subject, language))
    }

    /// Negated membership.
    pub fn mk_not_in(&mut self, subject: TermId, language: TermId) -> TermId {
        self.add(TermData::NotIn(subject, language))
    }

    /// String length.
    pub fn mk_len(&mut self, term: TermId) -> TermId {
        self.add(TermData::Len(term))
    }

    /// Containment test.
    pub fn mk_contains(&mut self, subject: TermId, search: TermId) -> TermId {
        self.add(TermData::Contains(subject, search))
    }

    /// Negated containment.
    pub fn mk_not_contains(&mut self, subject: TermId, search: TermId) -> TermId {
        self.add(TermData::NotContains(subject, search))
    }

    /// Prefix test.
    pub fn mk_begins(&mut self, subject: TermId, search: TermId) -> TermId {
        self.add(TermData::Begins(subject, search))
    }

    /// Negated prefix test.
    pub fn mk_not_begins(&mut self, subject: TermId, search: TermId) -> TermId {
        self.add(TermData::NotBegins(subject, search))
    }

    /// Suffix test.
    pub fn mk_ends(&mut self, subject: TermId, search: TermId) -> TermId {
        self.add(TermData::Ends(subject, search))
    }

    /// Negated suffix test.
    pub fn mk_not_ends(&mut self, subject: TermId, search: TermId) -> TermId {
        self.add(TermData::NotEnds(subject, search))
    }

    /// First-occurrence index.
    pub fn mk_index_of(&mut self, subject: TermId, search: TermId) -> TermId {
        self.add(TermData::IndexOf(subject, search))
    }

    /// Last-occurrence index.
    pub fn mk_last_index_of(&mut self, subject: TermId, search: TermId) -> TermId {
        self.add(TermData::LastIndexOf(subject, search))
    }

    /// Character at index.
    pub fn mk_char_at(&mut self, subject: TermId, index: TermId) -> TermId {
        self.add(TermData::CharAt(subject, index))
    }

    /// A substring application.
    pub fn mk_sub_string(
        &mut self,
        mode: SubStringMode,
        subject: TermId,
        start: TermId,
        end: Option<TermId>,
    ) -> TermId {
        self.add(TermData::SubString {
            mode,
            subject,
            start,
            end,
        })
    }

    /// Uppercase conversion.
    pub fn mk_to_upper(&mut self, term: TermId) -> TermId {
        self.add(TermData::ToUpper(term))
    }

    /// Lowercase conversion.
    pub fn mk_to_lower(&mut self, term: TermId) -> TermId {
        self.add(TermData::ToLower(term))
    }

    /// Whitespace trim.
    pub fn mk_trim(&mut self, term: TermId) -> TermId {
        self.add(TermData::Trim(term))
    }

    /// Integer-to-string conversion.
    pub fn mk_to_string(&mut self, term: TermId) -> TermId {
        self.add(TermData::ToString(term))
    }

    /// String-to-integer conversion.
    pub fn mk_to_int(&mut self, term: TermId) -> TermId {
        self.add(TermData::ToInt(term))
    }

    /// A replace application.
    pub fn mk_replace(&mut self, subject: TermId, search: TermId, replacement: TermId) -> TermId {
        self.add(TermData::Replace(subject, search, replacement))
    }

    /// A let binding.
    pub fn mk_let(&mut self, bindings: Vec<(String, TermId)>, body: TermId) -> TermId {
        self.add(TermData::Let { bindings, body })
    }

    /// An opaque application.
    pub fn mk_unknown(&mut self, name: impl Into<String>, args: Vec<TermId>) -> TermId {
        self.add(TermData::Unknown {
            name: name.into(),
            args,
        })
    }
}
