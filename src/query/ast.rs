//! Predicate AST.

/// A parsed predicate: terms joined by OR.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub terms: Vec<Term>,
}

/// Atoms joined by AND.
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    pub atoms: Vec<Atom>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub target: Target,
    pub op: CompareOp,
    pub literal: Literal,
}

/// What an atom reads from a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// The node's own value (or the `name`/`dist`/`support` pseudo-properties).
    Prop(String),
    /// Count of `key` inside the counter stored under `prop`.
    Counter { prop: String, key: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Contains,
}

impl CompareOp {
    pub fn is_ordering(&self) -> bool {
        matches!(self, CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte)
    }

    /// Compare two numbers; `None` for the set/substring operators.
    pub fn compare_f64(&self, lhs: f64, rhs: f64) -> Option<bool> {
        Some(match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Neq => lhs != rhs,
            CompareOp::Lt => lhs < rhs,
            CompareOp::Lte => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Gte => lhs >= rhs,
            CompareOp::In | CompareOp::Contains => return None,
        })
    }
}

/// A bare literal, with its numeric reading when it has one.
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub text: String,
    pub number: Option<f64>,
}

impl Literal {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let number = text.parse::<f64>().ok().filter(|f| !f.is_nan());
        Self { text, number }
    }

    /// Members of an `in` set.
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.text.split('|').map(str::trim)
    }
}
