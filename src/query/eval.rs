//! Predicate evaluation against a single node.

use super::ast::*;
use crate::model::{parse_bool, NodeId, Tree, Value};
use crate::summary::CounterMap;
use crate::{Error, Result};

impl Predicate {
    /// True when any term holds at `id`.
    pub fn matches(&self, tree: &Tree, id: NodeId) -> Result<bool> {
        for term in &self.terms {
            if term.matches(tree, id)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Term {
    pub fn matches(&self, tree: &Tree, id: NodeId) -> Result<bool> {
        for atom in &self.atoms {
            if !atom.matches(tree, id)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Atom {
    /// Evaluate at `id`. An absent or missing value is always false.
    pub fn matches(&self, tree: &Tree, id: NodeId) -> Result<bool> {
        match &self.target {
            Target::Prop(prop) => match lookup(tree, id, prop) {
                Some(value) if !value.is_missing() => compare(&value, self.op, &self.literal, prop),
                _ => Ok(false),
            },
            Target::Counter { prop, key } => {
                let Some(Value::Str(raw)) = tree.node(id).get(prop) else {
                    return Ok(false);
                };
                let count = CounterMap::parse(raw)?.get(key);
                let rhs = self.literal.number.unwrap_or(f64::NAN);
                Ok(self.op.compare_f64(count, rhs).unwrap_or(false))
            }
        }
    }
}

fn lookup(tree: &Tree, id: NodeId, prop: &str) -> Option<Value> {
    let node = tree.node(id);
    match prop {
        "name" => Some(Value::Str(node.name.clone())),
        "dist" => Some(Value::Float(node.dist)),
        "support" => node.support.map(Value::Float),
        _ => node.get(prop).cloned(),
    }
}

fn compare(value: &Value, op: CompareOp, lit: &Literal, prop: &str) -> Result<bool> {
    if op.is_ordering() {
        let lhs = value.as_float().ok_or_else(|| Error::TypeError {
            expected: format!("numeric value for '{prop}'"),
            got: value.type_name().to_string(),
        })?;
        return Ok(op.compare_f64(lhs, lit.number.unwrap_or(f64::NAN)).unwrap_or(false));
    }

    match op {
        CompareOp::Eq => Ok(equals(value, lit)),
        CompareOp::Neq => Ok(!equals(value, lit)),
        CompareOp::Contains => Ok(match value {
            Value::StrList(items) => items.iter().any(|i| i == &lit.text),
            Value::FloatList(items) => lit.number.is_some_and(|n| items.contains(&n)),
            other => other.to_string().contains(lit.text.as_str()),
        }),
        CompareOp::In => Ok(match value {
            Value::StrList(items) => items.iter().any(|i| lit.members().any(|m| m == i)),
            Value::Float(f) => lit.members().any(|m| m.parse::<f64>().is_ok_and(|n| n == *f)),
            Value::Bool(b) => lit.members().any(|m| parse_bool(m) == Some(*b)),
            other => {
                let text = other.to_string();
                lit.members().any(|m| m == text)
            }
        }),
        _ => Ok(false),
    }
}

fn equals(value: &Value, lit: &Literal) -> bool {
    match value {
        Value::Float(f) => match lit.number {
            Some(n) => *f == n,
            None => value.to_string() == lit.text,
        },
        Value::Bool(b) => parse_bool(&lit.text) == Some(*b),
        Value::StrList(items) => items.join(",") == lit.text,
        other => other.to_string() == lit.text,
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Node, Tree, Value};
    use crate::query::parse;

    fn single(props: &[(&str, Value)]) -> Tree {
        let mut node = Node::new("leaf1").with_dist(0.5);
        for (k, v) in props {
            node = node.with_property(*k, v.clone());
        }
        Tree::new(node)
    }

    fn eval(tree: &Tree, q: &str) -> bool {
        parse(q).unwrap().matches(tree, tree.root()).unwrap()
    }

    #[test]
    fn test_numeric_and_pseudo_props() {
        let t = single(&[("score", Value::Float(3.0))]);
        assert!(eval(&t, "score >= 3"));
        assert!(!eval(&t, "score > 3"));
        assert!(eval(&t, "score = 3.0"));
        assert!(eval(&t, "dist < 1"));
        assert!(eval(&t, "name = leaf1"));
        assert!(!eval(&t, "support > 0"));
    }

    #[test]
    fn test_missing_is_false() {
        let t = single(&[("score", Value::Float(f64::NAN)), ("c", Value::from("NaN"))]);
        assert!(!eval(&t, "score < 100"));
        assert!(!eval(&t, "score != 1"));
        assert!(!eval(&t, "c != x"));
        assert!(!eval(&t, "absent = x"));
    }

    #[test]
    fn test_contains_and_in() {
        let t = single(&[
            ("tags", Value::StrList(vec!["a".into(), "bc".into()])),
            ("cat", Value::from("vowel")),
        ]);
        assert!(eval(&t, "tags contains bc"));
        assert!(!eval(&t, "tags contains b"));
        assert!(eval(&t, "cat contains ow"));
        assert!(eval(&t, "cat in vowel|consonant"));
        assert!(!eval(&t, "cat in consonant|other"));
        assert!(eval(&t, "tags in x|a"));
    }

    #[test]
    fn test_in_is_set_membership() {
        for partial in ["vow", "el|co", "consonant|vowel"] {
            let t = single(&[("cat", Value::from(partial))]);
            assert!(!eval(&t, "cat in vowel|consonant"), "{partial} matched");
        }
        let t = single(&[("ok", Value::Bool(true))]);
        assert!(eval(&t, "ok in yes|maybe"));
        assert!(!eval(&t, "ok in False|Trueish"));
    }

    #[test]
    fn test_and_or() {
        let t = single(&[("a", Value::Float(1.0)), ("b", Value::from("x"))]);
        assert!(eval(&t, "a = 1, b = x"));
        assert!(!eval(&t, "a = 2, b = x"));
        assert!(eval(&t, "a = 2 ; b = x"));
    }

    #[test]
    fn test_ordering_on_text_is_type_error() {
        let t = single(&[("b", Value::from("x"))]);
        assert!(parse("b < 3").unwrap().matches(&t, t.root()).is_err());
    }

    #[test]
    fn test_counter_atom() {
        let t = single(&[("c_counter", Value::from("consonant--1||vowel--1"))]);
        assert!(eval(&t, "c_counter:consonant < 2"));
        assert!(eval(&t, "c_counter:other = 0"));
        assert!(!eval(&t, "missing_counter:consonant < 2"));
    }
}
