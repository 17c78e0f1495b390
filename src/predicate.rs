use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::scatter::DOMAIN_CEILING;
use crate::space::Space;

// Values carrying embedded query-parameter syntax ("$1" and friends) are
// never literal ids and must not be decoded.
const PARAM_MARKER: char = '$';

/// A literal value appearing on the right-hand side of a comparison.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Str(String),
    Bool(bool),
    List(Vec<Value>),
    Null,
}

impl Value {
    /// Reads the value as an in-domain real identifier, if it is one.
    ///
    /// Strings are parsed as plain integers here, not decoded; this is how a
    /// rescued original like `"42"` becomes usable as a direct id.
    pub fn as_id(&self) -> Option<u32> {
        match self {
            Value::Int(n) if (0..=i64::from(DOMAIN_CEILING)).contains(n) => Some(*n as u32),
            Value::Str(s) => s
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|&n| n <= DOMAIN_CEILING),
            _ => None,
        }
    }

    pub(crate) fn holds_param_marker(&self) -> bool {
        match self {
            Value::Str(s) => s.contains(PARAM_MARKER),
            Value::List(items) => items.iter().any(Value::holds_param_marker),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Int(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Value {
        Value::Int(i64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Value {
        Value::List(items)
    }
}

/// Comparison operators understood by the rewriter. The rewriter never
/// interprets the operator; it only rewrites the value side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
}

/// A single `field <op> value` leaf.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub field: String,
    pub op: Operator,
    pub value: Value,
}

/// A generic query predicate tree.
///
/// `Compare` is the only leaf. `All` and `Any` combine an ordered sequence of
/// children (AND / OR); `Not` wraps a single child. This closed set of
/// variants is what the rewriter dispatches on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Compare(Comparison),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(field: &str, op: Operator, value: impl Into<Value>) -> Predicate {
        Predicate::Compare(Comparison {
            field: field.to_string(),
            op,
            value: value.into(),
        })
    }

    /// Shorthand for an equality comparison.
    pub fn eq(field: &str, value: impl Into<Value>) -> Predicate {
        Predicate::compare(field, Operator::Eq, value)
    }
}

/// Rewrites every identifier-bearing comparison in the tree.
///
/// `resolve` maps a field name to the space whose deobfuscator applies, or
/// `None` for fields that are not identifier-bearing. Matching comparisons
/// get their value replaced by `deobfuscate(value, rescue: true)`, so inputs
/// that do not look like tokens survive unchanged; list values are decoded
/// element-wise. Values holding embedded query-parameter syntax are left
/// alone entirely.
///
/// Groups recurse into every child in order and wrappers into their single
/// child, so arbitrarily nested boolean combinations are covered.
pub fn rewrite_values<F>(node: &mut Predicate, resolve: &F)
where
    F: Fn(&str) -> Option<Arc<Space>>,
{
    match node {
        Predicate::Compare(cmp) => {
            if cmp.value.holds_param_marker() {
                return;
            }
            if let Some(space) = resolve(&cmp.field) {
                cmp.value = space.deobfuscate(&cmp.value, true);
            }
        }
        Predicate::All(children) | Predicate::Any(children) => {
            for child in children {
                rewrite_values(child, resolve);
            }
        }
        Predicate::Not(inner) => rewrite_values(inner, resolve),
    }
}
