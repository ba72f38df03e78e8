//! The recursive value model shared by input documents, FHIR documents,
//! and everything the interpreter reads or writes.

use indexmap::IndexMap;
use serde_json::{Number, Value};
use std::fmt;

pub type TreeMap = IndexMap<String, TreeValue>;

/// A tagged-sum tree: scalar, ordered list, or ordered keyed map.
///
/// Map entries preserve insertion order so that transformation output is
/// deterministic and an injected `resourceType` stays the first key.
#[derive(Clone, Debug, PartialEq)]
pub enum TreeValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<TreeValue>),
    Map(TreeMap),
}

impl TreeValue {
    pub fn empty_map() -> Self {
        TreeValue::Map(TreeMap::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TreeValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TreeValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&TreeMap> {
        match self {
            TreeValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut TreeMap> {
        match self {
            TreeValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TreeValue]> {
        match self {
            TreeValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<TreeValue>> {
        match self {
            TreeValue::List(l) => Some(l),
            _ => None,
        }
    }

    /// Best-effort string coercion used by the interpreter before a lookup
    /// table call (`stringify(v)` in the field algorithm).
    pub fn stringify(&self) -> String {
        match self {
            TreeValue::Null => String::new(),
            TreeValue::Bool(b) => b.to_string(),
            TreeValue::Number(n) => n.to_string(),
            TreeValue::String(s) => s.clone(),
            TreeValue::List(_) | TreeValue::Map(_) => self.to_json().to_string(),
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            TreeValue::Null => false,
            TreeValue::Bool(b) => *b,
            TreeValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            TreeValue::String(s) => !s.is_empty(),
            TreeValue::List(l) => !l.is_empty(),
            TreeValue::Map(m) => !m.is_empty(),
        }
    }

    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => TreeValue::Null,
            Value::Bool(b) => TreeValue::Bool(b),
            Value::Number(n) => TreeValue::Number(n),
            Value::String(s) => TreeValue::String(s),
            Value::Array(arr) => TreeValue::List(arr.into_iter().map(TreeValue::from_json).collect()),
            Value::Object(map) => {
                let mut out = TreeMap::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, TreeValue::from_json(v));
                }
                TreeValue::Map(out)
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            TreeValue::Null => Value::Null,
            TreeValue::Bool(b) => Value::Bool(*b),
            TreeValue::Number(n) => Value::Number(n.clone()),
            TreeValue::String(s) => Value::String(s.clone()),
            TreeValue::List(l) => Value::Array(l.iter().map(TreeValue::to_json).collect()),
            TreeValue::Map(m) => {
                let mut out = serde_json::Map::with_capacity(m.len());
                for (k, v) in m {
                    out.insert(k.clone(), v.to_json());
                }
                Value::Object(out)
            }
        }
    }
}

impl From<Value> for TreeValue {
    fn from(value: Value) -> Self {
        TreeValue::from_json(value)
    }
}

impl From<TreeValue> for Value {
    fn from(tree: TreeValue) -> Self {
        tree.to_json()
    }
}

impl From<&str> for TreeValue {
    fn from(s: &str) -> Self {
        TreeValue::String(s.to_string())
    }
}

impl From<String> for TreeValue {
    fn from(s: String) -> Self {
        TreeValue::String(s)
    }
}

impl From<bool> for TreeValue {
    fn from(b: bool) -> Self {
        TreeValue::Bool(b)
    }
}

impl From<i64> for TreeValue {
    fn from(n: i64) -> Self {
        TreeValue::Number(Number::from(n))
    }
}

impl From<f64> for TreeValue {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(TreeValue::Number).unwrap_or(TreeValue::Null)
    }
}

impl fmt::Display for TreeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}
