//! Hashable JSON-like values for defaults, constants and extension metadata.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// A JSON value with structural equality and hashing.
///
/// `serde_json::Value` is neither `Eq` nor `Hash`, which the IR needs for
/// deduplicating anonymous types, so every literal stored in a
/// [`TypeNode`](crate::ir::TypeNode) uses this type instead.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    String(String),
    Array(Vec<Literal>),
    /// Members in declaration order.
    Object(Vec<(String, Literal)>),
}

impl Literal {
    pub fn string(s: impl Into<String>) -> Self {
        Literal::String(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }

    pub fn to_json(&self) -> Value {
        Value::from(self.clone())
    }

    /// Look up a member of an object literal.
    pub fn get(&self, key: &str) -> Option<&Literal> {
        match self {
            Literal::Object(members) => members.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<Value> for Literal {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Literal::Int(i)
                } else {
                    Literal::Float(OrderedFloat(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Value::String(s) => Literal::String(s),
            Value::Array(items) => Literal::Array(items.into_iter().map(Literal::from).collect()),
            Value::Object(map) => {
                Literal::Object(map.into_iter().map(|(k, v)| (k, Literal::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for Literal {
    fn from(value: &Value) -> Self {
        Literal::from(value.clone())
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(b),
            Literal::Int(i) => Value::Number(i.into()),
            Literal::Float(f) => Number::from_f64(f.0).map(Value::Number).unwrap_or(Value::Null),
            Literal::String(s) => Value::String(s),
            Literal::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Literal::Object(members) => {
                let mut map = Map::new();
                for (k, v) in members {
                    map.insert(k, Value::from(v));
                }
                Value::Object(map)
            }
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Int(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preserves_member_order() {
        let value = json!({ "b": 1, "a": [true, null, 1.5] });
        let literal = Literal::from(&value);
        match &literal {
            Literal::Object(members) => {
                assert_eq!(members[0].0, "b");
                assert_eq!(members[1].0, "a");
            }
            other => panic!("expected object, got {other:?}"),
        }
        assert_eq!(literal.to_json(), value);
    }

    #[test]
    fn floats_hash_structurally() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Literal::from(json!(0.5)));
        assert!(set.contains(&Literal::from(json!(0.5))));
        assert!(!set.contains(&Literal::Int(0)));
    }
}
