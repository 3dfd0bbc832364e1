//! Structural predicates that pick a union variant from a JSON value.

use crate::ir::{Scalar, Schema, TypeNode};
use crate::literal::Literal;
use crate::name::QualifiedName;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Coarse JSON value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonKind {
    Null,
    Boolean,
    Integer,
    /// Any number, integral or not.
    Number,
    String,
    Array,
    Object,
}

impl JsonKind {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            JsonKind::Null => value.is_null(),
            JsonKind::Boolean => value.is_boolean(),
            JsonKind::Integer => value.is_i64() || value.is_u64(),
            JsonKind::Number => value.is_number(),
            JsonKind::String => value.is_string(),
            JsonKind::Array => value.is_array(),
            JsonKind::Object => value.is_object(),
        }
    }
}

/// One predicate of a recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum Check {
    /// Value is of one of the kinds.
    Kind { kinds: Vec<JsonKind> },
    /// String value is one of the symbols.
    OneOf { symbols: Vec<String> },
    /// Value equals the literal.
    Const { value: Literal },
    /// Object has the member.
    HasField { field: String },
    /// Object has no members beyond these.
    OnlyFields { fields: Vec<String> },
    /// Member, when present, is of one of the kinds.
    FieldKind { field: String, kinds: Vec<JsonKind> },
    /// Member is present and equals the literal.
    FieldConst { field: String, value: Literal },
}

impl Check {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Check::Kind { kinds } => kinds.iter().any(|k| k.accepts(value)),
            Check::OneOf { symbols } => value
                .as_str()
                .is_some_and(|s| symbols.iter().any(|sym| sym == s)),
            Check::Const { value: expected } => &Literal::from(value) == expected,
            Check::HasField { field } => object(value).is_some_and(|o| o.contains_key(field)),
            Check::OnlyFields { fields } => object(value)
                .is_some_and(|o| o.keys().all(|k| fields.iter().any(|f| f == k))),
            Check::FieldKind { field, kinds } => object(value).is_some_and(|o| match o.get(field) {
                Some(member) => kinds.iter().any(|k| k.accepts(member)),
                None => true,
            }),
            Check::FieldConst { field, value: expected } => object(value)
                .and_then(|o| o.get(field))
                .is_some_and(|member| &Literal::from(member) == expected),
        }
    }
}

fn object(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object()
}

/// Conjunction of checks identifying one variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Recognizer {
    pub variant: String,
    pub checks: Vec<Check>,
}

impl Recognizer {
    pub fn matches(&self, value: &Value) -> bool {
        self.checks.iter().all(|c| c.matches(value))
    }
}

/// A shared selector field and the tag of each variant, index-aligned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Discriminator {
    pub field: String,
    /// The enum every variant's selector field references.
    pub tag_enum: QualifiedName,
    pub tags: Vec<String>,
}

/// How a choice picks its variant from a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnionResolution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
    /// One per variant, in declared order.
    pub recognizers: Vec<Recognizer>,
}

impl UnionResolution {
    /// Index of the variant a value belongs to: the discriminator when the
    /// value carries a known tag, then the first recognizer that matches.
    pub fn dispatch(&self, value: &Value) -> Option<usize> {
        if let Some(disc) = &self.discriminator {
            let tag = value.get(&disc.field).and_then(Value::as_str);
            if let Some(index) = tag.and_then(|t| disc.tags.iter().position(|x| x == t)) {
                return Some(index);
            }
        }
        self.recognizers.iter().position(|r| r.matches(value))
    }
}

/// JSON kinds a node's JSON form can take. Empty means unconstrained.
pub fn json_kinds(node: &TypeNode, schema: &Schema) -> Vec<JsonKind> {
    kinds_at(node, schema, 0)
}

fn kinds_at(node: &TypeNode, schema: &Schema, depth: usize) -> Vec<JsonKind> {
    if depth > schema.types.len() + 1 {
        return Vec::new();
    }
    match node {
        TypeNode::Primitive(p) => match p.scalar {
            Scalar::Null => vec![JsonKind::Null],
            Scalar::Boolean => vec![JsonKind::Boolean],
            Scalar::Int32 | Scalar::Int64 | Scalar::Duration => vec![JsonKind::Integer],
            Scalar::Float32 | Scalar::Float64 => vec![JsonKind::Number],
            Scalar::Decimal { .. }
            | Scalar::String
            | Scalar::Bytes
            | Scalar::Date
            | Scalar::Time { .. }
            | Scalar::Timestamp { .. }
            | Scalar::Uuid => vec![JsonKind::String],
            Scalar::Any => Vec::new(),
        },
        TypeNode::Record(_) | TypeNode::Map(_) => vec![JsonKind::Object],
        TypeNode::Enum(_) => vec![JsonKind::String],
        TypeNode::Array(_) | TypeNode::Set(_) => vec![JsonKind::Array],
        TypeNode::Choice(c) => {
            let mut out = Vec::new();
            for v in &c.variants {
                let kinds = kinds_at(&v.node, schema, depth + 1);
                if kinds.is_empty() {
                    return Vec::new();
                }
                for k in kinds {
                    if !out.contains(&k) {
                        out.push(k);
                    }
                }
            }
            out
        }
        TypeNode::Reference { name } => match schema.get(name) {
            Some(def) => kinds_at(&def.node, schema, depth + 1),
            None => Vec::new(),
        },
    }
}

/// Longest string or collection a witness builds, whatever the constraints.
const WITNESS_LIMIT: usize = 64;

/// The smallest value a node accepts: required members only, zero
/// numbers, empty strings and collections, first enum symbol, constants
/// where declared.
pub fn witness(node: &TypeNode, schema: &Schema) -> Value {
    witness_at(node, schema, 0)
}

fn witness_at(node: &TypeNode, schema: &Schema, depth: usize) -> Value {
    if depth > schema.types.len() + 1 {
        return Value::Null;
    }
    match node {
        TypeNode::Primitive(p) => {
            if let Some(constant) = &p.constraints.constant {
                return constant.to_json();
            }
            match p.scalar {
                Scalar::Null | Scalar::Any => Value::Null,
                Scalar::Boolean => Value::Bool(false),
                Scalar::Int32 | Scalar::Int64 | Scalar::Duration => Value::from(0),
                Scalar::Float32 | Scalar::Float64 => Value::from(0.5),
                Scalar::Decimal { .. } => Value::from("0"),
                Scalar::String => {
                    let len = (p.constraints.min_length.unwrap_or(0) as usize).min(WITNESS_LIMIT);
                    Value::from("a".repeat(len))
                }
                Scalar::Bytes => Value::from(""),
                Scalar::Date => Value::from("1970-01-01"),
                Scalar::Time { .. } => Value::from("00:00:00"),
                Scalar::Timestamp { local: true, .. } => Value::from("1970-01-01T00:00:00"),
                Scalar::Timestamp { .. } => Value::from("1970-01-01T00:00:00Z"),
                Scalar::Uuid => Value::from("00000000-0000-0000-0000-000000000000"),
            }
        }
        TypeNode::Record(r) => {
            let mut map = Map::new();
            for field in r.fields.iter().filter(|f| f.required) {
                map.insert(field.name.clone(), witness_at(&field.ty, schema, depth + 1));
            }
            Value::Object(map)
        }
        TypeNode::Enum(e) => e.symbols.first().map(|s| Value::from(s.as_str())).unwrap_or(Value::Null),
        TypeNode::Array(c) | TypeNode::Set(c) => {
            let count = (c.min_items.unwrap_or(0) as usize).min(WITNESS_LIMIT);
            Value::Array((0..count).map(|_| witness_at(&c.items, schema, depth + 1)).collect())
        }
        TypeNode::Map(_) => Value::Object(Map::new()),
        TypeNode::Choice(c) => match c.variants.first() {
            Some(v) => witness_at(&v.node, schema, depth + 1),
            None => Value::Null,
        },
        TypeNode::Reference { name } => match schema.get(name) {
            Some(def) => witness_at(&def.node, schema, depth + 1),
            None => Value::Null,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Collection, Field, NamedType, Primitive};
    use crate::name::Namespace;
    use serde_json::json;

    fn text_or_number() -> UnionResolution {
        UnionResolution {
            discriminator: None,
            recognizers: vec![
                Recognizer {
                    variant: "TextValue".into(),
                    checks: vec![
                        Check::Kind { kinds: vec![JsonKind::Object] },
                        Check::HasField { field: "textValue".into() },
                        Check::OnlyFields { fields: vec!["textValue".into()] },
                    ],
                },
                Recognizer {
                    variant: "NumberValue".into(),
                    checks: vec![
                        Check::Kind { kinds: vec![JsonKind::Object] },
                        Check::HasField { field: "numberValue".into() },
                        Check::OnlyFields { fields: vec!["numberValue".into()] },
                        Check::FieldKind {
                            field: "numberValue".into(),
                            kinds: vec![JsonKind::Number],
                        },
                    ],
                },
            ],
        }
    }

    #[test]
    fn dispatch_first_match() {
        let res = text_or_number();
        assert_eq!(res.dispatch(&json!({"textValue": "x"})), Some(0));
        assert_eq!(res.dispatch(&json!({"numberValue": 1.5})), Some(1));
        assert_eq!(res.dispatch(&json!({"textValue": "x", "numberValue": 1})), None);
        assert_eq!(res.dispatch(&json!({"numberValue": "nope"})), None);
    }

    #[test]
    fn discriminator_wins_over_recognizers() {
        let mut res = text_or_number();
        res.discriminator = Some(Discriminator {
            field: "kind".into(),
            tag_enum: QualifiedName::parse("demo.Kind"),
            tags: vec!["text".into(), "number".into()],
        });
        assert_eq!(res.dispatch(&json!({"kind": "number", "textValue": "x"})), Some(1));
    }

    #[test]
    fn integer_kind_rejects_fractions() {
        assert!(JsonKind::Integer.accepts(&json!(3)));
        assert!(!JsonKind::Integer.accepts(&json!(3.5)));
        assert!(JsonKind::Number.accepts(&json!(3)));
    }

    #[test]
    fn witness_follows_references() {
        let ns = Namespace::new("demo");
        let mut schema = Schema::new();
        schema.add(NamedType::string_enum(ns.qualify("Color"), &["red", "green"]));
        schema.add(NamedType::record(
            ns.qualify("Paint"),
            vec![
                Field::required("color", TypeNode::reference(ns.qualify("Color"))),
                Field::optional("gloss", TypeNode::primitive(Scalar::Float64)),
            ],
        ));
        let node = TypeNode::reference(ns.qualify("Paint"));
        assert_eq!(witness(&node, &schema), json!({"color": "red"}));
        assert_eq!(json_kinds(&node, &schema), vec![JsonKind::Object]);
    }

    #[test]
    fn witness_lengths_are_bounded() {
        let mut text = Primitive::new(Scalar::String);
        text.constraints.min_length = Some(1_000_000_000_000_000_000);
        let mut list = Collection::of(TypeNode::primitive(Scalar::Int64));
        list.min_items = Some(u64::MAX);
        let schema = Schema::new();

        let value = witness(&TypeNode::Primitive(text), &schema);
        assert_eq!(value.as_str().map(str::len), Some(WITNESS_LIMIT));
        let value = witness(&TypeNode::Array(list), &schema);
        assert_eq!(value.as_array().map(Vec::len), Some(WITNESS_LIMIT));
        let decimal = TypeNode::primitive(Scalar::Decimal { precision: 38, scale: u32::MAX });
        assert_eq!(witness(&decimal, &schema), json!("0"));
    }
}
