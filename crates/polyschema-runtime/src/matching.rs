//! Structural matching of JSON-form values against the IR.

use crate::error::{Result, RuntimeError};
use crate::logical;
use polyschema_core::{ChoiceType, ResolvedSchema, Scalar, SchemaPath, TypeNode};
use serde_json::Value;

/// Variant index of a value: the choice's resolution when present, else
/// the first variant the value conforms to.
pub fn select(schema: &ResolvedSchema, choice: &ChoiceType, value: &Value) -> Option<usize> {
    match &choice.resolution {
        Some(resolution) => resolution.dispatch(value),
        None => choice.variants.iter().position(|v| conforms(schema, &v.node, value)),
    }
}

/// Whether a value has the JSON form of `type_name`.
pub fn is_match(schema: &ResolvedSchema, type_name: &str, value: &Value) -> bool {
    schema
        .lookup(type_name)
        .is_some_and(|def| conforms(schema, &def.node, value))
}

/// Deep structural conformance. Value constraints other than constants
/// (ranges, lengths, patterns) are not checked.
pub fn conforms(schema: &ResolvedSchema, node: &TypeNode, value: &Value) -> bool {
    match node {
        TypeNode::Primitive(p) => {
            if let Some(constant) = &p.constraints.constant {
                return *value == constant.to_json();
            }
            scalar_conforms(&p.scalar, value)
        }
        TypeNode::Record(r) => {
            let Some(object) = value.as_object() else {
                return false;
            };
            let fields_ok = r.fields.iter().all(|field| match object.get(&field.name) {
                Some(Value::Null) if !field.required => true,
                Some(member) => conforms(schema, &field.ty, member),
                None => !field.required || field.default.is_some(),
            });
            fields_ok && (r.open || object.keys().all(|k| r.field(k).is_some()))
        }
        TypeNode::Enum(e) => value.as_str().is_some_and(|s| e.symbols.iter().any(|x| x == s)),
        TypeNode::Array(c) | TypeNode::Set(c) => value
            .as_array()
            .is_some_and(|items| items.iter().all(|item| conforms(schema, &c.items, item))),
        TypeNode::Map(m) => value.as_object().is_some_and(|entries| {
            entries.iter().all(|(key, item)| key_conforms(&m.keys, key) && conforms(schema, &m.values, item))
        }),
        TypeNode::Choice(c) => {
            select(schema, c, value).is_some_and(|i| conforms(schema, &c.variants[i].node, value))
        }
        TypeNode::Reference { name } => schema.get(name).is_some_and(|def| conforms(schema, &def.node, value)),
    }
}

fn scalar_conforms(scalar: &Scalar, value: &Value) -> bool {
    let text = value.as_str();
    match *scalar {
        Scalar::Null => value.is_null(),
        Scalar::Boolean => value.is_boolean(),
        Scalar::Int32 => value.as_i64().is_some_and(|n| i32::try_from(n).is_ok()),
        Scalar::Int64 | Scalar::Duration => value.is_i64(),
        Scalar::Float32 | Scalar::Float64 => value.is_number(),
        Scalar::Decimal { scale, .. } => match value {
            Value::Number(n) => logical::decimal_to_unscaled(&n.to_string(), scale).is_some(),
            _ => text.and_then(|s| logical::decimal_to_unscaled(s, scale)).is_some(),
        },
        Scalar::String => value.is_string(),
        Scalar::Bytes => text.and_then(logical::decode_base64).is_some(),
        Scalar::Date => text.and_then(logical::date_to_days).is_some(),
        Scalar::Time { precision } => text.and_then(|s| logical::time_to_ticks(s, precision)).is_some(),
        Scalar::Timestamp { precision, local } => {
            text.and_then(|s| logical::timestamp_to_ticks(s, precision, local)).is_some()
        }
        Scalar::Uuid => text.is_some_and(logical::is_uuid),
        Scalar::Any => true,
    }
}

fn key_conforms(keys: &TypeNode, key: &str) -> bool {
    match keys {
        TypeNode::Primitive(p) => match p.scalar {
            Scalar::Int32 => key.parse::<i32>().is_ok(),
            Scalar::Int64 => key.parse::<i64>().is_ok(),
            _ => true,
        },
        _ => true,
    }
}

/// Step into a type: a field or variant name, `[]` for collection items
/// or `{}` for map values.
fn step<'s>(schema: &'s ResolvedSchema, node: &'s TypeNode, segment: &str) -> Option<&'s TypeNode> {
    match (schema.deref(node)?, segment) {
        (TypeNode::Array(c) | TypeNode::Set(c), "[]") => Some(&c.items),
        (TypeNode::Map(m), "{}") => Some(&m.values),
        (TypeNode::Record(r), name) => r.field(name).map(|f| &f.ty),
        (TypeNode::Choice(c), name) => c.variants.iter().find(|v| v.name == name).map(|v| &v.node),
        _ => None,
    }
}

/// The choice found by walking `path` from the named type `owner`.
pub fn choice_at<'s>(schema: &'s ResolvedSchema, owner: &str, path: &[&str]) -> Option<&'s ChoiceType> {
    let mut node = &schema.lookup(owner)?.node;
    for segment in path {
        node = step(schema, node, segment)?;
    }
    match schema.deref(node)? {
        TypeNode::Choice(c) => Some(c),
        _ => None,
    }
}

/// Variant index for a value of the choice at `owner` + `path`; what
/// generated deserializers call before decoding the variant.
pub fn dispatch(schema: &ResolvedSchema, owner: &str, path: &[&str], value: &Value) -> Result<usize> {
    let mut at = SchemaPath::root().join(owner);
    for segment in path {
        at = at.join(segment);
    }
    let choice = choice_at(schema, owner, path).ok_or_else(|| RuntimeError::UnknownType(at.to_string()))?;
    select(schema, choice, value).ok_or(RuntimeError::NoVariant { path: at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_core::{ConversionContext, Dialect, Field, NamedType, QualifiedName, Schema};
    use serde_json::json;

    fn shapes() -> ResolvedSchema {
        let mut schema = Schema::new();
        let circle = QualifiedName::parse("geo.Circle");
        schema.add(NamedType::record(
            circle.clone(),
            vec![Field::required("radius", TypeNode::primitive(Scalar::Float64))],
        ));
        let label = QualifiedName::parse("geo.Label");
        schema.add(NamedType::record(label.clone(), vec![Field::required("text", TypeNode::string())]));
        let drawing = QualifiedName::parse("geo.Drawing");
        schema.add(NamedType::record(
            drawing.clone(),
            vec![Field::required(
                "items",
                TypeNode::array(TypeNode::choice(vec![
                    TypeNode::reference(circle),
                    TypeNode::reference(label),
                ])),
            )],
        ));
        schema.root = Some(drawing);
        let mut ctx = ConversionContext::new(Dialect::Ir);
        polyschema_resolve::resolve(schema, &mut ctx).unwrap()
    }

    #[test]
    fn closed_records_reject_extra_members() {
        let schema = shapes();
        assert!(is_match(&schema, "geo.Circle", &json!({"radius": 1.5})));
        assert!(!is_match(&schema, "geo.Circle", &json!({"radius": 1.5, "text": "x"})));
        assert!(!is_match(&schema, "geo.Circle", &json!({"radius": "1.5"})));
        assert!(!is_match(&schema, "geo.Square", &json!({})));
    }

    #[test]
    fn nested_choices_are_found_by_path() {
        let schema = shapes();
        let choice = choice_at(&schema, "geo.Drawing", &["items", "[]"]).unwrap();
        assert_eq!(choice.variants.len(), 2);
        assert_eq!(dispatch(&schema, "geo.Drawing", &["items", "[]"], &json!({"text": "hi"})).unwrap(), 1);
        let err = dispatch(&schema, "geo.Drawing", &["items", "[]"], &json!({"side": 2})).unwrap_err();
        assert_eq!(err.to_string(), "no variant of the union at /geo.Drawing/items/[] accepts the value");
        assert!(is_match(&schema, "geo.Drawing", &json!({"items": [{"radius": 2}, {"text": "a"}]})));
    }
}
