//! Structural validation of IR schemas.

use crate::context::{ConversionContext, Dialect};
use crate::error::{Error, Result, SchemaPath};
use crate::ir::{ChoiceType, Collection, EnumType, MapType, Primitive, RecordType, Scalar, Schema, TypeNode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;

impl Schema {
    /// Build a schema from a canonical IR JSON document and validate it.
    pub fn from_document(document: &str) -> Result<Schema> {
        let mut ctx = ConversionContext::new(Dialect::Ir);
        let value: Value = serde_json::from_str(document)
            .map_err(|err| Error::schema(Dialect::Ir, &SchemaPath::root(), err.to_string()))?;
        let schema = match serde_path_to_error::deserialize::<_, Schema>(&value) {
            Ok(schema) => schema,
            Err(err) => {
                let (segments, message) = split(err);
                return Err(locate(&value, SchemaPath::root(), &segments, message));
            }
        };
        validate(&schema, &mut ctx)?;
        Ok(schema)
    }
}

fn split(err: serde_path_to_error::Error<serde_json::Error>) -> (Vec<String>, String) {
    let segments = err
        .path()
        .iter()
        .map(|segment| match segment {
            serde_path_to_error::Segment::Seq { index } => index.to_string(),
            serde_path_to_error::Segment::Map { key } => key.clone(),
            serde_path_to_error::Segment::Enum { variant } => variant.clone(),
            serde_path_to_error::Segment::Unknown => "?".to_string(),
        })
        .collect();
    (segments, err.into_inner().to_string())
}

/// Error for a failure at `segments` below `value`. The `kind` tag buffers
/// its node, so a path that stops at a type node is refined by decoding
/// the node's payload on its own.
fn locate(value: &Value, base: SchemaPath, segments: &[String], message: String) -> Error {
    let path = segments.iter().fold(base, |path, segment| path.join(segment));
    let child = segments.iter().try_fold(value, |v, segment| match v {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    });
    let Some(Value::Object(node)) = child else {
        return Error::schema(Dialect::Ir, &path, message);
    };
    let mut payload = node.clone();
    let kind = match payload.remove("kind") {
        Some(Value::String(kind)) => kind,
        _ => return Error::schema(Dialect::Ir, &path, message),
    };
    let payload = Value::Object(payload);
    let inner = match kind.as_str() {
        "primitive" => decode::<Primitive>(&payload),
        "record" => decode::<RecordType>(&payload),
        "enum" => decode::<EnumType>(&payload),
        "array" | "set" => decode::<Collection>(&payload),
        "map" => decode::<MapType>(&payload),
        "choice" => decode::<ChoiceType>(&payload),
        _ => None,
    };
    match inner {
        Some((segments, message)) => locate(&payload, path, &segments, message),
        None => Error::schema(Dialect::Ir, &path, message),
    }
}

fn decode<T: DeserializeOwned>(value: &Value) -> Option<(Vec<String>, String)> {
    serde_path_to_error::deserialize::<_, T>(value).err().map(split)
}

/// Check every local rule of the model.
///
/// Reference resolution is not checked here; see
/// [`ResolvedSchema::new`](crate::ResolvedSchema::new).
pub fn validate(schema: &Schema, ctx: &mut ConversionContext) -> Result<()> {
    let base = SchemaPath::root().join("types");
    if let Some(root) = &schema.root {
        if !schema.contains(root) {
            return Err(Error::unresolved(ctx.dialect, &SchemaPath::root().join("root"), root.full()));
        }
    }
    for (key, def) in &schema.types {
        let path = base.join(key);
        if key != &def.name {
            return Err(Error::schema(
                ctx.dialect,
                &path,
                format!("table key does not match type name `{}`", def.name),
            ));
        }
        if def.name.name.is_empty() {
            return Err(Error::schema(ctx.dialect, &path, "empty type name"));
        }
        validate_node(&def.node, &path, ctx)?;
    }
    tracing::debug!(dialect = %ctx.dialect, types = schema.types.len(), "schema validated");
    Ok(())
}

/// Validate a single node and everything nested inside it.
pub fn validate_node(node: &TypeNode, path: &SchemaPath, ctx: &mut ConversionContext) -> Result<()> {
    let dialect = ctx.dialect;
    match node {
        TypeNode::Primitive(p) => validate_primitive(p, path, ctx),
        TypeNode::Record(r) => {
            if r.fields.is_empty() && !ctx.allow_empty_records {
                return Err(Error::schema(dialect, path, "record has no fields"));
            }
            let mut seen = HashSet::new();
            for field in &r.fields {
                let field_path = path.join("fields").join(&field.name);
                if field.name.is_empty() {
                    return Err(Error::schema(dialect, &field_path, "empty field name"));
                }
                if !seen.insert(field.name.as_str()) {
                    return Err(Error::schema(dialect, &field_path, "duplicate field name"));
                }
                validate_node(&field.ty, &field_path, ctx)?;
            }
            Ok(())
        }
        TypeNode::Enum(e) => {
            let mut seen = HashSet::new();
            for symbol in &e.symbols {
                if symbol.is_empty() {
                    return Err(Error::schema(dialect, path, "empty enum symbol"));
                }
                if !seen.insert(symbol.as_str()) {
                    return Err(Error::schema(
                        dialect,
                        path,
                        format!("duplicate enum symbol `{symbol}`"),
                    ));
                }
            }
            Ok(())
        }
        TypeNode::Array(c) | TypeNode::Set(c) => {
            if let (Some(min), Some(max)) = (c.min_items, c.max_items) {
                if min > max {
                    return Err(Error::schema(dialect, path, "min_items exceeds max_items"));
                }
            }
            validate_node(&c.items, &path.join("items"), ctx)
        }
        TypeNode::Map(m) => {
            if !matches!(*m.keys, TypeNode::Primitive(_)) {
                return Err(Error::schema(dialect, &path.join("keys"), "map keys must be primitive"));
            }
            validate_node(&m.keys, &path.join("keys"), ctx)?;
            validate_node(&m.values, &path.join("values"), ctx)
        }
        TypeNode::Choice(c) => validate_choice(c, path, ctx),
        TypeNode::Reference { name } => {
            if name.name.is_empty() {
                return Err(Error::schema(dialect, path, "empty reference"));
            }
            Ok(())
        }
    }
}

fn validate_primitive(p: &Primitive, path: &SchemaPath, ctx: &mut ConversionContext) -> Result<()> {
    let dialect = ctx.dialect;
    if let Scalar::Decimal { precision, scale } = p.scalar {
        if precision == 0 {
            return Err(Error::schema(dialect, path, "decimal precision must be positive"));
        }
        if scale > precision {
            return Err(Error::schema(dialect, path, "decimal scale exceeds precision"));
        }
    }
    let c = &p.constraints;
    if let (Some(min), Some(max)) = (c.minimum, c.maximum) {
        if min > max {
            return Err(Error::schema(dialect, path, "minimum exceeds maximum"));
        }
    }
    if let (Some(min), Some(max)) = (c.min_length, c.max_length) {
        if min > max {
            return Err(Error::schema(dialect, path, "min_length exceeds max_length"));
        }
    }
    if let Some(pattern) = &c.pattern {
        if let Err(err) = ctx.patterns.get(pattern) {
            return Err(Error::schema(
                dialect,
                path,
                format!("invalid pattern `{pattern}`: {err}"),
            ));
        }
    }
    Ok(())
}

fn validate_choice(c: &ChoiceType, path: &SchemaPath, ctx: &mut ConversionContext) -> Result<()> {
    let dialect = ctx.dialect;
    if c.variants.is_empty() {
        return Err(Error::schema(dialect, path, "choice has no variants"));
    }
    let mut names = HashSet::new();
    let mut tags = HashSet::new();
    for variant in &c.variants {
        let variant_path = path.join("variants").join(&variant.name);
        if !names.insert(variant.name.as_str()) {
            return Err(Error::schema(dialect, &variant_path, "duplicate variant name"));
        }
        if let Some(tag) = &variant.tag {
            if !tags.insert(tag.as_str()) {
                return Err(Error::schema(
                    dialect,
                    &variant_path,
                    format!("duplicate discriminator constant `{tag}`"),
                ));
            }
        } else if c.selector.is_some() && c.resolution.is_some() {
            return Err(Error::schema(
                dialect,
                &variant_path,
                "missing discriminator constant",
            ));
        }
        validate_node(&variant.node, &variant_path, ctx)?;
    }
    if let Some(resolution) = &c.resolution {
        if resolution.recognizers.len() != c.variants.len() {
            return Err(Error::schema(
                dialect,
                path,
                "recognizer count does not match variant count",
            ));
        }
    }
    Ok(())
}
