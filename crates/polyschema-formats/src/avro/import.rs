//! Avro schema JSON to IR.

use super::sanitize_symbols;
use crate::document_root_name;
use crate::meta::{AVRO_KEY, Intent};
use crate::traits::Importer;
use polyschema_core::{
    Collection, ConversionContext, Dialect, EnumType, Error, ExtensionBag, Field, Literal,
    MapType, NamedType, Namespace, Primitive, QualifiedName, RecordType, Result, Scalar, Schema,
    SchemaPath, TimePrecision, TypeNode,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub struct AvroImporter;

impl Importer for AvroImporter {
    fn dialect(&self) -> Dialect {
        Dialect::Avro
    }

    fn parse(&self, document: &str, ctx: &mut ConversionContext) -> Result<Schema> {
        let root: Value = serde_json::from_str(document)
            .map_err(|e| Error::schema(Dialect::Avro, &SchemaPath::root(), e.to_string()))?;
        parse_avro(&root, ctx)
    }
}

const DEFINITION_ATTRIBUTES: &[&str] = &[
    "type",
    "name",
    "namespace",
    "doc",
    "aliases",
    "fields",
    "symbols",
    "items",
    "values",
    "size",
    "logicalType",
    "precision",
    "scale",
    AVRO_KEY,
];

const FIELD_ATTRIBUTES: &[&str] = &[
    "name",
    "type",
    "doc",
    "default",
    "order",
    "aliases",
    "discriminator",
    AVRO_KEY,
];

/// Parse an Avro schema document into an unresolved IR schema.
pub fn parse_avro(input: &Value, ctx: &mut ConversionContext) -> Result<Schema> {
    let mut parser = Parser::default();
    let top = Namespace::empty();

    let marker = match input {
        Value::Array(items) => items.last().and_then(|last| Intent::read(last, AVRO_KEY)),
        _ => None,
    };
    let (list_marker, union_name) = match marker {
        Some(intent) => (intent.root, intent.union),
        None => (None, None),
    };
    let root = match (input, list_marker) {
        (Value::Array(_), _) if union_name.is_some() => {
            let node = parser.node(input, &top, &SchemaPath::root())?;
            union_name.map(|name| {
                parser.schema.add(NamedType::new(name.clone(), node));
                name
            })
        }
        (Value::Array(items), Some(has_root)) => {
            let mut last = None;
            for (i, item) in items.iter().enumerate() {
                last = Some(parser.node(item, &top, &SchemaPath::root().join(i))?);
            }
            match last {
                Some(node) if has_root => Some(parser.root_of(node, ctx)),
                _ => None,
            }
        }
        (value, _) => {
            let node = parser.node(value, &top, &SchemaPath::root())?;
            Some(parser.root_of(node, ctx))
        }
    };
    parser.schema.root = root;
    parser.restore_symbols();
    parser.apply_selectors();
    tracing::debug!(types = parser.schema.types.len(), "parsed avro schema");
    Ok(parser.schema)
}

/// Full name of a definition: dotted names stand alone, otherwise the
/// `namespace` attribute or the enclosing namespace applies.
fn definition_name(object: &Map<String, Value>, enclosing: &Namespace, path: &SchemaPath) -> Result<QualifiedName> {
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::schema(Dialect::Avro, path, "named type without a name"))?;
    if name.contains('.') {
        return Ok(QualifiedName::parse(name));
    }
    let namespace = match object.get("namespace").and_then(Value::as_str) {
        Some(ns) => Namespace::new(ns),
        None => enclosing.clone(),
    };
    Ok(namespace.qualify(name))
}

/// A reference as written, qualified the way Avro resolves it.
fn qualify_in(name: &QualifiedName, enclosing: &Namespace) -> QualifiedName {
    if name.namespace.is_empty() {
        enclosing.qualify(&name.name)
    } else {
        name.clone()
    }
}

fn extensions(object: &Map<String, Value>, known: &[&str]) -> ExtensionBag {
    let mut bag = ExtensionBag::new();
    for (key, value) in object {
        if !known.contains(&key.as_str()) {
            bag.insert(key.clone(), Literal::from(value));
        }
    }
    bag
}

fn primitive_scalar(name: &str) -> Option<Scalar> {
    Some(match name {
        "null" => Scalar::Null,
        "boolean" => Scalar::Boolean,
        "int" => Scalar::Int32,
        "long" => Scalar::Int64,
        "float" => Scalar::Float32,
        "double" => Scalar::Float64,
        "bytes" => Scalar::Bytes,
        "string" => Scalar::String,
        _ => return None,
    })
}

#[derive(Default)]
struct Parser {
    schema: Schema,
    /// Enums whose symbols were sanitized on export: written → original.
    renamed_symbols: HashMap<QualifiedName, HashMap<String, String>>,
    /// Records with a field marked `"discriminator": true`.
    selectors: HashMap<QualifiedName, String>,
}

impl Parser {
    fn root_of(&mut self, node: TypeNode, ctx: &ConversionContext) -> QualifiedName {
        match node {
            TypeNode::Reference { name } => name,
            other => {
                let name = document_root_name(ctx);
                self.schema.add(NamedType::new(name.clone(), other));
                name
            }
        }
    }

    fn node(&mut self, value: &Value, enclosing: &Namespace, path: &SchemaPath) -> Result<TypeNode> {
        match value {
            Value::String(name) => Ok(match primitive_scalar(name) {
                Some(scalar) => TypeNode::primitive(scalar),
                None => TypeNode::reference(QualifiedName::parse(name)),
            }),
            Value::Array(branches) => {
                let mut nodes = Vec::with_capacity(branches.len());
                for (i, branch) in branches.iter().enumerate() {
                    nodes.push(self.node(branch, enclosing, &path.join(i))?);
                }
                Ok(TypeNode::choice(nodes))
            }
            Value::Object(object) => self.object(value, object, enclosing, path),
            _ => Err(Error::schema(Dialect::Avro, path, "expected a type name, union or schema object")),
        }
    }

    fn object(&mut self, value: &Value, object: &Map<String, Value>, enclosing: &Namespace, path: &SchemaPath) -> Result<TypeNode> {
        let intent = Intent::read(value, AVRO_KEY).unwrap_or_default();
        let ty = object
            .get("type")
            .ok_or_else(|| Error::schema(Dialect::Avro, path, "schema object without a type"))?;
        let node = match ty {
            Value::String(t) => match t.as_str() {
                "record" | "error" => return self.record(object, &intent, enclosing, path),
                "enum" => return self.enumeration(object, &intent, enclosing, path),
                "fixed" => return self.fixed(object, enclosing, path),
                "array" => {
                    let items = object
                        .get("items")
                        .ok_or_else(|| Error::schema(Dialect::Avro, path, "array without items"))?;
                    let collection = Collection {
                        items: Box::new(self.node(items, enclosing, &path.join("items"))?),
                        min_items: intent.min_items,
                        max_items: intent.max_items,
                    };
                    if intent.set {
                        TypeNode::Set(collection)
                    } else {
                        TypeNode::Array(collection)
                    }
                }
                "map" => {
                    let values = object
                        .get("values")
                        .ok_or_else(|| Error::schema(Dialect::Avro, path, "map without values"))?;
                    TypeNode::Map(MapType {
                        keys: Box::new(TypeNode::string()),
                        values: Box::new(self.node(values, enclosing, &path.join("values"))?),
                    })
                }
                name => match primitive_scalar(name) {
                    Some(base) => TypeNode::Primitive(self.primitive(name, base, object, &intent, path)?),
                    None => TypeNode::reference(QualifiedName::parse(name)),
                },
            },
            nested @ (Value::Array(_) | Value::Object(_)) => self.node(nested, enclosing, &path.join("type"))?,
            _ => return Err(Error::schema(Dialect::Avro, &path.join("type"), "expected a string, array or object")),
        };
        match intent.name {
            Some(name) => {
                if !self.schema.contains(&name) {
                    self.schema.add(NamedType::new(name.clone(), node));
                }
                Ok(TypeNode::reference(name))
            }
            None => Ok(node),
        }
    }

    fn primitive(&self, name: &str, base: Scalar, object: &Map<String, Value>, intent: &Intent, path: &SchemaPath) -> Result<Primitive> {
        let logical = object.get("logicalType").and_then(Value::as_str);
        let scalar = match (name, logical) {
            ("bytes", Some("decimal")) => decimal(object, path)?,
            ("int", Some("date")) => Scalar::Date,
            ("int", Some("time-millis")) => Scalar::Time { precision: TimePrecision::Millis },
            ("long", Some("time-micros")) => Scalar::Time { precision: TimePrecision::Micros },
            ("long", Some(l)) if l.ends_with("timestamp-millis") || l.ends_with("timestamp-micros") => {
                let local = match l.strip_suffix("timestamp-millis").or_else(|| l.strip_suffix("timestamp-micros")) {
                    Some("") => false,
                    Some("local-") => true,
                    _ => {
                        tracing::warn!(logical_type = l, %path, "unknown logical type, using the underlying type");
                        return Ok(Primitive::new(base));
                    }
                };
                let precision = if l.ends_with("millis") {
                    TimePrecision::Millis
                } else {
                    TimePrecision::Micros
                };
                Scalar::Timestamp { precision, local }
            }
            ("string", Some("uuid")) => Scalar::Uuid,
            (_, Some(l)) => {
                tracing::warn!(logical_type = l, %path, "unknown logical type, using the underlying type");
                base
            }
            (_, None) => base,
        };
        let mut p = Primitive::new(intent.scalar.unwrap_or(scalar));
        p.format = intent.format.clone();
        p.unit = intent.unit.clone();
        p.currency = intent.currency.clone();
        p.constraints = intent.constraints.clone();
        Ok(p)
    }

    fn record(&mut self, object: &Map<String, Value>, intent: &Intent, enclosing: &Namespace, path: &SchemaPath) -> Result<TypeNode> {
        let name = definition_name(object, enclosing, path)?;
        if self.schema.contains(&name) {
            return Err(Error::schema(Dialect::Avro, path, format!("`{name}` is defined twice")));
        }
        let fields = object
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::schema(Dialect::Avro, path, "record without fields"))?;
        let mut record = RecordType {
            fields: Vec::with_capacity(fields.len()),
            open: intent.open,
            hint: None,
        };
        for (i, field) in fields.iter().enumerate() {
            if let Some(field) = self.field(field, &name, &path.join("fields").join(i))? {
                record.fields.push(field);
            }
        }
        self.define(name.clone(), TypeNode::Record(record), object);
        Ok(TypeNode::reference(name))
    }

    fn field(&mut self, value: &Value, owner: &QualifiedName, path: &SchemaPath) -> Result<Option<Field>> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::schema(Dialect::Avro, path, "field must be an object"))?;
        let intent = Intent::read(value, AVRO_KEY).unwrap_or_default();
        if intent.envelope {
            return Ok(None);
        }
        let name = object
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::schema(Dialect::Avro, path, "field without a name"))?;
        let ty = object
            .get("type")
            .ok_or_else(|| Error::schema(Dialect::Avro, path, "field without a type"))?;
        let mut field = Field::required(name, self.node(ty, &owner.namespace, &path.join("type"))?);
        field.default = object.get("default").map(Literal::from);
        field.docs = object.get("doc").and_then(Value::as_str).map(String::from);
        field.extensions = extensions(object, FIELD_ATTRIBUTES);

        // A nullable union with a default is an optional field; without one
        // it is a required field that accepts null.
        let nullable = matches!(&field.ty, TypeNode::Choice(c) if c.has_null());
        if nullable && field.default.is_some() && intent.required != Some(true) {
            field.required = false;
            let single = match &mut field.ty {
                TypeNode::Choice(c) => {
                    c.variants.retain(|v| !v.node.is_null());
                    (c.variants.len() == 1).then(|| c.variants.remove(0).node)
                }
                _ => None,
            };
            if let Some(node) = single {
                field.ty = node;
            }
            field.default = field.default.filter(|d| !d.is_null());
        }
        if object.get("discriminator") == Some(&Value::Bool(true)) {
            self.selectors.insert(owner.clone(), name.to_string());
        }
        Ok(Some(field))
    }

    fn enumeration(&mut self, object: &Map<String, Value>, intent: &Intent, enclosing: &Namespace, path: &SchemaPath) -> Result<TypeNode> {
        let name = definition_name(object, enclosing, path)?;
        let written: Vec<String> = object
            .get("symbols")
            .and_then(Value::as_array)
            .and_then(|s| s.iter().map(|v| v.as_str().map(String::from)).collect())
            .ok_or_else(|| Error::schema(Dialect::Avro, path, "enum symbols must be strings"))?;
        let symbols = match &intent.symbols {
            Some(original) if sanitize_symbols(original).as_ref() == Some(&written) => {
                let renamed = written.iter().cloned().zip(original.iter().cloned()).collect();
                self.renamed_symbols.insert(name.clone(), renamed);
                original.clone()
            }
            Some(_) => {
                tracing::warn!(%name, "enum symbol metadata does not match the symbols, ignored");
                written
            }
            None => written,
        };
        self.define(name.clone(), TypeNode::Enum(EnumType { symbols, hint: None }), object);
        Ok(TypeNode::reference(name))
    }

    fn fixed(&mut self, object: &Map<String, Value>, enclosing: &Namespace, path: &SchemaPath) -> Result<TypeNode> {
        let name = definition_name(object, enclosing, path)?;
        let scalar = match object.get("logicalType").and_then(Value::as_str) {
            Some("decimal") => decimal(object, path)?,
            Some("duration") => Scalar::Duration,
            _ => Scalar::Bytes,
        };
        self.define(name.clone(), TypeNode::primitive(scalar), object);
        Ok(TypeNode::reference(name))
    }

    fn define(&mut self, name: QualifiedName, node: TypeNode, object: &Map<String, Value>) {
        let mut def = NamedType::new(name, node);
        def.docs = object.get("doc").and_then(Value::as_str).map(String::from);
        def.aliases = object
            .get("aliases")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).map(String::from).collect())
            .unwrap_or_default();
        def.extensions = extensions(object, DEFINITION_ATTRIBUTES);
        if let Some(size) = object.get("size") {
            def.extensions.insert("size", Literal::from(size));
        }
        self.schema.add(def);
    }

    /// Map defaults of fields typed by a sanitized enum back to the
    /// original symbols.
    fn restore_symbols(&mut self) {
        if self.renamed_symbols.is_empty() {
            return;
        }
        for def in self.schema.types.values_mut() {
            let TypeNode::Record(r) = &mut def.node else {
                continue;
            };
            for field in &mut r.fields {
                let target = field.ty.as_reference().map(|n| qualify_in(n, &def.name.namespace));
                let Some(renamed) = target.and_then(|t| self.renamed_symbols.get(&t)) else {
                    continue;
                };
                if let Some(Literal::String(symbol)) = &mut field.default {
                    if let Some(original) = renamed.get(symbol.as_str()) {
                        *symbol = original.clone();
                    }
                }
            }
        }
    }

    /// Give choices whose variants all carry the same marked field that
    /// field as selector, and each variant its default as tag.
    fn apply_selectors(&mut self) {
        if self.selectors.is_empty() {
            return;
        }
        let tags: HashMap<QualifiedName, (String, Option<String>)> = self
            .selectors
            .iter()
            .map(|(record, field)| {
                let tag = match self.schema.get(record).map(|d| &d.node) {
                    Some(TypeNode::Record(r)) => r
                        .field(field)
                        .and_then(|f| f.default.as_ref())
                        .and_then(Literal::as_str)
                        .map(String::from),
                    _ => None,
                };
                (record.clone(), (field.clone(), tag))
            })
            .collect();
        for def in self.schema.types.values_mut() {
            let namespace = def.name.namespace.clone();
            def.node.walk_mut(&mut |node| {
                let TypeNode::Choice(c) = node else {
                    return;
                };
                if c.selector.is_some() || c.variants.is_empty() {
                    return;
                }
                let found: Option<Vec<&(String, Option<String>)>> = c
                    .variants
                    .iter()
                    .map(|v| v.node.as_reference().and_then(|n| tags.get(&qualify_in(n, &namespace))))
                    .collect();
                let Some(found) = found else {
                    return;
                };
                let field = found[0].0.clone();
                if found.iter().any(|(f, _)| *f != field) {
                    return;
                }
                for (variant, (_, tag)) in c.variants.iter_mut().zip(found) {
                    variant.tag = tag.clone();
                }
                c.selector = Some(field);
            });
        }
    }
}

fn decimal(object: &Map<String, Value>, path: &SchemaPath) -> Result<Scalar> {
    let read = |key: &str| object.get(key).and_then(Value::as_u64).and_then(|n| u32::try_from(n).ok());
    let precision = read("precision").ok_or_else(|| Error::schema(Dialect::Avro, path, "decimal without precision"))?;
    Ok(Scalar::Decimal {
        precision,
        scale: read("scale").unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Schema {
        let mut ctx = ConversionContext::new(Dialect::Avro);
        parse_avro(&value, &mut ctx).unwrap()
    }

    #[test]
    fn nullable_union_with_default_is_optional() {
        let schema = parse(json!({
            "type": "record",
            "name": "Person",
            "namespace": "acme",
            "fields": [
                { "name": "nick", "type": ["null", "string"], "default": null },
                { "name": "tag", "type": ["null", "string"] }
            ]
        }));
        let TypeNode::Record(r) = &schema.lookup("acme.Person").unwrap().node else { unreachable!() };
        assert!(!r.fields[0].required);
        assert_eq!(r.fields[0].ty, TypeNode::string());
        assert_eq!(r.fields[0].default, None);
        assert!(r.fields[1].required);
        assert!(matches!(r.fields[1].ty, TypeNode::Choice(_)));
    }

    #[test]
    fn logical_types_map_to_scalars() {
        let schema = parse(json!({
            "type": "record",
            "name": "Reading",
            "fields": [
                { "name": "at", "type": { "type": "long", "logicalType": "local-timestamp-micros" } },
                { "name": "amount", "type": { "type": "bytes", "logicalType": "decimal", "precision": 12, "scale": 2 } },
                { "name": "odd", "type": { "type": "int", "logicalType": "wat" } }
            ]
        }));
        let TypeNode::Record(r) = &schema.lookup("Reading").unwrap().node else { unreachable!() };
        let scalars: Vec<&str> = r
            .fields
            .iter()
            .map(|f| match &f.ty {
                TypeNode::Primitive(p) => p.scalar.name(),
                _ => "?",
            })
            .collect();
        assert_eq!(scalars, vec!["timestamp", "decimal", "int32"]);
    }

    #[test]
    fn marked_fields_become_selectors() {
        let schema = parse(json!({
            "type": "record",
            "name": "Shape",
            "namespace": "geo",
            "fields": [{
                "name": "body",
                "type": [
                    { "type": "record", "name": "Circle", "fields": [
                        { "name": "kind", "type": { "type": "enum", "name": "Kind", "symbols": ["circle", "square"] },
                          "default": "circle", "discriminator": true },
                        { "name": "radius", "type": "double" }
                    ]},
                    { "type": "record", "name": "Square", "fields": [
                        { "name": "kind", "type": "Kind", "default": "square", "discriminator": true },
                        { "name": "side", "type": "double" }
                    ]}
                ]
            }]
        }));
        let TypeNode::Record(shape) = &schema.lookup("geo.Shape").unwrap().node else { unreachable!() };
        let TypeNode::Choice(body) = &shape.fields[0].ty else { unreachable!() };
        assert_eq!(body.selector.as_deref(), Some("kind"));
        let tags: Vec<Option<&str>> = body.variants.iter().map(|v| v.tag.as_deref()).collect();
        assert_eq!(tags, vec![Some("circle"), Some("square")]);
    }

    #[test]
    fn unmarked_top_level_array_is_a_union() {
        let schema = parse(json!(["null", { "type": "record", "name": "A", "fields": [] }]));
        let root = schema.root.clone().unwrap();
        assert_eq!(root.name, "Root");
        assert!(matches!(schema.get(&root).unwrap().node, TypeNode::Choice(_)));
    }

    #[test]
    fn redefinition_is_an_error() {
        let mut ctx = ConversionContext::new(Dialect::Avro);
        let err = parse_avro(
            &json!(["null", { "type": "record", "name": "A", "fields": [] }, { "type": "record", "name": "A", "fields": [] }]),
            &mut ctx,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "avro: invalid schema at /2: `A` is defined twice");
    }
}
