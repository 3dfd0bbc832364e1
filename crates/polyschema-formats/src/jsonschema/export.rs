//! IR to JSON Schema.

use crate::meta::{self, Intent, JSON_SCHEMA_KEY};
use crate::options::{ExportOptions, NamedTypePolicy};
use crate::traits::Exporter;
use polyschema_core::{
    ChoiceType, Dialect, Error, Field, NamedType, Primitive, QualifiedName, RecordType,
    ResolvedSchema, Result, Scalar, SchemaPath, TimePrecision, TypeNode,
};
use serde_json::{Map, Value, json};
use std::collections::HashSet;

pub struct JsonSchemaExporter;

impl Exporter for JsonSchemaExporter {
    fn dialect(&self) -> Dialect {
        Dialect::JsonSchema
    }

    fn export(&self, schema: &ResolvedSchema, options: &ExportOptions) -> Result<String> {
        let writer = Writer::new(schema, options);
        let document = writer.document()?;
        serde_json::to_string_pretty(&document)
            .map_err(|e| Error::schema(Dialect::JsonSchema, &SchemaPath::root(), e.to_string()))
    }
}

struct Writer<'a> {
    schema: &'a ResolvedSchema,
    options: &'a ExportOptions,
    /// Types that reach themselves; always written as definitions.
    recursive: HashSet<QualifiedName>,
}

impl<'a> Writer<'a> {
    fn new(schema: &'a ResolvedSchema, options: &'a ExportOptions) -> Self {
        let recursive = schema
            .types()
            .filter(|def| schema.schema().is_recursive(&def.name))
            .map(|def| def.name.clone())
            .collect();
        Self {
            schema,
            options,
            recursive,
        }
    }

    fn inline(&self) -> bool {
        self.options.named_types == NamedTypePolicy::Inline && self.schema.root().is_some()
    }

    fn document(&self) -> Result<Value> {
        let draft = self.options.draft;
        let mut doc = Map::new();
        doc.insert("$schema".into(), Value::from(draft.uri()));

        let mut defs = Map::new();
        let root = self.schema.root();
        if self.inline() {
            let root = root.filter(|r| !self.recursive.contains(&r.name));
            if let Some(root) = root {
                for (k, v) in self.named_body(root, true)? {
                    doc.insert(k, v);
                }
            } else if let Some(root) = self.schema.root() {
                doc.insert("$ref".into(), Value::from(self.ref_uri(&root.name)));
            }
            for def in self.schema.closure() {
                if self.recursive.contains(&def.name) {
                    defs.insert(def.name.full(), Value::Object(self.named_body(def, false)?));
                }
            }
        } else {
            if let Some(root) = root {
                doc.insert("$ref".into(), Value::from(self.ref_uri(&root.name)));
            }
            for def in self.schema.closure() {
                defs.insert(def.name.full(), Value::Object(self.named_body(def, false)?));
            }
        }
        if !defs.is_empty() {
            doc.insert(draft.defs_keyword().into(), Value::Object(defs));
        }
        Ok(Value::Object(doc))
    }

    fn ref_uri(&self, name: &QualifiedName) -> String {
        format!("#/{}/{}", self.options.draft.defs_keyword(), name.full())
    }

    fn path_of(name: &QualifiedName) -> SchemaPath {
        SchemaPath::root().join("types").join(name)
    }

    /// The schema object of a named type, with docs, aliases and extensions.
    fn named_body(&self, def: &NamedType, record_name: bool) -> Result<Map<String, Value>> {
        let mut intent = Intent::default();
        let mut out = self.node(&def.node, &Self::path_of(&def.name), &mut intent)?;
        if let Some(docs) = &def.docs {
            out.insert("description".into(), Value::from(docs.as_str()));
        }
        if record_name {
            intent.name = Some(def.name.clone());
        }
        intent.aliases = def.aliases.clone();
        for (key, value) in def.extensions.iter() {
            out.insert(key.clone(), value.to_json());
        }
        attach(&mut out, intent);
        Ok(out)
    }

    fn node(&self, node: &TypeNode, path: &SchemaPath, intent: &mut Intent) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        match node {
            TypeNode::Primitive(p) => return self.primitive(p, path, intent),
            TypeNode::Record(r) => return self.record(r, path),
            TypeNode::Enum(e) => {
                out.insert("type".into(), Value::from("string"));
                out.insert("enum".into(), json!(e.symbols));
                if e.symbols.len() == 1 {
                    intent.symbols = Some(e.symbols.clone());
                }
            }
            TypeNode::Array(c) | TypeNode::Set(c) => {
                out.insert("type".into(), Value::from("array"));
                out.insert("items".into(), self.child(&c.items, &path.join("items"))?);
                if matches!(node, TypeNode::Set(_)) {
                    out.insert("uniqueItems".into(), Value::Bool(true));
                }
                if let Some(min) = c.min_items {
                    out.insert("minItems".into(), Value::from(min));
                }
                if let Some(max) = c.max_items {
                    out.insert("maxItems".into(), Value::from(max));
                }
            }
            TypeNode::Map(m) => {
                out.insert("type".into(), Value::from("object"));
                out.insert("additionalProperties".into(), self.child(&m.values, &path.join("values"))?);
                if let TypeNode::Primitive(k) = &*m.keys {
                    if k.scalar != Scalar::String {
                        meta::substitute(self.options, Dialect::JsonSchema, path, "non-string map keys")?;
                        intent.keys = Some(k.scalar);
                    }
                }
            }
            TypeNode::Choice(c) => return self.choice(c, path),
            TypeNode::Reference { name } => {
                let target = self
                    .schema
                    .get(name)
                    .ok_or_else(|| Error::unresolved(Dialect::JsonSchema, path, name.full()))?;
                if self.inline() && !self.recursive.contains(name) {
                    return self.named_body(target, true);
                }
                out.insert("$ref".into(), Value::from(self.ref_uri(name)));
            }
        }
        Ok(out)
    }

    /// A nested schema with its own intent attached.
    fn child(&self, node: &TypeNode, path: &SchemaPath) -> Result<Value> {
        let mut intent = Intent::default();
        let mut out = self.node(node, path, &mut intent)?;
        attach(&mut out, intent);
        Ok(Value::Object(out))
    }

    fn primitive(&self, p: &Primitive, path: &SchemaPath, intent: &mut Intent) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        // (type, native format, substituted construct)
        let (ty, format, substituted) = match p.scalar {
            Scalar::Null => (Some("null"), None, None),
            Scalar::Boolean => (Some("boolean"), None, None),
            Scalar::Int32 => (Some("integer"), Some("int32"), None),
            Scalar::Int64 => (Some("integer"), Some("int64"), None),
            Scalar::Float32 => (Some("number"), Some("float"), None),
            Scalar::Float64 => (Some("number"), Some("double"), None),
            Scalar::Decimal { .. } => (Some("string"), None, Some("decimal")),
            Scalar::String | Scalar::Bytes => (Some("string"), None, None),
            Scalar::Date => (Some("string"), Some("date"), None),
            Scalar::Time { precision } => (
                Some("string"),
                Some("time"),
                (precision == TimePrecision::Micros).then_some("time with microsecond precision"),
            ),
            Scalar::Timestamp { precision, local } => (
                Some("string"),
                Some("date-time"),
                (precision == TimePrecision::Micros || local).then_some("local or microsecond timestamp"),
            ),
            Scalar::Duration => (Some("integer"), None, Some("duration")),
            Scalar::Uuid => (Some("string"), Some("uuid"), None),
            Scalar::Any => (None, None, None),
        };
        if let Some(ty) = ty {
            out.insert("type".into(), Value::from(ty));
        }
        if p.scalar == Scalar::Bytes {
            out.insert("contentEncoding".into(), Value::from("base64"));
        }
        if let Some(construct) = substituted {
            meta::substitute(self.options, Dialect::JsonSchema, path, construct)?;
            intent.scalar = Some(p.scalar);
        }
        match (format, &p.format) {
            (Some(native), Some(extra)) => {
                out.insert("format".into(), Value::from(native));
                intent.format = Some(extra.clone());
            }
            (Some(native), None) => {
                out.insert("format".into(), Value::from(native));
            }
            (None, Some(extra)) => {
                out.insert("format".into(), Value::from(extra.as_str()));
            }
            (None, None) => {}
        }
        intent.unit = p.unit.clone();
        intent.currency = p.currency.clone();

        let c = &p.constraints;
        if let Some(min) = c.minimum {
            out.insert("minimum".into(), number(min.0));
        }
        if let Some(max) = c.maximum {
            out.insert("maximum".into(), number(max.0));
        }
        if let Some(n) = c.min_length {
            out.insert("minLength".into(), Value::from(n));
        }
        if let Some(n) = c.max_length {
            out.insert("maxLength".into(), Value::from(n));
        }
        if let Some(pattern) = &c.pattern {
            out.insert("pattern".into(), Value::from(pattern.as_str()));
        }
        if let Some(constant) = &c.constant {
            out.insert("const".into(), constant.to_json());
        }
        Ok(out)
    }

    fn record(&self, r: &RecordType, path: &SchemaPath) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        out.insert("type".into(), Value::from("object"));
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &r.fields {
            properties.insert(field.name.clone(), self.property(field, &path.join("fields").join(&field.name))?);
            if field.required {
                required.push(Value::from(field.name.as_str()));
            }
        }
        out.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            out.insert("required".into(), Value::Array(required));
        }
        out.insert("additionalProperties".into(), Value::Bool(r.open));
        Ok(out)
    }

    fn property(&self, field: &Field, path: &SchemaPath) -> Result<Value> {
        let mut intent = Intent::default();
        let inlined = field
            .ty
            .as_reference()
            .is_some_and(|name| self.inline() && !self.recursive.contains(name));
        let mut out = if inlined {
            // Field keywords stay outside the inlined type body.
            let mut wrapper = Map::new();
            wrapper.insert("allOf".into(), Value::Array(vec![self.child(&field.ty, path)?]));
            wrapper
        } else {
            self.node(&field.ty, path, &mut intent)?
        };
        if let Some(docs) = &field.docs {
            out.insert("description".into(), Value::from(docs.as_str()));
        }
        if let Some(default) = &field.default {
            out.insert("default".into(), default.to_json());
        }
        for (key, value) in field.extensions.iter() {
            out.insert(key.clone(), value.to_json());
        }
        attach(&mut out, intent);
        Ok(Value::Object(out))
    }

    fn choice(&self, c: &ChoiceType, path: &SchemaPath) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        let mut variants = Vec::with_capacity(c.variants.len());
        for v in &c.variants {
            variants.push(self.child(&v.node, &path.join("variants").join(&v.name))?);
        }
        out.insert("oneOf".into(), Value::Array(variants));
        if let Some(selector) = &c.selector {
            let mut mapping = Map::new();
            for v in &c.variants {
                if let (Some(tag), Some(name)) = (&v.tag, v.node.as_reference()) {
                    mapping.insert(tag.clone(), Value::from(self.ref_uri(name)));
                }
            }
            out.insert(
                "discriminator".into(),
                json!({ "propertyName": selector, "mapping": mapping }),
            );
        }
        Ok(out)
    }
}

fn attach(out: &mut Map<String, Value>, intent: Intent) {
    if !intent.is_empty() {
        out.insert(JSON_SCHEMA_KEY.into(), intent.to_value());
    }
}

fn number(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        Value::from(f)
    }
}
