//! IR to Avro schema JSON.

use super::{ENVELOPE_COLUMNS, sanitize_symbols};
use crate::meta::{self, AVRO_KEY, Intent};
use crate::options::{ExportOptions, NamedTypePolicy};
use crate::traits::Exporter;
use polyschema_core::{
    Dialect, Error, Field, Literal, NamedType, OptionalLayout, Primitive, QualifiedName,
    RecordType, ResolvedSchema, Result, Scalar, SchemaPath, TimePrecision, TypeNode,
};
use serde_json::{Map, Value, json};
use std::collections::HashSet;

pub struct AvroExporter;

impl Exporter for AvroExporter {
    fn dialect(&self) -> Dialect {
        Dialect::Avro
    }

    fn export(&self, schema: &ResolvedSchema, options: &ExportOptions) -> Result<String> {
        let mut writer = Writer::new(schema, options);
        let document = writer.document()?;
        serde_json::to_string_pretty(&document)
            .map_err(|e| Error::schema(Dialect::Avro, &SchemaPath::root(), e.to_string()))
    }
}

/// Attributes the writer produces itself; extension keys never override them.
const RESERVED: &[&str] = &[
    "type",
    "name",
    "namespace",
    "doc",
    "aliases",
    "fields",
    "symbols",
    "items",
    "values",
    "default",
    "logicalType",
    "precision",
    "scale",
    "discriminator",
    AVRO_KEY,
];

/// Only records and enums can carry a name in Avro.
fn definable(node: &TypeNode) -> bool {
    matches!(node, TypeNode::Record(_) | TypeNode::Enum(_))
}

struct Writer<'a> {
    schema: &'a ResolvedSchema,
    options: &'a ExportOptions,
    /// Named types already written; later uses refer to them by full name.
    defined: HashSet<QualifiedName>,
    /// `(record, field)` pairs that carry a union discriminator.
    selectors: HashSet<(QualifiedName, String)>,
}

impl<'a> Writer<'a> {
    fn new(schema: &'a ResolvedSchema, options: &'a ExportOptions) -> Self {
        let mut selectors = HashSet::new();
        for def in schema.types() {
            collect_selectors(&def.node, &mut selectors);
        }
        Self {
            schema,
            options,
            defined: HashSet::new(),
            selectors,
        }
    }

    fn document(&mut self) -> Result<Value> {
        match self.schema.root() {
            Some(root) if matches!(root.node, TypeNode::Choice(_)) => self.union_root(root),
            Some(root) if self.options.named_types == NamedTypePolicy::Inline => {
                let path = SchemaPath::root().join("types").join(&root.name);
                self.reference(&root.name, &path)
            }
            _ => self.type_list(),
        }
    }

    /// A root union is written as a bare union; its name rides on the
    /// last branch.
    fn union_root(&mut self, root: &NamedType) -> Result<Value> {
        let path = SchemaPath::root().join("types").join(&root.name);
        let Value::Array(mut branches) = self.reference(&root.name, &path)? else {
            return Err(Error::schema(Dialect::Avro, &path, "root union has no branches"));
        };
        meta::substitute(self.options, Dialect::Avro, &path, "named union")?;
        if let Some(last) = branches.last_mut() {
            if last.is_string() {
                *last = json!({ "type": last.clone() });
            }
            Intent::amend(last, AVRO_KEY, |i| i.union = Some(root.name.clone()));
        }
        Ok(Value::Array(branches))
    }

    /// Every record and enum up front in dependency order, root last.
    fn type_list(&mut self) -> Result<Value> {
        let order = self.schema.dependency_order();
        self.defined = order
            .iter()
            .filter(|def| definable(&def.node))
            .map(|def| def.name.clone())
            .collect();
        let root = self.schema.root();
        let mut list = Vec::with_capacity(order.len());
        for def in order {
            let is_root = root.is_some_and(|r| r.name == def.name);
            let path = SchemaPath::root().join("types").join(&def.name);
            if definable(&def.node) {
                list.push(self.definition(def, &path)?);
            } else if is_root {
                let mut body = self.node(&def.node, &path)?;
                Intent::amend(&mut body, AVRO_KEY, |i| i.name = Some(def.name.clone()));
                list.push(body);
            }
        }
        if let Some(last) = list.last_mut() {
            let marker = root.is_some();
            Intent::amend(last, AVRO_KEY, |i| i.root = Some(marker));
        }
        Ok(Value::Array(list))
    }

    fn reference(&mut self, name: &QualifiedName, path: &SchemaPath) -> Result<Value> {
        let def = self
            .schema
            .get(name)
            .ok_or_else(|| Error::unresolved(Dialect::Avro, path, name.full()))?;
        if self.defined.contains(name) {
            return Ok(Value::from(name.full()));
        }
        if definable(&def.node) {
            self.defined.insert(name.clone());
            return self.definition(def, path);
        }
        if self.schema.schema().is_recursive(name) {
            let construct = match def.node {
                TypeNode::Choice(_) => "recursive union",
                _ => "recursive anonymous type",
            };
            return Err(Error::unsupported(Dialect::Avro, path, construct));
        }
        let mut body = self.node(&def.node, path)?;
        Intent::amend(&mut body, AVRO_KEY, |i| i.name = Some(name.clone()));
        Ok(body)
    }

    fn definition(&mut self, def: &NamedType, path: &SchemaPath) -> Result<Value> {
        let mut out = Map::new();
        let mut intent = Intent::default();
        match &def.node {
            TypeNode::Record(r) => {
                out.insert("type".into(), Value::from("record"));
                self.identity(def, &mut out);
                let fields = self.fields(def, r, path)?;
                out.insert("fields".into(), Value::Array(fields));
                if r.open {
                    meta::substitute(self.options, Dialect::Avro, path, "open record")?;
                    intent.open = true;
                }
            }
            TypeNode::Enum(e) => {
                out.insert("type".into(), Value::from("enum"));
                self.identity(def, &mut out);
                let symbols = match sanitize_symbols(&e.symbols) {
                    Some(sanitized) => {
                        meta::substitute(self.options, Dialect::Avro, path, "enum symbols outside Avro name rules")?;
                        intent.symbols = Some(e.symbols.clone());
                        sanitized
                    }
                    None => e.symbols.clone(),
                };
                out.insert("symbols".into(), json!(symbols));
            }
            _ => return Err(Error::schema(Dialect::Avro, path, "only records and enums are named in Avro")),
        }
        extend(&mut out, def.extensions.iter());
        attach(&mut out, intent);
        Ok(Value::Object(out))
    }

    fn identity(&self, def: &NamedType, out: &mut Map<String, Value>) {
        out.insert("name".into(), Value::from(def.name.name.as_str()));
        out.insert("namespace".into(), Value::from(def.name.namespace.as_str()));
        if let Some(docs) = &def.docs {
            out.insert("doc".into(), Value::from(docs.as_str()));
        }
        if !def.aliases.is_empty() {
            out.insert("aliases".into(), json!(def.aliases));
        }
    }

    fn fields(&mut self, def: &NamedType, record: &RecordType, path: &SchemaPath) -> Result<Vec<Value>> {
        let mut out = Vec::with_capacity(record.fields.len());
        for field in &record.fields {
            out.push(self.field(&def.name, field, &path.join("fields").join(&field.name))?);
        }
        let is_root = self.schema.root().is_some_and(|r| r.name == def.name);
        if self.options.envelope && is_root {
            out.extend(envelope_columns(&def.name));
        }
        Ok(out)
    }

    fn field(&mut self, owner: &QualifiedName, field: &Field, path: &SchemaPath) -> Result<Value> {
        let mut out = Map::new();
        let mut intent = Intent::default();
        out.insert("name".into(), Value::from(field.name.as_str()));
        let ty = self.node(&field.ty, path)?;
        let default = field.default.as_ref().map(|d| self.default_value(&field.ty, d));

        if field.required {
            out.insert("type".into(), ty);
            if let Some(docs) = &field.docs {
                out.insert("doc".into(), Value::from(docs.as_str()));
            }
            if let Some(default) = default {
                if matches!(&field.ty, TypeNode::Choice(c) if c.has_null()) {
                    intent.required = Some(true);
                }
                out.insert("default".into(), default);
            }
        } else {
            let mut branches = match ty {
                Value::Array(branches) => branches,
                other => vec![other],
            };
            branches.retain(|b| b.as_str() != Some("null"));
            let default = match field.optional_layout() {
                OptionalLayout::NullFirst => {
                    branches.insert(0, Value::from("null"));
                    Value::Null
                }
                OptionalLayout::NullLast => {
                    branches.push(Value::from("null"));
                    default.unwrap_or(Value::Null)
                }
            };
            out.insert("type".into(), Value::Array(branches));
            if let Some(docs) = &field.docs {
                out.insert("doc".into(), Value::from(docs.as_str()));
            }
            out.insert("default".into(), default);
        }
        if self.selectors.contains(&(owner.clone(), field.name.clone())) {
            out.insert("discriminator".into(), Value::Bool(true));
        }
        extend(&mut out, field.extensions.iter());
        attach(&mut out, intent);
        Ok(Value::Object(out))
    }

    /// Defaults of enum-typed fields follow symbol sanitizing.
    fn default_value(&self, ty: &TypeNode, default: &Literal) -> Value {
        if let (Some(TypeNode::Enum(e)), Some(symbol)) = (self.schema.deref(ty), default.as_str()) {
            if let Some(sanitized) = sanitize_symbols(&e.symbols) {
                if let Some(i) = e.symbols.iter().position(|s| s == symbol) {
                    return Value::from(sanitized[i].as_str());
                }
            }
        }
        default.to_json()
    }

    fn node(&mut self, node: &TypeNode, path: &SchemaPath) -> Result<Value> {
        match node {
            TypeNode::Primitive(p) => self.primitive(p, path),
            TypeNode::Record(_) | TypeNode::Enum(_) => {
                Err(Error::schema(Dialect::Avro, path, "anonymous record or enum"))
            }
            TypeNode::Array(c) | TypeNode::Set(c) => {
                let mut out = Map::new();
                let mut intent = Intent::default();
                out.insert("type".into(), Value::from("array"));
                out.insert("items".into(), self.node(&c.items, &path.join("items"))?);
                if matches!(node, TypeNode::Set(_)) {
                    meta::substitute(self.options, Dialect::Avro, path, "set")?;
                    intent.set = true;
                }
                intent.min_items = c.min_items;
                intent.max_items = c.max_items;
                attach(&mut out, intent);
                Ok(Value::Object(out))
            }
            TypeNode::Map(m) => {
                if !matches!(&*m.keys, TypeNode::Primitive(k) if k.scalar == Scalar::String) {
                    return Err(Error::unsupported(Dialect::Avro, path, "non-string map keys"));
                }
                Ok(json!({
                    "type": "map",
                    "values": self.node(&m.values, &path.join("values"))?,
                }))
            }
            TypeNode::Choice(c) => {
                let mut branches = Vec::with_capacity(c.variants.len());
                for v in &c.variants {
                    match self.node(&v.node, &path.join("variants").join(&v.name))? {
                        Value::Array(inner) => branches.extend(inner),
                        branch => branches.push(branch),
                    }
                }
                Ok(Value::Array(branches))
            }
            TypeNode::Reference { name } => self.reference(name, path),
        }
    }

    fn primitive(&self, p: &Primitive, path: &SchemaPath) -> Result<Value> {
        let mut out = Map::new();
        let mut intent = Intent::default();
        let (ty, logical, substituted) = match p.scalar {
            Scalar::Null => ("null", None, None),
            Scalar::Boolean => ("boolean", None, None),
            Scalar::Int32 => ("int", None, None),
            Scalar::Int64 => ("long", None, None),
            Scalar::Float32 => ("float", None, None),
            Scalar::Float64 => ("double", None, None),
            Scalar::String => ("string", None, None),
            Scalar::Bytes => ("bytes", None, None),
            Scalar::Decimal { .. } => ("bytes", Some("decimal".to_string()), None),
            Scalar::Date => ("int", Some("date".to_string()), None),
            Scalar::Time { precision: TimePrecision::Millis } => ("int", Some("time-millis".to_string()), None),
            Scalar::Time { precision: TimePrecision::Micros } => ("long", Some("time-micros".to_string()), None),
            Scalar::Timestamp { precision, local } => {
                let unit = match precision {
                    TimePrecision::Millis => "millis",
                    TimePrecision::Micros => "micros",
                };
                let prefix = if local { "local-" } else { "" };
                ("long", Some(format!("{prefix}timestamp-{unit}")), None)
            }
            Scalar::Uuid => ("string", Some("uuid".to_string()), None),
            Scalar::Duration => ("long", None, Some("duration")),
            Scalar::Any => ("string", None, Some("any value")),
        };
        out.insert("type".into(), Value::from(ty));
        if let Some(logical) = logical {
            out.insert("logicalType".into(), Value::from(logical));
        }
        if let Scalar::Decimal { precision, scale } = p.scalar {
            out.insert("precision".into(), Value::from(precision));
            out.insert("scale".into(), Value::from(scale));
        }
        if let Some(construct) = substituted {
            meta::substitute(self.options, Dialect::Avro, path, construct)?;
            intent.scalar = Some(p.scalar);
        }
        intent.format = p.format.clone();
        intent.unit = p.unit.clone();
        intent.currency = p.currency.clone();
        intent.constraints = p.constraints.clone();

        if out.len() == 1 && intent.is_empty() {
            return Ok(Value::from(ty));
        }
        attach(&mut out, intent);
        Ok(Value::Object(out))
    }
}

fn collect_selectors(node: &TypeNode, out: &mut HashSet<(QualifiedName, String)>) {
    if let TypeNode::Choice(c) = node {
        let discriminator = c.resolution.as_ref().and_then(|r| r.discriminator.as_ref());
        if let Some(disc) = discriminator {
            for v in &c.variants {
                if let Some(name) = v.node.as_reference() {
                    out.insert((name.clone(), disc.field.clone()));
                }
            }
        }
    }
    for child in node.children() {
        collect_selectors(child, out);
    }
}

fn envelope_columns(root: &QualifiedName) -> Vec<Value> {
    let types = [
        json!("string"),
        json!("string"),
        json!("string"),
        json!({ "type": "long", "logicalType": "timestamp-millis" }),
        json!(["null", "string"]),
    ];
    ENVELOPE_COLUMNS
        .iter()
        .zip(types)
        .map(|(name, ty)| {
            let mut column = Map::new();
            column.insert("name".into(), Value::from(*name));
            let nullable = ty.is_array();
            column.insert("type".into(), ty);
            if *name == "___type" {
                column.insert("default".into(), Value::from(root.full()));
            } else if nullable {
                column.insert("default".into(), Value::Null);
            }
            column.insert(AVRO_KEY.into(), json!({ "envelope": true }));
            Value::Object(column)
        })
        .collect()
}

fn extend<'b>(out: &mut Map<String, Value>, extensions: impl Iterator<Item = (&'b String, &'b Literal)>) {
    for (key, value) in extensions {
        if RESERVED.contains(&key.as_str()) {
            tracing::warn!(key, "extension key collides with an Avro attribute, dropped");
            continue;
        }
        out.insert(key.clone(), value.to_json());
    }
}

fn attach(out: &mut Map<String, Value>, intent: Intent) {
    if !intent.is_empty() {
        out.insert(AVRO_KEY.into(), intent.to_value());
    }
}
