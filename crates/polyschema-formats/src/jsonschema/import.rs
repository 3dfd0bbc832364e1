//! JSON Schema to IR.

use crate::document_root_name;
use crate::meta::{Intent, JSON_SCHEMA_KEY};
use crate::traits::Importer;
use ordered_float::OrderedFloat;
use polyschema_core::{
    ChoiceType, Collection, ConversionContext, Dialect, EnumType, Error, ExtensionBag, Field,
    Literal, MapType, NamedType, Primitive, QualifiedName, RecordType, Result, Scalar,
    Schema, SchemaPath, TimePrecision, TypeNode, Variant, pascal_case,
};
use serde_json::{Map, Value};

pub struct JsonSchemaImporter;

impl Importer for JsonSchemaImporter {
    fn dialect(&self) -> Dialect {
        Dialect::JsonSchema
    }

    fn parse(&self, document: &str, ctx: &mut ConversionContext) -> Result<Schema> {
        let root: Value = serde_json::from_str(document)
            .map_err(|e| Error::schema(Dialect::JsonSchema, &SchemaPath::root(), e.to_string()))?;
        parse_json_schema(&root, ctx)
    }
}

/// Keywords understood by the importer; anything else lands in an
/// extension bag.
const KNOWN_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "$ref",
    "$defs",
    "definitions",
    "$comment",
    "title",
    "description",
    "type",
    "format",
    "contentEncoding",
    "properties",
    "required",
    "additionalProperties",
    "items",
    "uniqueItems",
    "minItems",
    "maxItems",
    "minimum",
    "maximum",
    "minLength",
    "maxLength",
    "pattern",
    "const",
    "enum",
    "default",
    "oneOf",
    "anyOf",
    "allOf",
    "discriminator",
    JSON_SCHEMA_KEY,
];

/// Parse a JSON Schema document into an unresolved IR schema.
pub fn parse_json_schema(input: &Value, ctx: &mut ConversionContext) -> Result<Schema> {
    if ctx.document_uri.is_none() {
        if let Some(id) = input.get("$id").and_then(Value::as_str) {
            ctx.document_uri = Some(id.to_string());
        }
    }
    let root = match input.get("$ref").and_then(Value::as_str) {
        Some(target) => Some(ref_name(target)),
        None if is_schema_body(input) => Some(
            Intent::read(input, JSON_SCHEMA_KEY)
                .and_then(|intent| intent.name)
                .unwrap_or_else(|| root_name(input, ctx)),
        ),
        None => None,
    };
    let mut parser = Parser {
        schema: Schema::new(),
        root: root.clone(),
    };

    for keyword in ["$defs", "definitions"] {
        if let Some(defs) = input.get(keyword).and_then(Value::as_object) {
            for (key, def) in defs {
                let name = QualifiedName::parse(key);
                let path = SchemaPath::root().join(keyword).join(key);
                let named = parser.named(name, def, &path)?;
                parser.schema.add(named);
            }
        }
    }

    if let Some(name) = root {
        if input.get("$ref").is_none() {
            let named = parser.named(name.clone(), input, &SchemaPath::root())?;
            parser.schema.add(named);
        }
        parser.schema.root = Some(name);
    }
    tracing::debug!(types = parser.schema.types.len(), "parsed json schema");
    Ok(parser.schema)
}

fn is_schema_body(value: &Value) -> bool {
    ["type", "properties", "oneOf", "anyOf", "allOf", "enum", "const", "items"]
        .iter()
        .any(|k| value.get(k).is_some())
}

fn root_name(input: &Value, ctx: &ConversionContext) -> QualifiedName {
    match input.get("title").and_then(Value::as_str) {
        Some(title) => QualifiedName::parse(&pascal_case(title)),
        None => document_root_name(ctx),
    }
}

/// `#/$defs/com.example.Order` → `com.example.Order`.
fn ref_name(target: &str) -> QualifiedName {
    let local = ["#/$defs/", "#/definitions/"]
        .iter()
        .find_map(|p| target.strip_prefix(p))
        .unwrap_or_else(|| target.rsplit(['/', '#']).next().unwrap_or(target));
    let local = local.replace("~1", "/").replace("~0", "~");
    let local = local.strip_suffix(".json").unwrap_or(&local);
    QualifiedName::parse(local)
}

fn extensions(object: &Map<String, Value>) -> ExtensionBag {
    let mut bag = ExtensionBag::new();
    for (key, value) in object {
        if !KNOWN_KEYWORDS.contains(&key.as_str()) {
            bag.insert(key.clone(), Literal::from(value));
        }
    }
    bag
}

struct Parser {
    schema: Schema,
    /// Target of `#`, the document's own root.
    root: Option<QualifiedName>,
}

impl Parser {
    fn target(&self, target: &str) -> QualifiedName {
        match (target, &self.root) {
            ("#" | "#/", Some(root)) => root.clone(),
            _ => ref_name(target),
        }
    }

    fn named(&mut self, name: QualifiedName, def: &Value, path: &SchemaPath) -> Result<NamedType> {
        let node = self.body(def, path)?;
        let intent = Intent::read(def, JSON_SCHEMA_KEY).unwrap_or_default();
        let mut named = NamedType::new(name, node);
        named.docs = def.get("description").and_then(Value::as_str).map(String::from);
        named.aliases = intent.aliases;
        if let Some(object) = def.as_object() {
            named.extensions = extensions(object);
        }
        Ok(named)
    }

    /// A nested schema: inline types carrying a recorded name become named
    /// types and are referenced.
    fn node(&mut self, value: &Value, path: &SchemaPath) -> Result<TypeNode> {
        if let Some(name) = Intent::read(value, JSON_SCHEMA_KEY).and_then(|i| i.name) {
            if !self.schema.contains(&name) {
                let named = self.named(name.clone(), value, path)?;
                self.schema.add(named);
            }
            return Ok(TypeNode::reference(name));
        }
        self.body(value, path)
    }

    fn body(&mut self, value: &Value, path: &SchemaPath) -> Result<TypeNode> {
        let object = match value {
            Value::Bool(true) => return Ok(TypeNode::primitive(Scalar::Any)),
            Value::Bool(false) => {
                return Err(Error::unsupported(Dialect::JsonSchema, path, "`false` schema"));
            }
            Value::Object(object) => object,
            _ => return Err(Error::schema(Dialect::JsonSchema, path, "expected a schema object")),
        };
        let intent = Intent::read(value, JSON_SCHEMA_KEY).unwrap_or_default();

        if let Some(target) = object.get("$ref").and_then(Value::as_str) {
            return Ok(TypeNode::reference(self.target(target)));
        }
        if let Some(variants) = object.get("oneOf").or_else(|| object.get("anyOf")) {
            return self.choice(object, variants, path);
        }
        if let Some(all_of) = object.get("allOf").and_then(Value::as_array) {
            if all_of.len() == 1 {
                return self.node(&all_of[0], &path.join("allOf").join(0));
            }
            return Err(Error::unsupported(Dialect::JsonSchema, path, "allOf composition"));
        }
        if let Some(values) = object.get("enum").and_then(Value::as_array) {
            if values.len() != 1 || intent.symbols.is_some() {
                let symbols: Option<Vec<String>> =
                    values.iter().map(|s| s.as_str().map(String::from)).collect();
                let Some(symbols) = symbols else {
                    return Err(Error::unsupported(Dialect::JsonSchema, path, "enum of non-string values"));
                };
                return Ok(TypeNode::Enum(EnumType {
                    symbols,
                    hint: title(object),
                }));
            }
        }

        match object.get("type") {
            Some(Value::Array(types)) => {
                let mut variants = Vec::with_capacity(types.len());
                for (i, ty) in types.iter().enumerate() {
                    let mut single = object.clone();
                    single.insert("type".into(), ty.clone());
                    variants.push(self.body(&Value::Object(single), &path.join("type").join(i))?);
                }
                Ok(TypeNode::choice(variants))
            }
            Some(Value::String(ty)) => match ty.as_str() {
                "object" => self.object(object, &intent, path),
                "array" => self.array(object, &intent, path),
                "string" | "integer" | "number" | "boolean" | "null" => {
                    Ok(TypeNode::Primitive(self.primitive(object, ty, &intent, path)?))
                }
                other => Err(Error::schema(Dialect::JsonSchema, path, format!("unknown type `{other}`"))),
            },
            Some(_) => Err(Error::schema(Dialect::JsonSchema, &path.join("type"), "expected a string or array")),
            None if object.contains_key("properties") || object.contains_key("additionalProperties") => {
                self.object(object, &intent, path)
            }
            None if object.contains_key("items") => self.array(object, &intent, path),
            None => {
                let constant = object.get("const").or_else(|| single_enum(object));
                let ty = match constant {
                    Some(Value::String(_)) => "string",
                    Some(Value::Bool(_)) => "boolean",
                    Some(Value::Number(n)) if n.is_i64() || n.is_u64() => "integer",
                    Some(Value::Number(_)) => "number",
                    Some(Value::Null) => "null",
                    _ => {
                        let mut p = Primitive::new(intent.scalar.unwrap_or(Scalar::Any));
                        p.format = intent.format.clone();
                        return Ok(TypeNode::Primitive(p));
                    }
                };
                Ok(TypeNode::Primitive(self.primitive(object, ty, &intent, path)?))
            }
        }
    }

    fn choice(&mut self, object: &Map<String, Value>, variants: &Value, path: &SchemaPath) -> Result<TypeNode> {
        let list = variants
            .as_array()
            .ok_or_else(|| Error::schema(Dialect::JsonSchema, path, "oneOf must be an array"))?;
        let mut choice = ChoiceType::default();
        for (i, v) in list.iter().enumerate() {
            let node = self.node(v, &path.join("oneOf").join(i))?;
            choice.variants.push(Variant::new(node));
        }
        if let Some(disc) = object.get("discriminator") {
            let selector = disc
                .get("propertyName")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::schema(Dialect::JsonSchema, &path.join("discriminator"), "missing propertyName"))?;
            choice.selector = Some(selector.to_string());
            if let Some(mapping) = disc.get("mapping").and_then(Value::as_object) {
                for (tag, target) in mapping {
                    let Some(target) = target.as_str().map(|t| self.target(t)) else {
                        continue;
                    };
                    let variant = choice
                        .variants
                        .iter_mut()
                        .find(|v| v.node.as_reference().is_some_and(|r| r.name == target.name));
                    if let Some(variant) = variant {
                        variant.tag = Some(tag.clone());
                    }
                }
            }
        }
        Ok(TypeNode::Choice(choice))
    }

    fn object(&mut self, object: &Map<String, Value>, intent: &Intent, path: &SchemaPath) -> Result<TypeNode> {
        let additional = object.get("additionalProperties");
        let properties = object.get("properties").and_then(Value::as_object);

        if properties.is_none() {
            if let Some(values @ Value::Object(_)) = additional {
                let values = self.node(values, &path.join("additionalProperties"))?;
                let keys = TypeNode::primitive(intent.keys.unwrap_or(Scalar::String));
                return Ok(TypeNode::Map(MapType {
                    keys: Box::new(keys),
                    values: Box::new(values),
                }));
            }
        }

        let required: Vec<&str> = object
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let mut record = RecordType {
            fields: Vec::new(),
            open: matches!(additional, Some(Value::Bool(true))),
            hint: title(object),
        };
        for (name, prop) in properties.into_iter().flatten() {
            let prop_path = path.join("properties").join(name);
            let ty = self.node(prop, &prop_path)?;
            let mut field = Field::required(name.clone(), ty);
            field.required = required.contains(&name.as_str());
            field.docs = prop.get("description").and_then(Value::as_str).map(String::from);
            field.default = prop.get("default").map(Literal::from);
            if let Some(prop) = prop.as_object() {
                field.extensions = extensions(prop);
            }
            record.fields.push(field);
        }
        Ok(TypeNode::Record(record))
    }

    fn array(&mut self, object: &Map<String, Value>, intent: &Intent, path: &SchemaPath) -> Result<TypeNode> {
        let items = match object.get("items") {
            Some(items) => self.node(items, &path.join("items"))?,
            None => TypeNode::primitive(Scalar::Any),
        };
        let collection = Collection {
            items: Box::new(items),
            min_items: object.get("minItems").and_then(Value::as_u64).or(intent.min_items),
            max_items: object.get("maxItems").and_then(Value::as_u64).or(intent.max_items),
        };
        let unique = object.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false);
        Ok(if unique || intent.set {
            TypeNode::Set(collection)
        } else {
            TypeNode::Array(collection)
        })
    }

    fn primitive(&mut self, object: &Map<String, Value>, ty: &str, intent: &Intent, path: &SchemaPath) -> Result<Primitive> {
        let format = object.get("format").and_then(Value::as_str);
        let base64 = object.get("contentEncoding").and_then(Value::as_str) == Some("base64");
        let (scalar, consumed) = match (ty, format) {
            ("null", _) => (Scalar::Null, false),
            ("boolean", _) => (Scalar::Boolean, false),
            ("integer", Some("int32")) => (Scalar::Int32, true),
            ("integer", Some("int64")) => (Scalar::Int64, true),
            ("integer", _) => (Scalar::Int64, false),
            ("number", Some("float")) => (Scalar::Float32, true),
            ("number", Some("double")) => (Scalar::Float64, true),
            ("number", _) => (Scalar::Float64, false),
            ("string", _) if base64 => (Scalar::Bytes, false),
            ("string", Some("date")) => (Scalar::Date, true),
            ("string", Some("time")) => (Scalar::Time { precision: TimePrecision::Millis }, true),
            ("string", Some("date-time")) => (
                Scalar::Timestamp {
                    precision: TimePrecision::Millis,
                    local: false,
                },
                true,
            ),
            ("string", Some("uuid")) => (Scalar::Uuid, true),
            ("string", _) => (Scalar::String, false),
            (other, _) => {
                return Err(Error::schema(Dialect::JsonSchema, path, format!("unknown type `{other}`")));
            }
        };
        let mut p = Primitive::new(intent.scalar.unwrap_or(scalar));
        p.format = match (&intent.format, consumed, format) {
            (Some(f), _, _) => Some(f.clone()),
            (None, false, Some(f)) if intent.scalar.is_none() => Some(f.to_string()),
            _ => None,
        };
        p.unit = intent.unit.clone();
        p.currency = intent.currency.clone();
        let c = &mut p.constraints;
        c.minimum = object.get("minimum").and_then(Value::as_f64).map(OrderedFloat);
        c.maximum = object.get("maximum").and_then(Value::as_f64).map(OrderedFloat);
        c.min_length = object.get("minLength").and_then(Value::as_u64);
        c.max_length = object.get("maxLength").and_then(Value::as_u64);
        c.pattern = object.get("pattern").and_then(Value::as_str).map(String::from);
        c.constant = object.get("const").or_else(|| single_enum(object)).map(Literal::from);
        Ok(p)
    }
}

fn title(object: &Map<String, Value>) -> Option<String> {
    object.get("title").and_then(Value::as_str).map(String::from)
}

fn single_enum(object: &Map<String, Value>) -> Option<&Value> {
    match object.get("enum").and_then(Value::as_array) {
        Some(values) if values.len() == 1 => values.first(),
        _ => None,
    }
}
