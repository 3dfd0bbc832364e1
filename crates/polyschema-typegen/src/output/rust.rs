//! Rust output: serde types backed by `polyschema_runtime`.
//!
//! Each top-level named type gets a module file; `mod.rs` declares them,
//! re-exports every type and embeds the canonical IR in a `SchemaHandle`.
//! Unions serialize untagged and deserialize through the runtime's
//! `dispatch`, so variant selection follows the schema's resolution.

use crate::error::Result;
use crate::model::{Decl, Module, Union, Unit, unique};
use crate::template::Template;
use crate::traits::{Backend, GenerateOptions, GeneratedFile};
use polyschema_core::{
    EnumType, Field, Literal, NamedType, RecordType, ResolvedSchema, Scalar, TypeNode, pascal_case,
    snake_case,
};
use std::collections::HashSet;

const DEFAULT_RUNTIME: &str = "polyschema_runtime";

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return", "self",
    "Self", "static", "struct", "super", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

const FILE_HEADER: Template = Template::new(
    "rust file header",
    "//! `{{ type_name }}`\n//!\n//! Generated by polyschema. Do not edit.\n\n#[allow(unused_imports)]\nuse super::*;\n",
);

const GENERATED_IMPL: Template = Template::new(
    "rust generated impl",
    r#"
impl {{ rt }}::Generated for {{ ident }} {
    const TYPE_NAME: &'static str = "{{ type_name }}";

    fn schema() -> {{ rt }}::Result<&'static {{ rt }}::ResolvedSchema> {
        super::SCHEMA.get()
    }

    fn is_json_match(value: &{{ rt }}::serde_json::Value) -> bool {
        super::SCHEMA
            .get()
            .is_ok_and(|schema| {{ rt }}::is_match(schema, Self::TYPE_NAME, value))
    }
}
"#,
);

const UNION_DESERIALIZE: Template = Template::new(
    "rust union deserialize",
    r#"
impl<'de> {{ rt }}::serde::Deserialize<'de> for {{ ident }} {
    fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
    where
        D: {{ rt }}::serde::Deserializer<'de>,
    {
        use {{ rt }}::serde::de::Error;
        let value = <{{ rt }}::serde_json::Value as {{ rt }}::serde::Deserialize>::deserialize(deserializer)?;
        let schema = super::SCHEMA.get().map_err(D::Error::custom)?;
        let index = {{ rt }}::dispatch(schema, "{{ owner }}", &[{{ path }}], &value).map_err(D::Error::custom)?;
        match index {
{{ arms }}            other => Err(D::Error::custom(format!("variant {other} of {{ ident }} has no payload type"))),
        }
    }
}
"#,
);

const INDEX: Template = Template::new(
    "rust index",
    r#"//! Types generated by polyschema{{ root }}.
//!
//! Generated by polyschema. Do not edit.

{{ modules }}
/// Canonical IR of every type in this module.
pub(crate) static SCHEMA: {{ rt }}::SchemaHandle = {{ rt }}::SchemaHandle::new({{ document }});
{{ tests }}"#,
);

const TESTS: Template = Template::new(
    "rust tests",
    r#"
#[cfg(test)]
mod tests {
    use super::*;
    use {{ rt }}::{ContentType, Generated, Synthesizer};

    fn round_trip<T: Generated + PartialEq + std::fmt::Debug>(seed: u64) {
        let schema = T::schema().expect("embedded schema");
        let values = Synthesizer::new(seed)
            .instances(schema, T::TYPE_NAME, 8)
            .expect("synthesized instances");
        for value in values {
            assert!(T::is_json_match(&value), "{value}");
            let instance: T = {{ rt }}::serde_json::from_value(value).expect("typed instance");
            for content_type in ContentType::ALL {
                let content_type = content_type.to_string();
                let bytes = instance.to_byte_array(&content_type).expect("encode");
                let back = T::from_data(&bytes, &content_type).expect("decode");
                assert_eq!(back, instance, "{content_type}");
            }
        }
    }
{{ cases }}}
"#,
);

/// Rust backend.
pub struct RustBackend;

impl Backend for RustBackend {
    fn name(&self) -> &'static str {
        "rust"
    }

    fn language(&self) -> &'static str {
        "rust"
    }

    fn extension(&self) -> &'static str {
        "rs"
    }

    fn generate(&self, schema: &ResolvedSchema, options: &GenerateOptions) -> Result<Vec<GeneratedFile>> {
        let module = Module::new(schema);
        let writer = RustWriter {
            module: &module,
            rt: options.runtime.as_deref().unwrap_or(DEFAULT_RUNTIME),
        };
        let mut files = Vec::new();
        let mut stems = HashSet::new();
        let mut modules = String::new();
        let mut cases = String::new();
        for unit in &module.units {
            let stem = module_name(&unit.ident, &mut stems);
            files.push(GeneratedFile::new(format!("{stem}.rs"), writer.unit(unit)?));
            let exports: Vec<&str> = unit.decls.iter().map(Decl::ident).collect();
            modules.push_str(&format!("pub mod {stem};\npub use {stem}::{{{}}};\n", exports.join(", ")));
            for decl in &unit.decls {
                if is_generated(decl) {
                    cases.push_str(&format!(
                        "\n    #[test]\n    fn {}_round_trips() {{\n        round_trip::<{}>({});\n    }}\n",
                        snake_case(decl.ident()),
                        decl.ident(),
                        options.seed
                    ));
                }
            }
        }
        let tests = if options.tests {
            TESTS.render(&[("rt", writer.rt), ("cases", &cases)])?
        } else {
            String::new()
        };
        let root = schema
            .root()
            .map(|def| format!(" for `{}`", def.name.full()))
            .unwrap_or_default();
        let document = raw_string(&serde_json::to_string_pretty(schema.schema())?);
        files.push(GeneratedFile::new(
            "mod.rs",
            INDEX.render(&[
                ("root", &root),
                ("modules", &modules),
                ("rt", writer.rt),
                ("document", &document),
                ("tests", &tests),
            ])?,
        ));
        tracing::debug!(backend = "rust", files = files.len(), "generated");
        Ok(files)
    }
}

struct RustWriter<'a, 's> {
    module: &'a Module<'s>,
    rt: &'a str,
}

impl RustWriter<'_, '_> {
    fn unit(&self, unit: &Unit<'_>) -> Result<String> {
        let mut out = FILE_HEADER.render(&[("type_name", &unit.def.name.full())])?;
        for decl in &unit.decls {
            out.push('\n');
            match decl {
                Decl::Record { ident, def, record } => self.record(&mut out, ident, def, record)?,
                Decl::Enum { ident, def, symbols } => self.enumeration(&mut out, ident, def, symbols)?,
                Decl::Union(union) => self.union(&mut out, union)?,
                Decl::Alias { ident, def } => {
                    docs(&mut out, def.docs.as_deref(), "");
                    out.push_str(&format!("pub type {ident} = {};\n", self.type_expr(&def.node, false)));
                }
            }
        }
        Ok(out)
    }

    fn record(&self, out: &mut String, ident: &str, def: &NamedType, record: &RecordType) -> Result<()> {
        let rt = self.rt;
        docs(out, def.docs.as_deref(), "");
        out.push_str(&format!(
            "#[derive(Debug, Clone, PartialEq, {rt}::serde::Serialize, {rt}::serde::Deserialize)]\n"
        ));
        let closed = if record.open { "" } else { ", deny_unknown_fields" };
        out.push_str(&format!("#[serde(crate = \"{rt}::serde\"{closed})]\npub struct {ident} {{\n"));

        let names = field_idents(record);
        let mut params = Vec::new();
        let mut defaults = Vec::new();
        for (field, name) in record.fields.iter().zip(&names) {
            docs(out, field.docs.as_deref(), "    ");
            if let Some(hint) = collection_hint(&field.ty) {
                out.push_str(&format!("    /// {hint}\n"));
            }
            let ty = self.field_type(field);
            let mut attrs = Vec::new();
            if *name != field.name {
                attrs.push(format!("rename = {:?}", field.name));
            }
            if !field.required {
                attrs.push("default".to_string());
                attrs.push("skip_serializing_if = \"Option::is_none\"".to_string());
            } else if let Some(expr) = field.default.as_ref().and_then(|d| self.default_expr(&field.ty, d)) {
                let function = format!("default_{name}");
                attrs.push(format!("default = \"{ident}::{function}\""));
                defaults.push((function, ty.clone(), expr));
            }
            if is_direct_bytes(field) {
                attrs.push(format!("with = \"{rt}::base64_bytes\""));
            } else if field.required && is_nullable(&field.ty) {
                attrs.push(format!("deserialize_with = \"{rt}::nullable::deserialize\""));
            }
            if !attrs.is_empty() {
                out.push_str(&format!("    #[serde({})]\n", attrs.join(", ")));
            }
            out.push_str(&format!("    pub {name}: {ty},\n"));
            params.push((name, ty));
        }
        if record.open {
            out.push_str("    /// Members beyond the declared fields.\n    #[serde(flatten)]\n");
            out.push_str(&format!(
                "    pub extra: std::collections::BTreeMap<String, {rt}::serde_json::Value>,\n"
            ));
        }
        out.push_str("}\n\n");

        out.push_str(&format!("impl {ident} {{\n"));
        if params.len() > 7 {
            out.push_str("    #[allow(clippy::too_many_arguments)]\n");
        }
        let args: Vec<String> = params.iter().map(|(name, ty)| format!("{name}: {ty}")).collect();
        let mut members: Vec<String> = params.iter().map(|(name, _)| name.to_string()).collect();
        if record.open {
            members.push("extra: Default::default()".to_string());
        }
        out.push_str(&format!(
            "    pub fn new({}) -> Self {{\n        Self {{ {} }}\n    }}\n",
            args.join(", "),
            members.join(", ")
        ));
        for (function, ty, expr) in defaults {
            out.push_str(&format!("\n    fn {function}() -> {ty} {{\n        {expr}\n    }}\n"));
        }
        out.push_str("}\n");
        self.generated_impl(out, ident, def)
    }

    fn enumeration(&self, out: &mut String, ident: &str, def: &NamedType, symbols: &EnumType) -> Result<()> {
        let rt = self.rt;
        docs(out, def.docs.as_deref(), "");
        out.push_str(&format!(
            "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, {rt}::serde::Serialize, {rt}::serde::Deserialize)]\n"
        ));
        out.push_str(&format!("#[serde(crate = \"{rt}::serde\")]\npub enum {ident} {{\n"));
        for (symbol, variant) in symbols.symbols.iter().zip(symbol_idents(symbols)) {
            out.push_str(&format!("    #[serde(rename = {symbol:?})]\n    {variant},\n"));
        }
        out.push_str("}\n");
        self.generated_impl(out, ident, def)
    }

    fn union(&self, out: &mut String, union: &Union<'_>) -> Result<()> {
        let rt = self.rt;
        let ident = &union.ident;
        docs(out, union.def.and_then(|d| d.docs.as_deref()), "");
        out.push_str(&format!("#[derive(Debug, Clone, PartialEq, {rt}::serde::Serialize)]\n"));
        out.push_str(&format!("#[serde(crate = \"{rt}::serde\", untagged)]\npub enum {ident} {{\n"));
        let mut used = HashSet::from(["Self".to_string()]);
        let mut arms = String::new();
        for (index, variant) in union.choice.variants.iter().enumerate() {
            if variant.node.is_null() {
                let name = unique("Null".to_string(), &mut used);
                out.push_str(&format!("    {name},\n"));
                arms.push_str(&format!("            {index} => Ok(Self::{name}),\n"));
                continue;
            }
            let mut name = pascal_case(&variant.name);
            if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
                name.insert(0, 'V');
            }
            let name = unique(name, &mut used);
            out.push_str(&format!("    {name}({}),\n", self.type_expr(&variant.node, true)));
            arms.push_str(&format!(
                "            {index} => {rt}::serde_json::from_value(value).map(Self::{name}).map_err(D::Error::custom),\n"
            ));
        }
        out.push_str("}\n");
        let path: Vec<String> = union.path.iter().map(|segment| format!("{segment:?}")).collect();
        out.push_str(&UNION_DESERIALIZE.render(&[
            ("rt", rt),
            ("ident", ident),
            ("owner", &union.owner),
            ("path", &path.join(", ")),
            ("arms", &arms),
        ])?);
        if let Some(def) = union.def {
            self.generated_impl(out, ident, def)?;
        }
        Ok(())
    }

    fn generated_impl(&self, out: &mut String, ident: &str, def: &NamedType) -> Result<()> {
        out.push_str(&GENERATED_IMPL.render(&[
            ("rt", self.rt),
            ("ident", ident),
            ("type_name", &def.name.full()),
        ])?);
        Ok(())
    }

    fn field_type(&self, field: &Field) -> String {
        if is_direct_bytes(field) {
            return "Vec<u8>".to_string();
        }
        let ty = self.type_expr(&field.ty, true);
        if field.required || is_nullable(&field.ty) {
            ty
        } else {
            format!("Option<{ty}>")
        }
    }

    /// `direct` is false below a collection, where recursion needs no box.
    fn type_expr(&self, node: &TypeNode, direct: bool) -> String {
        let rt = self.rt;
        match node {
            TypeNode::Primitive(p) => self.scalar(&p.scalar),
            TypeNode::Array(c) | TypeNode::Set(c) => format!("Vec<{}>", self.type_expr(&c.items, false)),
            TypeNode::Map(m) => {
                let key = match &*m.keys {
                    TypeNode::Primitive(p) if p.scalar == Scalar::Int32 => "i32",
                    TypeNode::Primitive(p) if p.scalar == Scalar::Int64 => "i64",
                    _ => "String",
                };
                format!("std::collections::BTreeMap<{key}, {}>", self.type_expr(&m.values, false))
            }
            TypeNode::Choice(c) => match (c.nullable_inner(), self.module.union_ident(c)) {
                (Some(inner), _) => format!("Option<{}>", self.type_expr(inner, direct)),
                (None, Some(ident)) => ident.to_string(),
                (None, None) => format!("{rt}::serde_json::Value"),
            },
            TypeNode::Reference { name } => {
                let ident = self.module.ident(name);
                if direct && self.module.is_recursive(name) {
                    format!("Box<{ident}>")
                } else {
                    ident.to_string()
                }
            }
            // Hoisting names every record and enum.
            TypeNode::Record(_) | TypeNode::Enum(_) => format!("{rt}::serde_json::Value"),
        }
    }

    fn scalar(&self, scalar: &Scalar) -> String {
        let rt = self.rt;
        match scalar {
            Scalar::Null => "()".to_string(),
            Scalar::Boolean => "bool".to_string(),
            Scalar::Int32 => "i32".to_string(),
            Scalar::Int64 | Scalar::Duration => "i64".to_string(),
            Scalar::Float32 => "f32".to_string(),
            Scalar::Float64 => "f64".to_string(),
            Scalar::Decimal { .. } | Scalar::String | Scalar::Bytes | Scalar::Uuid => "String".to_string(),
            Scalar::Date => format!("{rt}::chrono::NaiveDate"),
            Scalar::Time { .. } => format!("{rt}::chrono::NaiveTime"),
            Scalar::Timestamp { local: true, .. } => format!("{rt}::chrono::NaiveDateTime"),
            Scalar::Timestamp { local: false, .. } => format!("{rt}::chrono::DateTime<{rt}::chrono::Utc>"),
            Scalar::Any => format!("{rt}::serde_json::Value"),
        }
    }

    /// Rust expression for a field default, when the literal is simple.
    fn default_expr(&self, node: &TypeNode, literal: &Literal) -> Option<String> {
        if let TypeNode::Reference { name } = node {
            let TypeNode::Enum(symbols) = &self.module.get(name)?.node else {
                return None;
            };
            let symbol = literal.as_str()?;
            let index = symbols.symbols.iter().position(|s| s == symbol)?;
            let variant = symbol_idents(symbols).swap_remove(index);
            return Some(format!("{}::{variant}", self.module.ident(name)));
        }
        let TypeNode::Primitive(p) = node else {
            return None;
        };
        match (&p.scalar, literal) {
            (Scalar::Boolean, Literal::Bool(b)) => Some(b.to_string()),
            (Scalar::Int32 | Scalar::Int64 | Scalar::Duration, Literal::Int(n)) => Some(n.to_string()),
            (Scalar::Float32 | Scalar::Float64, Literal::Int(n)) => Some(format!("{n}.0")),
            (Scalar::Float32 | Scalar::Float64, Literal::Float(f)) if f.0.is_finite() => Some(format!("{:?}", f.0)),
            (Scalar::String | Scalar::Decimal { .. } | Scalar::Uuid, Literal::String(s)) => {
                Some(format!("String::from({s:?})"))
            }
            _ => None,
        }
    }
}

fn is_generated(decl: &Decl<'_>) -> bool {
    match decl {
        Decl::Record { .. } => true,
        Decl::Enum { symbols, .. } => !symbols.symbols.is_empty(),
        Decl::Union(union) => union.def.is_some(),
        Decl::Alias { .. } => false,
    }
}

/// `null | X`, written as `Option<X>`.
fn is_nullable(node: &TypeNode) -> bool {
    matches!(node, TypeNode::Choice(c) if c.nullable_inner().is_some())
}

fn is_direct_bytes(field: &Field) -> bool {
    field.required && matches!(&field.ty, TypeNode::Primitive(p) if p.scalar == Scalar::Bytes && p.constraints.constant.is_none())
}

fn field_idents(record: &RecordType) -> Vec<String> {
    let mut used = HashSet::new();
    if record.open {
        used.insert("extra".to_string());
    }
    record
        .fields
        .iter()
        .map(|field| {
            let mut ident = snake_case(&field.name);
            if !ident.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
                ident.insert_str(0, "f_");
            }
            if KEYWORDS.contains(&ident.as_str()) {
                ident.push('_');
            }
            unique(ident, &mut used)
        })
        .collect()
}

fn symbol_idents(symbols: &EnumType) -> Vec<String> {
    let mut used = HashSet::from(["Self".to_string()]);
    symbols
        .symbols
        .iter()
        .map(|symbol| {
            let mut ident = pascal_case(symbol);
            if !ident.starts_with(|c: char| c.is_ascii_alphabetic()) {
                ident.insert(0, 'V');
            }
            unique(ident, &mut used)
        })
        .collect()
}

fn module_name(ident: &str, used: &mut HashSet<String>) -> String {
    let mut stem = snake_case(ident);
    if KEYWORDS.contains(&stem.as_str()) || stem == "tests" {
        stem.push('_');
    }
    unique(stem, used)
}

/// Item count and uniqueness notes for collection fields.
fn collection_hint(node: &TypeNode) -> Option<String> {
    let (collection, unique) = match node {
        TypeNode::Array(c) => (c, false),
        TypeNode::Set(c) => (c, true),
        TypeNode::Choice(c) => return c.nullable_inner().and_then(collection_hint),
        _ => return None,
    };
    let mut parts = Vec::new();
    if let Some(min) = collection.min_items {
        parts.push(format!("min {min}"));
    }
    if let Some(max) = collection.max_items {
        parts.push(format!("max {max}"));
    }
    if unique {
        parts.push("unique".to_string());
    }
    (!parts.is_empty()).then(|| format!("Items: {}.", parts.join(", ")))
}

fn docs(out: &mut String, docs: Option<&str>, indent: &str) {
    for line in docs.into_iter().flat_map(str::lines) {
        let line = line.trim_end();
        if line.is_empty() {
            out.push_str(&format!("{indent}///\n"));
        } else {
            out.push_str(&format!("{indent}/// {line}\n"));
        }
    }
}

/// A raw string literal with enough `#`s for `text`.
fn raw_string(text: &str) -> String {
    let mut hashes = "#".to_string();
    while text.contains(&format!("\"{hashes}")) {
        hashes.push('#');
    }
    format!("r{hashes}\"{text}\"{hashes}")
}
