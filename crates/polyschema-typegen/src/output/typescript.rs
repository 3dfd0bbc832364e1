//! TypeScript output: classes for records, string-literal unions for
//! enums, and dispatch functions for unions.
//!
//! The emitted code depends on a runtime package that is not part of this
//! workspace: `@polyschema/runtime` unless [`GenerateOptions::runtime`]
//! names another. It must export the TypeScript counterpart of
//! `polyschema-runtime`:
//!
//! ```text
//! encode(schema: unknown, typeName: string, value: unknown, contentType: string): Uint8Array
//! decode(schema: unknown, typeName: string, data: Uint8Array, contentType: string): unknown
//! dispatch(schema: unknown, owner: string, path: string[], value: unknown): number
//! isMatch(schema: unknown, typeName: string, value: unknown): boolean
//! synthesize(schema: unknown, typeName: string, count: number, seed: number): unknown[]
//! CONTENT_TYPES: readonly string[]
//! class DecodeError extends Error
//! ```
//!
//! Only the shape of the output is tested here; the Rust backend's output
//! is the one compiled and round-tripped (see `polyschema-generated`).

use crate::error::Result;
use crate::model::{Decl, Module, Union, Unit};
use crate::template::Template;
use crate::traits::{Backend, GenerateOptions, GeneratedFile};
use polyschema_core::{
    EnumType, Literal, NamedType, RecordType, ResolvedSchema, Scalar, TypeNode, camel_case,
};
use std::collections::{BTreeMap, BTreeSet};

const DEFAULT_RUNTIME: &str = "@polyschema/runtime";

const CLASS_METHODS: Template = Template::new(
    "typescript class methods",
    r#"
  toObject(): unknown {
    return JSON.parse(JSON.stringify(this));
  }

  toByteArray(contentType: string): Uint8Array {
    return encode(SCHEMA, {{ ident }}.typeName, this.toObject(), contentType);
  }

  static fromData(data: Uint8Array, contentType: string): {{ ident }} {
    return {{ ident }}.fromJson(decode(SCHEMA, {{ ident }}.typeName, data, contentType));
  }

  static isJsonMatch(value: unknown): boolean {
    return isMatch(SCHEMA, {{ ident }}.typeName, value);
  }

  static fromJson(value: unknown): {{ ident }} {
    if (typeof value !== "object" || value === null || Array.isArray(value)) {
      throw new DecodeError(`${ {{ ident }}.typeName }: expected an object`);
    }
    const o = value as Record<string, unknown>;
    return new {{ ident }}({
{{ members }}    });
  }
}
"#,
);

const CODEC: Template = Template::new(
    "typescript codec",
    r#"
export const {{ ident }}Codec = {
  typeName: "{{ type_name }}",
  toByteArray: (value: {{ ident }}, contentType: string): Uint8Array =>
    encode(SCHEMA, "{{ type_name }}", value, contentType),
  fromData: (data: Uint8Array, contentType: string): {{ ident }} =>
    {{ from_json }}(decode(SCHEMA, "{{ type_name }}", data, contentType)),
  isJsonMatch: (value: unknown): boolean => isMatch(SCHEMA, "{{ type_name }}", value),
};
"#,
);

const INDEX: Template = Template::new(
    "typescript index",
    r#"// Types generated by polyschema{{ root }}.
//
// Generated by polyschema. Do not edit.

{{ exports }}
/** Canonical IR of every type in this module. */
export const SCHEMA = {{ document }};
"#,
);

const TESTS: Template = Template::new(
    "typescript tests",
    r#"// Generated by polyschema. Do not edit.

import { describe, expect, it } from "vitest";
import { CONTENT_TYPES, synthesize } from "{{ runtime }}";
import * as types from "./index";

function roundTrip<T>(
  typeName: string,
  fromJson: (value: unknown) => T,
  toBytes: (value: T, contentType: string) => Uint8Array,
  fromData: (data: Uint8Array, contentType: string) => T,
  isJsonMatch: (value: unknown) => boolean,
): void {
  for (const value of synthesize(types.SCHEMA, typeName, 8, {{ seed }})) {
    expect(isJsonMatch(value)).toBe(true);
    const instance = fromJson(value);
    for (const contentType of CONTENT_TYPES) {
      expect(fromData(toBytes(instance, contentType), contentType)).toEqual(instance);
    }
  }
}

describe("round trips", () => {
{{ cases }}});
"#,
);

/// TypeScript backend.
pub struct TypeScriptBackend;

impl Backend for TypeScriptBackend {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn language(&self) -> &'static str {
        "typescript"
    }

    fn extension(&self) -> &'static str {
        "ts"
    }

    fn generate(&self, schema: &ResolvedSchema, options: &GenerateOptions) -> Result<Vec<GeneratedFile>> {
        let module = Module::new(schema);
        let runtime = options.runtime.as_deref().unwrap_or(DEFAULT_RUNTIME);
        let writer = TsWriter { module: &module };
        let mut files = Vec::new();
        let mut exports = String::new();
        let mut cases = String::new();
        for unit in &module.units {
            files.push(GeneratedFile::new(format!("{}.ts", unit.ident), writer.unit(unit, runtime)?));
            exports.push_str(&format!("export * from \"./{}\";\n", unit.ident));
            for decl in &unit.decls {
                if let Some(case) = test_case(decl) {
                    cases.push_str(&case);
                }
            }
        }
        let root = schema
            .root()
            .map(|def| format!(" for `{}`", def.name.full()))
            .unwrap_or_default();
        let document = serde_json::to_string_pretty(schema.schema())?;
        files.push(GeneratedFile::new(
            "index.ts",
            INDEX.render(&[("root", &root), ("exports", &exports), ("document", &document)])?,
        ));
        if options.tests {
            let seed = options.seed.to_string();
            files.push(GeneratedFile::new(
                "index.test.ts",
                TESTS.render(&[("runtime", runtime), ("seed", &seed), ("cases", &cases)])?,
            ));
        }
        tracing::debug!(backend = "typescript", files = files.len(), "generated");
        Ok(files)
    }
}

/// Symbols a unit imports from sibling files, keyed by file stem.
type Imports = BTreeMap<String, BTreeSet<String>>;

struct TsWriter<'a, 's> {
    module: &'a Module<'s>,
}

impl TsWriter<'_, '_> {
    fn unit(&self, unit: &Unit<'_>, runtime: &str) -> Result<String> {
        let mut imports = Imports::new();
        let mut body = String::new();
        for decl in &unit.decls {
            body.push('\n');
            match decl {
                Decl::Record { ident, def, record } => {
                    self.record(&mut body, &mut imports, ident, def, record)?
                }
                Decl::Enum { ident, def, symbols } => self.enumeration(&mut body, ident, def, symbols)?,
                Decl::Union(union) => self.union(&mut body, &mut imports, union)?,
                Decl::Alias { ident, def } => {
                    docs(&mut body, def.docs.as_deref(), "");
                    let ty = self.type_expr(&mut imports, &def.node);
                    let convert = self.convert(&mut imports, &def.node, "value");
                    body.push_str(&format!(
                        "export type {ident} = {ty};\n\nexport function {}(value: unknown): {ident} {{\n  return {convert};\n}}\n",
                        from_json_fn(ident)
                    ));
                }
            }
        }
        imports.remove(&unit.ident);

        let mut out = format!(
            "// `{}`\n//\n// Generated by polyschema. Do not edit.\n\nimport {{ DecodeError, decode, dispatch, encode, isMatch }} from \"{runtime}\";\nimport {{ SCHEMA }} from \"./index\";\n",
            unit.def.name.full()
        );
        for (stem, symbols) in &imports {
            let symbols: Vec<&str> = symbols.iter().map(String::as_str).collect();
            out.push_str(&format!("import {{ {} }} from \"./{stem}\";\n", symbols.join(", ")));
        }
        out.push_str(&body);
        Ok(out)
    }

    fn record(
        &self,
        out: &mut String,
        imports: &mut Imports,
        ident: &str,
        def: &NamedType,
        record: &RecordType,
    ) -> Result<()> {
        docs(out, def.docs.as_deref(), "");
        out.push_str(&format!(
            "export class {ident} {{\n  static readonly typeName = \"{}\";\n\n",
            def.name.full()
        ));
        let mut init = Vec::new();
        let mut assignments = String::new();
        let mut members = String::new();
        for field in &record.fields {
            let key = property(&field.name);
            let ty = self.type_expr(imports, &field.ty);
            docs(out, field.docs.as_deref(), "  ");
            let default = field.default.as_ref().and_then(|d| default_expr(&field.ty, d));
            let optional = !field.required || default.is_some();
            if field.required {
                out.push_str(&format!("  {key}: {ty};\n"));
            } else {
                out.push_str(&format!("  {key}?: {ty};\n"));
            }
            init.push(format!("{key}{}: {ty}", if optional { "?" } else { "" }));
            let source = member("init", &field.name);
            match default {
                Some(default) => assignments.push_str(&format!(
                    "    {} = {source} ?? {default};\n",
                    member("this", &field.name)
                )),
                None => assignments.push_str(&format!("    {} = {source};\n", member("this", &field.name))),
            }
            let raw = member("o", &field.name);
            let convert = self.convert(imports, &field.ty, &raw);
            let value = if optional {
                format!("{raw} === undefined ? undefined : {convert}")
            } else {
                convert
            };
            members.push_str(&format!("      {key}: {value},\n"));
        }
        if record.open {
            out.push_str("  [member: string]: unknown;\n");
        }
        out.push_str(&format!(
            "\n  constructor(init: {{ {} }}) {{\n{assignments}  }}\n",
            init.join("; ")
        ));
        out.push_str(&CLASS_METHODS.render(&[("ident", ident), ("members", &members)])?);
        Ok(())
    }

    fn enumeration(&self, out: &mut String, ident: &str, def: &NamedType, symbols: &EnumType) -> Result<()> {
        let quoted: Vec<String> = symbols.symbols.iter().map(|s| json_string(s)).collect();
        docs(out, def.docs.as_deref(), "");
        out.push_str(&format!(
            "export const {ident}Symbols = [{}] as const;\nexport type {ident} = (typeof {ident}Symbols)[number];\n\n",
            quoted.join(", ")
        ));
        out.push_str(&format!(
            "export function parse{ident}(value: unknown): {ident} {{\n  if (typeof value === \"string\" && ({ident}Symbols as readonly string[]).includes(value)) {{\n    return value as {ident};\n  }}\n  throw new DecodeError(`{}: unknown symbol ${{JSON.stringify(value)}}`);\n}}\n",
            def.name.full()
        ));
        out.push_str(&CODEC.render(&[
            ("ident", ident),
            ("type_name", &def.name.full()),
            ("from_json", &format!("parse{ident}")),
        ])?);
        Ok(())
    }

    fn union(&self, out: &mut String, imports: &mut Imports, union: &Union<'_>) -> Result<()> {
        let ident = &union.ident;
        let mut members = Vec::new();
        let mut cases = String::new();
        for (index, variant) in union.choice.variants.iter().enumerate() {
            members.push(self.type_expr(imports, &variant.node));
            let convert = self.convert(imports, &variant.node, "value");
            cases.push_str(&format!("    case {index}:\n      return {convert};\n"));
        }
        let path: Vec<String> = union.path.iter().map(|s| json_string(s)).collect();
        docs(out, union.def.and_then(|d| d.docs.as_deref()), "");
        out.push_str(&format!("export type {ident} = {};\n\n", members.join(" | ")));
        out.push_str(&format!(
            "export function {}(value: unknown): {ident} {{\n  switch (dispatch(SCHEMA, {}, [{}], value)) {{\n{cases}    default:\n      throw new DecodeError(\"no variant of {ident} accepts the value\");\n  }}\n}}\n",
            from_json_fn(ident),
            json_string(&union.owner),
            path.join(", ")
        ));
        if let Some(def) = union.def {
            out.push_str(&CODEC.render(&[
                ("ident", ident),
                ("type_name", &def.name.full()),
                ("from_json", &from_json_fn(ident)),
            ])?);
        }
        Ok(())
    }

    fn type_expr(&self, imports: &mut Imports, node: &TypeNode) -> String {
        match node {
            TypeNode::Primitive(p) => scalar(&p.scalar).to_string(),
            TypeNode::Array(c) | TypeNode::Set(c) => {
                let items = self.type_expr(imports, &c.items);
                if items.contains(' ') { format!("Array<{items}>") } else { format!("{items}[]") }
            }
            TypeNode::Map(m) => format!("Record<string, {}>", self.type_expr(imports, &m.values)),
            TypeNode::Choice(c) => match (c.nullable_inner(), self.module.union_ident(c)) {
                (Some(inner), _) => format!("{} | null", self.type_expr(imports, inner)),
                (None, Some(ident)) => ident.to_string(),
                (None, None) => "unknown".to_string(),
            },
            TypeNode::Reference { name } => {
                let ident = self.module.ident(name).to_string();
                imports.entry(ident.clone()).or_default().insert(ident.clone());
                ident
            }
            TypeNode::Record(_) | TypeNode::Enum(_) => "unknown".to_string(),
        }
    }

    /// Expression turning the untyped JSON `expr` into the typed form.
    fn convert(&self, imports: &mut Imports, node: &TypeNode, expr: &str) -> String {
        if !self.needs_conversion(node) {
            return format!("{expr} as {}", self.type_expr(imports, node));
        }
        match node {
            TypeNode::Array(c) | TypeNode::Set(c) => {
                format!("({expr} as unknown[]).map((item) => {})", self.convert(imports, &c.items, "item"))
            }
            TypeNode::Map(m) => format!(
                "Object.fromEntries(Object.entries({expr} as Record<string, unknown>).map(([k, v]) => [k, {}]))",
                self.convert(imports, &m.values, "v")
            ),
            TypeNode::Choice(c) => match (c.nullable_inner(), self.module.union_ident(c)) {
                (Some(inner), _) => format!("{expr} == null ? null : {}", self.convert(imports, inner, expr)),
                (None, Some(ident)) => format!("{}({expr})", from_json_fn(ident)),
                (None, None) => format!("{expr} as unknown"),
            },
            TypeNode::Reference { name } => {
                let ident = self.module.ident(name).to_string();
                let function = match self.module.get(name).map(|d| &d.node) {
                    Some(TypeNode::Record(_)) => format!("{ident}.fromJson"),
                    Some(TypeNode::Enum(_)) => format!("parse{ident}"),
                    _ => from_json_fn(&ident),
                };
                let symbol = function.split('.').next().unwrap_or(&function).to_string();
                imports.entry(ident).or_default().insert(symbol);
                format!("{function}({expr})")
            }
            TypeNode::Primitive(_) | TypeNode::Record(_) | TypeNode::Enum(_) => {
                format!("{expr} as {}", self.type_expr(imports, node))
            }
        }
    }

    fn needs_conversion(&self, node: &TypeNode) -> bool {
        match node {
            TypeNode::Primitive(_) | TypeNode::Record(_) | TypeNode::Enum(_) => false,
            TypeNode::Array(c) | TypeNode::Set(c) => self.needs_conversion(&c.items),
            TypeNode::Map(m) => self.needs_conversion(&m.values),
            TypeNode::Choice(c) => match c.nullable_inner() {
                Some(inner) => self.needs_conversion(inner),
                None => self.module.union_ident(c).is_some(),
            },
            TypeNode::Reference { .. } => true,
        }
    }
}

fn test_case(decl: &Decl<'_>) -> Option<String> {
    let (def, args) = match decl {
        Decl::Record { ident, def, .. } => (
            def,
            format!(
                "types.{ident}.fromJson, (v, ct) => v.toByteArray(ct), types.{ident}.fromData, types.{ident}.isJsonMatch"
            ),
        ),
        Decl::Enum { ident, def, symbols } if !symbols.symbols.is_empty() => {
            (def, codec_args(&format!("parse{ident}"), ident))
        }
        Decl::Union(Union {
            ident, def: Some(def), ..
        }) => (def, codec_args(&from_json_fn(ident), ident)),
        _ => return None,
    };
    let type_name = json_string(&def.name.full());
    Some(format!("  it({type_name}, () => {{\n    roundTrip({type_name}, {args});\n  }});\n"))
}

fn codec_args(from_json: &str, ident: &str) -> String {
    format!(
        "types.{from_json}, types.{ident}Codec.toByteArray, types.{ident}Codec.fromData, types.{ident}Codec.isJsonMatch"
    )
}

fn scalar(scalar: &Scalar) -> &'static str {
    match scalar {
        Scalar::Null => "null",
        Scalar::Boolean => "boolean",
        Scalar::Int32 | Scalar::Int64 | Scalar::Float32 | Scalar::Float64 | Scalar::Duration => "number",
        Scalar::Decimal { .. }
        | Scalar::String
        | Scalar::Bytes
        | Scalar::Date
        | Scalar::Time { .. }
        | Scalar::Timestamp { .. }
        | Scalar::Uuid => "string",
        Scalar::Any => "unknown",
    }
}

fn default_expr(node: &TypeNode, literal: &Literal) -> Option<String> {
    match (node, literal) {
        (TypeNode::Primitive(_) | TypeNode::Reference { .. }, Literal::String(s)) => Some(json_string(s)),
        (TypeNode::Primitive(_), Literal::Bool(_) | Literal::Int(_)) => Some(literal.to_json().to_string()),
        (TypeNode::Primitive(_), Literal::Float(f)) if f.0.is_finite() => Some(literal.to_json().to_string()),
        _ => None,
    }
}

fn from_json_fn(ident: &str) -> String {
    format!("{}FromJson", camel_case(ident))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn property(name: &str) -> String {
    if is_identifier(name) { name.to_string() } else { json_string(name) }
}

fn member(object: &str, name: &str) -> String {
    if is_identifier(name) {
        format!("{object}.{name}")
    } else {
        format!("{object}[{}]", json_string(name))
    }
}

fn json_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

fn docs(out: &mut String, docs: Option<&str>, indent: &str) {
    let Some(docs) = docs.filter(|d| !d.trim().is_empty()) else {
        return;
    };
    out.push_str(&format!("{indent}/**\n"));
    for line in docs.lines() {
        out.push_str(&format!("{indent} * {}\n", line.trim_end()).replace(" * \n", " *\n"));
    }
    out.push_str(&format!("{indent} */\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_core::{ConversionContext, Dialect, Field, Namespace, Schema};

    #[test]
    fn odd_member_names_are_quoted() {
        assert_eq!(property("userId"), "userId");
        assert_eq!(property("user-id"), "\"user-id\"");
        assert_eq!(member("o", "user-id"), "o[\"user-id\"]");
        assert_eq!(member("o", "$ref"), "o.$ref");
    }

    #[test]
    fn enums_parse_or_throw() {
        let ns = Namespace::new("demo");
        let mut schema = Schema::new();
        schema.add(NamedType::string_enum(ns.qualify("Status"), &["open", "closed"]));
        schema.root = Some(ns.qualify("Status"));
        let resolved = polyschema_resolve::resolve(schema, &mut ConversionContext::new(Dialect::Ir)).unwrap();
        let files = TypeScriptBackend.generate(&resolved, &GenerateOptions::default()).unwrap();
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["Status.ts", "index.ts", "index.test.ts"]);
        insta::assert_snapshot!(files[0].contents, @r#"
        // `demo.Status`
        //
        // Generated by polyschema. Do not edit.

        import { DecodeError, decode, dispatch, encode, isMatch } from "@polyschema/runtime";
        import { SCHEMA } from "./index";

        export const StatusSymbols = ["open", "closed"] as const;
        export type Status = (typeof StatusSymbols)[number];

        export function parseStatus(value: unknown): Status {
          if (typeof value === "string" && (StatusSymbols as readonly string[]).includes(value)) {
            return value as Status;
          }
          throw new DecodeError(`demo.Status: unknown symbol ${JSON.stringify(value)}`);
        }

        export const StatusCodec = {
          typeName: "demo.Status",
          toByteArray: (value: Status, contentType: string): Uint8Array =>
            encode(SCHEMA, "demo.Status", value, contentType),
          fromData: (data: Uint8Array, contentType: string): Status =>
            parseStatus(decode(SCHEMA, "demo.Status", data, contentType)),
          isJsonMatch: (value: unknown): boolean => isMatch(SCHEMA, "demo.Status", value),
        };
        "#);
        assert!(files[2].contents.contains(
            "roundTrip(\"demo.Status\", types.parseStatus, types.StatusCodec.toByteArray, types.StatusCodec.fromData, types.StatusCodec.isJsonMatch);"
        ));
    }

    #[test]
    fn runtime_imports_stay_within_the_documented_exports() {
        const EXPORTS: &[&str] = &[
            "CONTENT_TYPES",
            "DecodeError",
            "decode",
            "dispatch",
            "encode",
            "isMatch",
            "synthesize",
        ];
        let ns = Namespace::new("demo");
        let mut schema = Schema::new();
        schema.add(NamedType::record(ns.qualify("Ticket"), vec![Field::required("id", TypeNode::string())]));
        schema.root = Some(ns.qualify("Ticket"));
        let resolved = polyschema_resolve::resolve(schema, &mut ConversionContext::new(Dialect::Ir)).unwrap();
        let files = TypeScriptBackend.generate(&resolved, &GenerateOptions::default()).unwrap();
        for file in &files {
            for line in file.contents.lines().filter(|l| l.ends_with("from \"@polyschema/runtime\";")) {
                let names = line
                    .trim_start_matches("import { ")
                    .split(" }")
                    .next()
                    .unwrap_or_default();
                for name in names.split(", ") {
                    assert!(EXPORTS.contains(&name), "{}: `{name}`", file.path);
                }
            }
        }
    }
}
