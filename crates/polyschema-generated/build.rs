//! Build script for polyschema-generated.
//!
//! Runs the Rust backend over each schema and inlines the unit files into
//! `mod.rs`, so the whole module can be `include!`d from `OUT_DIR`.

use polyschema_core::{ConversionContext, Dialect};
use polyschema_typegen::{Backend, GenerateOptions, GeneratedFile, RustBackend};
use std::path::{Path, PathBuf};

const SCHEMAS: &[(&str, Dialect, &str)] = &[
    ("value", Dialect::JsonSchema, "../polyschema-formats/tests/fixtures/value.schema.json"),
    ("order", Dialect::JsonSchema, "../polyschema-formats/tests/fixtures/order.schema.json"),
    ("drawing", Dialect::Avro, "../polyschema-formats/tests/fixtures/drawing.avsc"),
    ("reading", Dialect::JsonSchema, "schemas/reading.schema.json"),
];

fn main() {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo"));
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    println!("cargo:rerun-if-changed=build.rs");

    for &(module, dialect, source) in SCHEMAS {
        println!("cargo:rerun-if-changed={source}");
        let path = manifest_dir.join(source);
        let files = generate(&path, dialect).unwrap_or_else(|e| panic!("{}: {e}", path.display()));
        let target = out_dir.join(format!("{module}.rs"));
        std::fs::write(&target, assemble(&files)).unwrap_or_else(|e| panic!("{}: {e}", target.display()));
    }
}

fn generate(path: &Path, dialect: Dialect) -> Result<Vec<GeneratedFile>, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let importer = polyschema_formats::importer(dialect).ok_or("no importer for dialect")?;
    let schema = importer.import(&text, &mut ConversionContext::new(dialect).with_document_name(name))?;
    Ok(RustBackend.generate(&schema, &GenerateOptions::default())?)
}

/// `mod.rs` with every `pub mod x;` replaced by the body of `x.rs`.
/// An included file cannot open with inner doc comments, so `//!` lines
/// become plain comments.
fn assemble(files: &[GeneratedFile]) -> String {
    let index = files
        .iter()
        .find(|f| f.path == "mod.rs")
        .map_or("", |f| f.contents.as_str());
    let mut out = String::new();
    for line in index.lines() {
        let unit = line
            .strip_prefix("pub mod ")
            .and_then(|rest| rest.strip_suffix(';'))
            .and_then(|stem| files.iter().find(|f| f.path == format!("{stem}.rs")));
        match unit {
            Some(file) => {
                out.push_str(line.trim_end_matches(';'));
                out.push_str(" {\n");
                for inner in file.contents.lines() {
                    push_line(&mut out, inner);
                }
                out.push_str("}\n");
            }
            None => push_line(&mut out, line),
        }
    }
    out
}

fn push_line(out: &mut String, line: &str) {
    match line.strip_prefix("//!") {
        Some(rest) => {
            out.push_str("//");
            out.push_str(rest);
        }
        None => out.push_str(line),
    }
    out.push('\n');
}
