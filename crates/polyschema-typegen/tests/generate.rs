//! Generated sources for the `textValue | numberValue` fixture.

use polyschema_core::{ConversionContext, Dialect, ResolvedSchema};
use polyschema_typegen::{GenerateOptions, GeneratedFile, backends, get_backend};

fn cell() -> ResolvedSchema {
    let path = format!(
        "{}/../polyschema-formats/tests/fixtures/value.schema.json",
        env!("CARGO_MANIFEST_DIR")
    );
    let text = std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{path}: {e}"));
    let mut ctx = ConversionContext::new(Dialect::JsonSchema).with_document_name("value.schema.json");
    polyschema_formats::importer(Dialect::JsonSchema)
        .unwrap()
        .import(&text, &mut ctx)
        .unwrap()
}

fn generate(backend: &str, options: &GenerateOptions) -> Vec<GeneratedFile> {
    get_backend(backend).unwrap().generate(&cell(), options).unwrap()
}

fn contents<'f>(files: &'f [GeneratedFile], path: &str) -> &'f str {
    &files
        .iter()
        .find(|f| f.path == path)
        .unwrap_or_else(|| panic!("no {path}"))
        .contents
}

#[test]
fn one_file_per_type_plus_index() {
    let options = GenerateOptions::default();
    let rust: Vec<String> = generate("rust", &options).into_iter().map(|f| f.path).collect();
    assert_eq!(rust, ["cell.rs", "text_value.rs", "number_value.rs", "mod.rs"]);
    let ts: Vec<String> = generate("ts", &options).into_iter().map(|f| f.path).collect();
    assert_eq!(ts, ["Cell.ts", "TextValue.ts", "NumberValue.ts", "index.ts", "index.test.ts"]);
}

#[test]
fn rust_union_dispatches_through_the_runtime() {
    let files = generate("rust", &GenerateOptions::default());
    let cell = contents(&files, "cell.rs");
    assert!(cell.contains("    pub value: CellValue,\n"), "{cell}");
    assert!(cell.contains("pub enum CellValue {\n    TextValue(TextValue),\n    NumberValue(NumberValue),\n}"));
    assert!(cell.contains("#[serde(crate = \"polyschema_runtime::serde\", untagged)]"));
    assert!(cell.contains("polyschema_runtime::dispatch(schema, \"value.Cell\", &[\"value\"], &value)"));
    assert!(cell.contains(
        "            1 => polyschema_runtime::serde_json::from_value(value).map(Self::NumberValue).map_err(D::Error::custom),\n"
    ));

    let text = contents(&files, "text_value.rs");
    assert!(text.contains("    #[serde(rename = \"textValue\")]\n    pub text_value: String,\n"));
    assert!(text.contains("pub fn new(text_value: String) -> Self {\n        Self { text_value }\n    }"));

    let index = contents(&files, "mod.rs");
    assert!(index.contains("pub mod cell;\npub use cell::{Cell, CellValue};\n"));
    assert!(index.contains("pub(crate) static SCHEMA: polyschema_runtime::SchemaHandle = polyschema_runtime::SchemaHandle::new(r#\"{"));
    assert!(index.contains("fn cell_round_trips()"));
    assert!(!index.contains("fn cell_value_round_trips()"));
}

#[test]
fn typescript_union_switches_on_dispatch() {
    let files = generate("typescript", &GenerateOptions::default());
    let cell = contents(&files, "Cell.ts");
    assert!(cell.contains("import { NumberValue } from \"./NumberValue\";\nimport { TextValue } from \"./TextValue\";\n"));
    assert!(cell.contains("export type CellValue = TextValue | NumberValue;"));
    assert!(cell.contains("  switch (dispatch(SCHEMA, \"value.Cell\", [\"value\"], value)) {\n    case 0:\n      return TextValue.fromJson(value);\n"));
    assert!(cell.contains("      value: cellValueFromJson(o.value),\n"));

    let index = contents(&files, "index.ts");
    assert!(index.contains("export * from \"./Cell\";\nexport * from \"./TextValue\";\nexport * from \"./NumberValue\";\n"));
    let tests = contents(&files, "index.test.ts");
    assert!(tests.contains("  it(\"value.TextValue\", () => {"));
}

#[test]
fn runtime_path_and_tests_are_options() {
    let options = GenerateOptions {
        runtime: Some("crate::rt".to_string()),
        tests: false,
        seed: 9,
    };
    let files = generate("rust", &options);
    let index = contents(&files, "mod.rs");
    assert!(index.contains("crate::rt::SchemaHandle::new("));
    assert!(!index.contains("#[cfg(test)]"));
    assert!(contents(&files, "cell.rs").contains("impl crate::rt::Generated for Cell {"));
}

#[test]
fn generation_is_deterministic() {
    for backend in backends() {
        let first = backend.generate(&cell(), &GenerateOptions::default()).unwrap();
        let second = backend.generate(&cell(), &GenerateOptions::default()).unwrap();
        assert_eq!(first, second, "{}", backend.name());
    }
}
