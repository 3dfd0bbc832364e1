//! End-to-end conversions over the dialect fixtures.

use polyschema::core::Dialect;
use polyschema::{ConvertError, Converter, Document, Job, PolyschemaConfig, Target};
use serde_json::Value;
use tempfile::TempDir;

fn fixture(name: &str) -> Document {
    let path = format!("{}/../polyschema-formats/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    Document::read(path.as_ref()).unwrap()
}

#[test]
fn json_schema_to_avro_names_the_output_after_the_document() {
    let files = Converter::default()
        .convert(Dialect::JsonSchema, &fixture("value.schema.json"), Target::parse("avro").unwrap())
        .unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "value.avsc");
    let avro: Value = serde_json::from_str(&files[0].contents).unwrap();
    insta::assert_snapshot!(
        avro.as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect::<Vec<_>>().join(","),
        @"TextValue,NumberValue,Cell"
    );
}

#[test]
fn batch_matches_sequential_conversion() {
    let converter = Converter::default();
    let mut jobs = Vec::new();
    for target in ["avro", "json-schema", "ir", "rust", "typescript"] {
        for (source, name) in [
            (Dialect::JsonSchema, "order.schema.json"),
            (Dialect::JsonSchema, "value.schema.json"),
            (Dialect::Avro, "drawing.avsc"),
        ] {
            jobs.push(Job {
                source,
                document: fixture(name),
                target: Target::parse(target).unwrap(),
            });
        }
    }
    let parallel = converter.convert_batch(&jobs);
    assert_eq!(parallel.len(), jobs.len());
    for (job, result) in jobs.iter().zip(parallel) {
        let sequential = converter.convert(job.source, &job.document, job.target);
        match (result, sequential) {
            (Ok(a), Ok(b)) => assert_eq!(a, b, "{} -> {:?}", job.document.name, job.target),
            (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
            (a, b) => panic!("{} -> {:?}: {a:?} vs {b:?}", job.document.name, job.target),
        }
    }
}

#[test]
fn generated_sources_are_written_into_place() {
    let out = TempDir::new().unwrap();
    let written = Converter::default()
        .convert_into(
            Dialect::JsonSchema,
            &fixture("value.schema.json"),
            Target::parse("rust").unwrap(),
            &out.path().join("gen"),
        )
        .unwrap();
    let mut names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["cell.rs", "mod.rs", "number_value.rs", "text_value.rs"]);
    let mut on_disk: Vec<String> = std::fs::read_dir(out.path().join("gen"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    on_disk.sort();
    assert_eq!(on_disk, names);
}

#[test]
fn failed_conversion_writes_nothing() {
    let out = TempDir::new().unwrap();
    let broken = Document::new("broken.schema.json", r##"{"type": "object", "properties": {"a": {"$ref": "#/$defs/Missing"}}}"##);
    let err = Converter::default()
        .convert_into(Dialect::JsonSchema, &broken, Target::parse("avro").unwrap(), out.path())
        .unwrap_err();
    assert!(matches!(err, ConvertError::Schema(_)), "{err}");
    assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
}

#[test]
fn config_policies_reach_the_exporter() {
    let config: PolyschemaConfig = toml::from_str("[export]\nlossy = \"fail\"\n").unwrap();
    let err = Converter::new(config)
        .convert(Dialect::JsonSchema, &fixture("order.schema.json"), Target::Dialect(Dialect::Avro))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "avro: unsupported construct at /types/com.acme.orders.Order/fields/tags: set"
    );
}
