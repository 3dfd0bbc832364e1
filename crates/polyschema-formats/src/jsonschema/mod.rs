//! JSON Schema (draft 2020-12 and draft-07).

mod export;
mod import;

pub use export::JsonSchemaExporter;
pub use import::{JsonSchemaImporter, parse_json_schema};
