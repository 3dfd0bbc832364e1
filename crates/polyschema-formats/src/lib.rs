//! Schema dialects: importers into and exporters out of the polyschema IR.
//!
//! | dialect | importer | exporter |
//! |---------|----------|----------|
//! | canonical IR (`.ir.json`) | [`ir::IrImporter`] | [`ir::IrExporter`] |
//! | JSON Schema | [`jsonschema::JsonSchemaImporter`] | [`jsonschema::JsonSchemaExporter`] |
//! | Avro (`.avsc`) | [`avro::AvroImporter`] | [`avro::AvroExporter`] |
//!
//! Lossy constructs are governed by [`LossyPolicy`]; see [`meta`].

#[cfg(feature = "avro")]
pub mod avro;
pub mod ir;
#[cfg(feature = "jsonschema")]
pub mod jsonschema;
pub mod meta;
pub mod options;
pub mod registry;
pub mod traits;

pub use options::{ExportOptions, JsonSchemaDraft, LossyPolicy, NamedTypePolicy};
pub use registry::{dialect_names, exporter, importer};
pub use traits::{Exporter, Importer};

use polyschema_core::{ConversionContext, Namespace, QualifiedName, pascal_case};

/// Name for an anonymous root type: the document's stem, else `Root`.
pub(crate) fn document_root_name(ctx: &ConversionContext) -> QualifiedName {
    let stem = ctx
        .document_name
        .as_deref()
        .map(|n| Namespace::from_document_name(n).as_str().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "root".to_string());
    QualifiedName::new(Namespace::empty(), pascal_case(&stem))
}
