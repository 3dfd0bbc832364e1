//! Registry of dialect importers and exporters.
//!
//! The tables are fixed at compile time by the enabled dialect features;
//! nothing is registered at runtime.

use crate::ir::{IrExporter, IrImporter};
use crate::traits::{Exporter, Importer};
use polyschema_core::Dialect;

static IMPORTERS: &[&'static dyn Importer] = &[
    &IrImporter,
    #[cfg(feature = "jsonschema")]
    &crate::jsonschema::JsonSchemaImporter,
    #[cfg(feature = "avro")]
    &crate::avro::AvroImporter,
];

static EXPORTERS: &[&'static dyn Exporter] = &[
    &IrExporter,
    #[cfg(feature = "jsonschema")]
    &crate::jsonschema::JsonSchemaExporter,
    #[cfg(feature = "avro")]
    &crate::avro::AvroExporter,
];

/// Get the importer for a dialect, if it is compiled in.
pub fn importer(dialect: Dialect) -> Option<&'static dyn Importer> {
    IMPORTERS.iter().find(|i| i.dialect() == dialect).copied()
}

/// Get the exporter for a dialect, if it is compiled in.
pub fn exporter(dialect: Dialect) -> Option<&'static dyn Exporter> {
    EXPORTERS.iter().find(|e| e.dialect() == dialect).copied()
}

/// Names of every dialect with both an importer and an exporter.
pub fn dialect_names() -> Vec<&'static str> {
    Dialect::ALL
        .iter()
        .filter(|d| importer(**d).is_some() && exporter(**d).is_some())
        .map(|d| d.name())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_features_cover_every_dialect() {
        assert_eq!(dialect_names(), vec!["ir", "json-schema", "avro"]);
        for dialect in Dialect::ALL {
            assert_eq!(importer(dialect).map(|i| i.dialect()), Some(dialect));
        }
    }
}
