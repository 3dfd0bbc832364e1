//! The canonical IR document: the serde form of [`Schema`].

use crate::options::ExportOptions;
use crate::traits::{Exporter, Importer};
use polyschema_core::{ConversionContext, Dialect, Error, ResolvedSchema, Result, Schema, SchemaPath};

pub struct IrImporter;

impl Importer for IrImporter {
    fn dialect(&self) -> Dialect {
        Dialect::Ir
    }

    fn parse(&self, document: &str, _ctx: &mut ConversionContext) -> Result<Schema> {
        Schema::from_document(document)
    }
}

/// Writes the resolved schema as is, resolutions included. Export options
/// do not apply.
pub struct IrExporter;

impl Exporter for IrExporter {
    fn dialect(&self) -> Dialect {
        Dialect::Ir
    }

    fn export(&self, schema: &ResolvedSchema, _options: &ExportOptions) -> Result<String> {
        serde_json::to_string_pretty(schema.schema())
            .map_err(|e| Error::schema(Dialect::Ir, &SchemaPath::root(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ir_round_trips_through_text() {
        let doc = r#"{
            "root": "shop.Item",
            "types": {
                "shop.Item": {
                    "name": "shop.Item",
                    "node": { "kind": "record", "fields": [
                        { "name": "sku", "type": { "kind": "primitive", "scalar": "string" } },
                        { "name": "price", "type": { "kind": "primitive", "scalar": { "decimal": { "precision": 10, "scale": 2 } } } }
                    ] }
                }
            }
        }"#;
        let mut ctx = ConversionContext::new(Dialect::Ir);
        let resolved = IrImporter.import(doc, &mut ctx).unwrap();
        let text = IrExporter.export(&resolved, &ExportOptions::default()).unwrap();
        let mut again = ConversionContext::new(Dialect::Ir);
        let back = IrImporter.import(&text, &mut again).unwrap();
        assert_eq!(back.schema(), resolved.schema());
    }
}
