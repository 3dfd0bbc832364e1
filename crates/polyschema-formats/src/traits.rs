//! Traits shared by every dialect.

use crate::options::ExportOptions;
use polyschema_core::{ConversionContext, Dialect, ResolvedSchema, Result, Schema};

/// Reads documents of one dialect into the IR.
///
/// ```ignore
/// use polyschema_formats::{importer, ExportOptions};
/// use polyschema_core::{ConversionContext, Dialect};
///
/// let mut ctx = ConversionContext::new(Dialect::Avro).with_document_name("order.avsc");
/// let resolved = importer(Dialect::Avro).import(&text, &mut ctx)?;
/// ```
pub trait Importer: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Parse a document into an unresolved schema.
    fn parse(&self, document: &str, ctx: &mut ConversionContext) -> Result<Schema>;

    /// Parse and run every resolution pass.
    fn import(&self, document: &str, ctx: &mut ConversionContext) -> Result<ResolvedSchema> {
        let schema = self.parse(document, ctx)?;
        polyschema_resolve::resolve(schema, ctx)
    }
}

/// Writes a resolved schema as a document of one dialect.
pub trait Exporter: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Render the whole document. Nothing is written anywhere; callers
    /// decide where the text goes.
    fn export(&self, schema: &ResolvedSchema, options: &ExportOptions) -> Result<String>;
}
