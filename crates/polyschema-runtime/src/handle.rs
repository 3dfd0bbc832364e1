//! The embedded IR document of a generated module.

use crate::error::{Result, RuntimeError};
use polyschema_core::{Dialect, ResolvedSchema, Schema};
use std::sync::OnceLock;

/// A canonical IR document parsed on first use.
///
/// Generated modules keep one of these in a `static`; every generated type
/// of the module reads the same frozen schema.
pub struct SchemaHandle {
    document: &'static str,
    parsed: OnceLock<std::result::Result<ResolvedSchema, String>>,
}

impl SchemaHandle {
    pub const fn new(document: &'static str) -> Self {
        Self {
            document,
            parsed: OnceLock::new(),
        }
    }

    pub fn get(&self) -> Result<&ResolvedSchema> {
        self.parsed
            .get_or_init(|| {
                let schema = Schema::from_document(self.document).map_err(|e| e.to_string())?;
                ResolvedSchema::new(schema, Dialect::Ir).map_err(|e| e.to_string())
            })
            .as_ref()
            .map_err(|e| RuntimeError::Schema(e.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static BROKEN: SchemaHandle = SchemaHandle::new(r#"{"types": {"a.B": {"name": "a.B"}}}"#);

    #[test]
    fn invalid_documents_fail_on_every_use() {
        for _ in 0..2 {
            let err = BROKEN.get().unwrap_err();
            assert!(matches!(err, RuntimeError::Schema(_)), "{err}");
        }
    }
}
