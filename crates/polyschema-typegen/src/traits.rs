//! Traits for code generation backends.

use crate::error::Result;
use polyschema_core::ResolvedSchema;

/// Knobs shared by every backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Import path of the runtime the generated code calls. `None` picks
    /// the backend's default.
    pub runtime: Option<String>,
    /// Emit round-trip tests over synthesized instances.
    pub tests: bool,
    /// Seed for the synthesized test instances.
    pub seed: u64,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            runtime: None,
            tests: true,
            seed: 1,
        }
    }
}

/// One output file, path relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: String,
    pub contents: String,
}

impl GeneratedFile {
    pub fn new(path: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// A code generation backend.
///
/// Backends turn a [`ResolvedSchema`] into one source file per top-level
/// named type plus an index that aggregates them and embeds the schema.
pub trait Backend: Send + Sync {
    /// Unique backend identifier (e.g. "rust", "typescript").
    fn name(&self) -> &'static str;

    /// Target language.
    fn language(&self) -> &'static str;

    /// File extension for generated code (e.g. "rs", "ts").
    fn extension(&self) -> &'static str;

    fn generate(&self, schema: &ResolvedSchema, options: &GenerateOptions) -> Result<Vec<GeneratedFile>>;
}
