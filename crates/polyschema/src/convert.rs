//! The conversion pipeline: import, resolve, render, write.
//!
//! Rendering happens entirely in memory. [`Converter::write_artifacts`]
//! stages every file in a temporary sibling before renaming any of them
//! into place, so a failed conversion leaves the output directory as it was.

use crate::config::PolyschemaConfig;
use crate::error::{ConvertError, Result};
use polyschema_core::{Dialect, ResolvedSchema};
use polyschema_typegen::{Backend, GeneratedFile};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// An input document and the name it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name, used for the default namespace and the output stem.
    pub name: String,
    pub uri: Option<String>,
    pub text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: None,
            text: text.into(),
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Read a document from disk, named after the file.
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, text))
    }

    /// File name up to the first `.`.
    fn stem(&self) -> &str {
        self.name.split('.').next().filter(|s| !s.is_empty()).unwrap_or("schema")
    }
}

/// What a conversion produces.
#[derive(Clone, Copy)]
pub enum Target {
    Dialect(Dialect),
    Backend(&'static dyn Backend),
}

impl Target {
    /// A dialect name (`avro`, `json-schema`, `ir`) or a backend name
    /// (`rust`, `ts`, ...).
    pub fn parse(name: &str) -> Result<Self> {
        if let Some(dialect) = Dialect::from_name(name) {
            return Ok(Target::Dialect(dialect));
        }
        polyschema_typegen::get_backend(name)
            .map(Target::Backend)
            .ok_or_else(|| ConvertError::UnknownTarget(name.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Target::Dialect(d) => d.name(),
            Target::Backend(b) => b.name(),
        }
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Target").field(&self.name()).finish()
    }
}

/// One independent conversion for [`Converter::convert_batch`].
#[derive(Debug, Clone)]
pub struct Job {
    pub source: Dialect,
    pub document: Document,
    pub target: Target,
}

/// Runs conversions under one configuration.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    config: PolyschemaConfig,
}

impl Converter {
    pub fn new(config: PolyschemaConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolyschemaConfig {
        &self.config
    }

    /// Parse and resolve a document with a context of its own.
    pub fn import(&self, source: Dialect, document: &Document) -> Result<ResolvedSchema> {
        let importer =
            polyschema_formats::importer(source).ok_or(ConvertError::Unsupported(source, "imported"))?;
        let mut ctx = self.config.context(source).with_document_name(document.name.as_str());
        if let Some(uri) = &document.uri {
            ctx = ctx.with_uri(uri.as_str());
        }
        let schema = importer.import(&document.text, &mut ctx)?;
        tracing::debug!(document = %document.name, types = schema.types().count(), "imported");
        Ok(schema)
    }

    /// Render a resolved schema. `stem` names a dialect document.
    pub fn render(&self, schema: &ResolvedSchema, target: Target, stem: &str) -> Result<Vec<GeneratedFile>> {
        match target {
            Target::Dialect(dialect) => {
                let exporter = polyschema_formats::exporter(dialect)
                    .ok_or(ConvertError::Unsupported(dialect, "exported"))?;
                let text = exporter.export(schema, &self.config.export_options())?;
                Ok(vec![GeneratedFile::new(format!("{stem}.{}", dialect.extension()), text)])
            }
            Target::Backend(backend) => Ok(backend.generate(schema, &self.config.generate_options())?),
        }
    }

    /// Import `document` and render it for `target`, in memory.
    pub fn convert(&self, source: Dialect, document: &Document, target: Target) -> Result<Vec<GeneratedFile>> {
        let schema = self.import(source, document)?;
        let files = self.render(&schema, target, document.stem())?;
        tracing::debug!(
            document = %document.name,
            target = target.name(),
            files = files.len(),
            "converted"
        );
        Ok(files)
    }

    /// Run independent jobs in parallel. Results keep the order of `jobs`.
    pub fn convert_batch(&self, jobs: &[Job]) -> Vec<Result<Vec<GeneratedFile>>> {
        jobs.par_iter()
            .map(|job| self.convert(job.source, &job.document, job.target))
            .collect()
    }

    /// [`convert`](Self::convert), then [`write_artifacts`](Self::write_artifacts).
    pub fn convert_into(
        &self,
        source: Dialect,
        document: &Document,
        target: Target,
        dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let files = self.convert(source, document, target)?;
        Self::write_artifacts(dir, &files)
    }

    /// Write rendered files under `dir`. Every file is staged before any
    /// is renamed into place.
    pub fn write_artifacts(dir: &Path, files: &[GeneratedFile]) -> Result<Vec<PathBuf>> {
        let mut staged = Vec::with_capacity(files.len());
        for file in files {
            let path = dir.join(&file.path);
            let parent = path.parent().unwrap_or(dir);
            std::fs::create_dir_all(parent).map_err(|e| ConvertError::io(parent, e))?;
            let mut temp = NamedTempFile::new_in(parent).map_err(|e| ConvertError::io(parent, e))?;
            temp.write_all(file.contents.as_bytes())
                .map_err(|e| ConvertError::io(temp.path(), e))?;
            staged.push((temp, path));
        }
        let mut written = Vec::with_capacity(staged.len());
        for (temp, path) in staged {
            temp.persist(&path).map_err(|e| ConvertError::io(&path, e.error))?;
            written.push(path);
        }
        tracing::debug!(dir = %dir.display(), files = written.len(), "wrote artifacts");
        Ok(written)
    }
}
