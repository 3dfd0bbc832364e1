//! Configuration for the conversion pipeline.
//!
//! Loads config from:
//! 1. Global: ~/.config/polyschema/config.toml
//! 2. Per-project: .polyschema/config.toml (overrides global)
//!
//! Example config.toml:
//! ```toml
//! [resolve]
//! namespace = "com.acme.orders"
//!
//! [export]
//! named-types = "inline"
//! lossy = "fail"
//!
//! [generate]
//! runtime = "crate::runtime"
//! tests = false
//! ```
//!
//! Every key is optional; a key set in the project file wins over the
//! global one, and unset keys fall back to the defaults.

use crate::error::{ConvertError, Result};
use polyschema_core::{ConversionContext, Dialect, Namespace};
use polyschema_formats::{ExportOptions, JsonSchemaDraft, LossyPolicy, NamedTypePolicy};
use polyschema_typegen::GenerateOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Resolution settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ResolveConfig {
    /// Namespace for unqualified types, overriding the document's own.
    pub namespace: Option<String>,
    /// Share one name between structurally identical anonymous types.
    pub dedupe_anonymous: Option<bool>,
    pub allow_empty_records: Option<bool>,
}

/// Dialect export settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ExportConfig {
    pub draft: Option<JsonSchemaDraft>,
    pub envelope: Option<bool>,
    pub named_types: Option<NamedTypePolicy>,
    pub lossy: Option<LossyPolicy>,
}

/// Code generation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct GenerateConfig {
    pub runtime: Option<String>,
    pub tests: Option<bool>,
    pub seed: Option<u64>,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolyschemaConfig {
    pub resolve: ResolveConfig,
    pub export: ExportConfig,
    pub generate: GenerateConfig,
}

impl PolyschemaConfig {
    /// Load the global config, then the project's `.polyschema/config.toml`.
    pub fn load(root: &Path) -> Result<Self> {
        Self::load_from(Self::global_config_path().as_deref(), root)
    }

    /// [`load`](Self::load) with an explicit global config file.
    pub fn load_from(global: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();
        if let Some(global) = global {
            if let Some(loaded) = Self::load_file(global)? {
                config = config.merge(loaded);
            }
        }
        let project = root.join(".polyschema").join("config.toml");
        if let Some(loaded) = Self::load_file(&project)? {
            config = config.merge(loaded);
        }
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/polyschema/config.toml`, else under `~/.config`.
    pub fn global_config_path() -> Option<PathBuf> {
        let config_home = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))?;
        Some(config_home.join("polyschema").join("config.toml"))
    }

    /// A missing file is `None`; an unreadable or malformed one is an error.
    fn load_file(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConvertError::io(path, e)),
        };
        let config = toml::from_str(&content).map_err(|source| ConvertError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(Some(config))
    }

    /// Keys set in `other` override those in `self`.
    pub fn merge(self, other: Self) -> Self {
        Self {
            resolve: ResolveConfig {
                namespace: other.resolve.namespace.or(self.resolve.namespace),
                dedupe_anonymous: other.resolve.dedupe_anonymous.or(self.resolve.dedupe_anonymous),
                allow_empty_records: other.resolve.allow_empty_records.or(self.resolve.allow_empty_records),
            },
            export: ExportConfig {
                draft: other.export.draft.or(self.export.draft),
                envelope: other.export.envelope.or(self.export.envelope),
                named_types: other.export.named_types.or(self.export.named_types),
                lossy: other.export.lossy.or(self.export.lossy),
            },
            generate: GenerateConfig {
                runtime: other.generate.runtime.or(self.generate.runtime),
                tests: other.generate.tests.or(self.generate.tests),
                seed: other.generate.seed.or(self.generate.seed),
            },
        }
    }

    /// A fresh context for one conversion of `dialect` documents.
    pub fn context(&self, dialect: Dialect) -> ConversionContext {
        let mut ctx = ConversionContext::new(dialect);
        if let Some(namespace) = &self.resolve.namespace {
            ctx = ctx.with_namespace(Namespace::new(namespace.as_str()));
        }
        if let Some(dedupe) = self.resolve.dedupe_anonymous {
            ctx.dedupe_anonymous = dedupe;
        }
        if let Some(allow) = self.resolve.allow_empty_records {
            ctx.allow_empty_records = allow;
        }
        ctx
    }

    pub fn export_options(&self) -> ExportOptions {
        let defaults = ExportOptions::default();
        ExportOptions {
            draft: self.export.draft.unwrap_or(defaults.draft),
            envelope: self.export.envelope.unwrap_or(defaults.envelope),
            named_types: self.export.named_types.unwrap_or(defaults.named_types),
            lossy: self.export.lossy.unwrap_or(defaults.lossy),
        }
    }

    pub fn generate_options(&self) -> GenerateOptions {
        let defaults = GenerateOptions::default();
        GenerateOptions {
            runtime: self.generate.runtime.clone().or(defaults.runtime),
            tests: self.generate.tests.unwrap_or(defaults.tests),
            seed: self.generate.seed.unwrap_or(defaults.seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, text: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, text).unwrap();
    }

    #[test]
    fn test_default_config() {
        let config = PolyschemaConfig::default();
        assert_eq!(config.export_options(), ExportOptions::default());
        assert_eq!(config.generate_options(), GenerateOptions::default());
        assert!(config.context(Dialect::Avro).dedupe_anonymous);
    }

    #[test]
    fn test_project_overrides_global_per_key() {
        let dir = TempDir::new().unwrap();
        let global = dir.path().join("global").join("config.toml");
        write(
            &global,
            "[export]\nnamed-types = \"inline\"\nlossy = \"fail\"\n\n[generate]\nseed = 7\n",
        );
        let project = dir.path().join("project");
        write(
            &project.join(".polyschema").join("config.toml"),
            "[export]\nlossy = \"preserve\"\n\n[resolve]\nnamespace = \"com.acme\"\n",
        );

        let config = PolyschemaConfig::load_from(Some(&global), &project).unwrap();
        let export = config.export_options();
        assert_eq!(export.named_types, NamedTypePolicy::Inline);
        assert_eq!(export.lossy, LossyPolicy::Preserve);
        assert_eq!(config.generate_options().seed, 7);
        assert_eq!(
            config.context(Dialect::JsonSchema).document_namespace(),
            Namespace::new("com.acme")
        );
    }

    #[test]
    fn test_missing_files_are_defaults() {
        let dir = TempDir::new().unwrap();
        let config = PolyschemaConfig::load_from(Some(&dir.path().join("nope.toml")), dir.path()).unwrap();
        assert_eq!(config, PolyschemaConfig::default());
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join(".polyschema").join("config.toml"), "[export]\nlossy = \"sometimes\"\n");
        let err = PolyschemaConfig::load_from(None, dir.path()).unwrap_err();
        assert!(matches!(err, ConvertError::Config { .. }), "{err}");
    }
}
