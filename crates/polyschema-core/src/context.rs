//! Per-conversion state.

use crate::name::{NameAllocator, Namespace};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Schema dialects understood by the converters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// The canonical IR document.
    Ir,
    JsonSchema,
    Avro,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::Ir, Dialect::JsonSchema, Dialect::Avro];

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Ir => "ir",
            Dialect::JsonSchema => "json-schema",
            Dialect::Avro => "avro",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "ir" | "polyschema" => Some(Dialect::Ir),
            "json-schema" | "jsonschema" | "json" => Some(Dialect::JsonSchema),
            "avro" | "avsc" => Some(Dialect::Avro),
            _ => None,
        }
    }

    /// File extension of documents in this dialect.
    pub fn extension(&self) -> &'static str {
        match self {
            Dialect::Ir => "ir.json",
            Dialect::JsonSchema => "schema.json",
            Dialect::Avro => "avsc",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compiled regular expressions, keyed by source pattern.
#[derive(Debug, Default, Clone)]
pub struct PatternCache {
    compiled: HashMap<String, Regex>,
}

impl PatternCache {
    pub fn get(&mut self, pattern: &str) -> Result<&Regex, regex::Error> {
        if !self.compiled.contains_key(pattern) {
            let re = Regex::new(pattern)?;
            self.compiled.insert(pattern.to_string(), re);
        }
        Ok(&self.compiled[pattern])
    }

    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

/// State owned by exactly one conversion.
///
/// Nothing here is shared between conversions; parallel jobs each build
/// their own context.
#[derive(Debug, Clone)]
pub struct ConversionContext {
    pub dialect: Dialect,
    pub document_uri: Option<String>,
    pub document_name: Option<String>,
    /// Explicit namespace for unqualified types.
    pub namespace: Option<Namespace>,
    pub names: NameAllocator,
    pub patterns: PatternCache,
    pub allow_empty_records: bool,
    /// Share one hoisted name between structurally identical anonymous types.
    pub dedupe_anonymous: bool,
}

impl ConversionContext {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            document_uri: None,
            document_name: None,
            namespace: None,
            names: NameAllocator::new(),
            patterns: PatternCache::default(),
            allow_empty_records: true,
            dedupe_anonymous: true,
        }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.document_uri = Some(uri.into());
        self
    }

    pub fn with_document_name(mut self, name: impl Into<String>) -> Self {
        self.document_name = Some(name.into());
        self
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    /// Namespace given to unqualified types: configured, else derived from
    /// the document URI, else from the document name.
    pub fn document_namespace(&self) -> Namespace {
        if let Some(ns) = self.namespace.as_ref().filter(|ns| !ns.is_empty()) {
            return ns.clone();
        }
        if let Some(uri) = &self.document_uri {
            let ns = Namespace::from_uri(uri);
            if !ns.is_empty() {
                return ns;
            }
        }
        self.document_name
            .as_deref()
            .map(Namespace::from_document_name)
            .unwrap_or_default()
    }
}
