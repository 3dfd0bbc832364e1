//! Export options.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsonSchemaDraft {
    #[default]
    #[serde(rename = "2020-12")]
    Draft2020_12,
    #[serde(rename = "draft-07")]
    Draft07,
}

impl JsonSchemaDraft {
    pub fn uri(&self) -> &'static str {
        match self {
            JsonSchemaDraft::Draft2020_12 => "https://json-schema.org/draft/2020-12/schema",
            JsonSchemaDraft::Draft07 => "http://json-schema.org/draft-07/schema#",
        }
    }

    /// Keyword holding named definitions.
    pub fn defs_keyword(&self) -> &'static str {
        match self {
            JsonSchemaDraft::Draft2020_12 => "$defs",
            JsonSchemaDraft::Draft07 => "definitions",
        }
    }
}

/// Where named types are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NamedTypePolicy {
    /// One definition per named type; uses refer to it by name.
    #[default]
    Reference,
    /// Definitions written at first use.
    Inline,
}

/// What to do when a construct has no native form in the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LossyPolicy {
    /// Substitute the nearest type and record the original in metadata.
    #[default]
    Preserve,
    /// Refuse with an unsupported-construct error.
    Fail,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExportOptions {
    pub draft: JsonSchemaDraft,
    /// Append envelope columns to the root record (Avro).
    pub envelope: bool,
    pub named_types: NamedTypePolicy,
    pub lossy: LossyPolicy,
}
