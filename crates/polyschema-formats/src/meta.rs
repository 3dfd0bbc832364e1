//! Metadata recording IR intent that a dialect cannot express natively.
//!
//! Exporters attach an [`Intent`] under a reserved key (`x-polyschema` in
//! JSON Schema, `polyschema` in Avro); importers read it before anything
//! else so a re-import rebuilds the original IR.

use crate::options::{ExportOptions, LossyPolicy};
use polyschema_core::{Constraints, Dialect, Error, QualifiedName, Result, Scalar, SchemaPath};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSON_SCHEMA_KEY: &str = "x-polyschema";
pub const AVRO_KEY: &str = "polyschema";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Intent {
    /// Original scalar, when a substitute was written.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub scalar: Option<Scalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,
    /// Map key scalar when keys are not strings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Scalar>,
    #[serde(skip_serializing_if = "is_false")]
    pub set: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub open: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    /// Field is required even though its encoding looks optional.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Enum symbols before sanitizing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<String>>,
    /// Name of a type written inline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<QualifiedName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// Column added by the exporter, dropped on import.
    #[serde(skip_serializing_if = "is_false")]
    pub envelope: bool,
    /// Marks the last entry of a type list: `true` when it is the root,
    /// `false` for a list without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<bool>,
    /// On the last branch of a root union: the union's own name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub union: Option<QualifiedName>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Intent {
    pub fn is_empty(&self) -> bool {
        self == &Intent::default()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Merge into the intent already attached to `object` under `key`.
    pub fn amend(object: &mut Value, key: &str, edit: impl FnOnce(&mut Intent)) {
        let mut intent = Intent::read(object, key).unwrap_or_default();
        edit(&mut intent);
        if let Value::Object(map) = object {
            if intent.is_empty() {
                map.remove(key);
            } else {
                map.insert(key.to_string(), intent.to_value());
            }
        }
    }

    /// Read the intent stored under `key` in a JSON object, if any.
    pub fn read(object: &Value, key: &str) -> Option<Intent> {
        let raw = object.get(key)?;
        match serde_json::from_value(raw.clone()) {
            Ok(intent) => Some(intent),
            Err(err) => {
                tracing::warn!(key, error = %err, "ignoring malformed intent metadata");
                None
            }
        }
    }
}

/// Gate a type substitution on the lossy policy.
pub fn substitute(
    options: &ExportOptions,
    dialect: Dialect,
    path: &SchemaPath,
    construct: &str,
) -> Result<()> {
    match options.lossy {
        LossyPolicy::Preserve => {
            tracing::warn!(%dialect, %path, construct, "no native form, recorded as metadata");
            Ok(())
        }
        LossyPolicy::Fail => Err(Error::unsupported(dialect, path, construct)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_core::TimePrecision;
    use serde_json::json;

    #[test]
    fn intent_serializes_sparsely() {
        let intent = Intent {
            scalar: Some(Scalar::Time { precision: TimePrecision::Micros }),
            set: true,
            ..Intent::default()
        };
        insta::assert_snapshot!(
            serde_json::to_string(&intent).unwrap(),
            @r#"{"type":{"time":{"precision":"micros"}},"set":true}"#
        );
        assert_eq!(Intent::read(&json!({ "x": intent.to_value() }), "x"), Some(intent));
    }

    #[test]
    fn fail_policy_rejects_substitution() {
        let options = ExportOptions {
            lossy: LossyPolicy::Fail,
            ..ExportOptions::default()
        };
        let err = substitute(&options, Dialect::Avro, &SchemaPath::from("/types/a.B"), "set").unwrap_err();
        assert_eq!(err.to_string(), "avro: unsupported construct at /types/a.B: set");
    }
}
