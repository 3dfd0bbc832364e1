//! Errors raised by generated code.

use polyschema_core::SchemaPath;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("unsupported media type `{0}`")]
    UnsupportedMediaType(String),

    #[error("cannot encode {path}: {reason}")]
    Encode { path: SchemaPath, reason: String },

    #[error("cannot decode {path}: {reason}")]
    Decode { path: SchemaPath, reason: String },

    #[error("no variant of the union at {path} accepts the value")]
    NoVariant { path: SchemaPath },

    #[error("type `{0}` is not part of the embedded schema")]
    UnknownType(String),

    #[error("embedded schema is invalid: {0}")]
    Schema(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn encode(path: &SchemaPath, reason: impl Into<String>) -> Self {
        RuntimeError::Encode {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    pub fn decode(path: &SchemaPath, reason: impl Into<String>) -> Self {
        RuntimeError::Decode {
            path: path.clone(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;
