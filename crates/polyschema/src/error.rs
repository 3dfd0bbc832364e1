//! Pipeline errors.

use polyschema_core::Dialect;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Schema(#[from] polyschema_core::Error),

    #[error(transparent)]
    Generate(#[from] polyschema_typegen::GenerateError),

    #[error("unknown target `{0}` (expected a dialect or a backend name)")]
    UnknownTarget(String),

    #[error("{0} documents cannot be {1}")]
    Unsupported(Dialect, &'static str),

    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;
