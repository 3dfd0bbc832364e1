//! Generation errors.

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("template `{template}` has no value for slot `{slot}`")]
    MissingSlot { template: &'static str, slot: String },

    #[error("template `{template}` has an unterminated slot")]
    Unterminated { template: &'static str },

    #[error("cannot embed the schema document: {0}")]
    Embed(#[from] serde_json::Error),
}

pub type Result<T, E = GenerateError> = std::result::Result<T, E>;
