use crate::error::Result;
use serde_json::Value;

pub(super) fn encode(value: &Value) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub(super) fn decode(payload: &[u8]) -> Result<Value> {
    Ok(serde_json::from_slice(payload)?)
}
