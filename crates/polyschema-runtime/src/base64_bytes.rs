//! `#[serde(with = "polyschema_runtime::base64_bytes")]` for byte fields,
//! whose JSON form is a base64 string.

use crate::logical;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&logical::encode_base64(bytes))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
    let text = String::deserialize(deserializer)?;
    logical::decode_base64(&text).ok_or_else(|| D::Error::custom("invalid base64"))
}
