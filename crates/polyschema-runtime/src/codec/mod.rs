//! Payload codecs selected by [`ContentType`].

mod avro;
mod gzip;
mod json;

pub use avro::{AvroDecoder, AvroEncoder};

use crate::content_type::{ContentType, Encoding};
use crate::error::{Result, RuntimeError};
use polyschema_core::{ResolvedSchema, TypeNode};
use serde_json::Value;

fn type_node(schema: &ResolvedSchema, type_name: &str) -> Result<TypeNode> {
    schema
        .lookup(type_name)
        .map(|def| TypeNode::reference(def.name.clone()))
        .ok_or_else(|| RuntimeError::UnknownType(type_name.to_string()))
}

/// Encode the JSON form of a `type_name` instance.
pub fn encode(
    schema: &ResolvedSchema,
    type_name: &str,
    value: &Value,
    content_type: ContentType,
) -> Result<Vec<u8>> {
    let payload = match content_type.encoding {
        Encoding::Json => json::encode(value)?,
        Encoding::AvroBinary => AvroEncoder::new(schema).encode(&type_node(schema, type_name)?, value)?,
    };
    tracing::trace!(%content_type, type_name, bytes = payload.len(), "encoded");
    if content_type.gzip {
        gzip::compress(&payload)
    } else {
        Ok(payload)
    }
}

/// Decode a payload into the JSON form of a `type_name` instance.
pub fn decode(
    schema: &ResolvedSchema,
    type_name: &str,
    data: &[u8],
    content_type: ContentType,
) -> Result<Value> {
    let inflated;
    let payload = if content_type.gzip {
        inflated = gzip::decompress(data)?;
        inflated.as_slice()
    } else {
        data
    };
    match content_type.encoding {
        Encoding::Json => json::decode(payload),
        Encoding::AvroBinary => AvroDecoder::new(schema).decode(&type_node(schema, type_name)?, payload),
    }
}

