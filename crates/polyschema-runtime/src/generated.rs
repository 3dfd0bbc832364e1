//! The contract every generated type implements.

use crate::codec;
use crate::content_type::ContentType;
use crate::error::Result;
use polyschema_core::ResolvedSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::io::Read;

/// A type generated from a schema.
///
/// Generated code supplies the type name, the schema handle and the
/// recognizer; encoding and decoding come from the default methods.
///
/// ```ignore
/// let bytes = order.to_byte_array("avro/binary+gzip")?;
/// let back = Order::from_data(&bytes, "avro/binary+gzip")?;
/// assert_eq!(back, order);
/// ```
pub trait Generated: Serialize + DeserializeOwned {
    /// Full name of the type in the embedded schema.
    const TYPE_NAME: &'static str;

    fn schema() -> Result<&'static ResolvedSchema>;

    /// Whether an untyped JSON value has this type's JSON form.
    fn is_json_match(value: &Value) -> bool;

    /// The JSON form of this instance.
    fn to_object(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn to_byte_array(&self, content_type: &str) -> Result<Vec<u8>> {
        let content_type = ContentType::parse(content_type)?;
        codec::encode(Self::schema()?, Self::TYPE_NAME, &self.to_object()?, content_type)
    }

    fn from_data(data: &[u8], content_type: &str) -> Result<Self> {
        let content_type = ContentType::parse(content_type)?;
        let value = codec::decode(Self::schema()?, Self::TYPE_NAME, data, content_type)?;
        Ok(serde_json::from_value(value)?)
    }

    fn from_reader(mut reader: impl Read, content_type: &str) -> Result<Self> {
        ContentType::parse(content_type)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_data(&data, content_type)
    }
}
