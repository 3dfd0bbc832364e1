//! A hand-written type shaped like typegen's Rust output, exercised over
//! every content type.

use chrono::{DateTime, Utc};
use polyschema_core::{
    ConversionContext, Dialect, Field, NamedType, QualifiedName, ResolvedSchema, Scalar, Schema,
    TimePrecision, TypeNode,
};
use polyschema_runtime::{ContentType, Generated, RuntimeError, Synthesizer, dispatch, is_match};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::sync::OnceLock;

fn schema() -> &'static ResolvedSchema {
    static SCHEMA: OnceLock<ResolvedSchema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let mut schema = Schema::new();
        let text = QualifiedName::parse("sensors.TextValue");
        let number = QualifiedName::parse("sensors.NumberValue");
        let reading = QualifiedName::parse("sensors.Reading");
        schema.add(NamedType::record(text.clone(), vec![Field::required("textValue", TypeNode::string())]));
        schema.add(NamedType::record(
            number.clone(),
            vec![Field::required("numberValue", TypeNode::primitive(Scalar::Int32))],
        ));
        schema.add(NamedType::record(
            reading.clone(),
            vec![
                Field::required("sensor", TypeNode::string()),
                Field::required(
                    "at",
                    TypeNode::primitive(Scalar::Timestamp { precision: TimePrecision::Millis, local: false }),
                ),
                Field::optional("note", TypeNode::string()),
                Field::required(
                    "value",
                    TypeNode::choice(vec![TypeNode::reference(text), TypeNode::reference(number)]),
                ),
            ],
        ));
        schema.root = Some(reading);
        polyschema_resolve::resolve(schema, &mut ConversionContext::new(Dialect::Ir)).unwrap()
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct TextValue {
    #[serde(rename = "textValue")]
    text_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct NumberValue {
    #[serde(rename = "numberValue")]
    number_value: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
enum ReadingValue {
    TextValue(TextValue),
    NumberValue(NumberValue),
}

impl<'de> Deserialize<'de> for ReadingValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let schema = Reading::schema().map_err(D::Error::custom)?;
        match dispatch(schema, Reading::TYPE_NAME, &["value"], &value).map_err(D::Error::custom)? {
            0 => serde_json::from_value(value).map(Self::TextValue).map_err(D::Error::custom),
            1 => serde_json::from_value(value).map(Self::NumberValue).map_err(D::Error::custom),
            other => Err(D::Error::custom(format!("variant {other} out of range"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Reading {
    sensor: String,
    at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    value: ReadingValue,
}

impl Generated for Reading {
    const TYPE_NAME: &'static str = "sensors.Reading";

    fn schema() -> polyschema_runtime::Result<&'static ResolvedSchema> {
        Ok(schema())
    }

    fn is_json_match(value: &Value) -> bool {
        is_match(schema(), Self::TYPE_NAME, value)
    }
}

fn sample() -> Reading {
    Reading {
        sensor: "boiler".into(),
        at: DateTime::parse_from_rfc3339("2024-02-29T13:45:00.250Z").unwrap().to_utc(),
        note: None,
        value: ReadingValue::NumberValue(NumberValue { number_value: 71 }),
    }
}

#[test]
fn every_content_type_round_trips() {
    let mut readings = vec![sample()];
    let mut synth = Synthesizer::new(11);
    for value in synth.instances(schema(), Reading::TYPE_NAME, 6).unwrap() {
        readings.push(serde_json::from_value(value).unwrap());
    }
    assert!(readings.iter().any(|r| matches!(r.value, ReadingValue::TextValue(_))));
    assert!(readings.iter().any(|r| r.note.is_some()));

    for content_type in ContentType::ALL {
        let content_type = content_type.to_string();
        for reading in &readings {
            let bytes = reading.to_byte_array(&content_type).unwrap();
            assert_eq!(&Reading::from_data(&bytes, &content_type).unwrap(), reading, "{content_type}");
            assert_eq!(&Reading::from_reader(bytes.as_slice(), &content_type).unwrap(), reading);
        }
    }
}

#[test]
fn avro_binary_layout() {
    let bytes = sample().to_byte_array("avro/binary").unwrap();
    let mut expected = vec![0x0c];
    expected.extend_from_slice(b"boiler");
    // 1709214300250 ms as a zig-zag varint
    expected.extend_from_slice(&[0xb4, 0xe1, 0xe3, 0xd1, 0xbe, 0x63]);
    // null note, second union branch, 71
    expected.extend_from_slice(&[0x00, 0x02, 0x8e, 0x01]);
    assert_eq!(bytes, expected);
}

#[test]
fn unknown_media_type_is_an_error() {
    let err = sample().to_byte_array("text/nonsense").unwrap_err();
    assert!(matches!(err, RuntimeError::UnsupportedMediaType(_)));
    let err = Reading::from_data(b"{}", "text/nonsense").unwrap_err();
    assert_eq!(err.to_string(), "unsupported media type `text/nonsense`");
    let err = Reading::from_reader(&b"\x1f\x8b"[..], "application/json+brotli").unwrap_err();
    assert!(matches!(err, RuntimeError::UnsupportedMediaType(_)));
}

#[test]
fn json_matching_follows_the_union_contract() {
    let base = json!({"sensor": "s", "at": "2024-01-01T00:00:00Z"});
    let with = |value: Value| {
        let mut reading = base.clone();
        reading["value"] = value;
        reading
    };
    assert!(Reading::is_json_match(&with(json!({"numberValue": 3}))));
    assert!(Reading::is_json_match(&with(json!({"textValue": "3"}))));
    assert!(!Reading::is_json_match(&with(json!({"textValue": "3", "numberValue": 3}))));
    assert!(!Reading::is_json_match(&json!({"sensor": "s"})));

    let both = with(json!({"textValue": "3", "numberValue": 3}));
    let err = Reading::from_data(both.to_string().as_bytes(), "application/json").unwrap_err();
    assert!(err.to_string().contains("no variant"), "{err}");
}

#[test]
fn corrupt_payloads_fail_cleanly() {
    let bytes = sample().to_byte_array("avro/binary+gzip").unwrap();
    assert!(matches!(Reading::from_data(&bytes[..bytes.len() - 4], "avro/binary+gzip"), Err(RuntimeError::Io(_))));
    let plain = sample().to_byte_array("avro/binary").unwrap();
    let err = Reading::from_data(&plain[..plain.len() - 1], "avro/binary").unwrap_err();
    assert!(matches!(err, RuntimeError::Decode { .. }), "{err}");
}
