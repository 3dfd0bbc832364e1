//! Seeded random instances for generated round-trip tests.

use crate::error::{Result, RuntimeError};
use crate::logical;
use crate::matching;
use polyschema_core::recognizer::witness;
use polyschema_core::{
    ChoiceType, Collection, Primitive, RecordType, ResolvedSchema, Scalar, TimePrecision, TypeNode,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value, json};

/// Past this depth values are minimal, so recursive types terminate.
const MAX_DEPTH: usize = 4;
/// Longest string or collection synthesized, whatever the constraints.
const MAX_LEN: usize = 64;
const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates JSON-form instances that populate every field.
///
/// Each call to [`instance`](Self::instance) moves every choice on to its
/// next variant, so `n` instances cover every variant of choices with at
/// most `n` variants.
pub struct Synthesizer {
    rng: StdRng,
    round: usize,
}

impl Synthesizer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            round: 0,
        }
    }

    pub fn instance(&mut self, schema: &ResolvedSchema, type_name: &str) -> Result<Value> {
        let def = schema
            .lookup(type_name)
            .ok_or_else(|| RuntimeError::UnknownType(type_name.to_string()))?;
        let value = self.value(schema, &def.node, 0);
        self.round += 1;
        Ok(value)
    }

    pub fn instances(&mut self, schema: &ResolvedSchema, type_name: &str, count: usize) -> Result<Vec<Value>> {
        (0..count).map(|_| self.instance(schema, type_name)).collect()
    }

    fn value(&mut self, schema: &ResolvedSchema, node: &TypeNode, depth: usize) -> Value {
        if depth > MAX_DEPTH && !matches!(node, TypeNode::Primitive(_)) {
            return witness(node, schema.schema());
        }
        match node {
            TypeNode::Primitive(p) => self.primitive(p),
            TypeNode::Record(r) => self.record(schema, r, depth),
            TypeNode::Enum(e) => {
                let index = self.rng.gen_range(0..e.symbols.len().max(1));
                e.symbols.get(index).map_or(Value::Null, |s| Value::from(s.as_str()))
            }
            TypeNode::Array(c) => Value::Array(self.items(schema, c, depth)),
            TypeNode::Set(c) => {
                let mut unique: Vec<Value> = Vec::new();
                for item in self.items(schema, c, depth) {
                    if !unique.contains(&item) {
                        unique.push(item);
                    }
                }
                Value::Array(unique)
            }
            TypeNode::Map(m) => {
                let len = if depth == MAX_DEPTH { 0 } else { self.rng.gen_range(0..=2) };
                let mut entries = Map::new();
                for i in 0..len {
                    let key = match &*m.keys {
                        TypeNode::Primitive(k) if matches!(k.scalar, Scalar::Int32 | Scalar::Int64) => {
                            self.rng.gen_range(-50..50).to_string()
                        }
                        _ => format!("k{i}"),
                    };
                    let value = self.value(schema, &m.values, depth + 1);
                    entries.insert(key, value);
                }
                Value::Object(entries)
            }
            TypeNode::Choice(c) => self.choice(schema, c, depth),
            TypeNode::Reference { name } => match schema.get(name) {
                Some(def) => self.value(schema, &def.node, depth + 1),
                None => Value::Null,
            },
        }
    }

    fn record(&mut self, schema: &ResolvedSchema, r: &RecordType, depth: usize) -> Value {
        let mut object = Map::new();
        for field in &r.fields {
            if !field.required && depth == MAX_DEPTH {
                continue;
            }
            let value = self.value(schema, &field.ty, depth + 1);
            object.insert(field.name.clone(), value);
        }
        Value::Object(object)
    }

    fn items(&mut self, schema: &ResolvedSchema, c: &Collection, depth: usize) -> Vec<Value> {
        let min = (c.min_items.unwrap_or(0) as usize).min(MAX_LEN);
        let max = c.max_items.map_or(usize::MAX, |m| m as usize);
        let len = if depth == MAX_DEPTH { min } else { self.rng.gen_range(1..=3).clamp(min, max.max(min)) };
        (0..len).map(|_| self.value(schema, &c.items, depth + 1)).collect()
    }

    /// A value of this round's variant, or of the next variant whose value
    /// dispatches back to it.
    fn choice(&mut self, schema: &ResolvedSchema, c: &ChoiceType, depth: usize) -> Value {
        let n = c.variants.len();
        for k in 0..n {
            let index = (self.round + k) % n;
            let value = self.value(schema, &c.variants[index].node, depth + 1);
            if matching::select(schema, c, &value) == Some(index) {
                return value;
            }
        }
        c.variants
            .first()
            .map_or(Value::Null, |v| witness(&v.node, schema.schema()))
    }

    fn primitive(&mut self, p: &Primitive) -> Value {
        if let Some(constant) = &p.constraints.constant {
            return constant.to_json();
        }
        let rng = &mut self.rng;
        match p.scalar {
            Scalar::Null => Value::Null,
            Scalar::Boolean => Value::Bool(rng.r#gen()),
            Scalar::Int32 | Scalar::Int64 => {
                let lo = p.constraints.minimum.map_or(-1000, |m| m.0.ceil() as i64);
                let hi = p.constraints.maximum.map_or(1000, |m| m.0.floor() as i64);
                Value::from(if lo <= hi { rng.gen_range(lo..=hi) } else { lo })
            }
            Scalar::Float32 => Value::from(f64::from(rng.gen_range(-400i16..400)) / 4.0),
            Scalar::Float64 => Value::from(f64::from(rng.gen_range(-8000i32..8000)) / 8.0),
            Scalar::Decimal { precision, scale } => {
                let digits = precision.clamp(1, 18);
                let bound = 10i128.pow(digits) - 1;
                if scale > logical::MAX_DECIMAL_DIGITS {
                    return Value::from("0");
                }
                logical::unscaled_to_decimal(rng.gen_range(-bound..=bound), scale).into()
            }
            Scalar::String => {
                let min = (p.constraints.min_length.unwrap_or(0) as usize).min(MAX_LEN);
                let max = p.constraints.max_length.map_or(usize::MAX, |m| m as usize);
                let len = rng.gen_range(1..=8usize).clamp(min, max.max(min));
                let text: String = (0..len)
                    .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
                    .collect();
                Value::from(text)
            }
            Scalar::Bytes => {
                let len = rng.gen_range(0..12);
                let bytes: Vec<u8> = (0..len).map(|_| rng.r#gen()).collect();
                Value::from(logical::encode_base64(&bytes))
            }
            Scalar::Date => Value::from(logical::days_to_date(rng.gen_range(0..25_000)).unwrap_or_default()),
            Scalar::Time { precision } => {
                let per_day = match precision {
                    TimePrecision::Millis => 86_400_000,
                    TimePrecision::Micros => 86_400_000_000,
                };
                Value::from(logical::ticks_to_time(rng.gen_range(0..per_day), precision).unwrap_or_default())
            }
            Scalar::Timestamp { precision, local } => {
                let mut ticks = rng.gen_range(0..2_000_000_000_000i64);
                if precision == TimePrecision::Micros {
                    ticks = ticks * 1_000 + rng.gen_range(0..1_000);
                }
                Value::from(logical::ticks_to_timestamp(ticks, precision, local).unwrap_or_default())
            }
            Scalar::Duration => Value::from(rng.gen_range(0..1_000_000_000i64)),
            Scalar::Uuid => {
                let mut bytes: [u8; 16] = rng.r#gen();
                bytes[6] = (bytes[6] & 0x0f) | 0x40;
                bytes[8] = (bytes[8] & 0x3f) | 0x80;
                let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
                Value::from(format!(
                    "{}-{}-{}-{}-{}",
                    &hex[0..8],
                    &hex[8..12],
                    &hex[12..16],
                    &hex[16..20],
                    &hex[20..32]
                ))
            }
            Scalar::Any => json!({ "n": rng.gen_range(0..100) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_core::{ConversionContext, Dialect, Field, NamedType, QualifiedName, Schema};

    fn tree() -> ResolvedSchema {
        let mut schema = Schema::new();
        let node = QualifiedName::parse("demo.Node");
        schema.add(NamedType::record(
            node.clone(),
            vec![
                Field::required("id", TypeNode::primitive(Scalar::Uuid)),
                Field::optional("next", TypeNode::reference(node.clone())),
                Field::required(
                    "value",
                    TypeNode::choice(vec![TypeNode::primitive(Scalar::Int64), TypeNode::string()]),
                ),
            ],
        ));
        schema.root = Some(node);
        polyschema_resolve::resolve(schema, &mut ConversionContext::new(Dialect::Ir)).unwrap()
    }

    #[test]
    fn instances_conform_and_cycle_variants() {
        let schema = tree();
        let values = Synthesizer::new(7).instances(&schema, "demo.Node", 4).unwrap();
        for value in &values {
            assert!(matching::is_match(&schema, "demo.Node", value), "{value}");
        }
        let kinds: Vec<bool> = values.iter().map(|v| v["value"].is_string()).collect();
        assert_eq!(kinds, [false, true, false, true]);
    }

    #[test]
    fn same_seed_same_instances() {
        let schema = tree();
        let a = Synthesizer::new(42).instances(&schema, "demo.Node", 3).unwrap();
        let b = Synthesizer::new(42).instances(&schema, "demo.Node", 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn huge_minimums_are_capped() {
        let mut schema = Schema::new();
        let name = QualifiedName::parse("demo.Big");
        let mut text = polyschema_core::Primitive::new(Scalar::String);
        text.constraints.min_length = Some(1_000_000_000_000_000_000);
        let mut list = polyschema_core::Collection::of(TypeNode::string());
        list.min_items = Some(u64::MAX);
        schema.add(NamedType::record(
            name.clone(),
            vec![
                Field::required("text", TypeNode::Primitive(text)),
                Field::required("list", TypeNode::Array(list)),
                Field::required("amount", TypeNode::primitive(Scalar::Decimal { precision: 4000, scale: 4000 })),
            ],
        ));
        schema.root = Some(name);
        let schema = polyschema_resolve::resolve(schema, &mut ConversionContext::new(Dialect::Ir)).unwrap();

        let value = Synthesizer::new(1).instance(&schema, "demo.Big").unwrap();
        assert_eq!(value["text"].as_str().map(str::len), Some(MAX_LEN));
        assert_eq!(value["list"].as_array().map(Vec::len), Some(MAX_LEN));
        assert_eq!(value["amount"], json!("0"));
    }
}
