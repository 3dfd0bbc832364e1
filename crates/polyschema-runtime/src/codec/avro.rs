//! Avro binary encoding of JSON-form instances, driven by the IR.
//!
//! The layout follows the Avro schema the Avro exporter writes for the same
//! IR: optional fields are two-branch unions with `null` placed by
//! [`Field::optional_layout`], nested choices are flattened into one union
//! and union branches are picked with the choice's resolution.

use crate::error::{Result, RuntimeError};
use crate::logical;
use crate::matching;
use polyschema_core::{
    ChoiceType, Field, OptionalLayout, RecordType, ResolvedSchema, Scalar, SchemaPath, TypeNode,
};
use serde_json::{Map, Value};

/// Leaf branches of a union as Avro writes it.
fn flatten<'a>(schema: &'a ResolvedSchema, choice: &'a ChoiceType, out: &mut Vec<&'a TypeNode>) {
    for variant in &choice.variants {
        match union_of(schema, &variant.node) {
            Some(inner) => flatten(schema, inner, out),
            None => out.push(&variant.node),
        }
    }
}

/// The choice behind a node, looking through a reference to a named choice.
fn union_of<'a>(schema: &'a ResolvedSchema, node: &'a TypeNode) -> Option<&'a ChoiceType> {
    match node {
        TypeNode::Choice(c) => Some(c),
        TypeNode::Reference { name } => match &schema.get(name)?.node {
            TypeNode::Choice(c) => Some(c),
            _ => None,
        },
        _ => None,
    }
}

/// Branches of an optional field: the non-null branches with `null` put
/// first or last.
fn optional_branches<'a>(schema: &'a ResolvedSchema, field: &'a Field) -> (Vec<&'a TypeNode>, usize) {
    let mut branches = Vec::new();
    match union_of(schema, &field.ty) {
        Some(choice) => flatten(schema, choice, &mut branches),
        None => branches.push(&field.ty),
    }
    branches.retain(|b| !b.is_null());
    let null_index = match field.optional_layout() {
        OptionalLayout::NullFirst => 0,
        OptionalLayout::NullLast => branches.len(),
    };
    (branches, null_index)
}

pub struct AvroEncoder<'a> {
    schema: &'a ResolvedSchema,
}

impl<'a> AvroEncoder<'a> {
    pub fn new(schema: &'a ResolvedSchema) -> Self {
        Self { schema }
    }

    pub fn encode(&self, node: &TypeNode, value: &Value) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(node, value, &SchemaPath::root(), &mut out)?;
        Ok(out)
    }

    fn write(&self, node: &TypeNode, value: &Value, path: &SchemaPath, out: &mut Vec<u8>) -> Result<()> {
        match node {
            TypeNode::Primitive(p) => self.primitive(&p.scalar, value, path, out),
            TypeNode::Record(r) => self.record(r, value, path, out),
            TypeNode::Enum(e) => {
                let symbol = value.as_str().ok_or_else(|| RuntimeError::encode(path, "expected a symbol"))?;
                let index = e
                    .symbols
                    .iter()
                    .position(|s| s == symbol)
                    .ok_or_else(|| RuntimeError::encode(path, format!("unknown symbol `{symbol}`")))?;
                write_long(index as i64, out);
                Ok(())
            }
            TypeNode::Array(c) | TypeNode::Set(c) => {
                let items = value.as_array().ok_or_else(|| RuntimeError::encode(path, "expected an array"))?;
                if !items.is_empty() {
                    write_long(items.len() as i64, out);
                    for (i, item) in items.iter().enumerate() {
                        self.write(&c.items, item, &path.join(i), out)?;
                    }
                }
                write_long(0, out);
                Ok(())
            }
            TypeNode::Map(m) => {
                let entries = value.as_object().ok_or_else(|| RuntimeError::encode(path, "expected an object"))?;
                if !entries.is_empty() {
                    write_long(entries.len() as i64, out);
                    for (key, item) in entries {
                        write_bytes(key.as_bytes(), out);
                        self.write(&m.values, item, &path.join(key), out)?;
                    }
                }
                write_long(0, out);
                Ok(())
            }
            TypeNode::Choice(c) => {
                let mut branches = Vec::new();
                flatten(self.schema, c, &mut branches);
                let leaf = self.leaf(c, value, path)?;
                let index = position(&branches, leaf).ok_or_else(|| RuntimeError::NoVariant { path: path.clone() })?;
                write_long(index as i64, out);
                self.write(leaf, value, path, out)
            }
            TypeNode::Reference { name } => {
                let def = self
                    .schema
                    .get(name)
                    .ok_or_else(|| RuntimeError::UnknownType(name.full()))?;
                self.write(&def.node, value, path, out)
            }
        }
    }

    /// The leaf branch a value belongs to, descending through nested choices.
    fn leaf<'s>(&'s self, choice: &'s ChoiceType, value: &Value, path: &SchemaPath) -> Result<&'s TypeNode> {
        let index = matching::select(self.schema, choice, value)
            .ok_or_else(|| RuntimeError::NoVariant { path: path.clone() })?;
        let node = &choice.variants[index].node;
        match union_of(self.schema, node) {
            Some(inner) => self.leaf(inner, value, path),
            None => Ok(node),
        }
    }

    fn record(&self, r: &RecordType, value: &Value, path: &SchemaPath, out: &mut Vec<u8>) -> Result<()> {
        let object = value.as_object().ok_or_else(|| RuntimeError::encode(path, "expected an object"))?;
        for field in &r.fields {
            let path = path.join(&field.name);
            let member = object.get(&field.name);
            if field.required {
                let fallback = field.default.as_ref().map(|d| d.to_json());
                let value = member.or(fallback.as_ref()).ok_or_else(|| RuntimeError::encode(&path, "missing"))?;
                self.write(&field.ty, value, &path, out)?;
                continue;
            }
            let (branches, null_index) = optional_branches(self.schema, field);
            match member.filter(|v| !v.is_null()) {
                None => write_long(null_index as i64, out),
                Some(value) => {
                    let leaf = match union_of(self.schema, &field.ty) {
                        Some(choice) => self.leaf(choice, value, &path)?,
                        None => &field.ty,
                    };
                    let mut index = position(&branches, leaf).ok_or_else(|| RuntimeError::NoVariant { path: path.clone() })?;
                    if index >= null_index {
                        index += 1;
                    }
                    write_long(index as i64, out);
                    self.write(leaf, value, &path, out)?;
                }
            }
        }
        Ok(())
    }

    fn primitive(&self, scalar: &Scalar, value: &Value, path: &SchemaPath, out: &mut Vec<u8>) -> Result<()> {
        let mismatch = |expected: &str| RuntimeError::encode(path, format!("expected {expected}"));
        let text = || value.as_str().ok_or_else(|| mismatch("a string"));
        match *scalar {
            Scalar::Null => {
                if !value.is_null() {
                    return Err(mismatch("null"));
                }
            }
            Scalar::Boolean => out.push(u8::from(value.as_bool().ok_or_else(|| mismatch("a boolean"))?)),
            Scalar::Int32 => {
                let n = value.as_i64().and_then(|n| i32::try_from(n).ok()).ok_or_else(|| mismatch("an int32"))?;
                write_long(n.into(), out);
            }
            Scalar::Int64 | Scalar::Duration => write_long(value.as_i64().ok_or_else(|| mismatch("an integer"))?, out),
            Scalar::Float32 => {
                let f = value.as_f64().ok_or_else(|| mismatch("a number"))? as f32;
                out.extend_from_slice(&f.to_le_bytes());
            }
            Scalar::Float64 => {
                let f = value.as_f64().ok_or_else(|| mismatch("a number"))?;
                out.extend_from_slice(&f.to_le_bytes());
            }
            Scalar::Decimal { scale, .. } => {
                let unscaled = match value {
                    Value::Number(n) => logical::decimal_to_unscaled(&n.to_string(), scale),
                    _ => logical::decimal_to_unscaled(text()?, scale),
                };
                let unscaled = unscaled.ok_or_else(|| mismatch(&format!("a decimal with scale {scale}")))?;
                write_bytes(&logical::twos_complement(unscaled), out);
            }
            Scalar::String => write_bytes(text()?.as_bytes(), out),
            Scalar::Uuid => {
                let s = text()?;
                if !logical::is_uuid(s) {
                    return Err(mismatch("a uuid"));
                }
                write_bytes(s.as_bytes(), out);
            }
            Scalar::Bytes => {
                let bytes = logical::decode_base64(text()?).ok_or_else(|| mismatch("base64"))?;
                write_bytes(&bytes, out);
            }
            Scalar::Date => {
                let days = logical::date_to_days(text()?).ok_or_else(|| mismatch("a date"))?;
                write_long(days.into(), out);
            }
            Scalar::Time { precision } => {
                let ticks = logical::time_to_ticks(text()?, precision).ok_or_else(|| mismatch("a time"))?;
                write_long(ticks, out);
            }
            Scalar::Timestamp { precision, local } => {
                let ticks = logical::timestamp_to_ticks(text()?, precision, local)
                    .ok_or_else(|| mismatch("a timestamp"))?;
                write_long(ticks, out);
            }
            Scalar::Any => write_bytes(serde_json::to_string(value)?.as_bytes(), out),
        }
        Ok(())
    }
}

fn position(branches: &[&TypeNode], leaf: &TypeNode) -> Option<usize> {
    branches.iter().position(|b| std::ptr::eq(*b, leaf))
}

fn write_long(n: i64, out: &mut Vec<u8>) {
    let mut z = ((n << 1) ^ (n >> 63)) as u64;
    while z >= 0x80 {
        out.push((z as u8 & 0x7f) | 0x80);
        z >>= 7;
    }
    out.push(z as u8);
}

fn write_bytes(bytes: &[u8], out: &mut Vec<u8>) {
    write_long(bytes.len() as i64, out);
    out.extend_from_slice(bytes);
}

pub struct AvroDecoder<'a> {
    schema: &'a ResolvedSchema,
}

struct Reader<'d> {
    data: &'d [u8],
    pos: usize,
}

impl<'d> Reader<'d> {
    fn take(&mut self, n: usize, path: &SchemaPath) -> Result<&'d [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| RuntimeError::decode(path, "unexpected end of data"))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn long(&mut self, path: &SchemaPath) -> Result<i64> {
        let mut z: u64 = 0;
        let mut shift = 0;
        loop {
            let byte = self.take(1, path)?[0];
            z |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift > 63 {
                return Err(RuntimeError::decode(path, "varint is too long"));
            }
        }
        Ok((z >> 1) as i64 ^ -((z & 1) as i64))
    }

    fn index(&mut self, len: usize, path: &SchemaPath) -> Result<usize> {
        let n = self.long(path)?;
        usize::try_from(n)
            .ok()
            .filter(|i| *i < len)
            .ok_or_else(|| RuntimeError::decode(path, format!("index {n} out of range")))
    }

    fn bytes(&mut self, path: &SchemaPath) -> Result<&'d [u8]> {
        let len = self.long(path)?;
        let len = usize::try_from(len).map_err(|_| RuntimeError::decode(path, "negative length"))?;
        self.take(len, path)
    }

    fn string(&mut self, path: &SchemaPath) -> Result<String> {
        let bytes = self.bytes(path)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| RuntimeError::decode(path, "invalid utf-8"))
    }

    /// Item count of the next block, skipping the byte size of negative-count blocks.
    fn block(&mut self, path: &SchemaPath) -> Result<usize> {
        let count = self.long(path)?;
        if count < 0 {
            self.long(path)?;
        }
        usize::try_from(count.unsigned_abs()).map_err(|_| RuntimeError::decode(path, "block too large"))
    }
}

impl<'a> AvroDecoder<'a> {
    pub fn new(schema: &'a ResolvedSchema) -> Self {
        Self { schema }
    }

    pub fn decode(&self, node: &TypeNode, data: &[u8]) -> Result<Value> {
        let mut reader = Reader { data, pos: 0 };
        let root = SchemaPath::root();
        let value = self.read(node, &mut reader, &root)?;
        if reader.pos != data.len() {
            return Err(RuntimeError::decode(&root, format!("{} trailing bytes", data.len() - reader.pos)));
        }
        Ok(value)
    }

    fn read(&self, node: &TypeNode, reader: &mut Reader<'_>, path: &SchemaPath) -> Result<Value> {
        match node {
            TypeNode::Primitive(p) => self.primitive(&p.scalar, reader, path),
            TypeNode::Record(r) => {
                let mut object = Map::new();
                for field in &r.fields {
                    let path = path.join(&field.name);
                    if field.required {
                        object.insert(field.name.clone(), self.read(&field.ty, reader, &path)?);
                        continue;
                    }
                    let (branches, null_index) = optional_branches(self.schema, field);
                    let index = reader.index(branches.len() + 1, &path)?;
                    if index == null_index {
                        continue;
                    }
                    let branch = branches[if index > null_index { index - 1 } else { index }];
                    object.insert(field.name.clone(), self.read(branch, reader, &path)?);
                }
                Ok(Value::Object(object))
            }
            TypeNode::Enum(e) => {
                let index = reader.index(e.symbols.len(), path)?;
                Ok(Value::from(e.symbols[index].as_str()))
            }
            TypeNode::Array(c) | TypeNode::Set(c) => {
                let mut items = Vec::new();
                loop {
                    let count = reader.block(path)?;
                    if count == 0 {
                        break;
                    }
                    for _ in 0..count {
                        items.push(self.read(&c.items, reader, &path.join(items.len()))?);
                    }
                }
                Ok(Value::Array(items))
            }
            TypeNode::Map(m) => {
                let mut entries = Map::new();
                loop {
                    let count = reader.block(path)?;
                    if count == 0 {
                        break;
                    }
                    for _ in 0..count {
                        let key = reader.string(path)?;
                        let value = self.read(&m.values, reader, &path.join(&key))?;
                        entries.insert(key, value);
                    }
                }
                Ok(Value::Object(entries))
            }
            TypeNode::Choice(c) => {
                let mut branches = Vec::new();
                flatten(self.schema, c, &mut branches);
                let index = reader.index(branches.len(), path)?;
                self.read(branches[index], reader, path)
            }
            TypeNode::Reference { name } => {
                let def = self
                    .schema
                    .get(name)
                    .ok_or_else(|| RuntimeError::UnknownType(name.full()))?;
                self.read(&def.node, reader, path)
            }
        }
    }

    fn primitive(&self, scalar: &Scalar, reader: &mut Reader<'_>, path: &SchemaPath) -> Result<Value> {
        let invalid = |what: &str| RuntimeError::decode(path, format!("invalid {what}"));
        Ok(match *scalar {
            Scalar::Null => Value::Null,
            Scalar::Boolean => match reader.take(1, path)?[0] {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                _ => return Err(invalid("boolean")),
            },
            Scalar::Int32 => {
                let n = reader.long(path)?;
                Value::from(i32::try_from(n).map_err(|_| invalid("int32"))?)
            }
            Scalar::Int64 | Scalar::Duration => Value::from(reader.long(path)?),
            Scalar::Float32 => {
                let mut buf = [0u8; 4];
                buf.copy_from_slice(reader.take(4, path)?);
                Value::from(f64::from(f32::from_le_bytes(buf)))
            }
            Scalar::Float64 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(reader.take(8, path)?);
                Value::from(f64::from_le_bytes(buf))
            }
            Scalar::Decimal { scale, .. } => {
                let unscaled = logical::from_twos_complement(reader.bytes(path)?).ok_or_else(|| invalid("decimal"))?;
                Value::from(logical::unscaled_to_decimal(unscaled, scale))
            }
            Scalar::String | Scalar::Uuid => Value::from(reader.string(path)?),
            Scalar::Bytes => Value::from(logical::encode_base64(reader.bytes(path)?)),
            Scalar::Date => {
                let days = i32::try_from(reader.long(path)?).map_err(|_| invalid("date"))?;
                Value::from(logical::days_to_date(days).ok_or_else(|| invalid("date"))?)
            }
            Scalar::Time { precision } => {
                Value::from(logical::ticks_to_time(reader.long(path)?, precision).ok_or_else(|| invalid("time"))?)
            }
            Scalar::Timestamp { precision, local } => Value::from(
                logical::ticks_to_timestamp(reader.long(path)?, precision, local)
                    .ok_or_else(|| invalid("timestamp"))?,
            ),
            Scalar::Any => serde_json::from_str(&reader.string(path)?).map_err(|_| invalid("json text"))?,
        })
    }
}
