//! Intermediate representation for schemas.
//!
//! All importers normalize to this IR before resolution; exporters and code
//! generators only ever read a frozen [`ResolvedSchema`](crate::ResolvedSchema).
//!
//! Named types live in one table keyed by qualified name and point at each
//! other with [`TypeNode::Reference`], so recursive schemas never form
//! ownership cycles in memory.

use crate::literal::Literal;
use crate::name::{Namespace, QualifiedName};
use crate::recognizer::UnionResolution;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A complete schema: a table of named types plus an optional root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<QualifiedName>,
    #[serde(default)]
    pub types: IndexMap<QualifiedName, NamedType>,
}

/// A named type definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NamedType {
    pub name: QualifiedName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "ExtensionBag::is_empty")]
    pub extensions: ExtensionBag,
    pub node: TypeNode,
}

/// The shape of a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeNode {
    Primitive(Primitive),
    Record(RecordType),
    Enum(EnumType),
    Array(Collection),
    Set(Collection),
    Map(MapType),
    Choice(ChoiceType),
    /// Lookup of a named type. Never owns the target.
    Reference { name: QualifiedName },
}

/// A scalar, refined by logical-type attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Primitive {
    pub scalar: Scalar,
    /// Free-form string format (`email`, `uri`, `hostname`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimePrecision {
    Millis,
    Micros,
}

/// Scalar kinds, with logical types as structured variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scalar {
    Null,
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Decimal { precision: u32, scale: u32 },
    String,
    Bytes,
    Date,
    Time { precision: TimePrecision },
    Timestamp { precision: TimePrecision, local: bool },
    Duration,
    Uuid,
    /// Any JSON value.
    Any,
}

impl Scalar {
    pub fn name(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Boolean => "boolean",
            Scalar::Int32 => "int32",
            Scalar::Int64 => "int64",
            Scalar::Float32 => "float32",
            Scalar::Float64 => "float64",
            Scalar::Decimal { .. } => "decimal",
            Scalar::String => "string",
            Scalar::Bytes => "bytes",
            Scalar::Date => "date",
            Scalar::Time { .. } => "time",
            Scalar::Timestamp { .. } => "timestamp",
            Scalar::Duration => "duration",
            Scalar::Uuid => "uuid",
            Scalar::Any => "any",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Scalar::Int32 | Scalar::Int64 | Scalar::Float32 | Scalar::Float64
        )
    }
}

/// Value constraints carried by a primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<OrderedFloat<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<OrderedFloat<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_literal"
    )]
    pub constant: Option<Literal>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self == &Constraints::default()
    }
}

/// A record with ordered fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordType {
    pub fields: Vec<Field>,
    /// Accepts members beyond the declared fields.
    #[serde(default, skip_serializing_if = "is_false")]
    pub open: bool,
    /// Preferred name for an anonymous record, consumed by hoisting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl RecordType {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name == name)
    }
}

/// A record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeNode,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_literal"
    )]
    pub default: Option<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
    #[serde(default, skip_serializing_if = "ExtensionBag::is_empty")]
    pub extensions: ExtensionBag,
}

/// Where `null` sits when an optional field is written as a two-branch union.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalLayout {
    NullFirst,
    NullLast,
}

impl Field {
    pub fn required(name: impl Into<String>, ty: TypeNode) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
            docs: None,
            extensions: ExtensionBag::default(),
        }
    }

    pub fn optional(name: impl Into<String>, ty: TypeNode) -> Self {
        Self {
            required: false,
            ..Self::required(name, ty)
        }
    }

    pub fn with_docs(mut self, docs: impl Into<String>) -> Self {
        self.docs = Some(docs.into());
        self
    }

    pub fn with_default(mut self, default: Literal) -> Self {
        self.default = Some(default);
        self
    }

    /// A non-null default must come first in union encodings, so it decides
    /// the branch order of an optional field.
    pub fn optional_layout(&self) -> OptionalLayout {
        match &self.default {
            Some(d) if !d.is_null() => OptionalLayout::NullLast,
            _ => OptionalLayout::NullFirst,
        }
    }
}

/// A closed set of string symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumType {
    pub symbols: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// Item type and size bounds of an array or set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Collection {
    pub items: Box<TypeNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
}

impl Collection {
    pub fn of(items: TypeNode) -> Self {
        Self {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapType {
    pub keys: Box<TypeNode>,
    pub values: Box<TypeNode>,
}

/// A union: the value is exactly one of the variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChoiceType {
    pub variants: Vec<Variant>,
    /// Declared discriminator field, when the source has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Filled in by the union resolver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<UnionResolution>,
}

impl ChoiceType {
    pub fn of(nodes: Vec<TypeNode>) -> Self {
        Self {
            variants: nodes.into_iter().map(Variant::new).collect(),
            selector: None,
            resolution: None,
        }
    }

    /// The non-null variant of a two-way `null | X` choice.
    pub fn nullable_inner(&self) -> Option<&TypeNode> {
        if self.variants.len() != 2 || self.selector.is_some() {
            return None;
        }
        match (self.variants[0].node.is_null(), self.variants[1].node.is_null()) {
            (true, false) => Some(&self.variants[1].node),
            (false, true) => Some(&self.variants[0].node),
            _ => None,
        }
    }

    pub fn has_null(&self) -> bool {
        self.variants.iter().any(|v| v.node.is_null())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub node: TypeNode,
    /// Discriminator constant for this variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Variant {
    pub fn new(node: TypeNode) -> Self {
        Self {
            name: node.variant_name(),
            node,
            tag: None,
        }
    }

    pub fn tagged(node: TypeNode, tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::new(node)
        }
    }
}

/// Opaque key/value metadata preserved verbatim across conversions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionBag(BTreeMap<String, Literal>);

impl ExtensionBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Literal>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Literal> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Literal)> {
        self.0.iter()
    }

    pub fn extend(&mut self, other: ExtensionBag) {
        self.0.extend(other.0);
    }
}

impl TypeNode {
    pub fn primitive(scalar: Scalar) -> Self {
        TypeNode::Primitive(Primitive::new(scalar))
    }

    pub fn null() -> Self {
        Self::primitive(Scalar::Null)
    }

    pub fn string() -> Self {
        Self::primitive(Scalar::String)
    }

    pub fn reference(name: QualifiedName) -> Self {
        TypeNode::Reference { name }
    }

    pub fn array(items: TypeNode) -> Self {
        TypeNode::Array(Collection::of(items))
    }

    pub fn map(values: TypeNode) -> Self {
        TypeNode::Map(MapType {
            keys: Box::new(TypeNode::string()),
            values: Box::new(values),
        })
    }

    pub fn choice(nodes: Vec<TypeNode>) -> Self {
        TypeNode::Choice(ChoiceType::of(nodes))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TypeNode::Primitive(p) if p.scalar == Scalar::Null)
    }

    pub fn as_reference(&self) -> Option<&QualifiedName> {
        match self {
            TypeNode::Reference { name } => Some(name),
            _ => None,
        }
    }

    /// Canonical variant name: a referenced type's short name, else the
    /// kind of the node.
    pub fn variant_name(&self) -> String {
        match self {
            TypeNode::Reference { name } => name.name.clone(),
            TypeNode::Primitive(p) => p.scalar.name().to_string(),
            TypeNode::Record(r) => r.hint.clone().unwrap_or_else(|| "record".to_string()),
            TypeNode::Enum(e) => e.hint.clone().unwrap_or_else(|| "enum".to_string()),
            TypeNode::Array(_) => "array".to_string(),
            TypeNode::Set(_) => "set".to_string(),
            TypeNode::Map(_) => "map".to_string(),
            TypeNode::Choice(_) => "choice".to_string(),
        }
    }

    /// Direct children, in declaration order.
    pub fn children(&self) -> Vec<&TypeNode> {
        match self {
            TypeNode::Record(r) => r.fields.iter().map(|f| &f.ty).collect(),
            TypeNode::Array(c) | TypeNode::Set(c) => vec![&c.items],
            TypeNode::Map(m) => vec![&m.keys, &m.values],
            TypeNode::Choice(c) => c.variants.iter().map(|v| &v.node).collect(),
            TypeNode::Primitive(_) | TypeNode::Enum(_) | TypeNode::Reference { .. } => Vec::new(),
        }
    }

    pub fn children_mut(&mut self) -> Vec<&mut TypeNode> {
        match self {
            TypeNode::Record(r) => r.fields.iter_mut().map(|f| &mut f.ty).collect(),
            TypeNode::Array(c) | TypeNode::Set(c) => vec![&mut c.items],
            TypeNode::Map(m) => vec![&mut m.keys, &mut m.values],
            TypeNode::Choice(c) => c.variants.iter_mut().map(|v| &mut v.node).collect(),
            TypeNode::Primitive(_) | TypeNode::Enum(_) | TypeNode::Reference { .. } => Vec::new(),
        }
    }

    /// Every reference reachable inside this node (not following them).
    pub fn references(&self) -> Vec<&QualifiedName> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a QualifiedName>) {
        if let TypeNode::Reference { name } = self {
            out.push(name);
        }
        for child in self.children() {
            child.collect_references(out);
        }
    }

    /// Apply `f` to every node below and including this one, parents first.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut TypeNode)) {
        f(self);
        for child in self.children_mut() {
            child.walk_mut(f);
        }
    }
}

impl Primitive {
    pub fn new(scalar: Scalar) -> Self {
        Self {
            scalar,
            format: None,
            unit: None,
            currency: None,
            constraints: Constraints::default(),
        }
    }
}

impl NamedType {
    pub fn new(name: QualifiedName, node: TypeNode) -> Self {
        Self {
            name,
            docs: None,
            aliases: Vec::new(),
            extensions: ExtensionBag::default(),
            node,
        }
    }

    pub fn record(name: QualifiedName, fields: Vec<Field>) -> Self {
        Self::new(
            name,
            TypeNode::Record(RecordType {
                fields,
                ..RecordType::default()
            }),
        )
    }

    pub fn string_enum(name: QualifiedName, symbols: &[&str]) -> Self {
        Self::new(
            name,
            TypeNode::Enum(EnumType {
                symbols: symbols.iter().map(|s| s.to_string()).collect(),
                hint: None,
            }),
        )
    }

    pub fn with_docs(mut self, docs: impl Into<String>) -> Self {
        self.docs = Some(docs.into());
        self
    }
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a named type.
    pub fn add(&mut self, def: NamedType) {
        self.types.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &QualifiedName) -> Option<&NamedType> {
        self.types.get(name)
    }

    pub fn get_mut(&mut self, name: &QualifiedName) -> Option<&mut NamedType> {
        self.types.get_mut(name)
    }

    /// Look up by dotted full name.
    pub fn lookup(&self, full: &str) -> Option<&NamedType> {
        self.types.get(&QualifiedName::parse(full))
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.types.contains_key(name)
    }

    /// Follow references until a structural node is reached.
    ///
    /// Returns `None` for dangling references and for reference-only cycles.
    pub fn deref<'a>(&'a self, node: &'a TypeNode) -> Option<&'a TypeNode> {
        let mut current = node;
        let mut hops = 0;
        while let TypeNode::Reference { name } = current {
            current = &self.types.get(name)?.node;
            hops += 1;
            if hops > self.types.len() {
                return None;
            }
        }
        Some(current)
    }

    /// Whether a named type reaches itself through at least one reference.
    pub fn is_recursive(&self, name: &QualifiedName) -> bool {
        let mut seen = HashSet::new();
        let mut stack: Vec<&QualifiedName> = match self.get(name) {
            Some(def) => def.node.references(),
            None => return false,
        };
        while let Some(next) = stack.pop() {
            if next == name {
                return true;
            }
            if seen.insert(next) {
                if let Some(def) = self.get(next) {
                    stack.extend(def.node.references());
                }
            }
        }
        false
    }

    pub fn namespaces(&self) -> Vec<&Namespace> {
        let mut out: Vec<&Namespace> = Vec::new();
        for name in self.types.keys() {
            if !out.contains(&&name.namespace) {
                out.push(&name.namespace);
            }
        }
        out
    }
}

fn default_true() -> bool {
    true
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Keep an explicit `null` as `Some(Literal::Null)` instead of `None`.
fn present_literal<'de, D>(deserializer: D) -> Result<Option<Literal>, D::Error>
where
    D: Deserializer<'de>,
{
    Literal::deserialize(deserializer).map(Some)
}
