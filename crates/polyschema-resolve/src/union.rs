//! Discriminated-union resolution.
//!
//! Every choice gets a [`UnionResolution`]: a discriminator when the source
//! declared a selector field, and one structural recognizer per variant.
//! Choices without a selector are checked for shadowed variants.

use crate::{Segment, append_path, labeled_children_mut};
use polyschema_core::recognizer::{json_kinds, witness};
use polyschema_core::{
    Check, ChoiceType, ConversionContext, Discriminator, EnumType, Error, Field, JsonKind,
    Literal, NamedType, QualifiedName, Recognizer, RecordType, Result, Schema, SchemaPath,
    TypeNode, UnionResolution, pascal_case,
};
use std::collections::HashMap;

/// Resolve every choice in the schema, in declaration order.
pub fn resolve_unions(schema: &mut Schema, ctx: &mut ConversionContext) -> Result<()> {
    let owners: Vec<QualifiedName> = schema.types.keys().cloned().collect();
    let mut shared: HashMap<Vec<String>, QualifiedName> = HashMap::new();
    let mut resolved = 0usize;

    for owner in owners {
        let Some(def) = schema.get(&owner) else {
            continue;
        };
        let mut node = def.node.clone();
        let mut pass = UnionPass {
            schema: &*schema,
            ctx: &mut *ctx,
            owner: &owner,
            shared: &mut shared,
            edits: Vec::new(),
            new_types: Vec::new(),
            resolved: 0,
        };
        let path = SchemaPath::root().join("types").join(&owner);
        pass.resolve_node(&mut node, &mut Vec::new(), &path)?;
        let UnionPass { edits, new_types, resolved: count, .. } = pass;
        resolved += count;

        if let Some(def) = schema.get_mut(&owner) {
            def.node = node;
        }
        for def in new_types {
            schema.add(def);
        }
        for edit in edits {
            edit.apply(schema);
        }
    }
    if resolved > 0 {
        tracing::debug!(choices = resolved, "resolved unions");
    }
    Ok(())
}

/// Rewrite of a variant's selector field to the shared tag enum.
struct SelectorEdit {
    record: QualifiedName,
    field: String,
    tag: String,
    tag_enum: QualifiedName,
}

impl SelectorEdit {
    fn apply(self, schema: &mut Schema) {
        let Some(def) = schema.get_mut(&self.record) else {
            return;
        };
        if let TypeNode::Record(r) = &mut def.node {
            if let Some(field) = r.field_mut(&self.field) {
                field.ty = TypeNode::reference(self.tag_enum);
                field.required = true;
                field.default = Some(Literal::String(self.tag));
            }
        }
    }
}

struct UnionPass<'a> {
    schema: &'a Schema,
    ctx: &'a mut ConversionContext,
    owner: &'a QualifiedName,
    shared: &'a mut HashMap<Vec<String>, QualifiedName>,
    edits: Vec<SelectorEdit>,
    new_types: Vec<NamedType>,
    resolved: usize,
}

impl UnionPass<'_> {
    fn resolve_node(
        &mut self,
        node: &mut TypeNode,
        segments: &mut Vec<Segment>,
        path: &SchemaPath,
    ) -> Result<()> {
        for (segment, child) in labeled_children_mut(node) {
            let child_path = append_path(path, &segment);
            segments.push(segment);
            self.resolve_node(child, segments, &child_path)?;
            segments.pop();
        }
        if let TypeNode::Choice(choice) = node {
            self.resolve_choice(choice, segments, path)?;
            self.resolved += 1;
        }
        Ok(())
    }

    fn resolve_choice(
        &mut self,
        choice: &mut ChoiceType,
        segments: &[Segment],
        path: &SchemaPath,
    ) -> Result<()> {
        name_variants(choice);
        let discriminator = match choice.selector.clone() {
            Some(selector) => Some(self.discriminate(choice, &selector, segments, path)?),
            None => None,
        };

        let mut recognizers = Vec::with_capacity(choice.variants.len());
        for (i, variant) in choice.variants.iter().enumerate() {
            let mut checks = structural_checks(&variant.node, self.schema);
            if let Some(disc) = &discriminator {
                let tag_check = Check::FieldConst {
                    field: disc.field.clone(),
                    value: Literal::string(disc.tags[i].as_str()),
                };
                checks.retain(|c| !matches!(c, Check::FieldConst { field, .. } if *field == disc.field));
                checks.push(tag_check);
            }
            recognizers.push(Recognizer {
                variant: variant.name.clone(),
                checks,
            });
        }

        if discriminator.is_none() {
            self.check_ambiguity(choice, &recognizers, path)?;
        }
        choice.resolution = Some(UnionResolution {
            discriminator,
            recognizers,
        });
        Ok(())
    }

    /// Build the discriminator for a choice with a declared selector field.
    fn discriminate(
        &mut self,
        choice: &mut ChoiceType,
        selector: &str,
        segments: &[Segment],
        path: &SchemaPath,
    ) -> Result<Discriminator> {
        let dialect = self.ctx.dialect;
        let mut tags: Vec<String> = Vec::new();
        let mut records: Vec<QualifiedName> = Vec::new();
        let mut field_enums: Vec<Option<QualifiedName>> = Vec::new();

        for variant in choice.variants.iter_mut() {
            let variant_path = path.join("variants").join(&variant.name);
            let (record_name, record) = variant_record(&variant.node, self.schema).ok_or_else(|| {
                Error::schema(
                    dialect,
                    &variant_path,
                    format!("variant of a choice with selector `{selector}` is not a record"),
                )
            })?;
            let field = record.field(selector).ok_or_else(|| {
                Error::schema(
                    dialect,
                    &variant_path,
                    format!("variant lacks selector field `{selector}`"),
                )
            })?;
            let tag = variant
                .tag
                .clone()
                .or_else(|| field_tag(field, self.schema))
                .ok_or_else(|| Error::schema(dialect, &variant_path, "missing discriminator constant"))?;
            if tags.contains(&tag) {
                return Err(Error::schema(
                    dialect,
                    &variant_path,
                    format!("duplicate discriminator constant `{tag}`"),
                ));
            }
            variant.tag = Some(tag.clone());
            field_enums.push(
                field
                    .ty
                    .as_reference()
                    .filter(|name| matches!(self.schema.get(name).map(|d| &d.node), Some(TypeNode::Enum(_))))
                    .cloned(),
            );
            tags.push(tag);
            records.push(record_name);
        }

        let tag_enum = match self.common_enum(&field_enums, &tags) {
            Some(existing) => existing,
            None => self.shared_enum(selector, &records, &tags, segments),
        };
        for (record, tag) in records.into_iter().zip(&tags) {
            self.edits.push(SelectorEdit {
                record,
                field: selector.to_string(),
                tag: tag.clone(),
                tag_enum: tag_enum.clone(),
            });
        }
        Ok(Discriminator {
            field: selector.to_string(),
            tag_enum,
            tags,
        })
    }

    /// The enum every variant's selector field already references, if it
    /// covers all tags.
    fn common_enum(&self, field_enums: &[Option<QualifiedName>], tags: &[String]) -> Option<QualifiedName> {
        let first = field_enums.first()?.as_ref()?;
        if !field_enums.iter().all(|e| e.as_ref() == Some(first)) {
            return None;
        }
        match self.schema.get(first).map(|d| &d.node) {
            Some(TypeNode::Enum(e)) if tags.iter().all(|t| e.symbols.contains(t)) => Some(first.clone()),
            _ => None,
        }
    }

    /// One enum per distinct selector/variant set, named `{Context}{Selector}`.
    fn shared_enum(
        &mut self,
        selector: &str,
        records: &[QualifiedName],
        tags: &[String],
        segments: &[Segment],
    ) -> QualifiedName {
        let key: Vec<String> = std::iter::once(selector.to_string())
            .chain(records.iter().zip(tags).map(|(r, t)| format!("{r}={t}")))
            .collect();
        if let Some(existing) = self.shared.get(&key) {
            return existing.clone();
        }
        let context: String = std::iter::once(pascal_case(&self.owner.name))
            .chain(segments.iter().map(Segment::name_part))
            .collect();
        let candidate = format!("{context}{}", pascal_case(selector));
        let name = self.ctx.names.allocate(&self.owner.namespace, &[candidate]);
        self.new_types.push(NamedType::new(
            name.clone(),
            TypeNode::Enum(EnumType {
                symbols: tags.to_vec(),
                hint: None,
            }),
        ));
        self.shared.insert(key, name.clone());
        name
    }

    /// Reject a variant whose minimal value an earlier variant already
    /// accepts.
    fn check_ambiguity(&self, choice: &ChoiceType, recognizers: &[Recognizer], path: &SchemaPath) -> Result<()> {
        for (j, later) in choice.variants.iter().enumerate().skip(1) {
            let value = witness(&later.node, self.schema);
            if let Some(i) = recognizers[..j].iter().position(|r| r.matches(&value)) {
                return Err(Error::AmbiguousUnion {
                    dialect: self.ctx.dialect.to_string(),
                    path: path.clone(),
                    shadowing: choice.variants[i].name.clone(),
                    shadowed: later.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Canonical, unique variant names.
fn name_variants(choice: &mut ChoiceType) {
    let mut used: HashMap<String, usize> = HashMap::new();
    for variant in &mut choice.variants {
        let base = variant.node.variant_name();
        let count = used.entry(base.clone()).or_insert(0);
        *count += 1;
        variant.name = if *count == 1 { base } else { format!("{base}{count}") };
    }
}

fn variant_record<'s>(node: &TypeNode, schema: &'s Schema) -> Option<(QualifiedName, &'s RecordType)> {
    let mut name = node.as_reference()?.clone();
    for _ in 0..=schema.types.len() {
        let def = schema.get(&name)?;
        match &def.node {
            TypeNode::Record(r) => return Some((name, r)),
            TypeNode::Reference { name: next } => name = next.clone(),
            _ => return None,
        }
    }
    None
}

/// Constant a selector field pins: a primitive constant, a single-symbol
/// enum, or a string default.
fn field_tag(field: &Field, schema: &Schema) -> Option<String> {
    match schema.deref(&field.ty) {
        Some(TypeNode::Primitive(p)) => {
            if let Some(tag) = p.constraints.constant.as_ref().and_then(Literal::as_str) {
                return Some(tag.to_string());
            }
        }
        Some(TypeNode::Enum(e)) if e.symbols.len() == 1 => return Some(e.symbols[0].clone()),
        _ => {}
    }
    field.default.as_ref().and_then(Literal::as_str).map(String::from)
}

fn field_constant(field: &Field, schema: &Schema) -> Option<Literal> {
    match schema.deref(&field.ty)? {
        TypeNode::Primitive(p) => p.constraints.constant.clone(),
        TypeNode::Enum(e) if e.symbols.len() == 1 => Some(Literal::string(e.symbols[0].as_str())),
        _ => None,
    }
}

/// Checks derived from the shape of a variant: JSON kind, enum symbols,
/// constants, and for records the required members, the closed member set
/// and per-member kinds and constants.
pub fn structural_checks(node: &TypeNode, schema: &Schema) -> Vec<Check> {
    let mut checks = Vec::new();
    let kinds = json_kinds(node, schema);
    if !kinds.is_empty() {
        checks.push(Check::Kind { kinds });
    }
    match schema.deref(node) {
        Some(TypeNode::Enum(e)) => checks.push(Check::OneOf {
            symbols: e.symbols.clone(),
        }),
        Some(TypeNode::Primitive(p)) => {
            if let Some(value) = &p.constraints.constant {
                checks.push(Check::Const { value: value.clone() });
            }
        }
        Some(TypeNode::Record(r)) => {
            for field in r.fields.iter().filter(|f| f.required) {
                checks.push(Check::HasField {
                    field: field.name.clone(),
                });
            }
            if !r.open {
                checks.push(Check::OnlyFields {
                    fields: r.fields.iter().map(|f| f.name.clone()).collect(),
                });
            }
            for field in &r.fields {
                let mut kinds = json_kinds(&field.ty, schema);
                if !kinds.is_empty() {
                    if !field.required && !kinds.contains(&JsonKind::Null) {
                        kinds.push(JsonKind::Null);
                    }
                    checks.push(Check::FieldKind {
                        field: field.name.clone(),
                        kinds,
                    });
                }
                if field.required {
                    if let Some(value) = field_constant(field, schema) {
                        checks.push(Check::FieldConst {
                            field: field.name.clone(),
                            value,
                        });
                    }
                }
            }
        }
        _ => {}
    }
    checks
}
