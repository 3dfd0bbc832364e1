//! Resolution passes that turn an imported [`Schema`] into a
//! [`ResolvedSchema`].
//!
//! Passes, in order:
//!
//! 1. namespace assignment for unqualified types
//! 2. reference qualification
//! 3. alias-cycle check
//! 4. normalization (optional fields, nested choices)
//! 5. anonymous record and enum hoisting
//! 6. named-choice inlining
//! 7. union resolution (discriminators, recognizers, ambiguity)
//! 8. validation and freezing
//!
//! Every pass is deterministic: traversal follows declaration order and
//! all synthesized names come from the context's allocator.

pub mod hoist;
pub mod normalize;
pub mod references;
pub mod union;

use polyschema_core::{ConversionContext, ResolvedSchema, Result, Schema, TypeNode, pascal_case};

/// Run every resolution pass and freeze the result.
pub fn resolve(mut schema: Schema, ctx: &mut ConversionContext) -> Result<ResolvedSchema> {
    references::assign_namespaces(&mut schema, ctx)?;
    references::qualify_references(&mut schema, ctx)?;
    references::check_alias_cycles(&schema, ctx)?;
    normalize::normalize(&mut schema);
    hoist::hoist_anonymous(&mut schema, ctx);
    normalize::inline_choices(&mut schema);
    normalize::normalize(&mut schema);
    union::resolve_unions(&mut schema, ctx)?;
    polyschema_core::validate(&schema, ctx)?;
    let resolved = ResolvedSchema::new(schema, ctx.dialect)?;
    tracing::debug!(
        dialect = %ctx.dialect,
        types = resolved.schema().types.len(),
        "schema resolved"
    );
    Ok(resolved)
}

/// Position of a child node below its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Field(String),
    Item,
    Key,
    Value,
    /// Zero-based variant index.
    Variant(usize),
}

impl Segment {
    /// Label used in error paths.
    pub(crate) fn path_label(&self) -> String {
        match self {
            Segment::Field(name) => format!("fields/{name}"),
            Segment::Item => "items".to_string(),
            Segment::Key => "keys".to_string(),
            Segment::Value => "values".to_string(),
            Segment::Variant(i) => format!("variants/{i}"),
        }
    }

    /// Fragment used when synthesizing type names.
    pub(crate) fn name_part(&self) -> String {
        match self {
            Segment::Field(name) => pascal_case(name),
            Segment::Item => "Item".to_string(),
            Segment::Key => "Key".to_string(),
            Segment::Value => "Value".to_string(),
            Segment::Variant(i) => format!("Option{}", i + 1),
        }
    }
}

pub(crate) fn labeled_children_mut(node: &mut TypeNode) -> Vec<(Segment, &mut TypeNode)> {
    match node {
        TypeNode::Record(r) => r
            .fields
            .iter_mut()
            .map(|f| (Segment::Field(f.name.clone()), &mut f.ty))
            .collect(),
        TypeNode::Array(c) | TypeNode::Set(c) => vec![(Segment::Item, &mut *c.items)],
        TypeNode::Map(m) => vec![(Segment::Key, &mut *m.keys), (Segment::Value, &mut *m.values)],
        TypeNode::Choice(c) => c
            .variants
            .iter_mut()
            .enumerate()
            .map(|(i, v)| (Segment::Variant(i), &mut v.node))
            .collect(),
        TypeNode::Primitive(_) | TypeNode::Enum(_) | TypeNode::Reference { .. } => Vec::new(),
    }
}

pub(crate) fn append_path(path: &polyschema_core::SchemaPath, segment: &Segment) -> polyschema_core::SchemaPath {
    segment
        .path_label()
        .split('/')
        .fold(path.clone(), |p, part| p.join(part))
}
