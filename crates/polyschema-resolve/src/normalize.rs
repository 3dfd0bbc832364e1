//! Choice normalization: optional-field collapsing, flattening and
//! inlining of named choices.

use polyschema_core::{ChoiceType, Field, QualifiedName, Schema, TypeNode, Variant};
use std::collections::HashMap;

/// Normalize every node of every named type.
pub fn normalize(schema: &mut Schema) {
    for def in schema.types.values_mut() {
        normalize_node(&mut def.node);
    }
}

/// Children first, then:
/// - optional fields lose the `null` branch of their choice
/// - selector-less choices nested in a choice are spliced into it
/// - identical variants are merged
pub fn normalize_node(node: &mut TypeNode) {
    for child in node.children_mut() {
        normalize_node(child);
    }
    match node {
        TypeNode::Record(r) => r.fields.iter_mut().for_each(collapse_optional),
        TypeNode::Choice(c) => flatten(c),
        _ => {}
    }
}

fn collapse_optional(field: &mut Field) {
    if field.required {
        return;
    }
    let single = match &mut field.ty {
        TypeNode::Choice(c) if c.selector.is_none() && c.has_null() => {
            if c.variants.iter().all(|v| v.node.is_null()) {
                return;
            }
            c.variants.retain(|v| !v.node.is_null());
            if c.variants.len() == 1 { c.variants.pop() } else { None }
        }
        _ => None,
    };
    if let Some(variant) = single {
        field.ty = variant.node;
    }
    if field.default.as_ref().is_some_and(|d| d.is_null()) {
        field.default = None;
    }
}

fn flatten(choice: &mut ChoiceType) {
    let mut out: Vec<Variant> = Vec::new();
    for variant in choice.variants.drain(..) {
        let Variant { name, node, tag } = variant;
        match node {
            TypeNode::Choice(inner) if inner.selector.is_none() => {
                for v in inner.variants {
                    push_unique(&mut out, v);
                }
            }
            node => push_unique(&mut out, Variant { name, node, tag }),
        }
    }
    choice.variants = out;
}

fn push_unique(out: &mut Vec<Variant>, variant: Variant) {
    if !out.iter().any(|v| v.node == variant.node && v.tag == variant.tag) {
        out.push(variant);
    }
}

/// Replace references to named choices by the choice itself.
///
/// The root and choices that reach themselves through references stay
/// named; inlined choice types are removed from the table.
pub fn inline_choices(schema: &mut Schema) {
    let targets: HashMap<QualifiedName, TypeNode> = schema
        .types
        .iter()
        .filter(|(name, def)| {
            matches!(def.node, TypeNode::Choice(_))
                && schema.root.as_ref() != Some(*name)
                && !schema.is_recursive(name)
        })
        .map(|(name, def)| (name.clone(), def.node.clone()))
        .collect();
    if targets.is_empty() {
        return;
    }
    for def in schema.types.values_mut() {
        if targets.contains_key(&def.name) {
            continue;
        }
        def.node.walk_mut(&mut |node| {
            let replacement = node.as_reference().and_then(|name| targets.get(name));
            if let Some(choice) = replacement {
                *node = choice.clone();
            }
        });
    }
    schema.types.retain(|name, _| !targets.contains_key(name));
    tracing::debug!(inlined = targets.len(), "inlined named choices");
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyschema_core::{Literal, NamedType, Scalar};

    #[test]
    fn optional_field_drops_null_branch() {
        let mut node = TypeNode::Record(polyschema_core::RecordType {
            fields: vec![
                Field::optional("note", TypeNode::choice(vec![TypeNode::null(), TypeNode::string()]))
                    .with_default(Literal::Null),
                Field::required("tag", TypeNode::choice(vec![TypeNode::null(), TypeNode::string()])),
            ],
            ..Default::default()
        });
        normalize_node(&mut node);
        let TypeNode::Record(r) = &node else { unreachable!() };
        assert_eq!(r.fields[0].ty, TypeNode::string());
        assert_eq!(r.fields[0].default, None);
        assert!(matches!(r.fields[1].ty, TypeNode::Choice(_)));
    }

    #[test]
    fn nested_choices_flatten() {
        let mut node = TypeNode::choice(vec![
            TypeNode::null(),
            TypeNode::choice(vec![TypeNode::string(), TypeNode::primitive(Scalar::Int64)]),
            TypeNode::string(),
        ]);
        normalize_node(&mut node);
        let TypeNode::Choice(c) = &node else { unreachable!() };
        let names: Vec<&str> = c.variants.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["null", "string", "int64"]);
    }

    #[test]
    fn named_choice_is_inlined_unless_recursive() {
        let mut schema = Schema::new();
        schema.add(NamedType::new(
            QualifiedName::parse("d.Scalar"),
            TypeNode::choice(vec![TypeNode::string(), TypeNode::primitive(Scalar::Float64)]),
        ));
        schema.add(NamedType::new(
            QualifiedName::parse("d.Json"),
            TypeNode::choice(vec![
                TypeNode::null(),
                TypeNode::array(TypeNode::reference(QualifiedName::parse("d.Json"))),
            ]),
        ));
        schema.add(NamedType::record(
            QualifiedName::parse("d.Cell"),
            vec![
                Field::required("value", TypeNode::reference(QualifiedName::parse("d.Scalar"))),
                Field::required("raw", TypeNode::reference(QualifiedName::parse("d.Json"))),
            ],
        ));
        inline_choices(&mut schema);
        assert!(schema.lookup("d.Scalar").is_none());
        assert!(schema.lookup("d.Json").is_some());
        let TypeNode::Record(cell) = &schema.lookup("d.Cell").unwrap().node else { unreachable!() };
        assert!(matches!(cell.fields[0].ty, TypeNode::Choice(_)));
    }
}
