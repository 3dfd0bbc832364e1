//! Cross-dialect conversions over the fixtures in `tests/fixtures`.

use polyschema_core::{
    ConversionContext, Dialect, Error, Field, MapType, NamedType, QualifiedName, ResolvedSchema,
    Scalar, Schema, TypeNode,
};
use polyschema_formats::{ExportOptions, LossyPolicy, NamedTypePolicy, exporter, importer};
use serde_json::{Value, json};

fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("{path}: {e}"))
}

fn import(dialect: Dialect, document_name: &str, text: &str) -> ResolvedSchema {
    let mut ctx = ConversionContext::new(dialect).with_document_name(document_name);
    importer(dialect).unwrap().import(text, &mut ctx).unwrap()
}

fn export(dialect: Dialect, schema: &ResolvedSchema, options: &ExportOptions) -> String {
    exporter(dialect).unwrap().export(schema, options).unwrap()
}

fn order() -> ResolvedSchema {
    import(Dialect::JsonSchema, "order.schema.json", &fixture("order.schema.json"))
}

fn resolve(schema: Schema) -> ResolvedSchema {
    let mut ctx = ConversionContext::new(Dialect::Ir);
    polyschema_resolve::resolve(schema, &mut ctx).unwrap()
}

#[test]
fn json_schema_through_avro_rebuilds_the_ir() {
    let original = order();
    for named_types in [NamedTypePolicy::Reference, NamedTypePolicy::Inline] {
        let options = ExportOptions {
            named_types,
            ..ExportOptions::default()
        };
        let avro = export(Dialect::Avro, &original, &options);
        let back = import(Dialect::Avro, "order.avsc", &avro);
        assert_eq!(back.schema(), original.schema(), "{named_types:?}");
    }
}

#[test]
fn json_schema_round_trips_under_both_policies() {
    let original = order();
    for named_types in [NamedTypePolicy::Reference, NamedTypePolicy::Inline] {
        let options = ExportOptions {
            named_types,
            ..ExportOptions::default()
        };
        let text = export(Dialect::JsonSchema, &original, &options);
        let back = import(Dialect::JsonSchema, "order.schema.json", &text);
        assert_eq!(back.schema(), original.schema(), "{named_types:?}");
    }
}

#[test]
fn avro_through_json_schema_keeps_logical_types() {
    let original = import(Dialect::Avro, "drawing.avsc", &fixture("drawing.avsc"));
    let text = export(Dialect::JsonSchema, &original, &ExportOptions::default());
    let back = import(Dialect::JsonSchema, "drawing.schema.json", &text);
    assert_eq!(back.schema(), original.schema());

    let doc: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        doc["$defs"]["geo.Drawing"]["properties"]["createdAt"],
        json!({
            "type": "string",
            "format": "date-time",
            "x-polyschema": { "type": { "timestamp": { "precision": "micros", "local": false } } }
        })
    );
}

#[test]
fn discriminated_json_schema_gets_one_tag_enum() {
    let schema = order();
    let enums: Vec<String> = schema
        .types()
        .filter(|d| matches!(d.node, TypeNode::Enum(_)))
        .map(|d| d.name.full())
        .collect();
    assert_eq!(enums.len(), 2, "{enums:?}");
    assert!(enums.contains(&"com.acme.orders.OrderPaymentMethod".to_string()));

    let TypeNode::Record(card) = &schema.lookup("com.acme.orders.Card").unwrap().node else {
        panic!("Card is not a record");
    };
    let method = card.field("method").unwrap();
    assert_eq!(method.ty, TypeNode::reference(QualifiedName::parse("com.acme.orders.OrderPaymentMethod")));
    assert_eq!(method.default.as_ref().and_then(|d| d.as_str()), Some("card"));
}

#[test]
fn avro_variants_share_the_tag_enum() {
    let schema = import(Dialect::Avro, "drawing.avsc", &fixture("drawing.avsc"));
    let enums: Vec<String> = schema
        .types()
        .filter(|d| matches!(d.node, TypeNode::Enum(_)))
        .map(|d| d.name.full())
        .collect();
    assert_eq!(enums, vec!["geo.Kind"]);

    let TypeNode::Record(drawing) = &schema.lookup("geo.Drawing").unwrap().node else {
        panic!("Drawing is not a record");
    };
    let TypeNode::Array(shapes) = &drawing.field("shapes").unwrap().ty else {
        panic!("shapes is not an array");
    };
    let TypeNode::Choice(choice) = &*shapes.items else {
        panic!("shape items are not a choice");
    };
    let resolution = choice.resolution.as_ref().unwrap();
    let disc = resolution.discriminator.as_ref().unwrap();
    assert_eq!(disc.tag_enum.full(), "geo.Kind");
    assert_eq!(disc.tags, ["circle", "square", "triangle"]);
    assert_eq!(resolution.dispatch(&json!({"kind": "triangle", "base": 1.0, "height": 2.0})), Some(2));
}

#[test]
fn text_or_number_value_dispatches_by_shape() {
    let schema = import(Dialect::JsonSchema, "value.schema.json", &fixture("value.schema.json"));
    let root = schema.root().unwrap();
    let TypeNode::Record(cell) = &root.node else {
        panic!("Cell is not a record");
    };
    let TypeNode::Choice(value) = &cell.field("value").unwrap().ty else {
        panic!("value is not a choice");
    };
    let names: Vec<&str> = value.variants.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["TextValue", "NumberValue"]);

    let resolution = value.resolution.as_ref().unwrap();
    assert_eq!(resolution.dispatch(&json!({"numberValue": 2.5})), Some(1));
    assert_eq!(resolution.dispatch(&json!({"textValue": "2.5"})), Some(0));
    assert_eq!(resolution.dispatch(&json!({"textValue": 2.5})), None);

    let avro: Value = serde_json::from_str(&export(Dialect::Avro, &schema, &ExportOptions::default())).unwrap();
    insta::assert_snapshot!(
        serde_json::to_string(&avro).unwrap(),
        @r#"[{"type":"record","name":"TextValue","namespace":"value","fields":[{"name":"textValue","type":"string"}]},{"type":"record","name":"NumberValue","namespace":"value","fields":[{"name":"numberValue","type":"double"}]},{"type":"record","name":"Cell","namespace":"value","fields":[{"name":"value","type":["value.TextValue","value.NumberValue"]}],"polyschema":{"root":true}}]"#
    );
}

#[test]
fn fail_policy_refuses_substitutions() {
    let options = ExportOptions {
        lossy: LossyPolicy::Fail,
        ..ExportOptions::default()
    };
    let err = exporter(Dialect::Avro).unwrap().export(&order(), &options).unwrap_err();
    assert!(matches!(err, Error::UnsupportedConstruct { .. }));
    assert_eq!(
        err.to_string(),
        "avro: unsupported construct at /types/com.acme.orders.Order/fields/tags: set"
    );
}

#[test]
fn envelope_columns_are_dropped_on_import() {
    let original = order();
    let options = ExportOptions {
        envelope: true,
        ..ExportOptions::default()
    };
    let text = export(Dialect::Avro, &original, &options);
    let doc: Value = serde_json::from_str(&text).unwrap();
    let root = doc.as_array().and_then(|list| list.last()).unwrap();
    let fields = root["fields"].as_array().unwrap();
    let columns: Vec<&str> = fields
        .iter()
        .filter_map(|f| f["name"].as_str())
        .filter(|n| n.starts_with("___"))
        .collect();
    assert_eq!(columns, ["___type", "___source", "___id", "___time", "___subject"]);
    assert_eq!(fields[9]["default"], json!("com.acme.orders.Order"));

    let back = import(Dialect::Avro, "order.avsc", &text);
    assert_eq!(back.schema(), original.schema());
}

#[test]
fn integer_map_keys_survive_json_schema_but_not_avro() {
    let mut schema = Schema::new();
    let name = QualifiedName::parse("stock.Levels");
    schema.add(NamedType::record(
        name.clone(),
        vec![Field::required(
            "byWarehouse",
            TypeNode::Map(MapType {
                keys: Box::new(TypeNode::primitive(Scalar::Int32)),
                values: Box::new(TypeNode::primitive(Scalar::Int64)),
            }),
        )],
    ));
    schema.root = Some(name);
    let resolved = resolve(schema);

    let err = exporter(Dialect::Avro)
        .unwrap()
        .export(&resolved, &ExportOptions::default())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "avro: unsupported construct at /types/stock.Levels/fields/byWarehouse: non-string map keys"
    );

    let text = export(Dialect::JsonSchema, &resolved, &ExportOptions::default());
    let back = import(Dialect::JsonSchema, "levels.json", &text);
    assert_eq!(back.schema(), resolved.schema());
}

#[test]
fn recursive_union_has_no_avro_form() {
    let mut schema = Schema::new();
    let json_value = QualifiedName::parse("doc.Json");
    schema.add(NamedType::new(
        json_value.clone(),
        TypeNode::choice(vec![
            TypeNode::null(),
            TypeNode::string(),
            TypeNode::array(TypeNode::reference(json_value.clone())),
        ]),
    ));
    let root = QualifiedName::parse("doc.Document");
    schema.add(NamedType::record(
        root.clone(),
        vec![Field::required("body", TypeNode::reference(json_value))],
    ));
    schema.root = Some(root);
    let resolved = resolve(schema);

    let err = exporter(Dialect::Avro)
        .unwrap()
        .export(&resolved, &ExportOptions::default())
        .unwrap_err();
    assert!(err.to_string().ends_with("recursive union"), "{err}");
    assert!(exporter(Dialect::JsonSchema).unwrap().export(&resolved, &ExportOptions::default()).is_ok());
}

#[test]
fn root_self_reference_builds_a_linked_list() {
    let text = r##"{
        "title": "Node",
        "type": "object",
        "properties": {
            "value": { "type": "integer" },
            "next": { "$ref": "#" }
        },
        "required": ["value"]
    }"##;
    let schema = import(Dialect::JsonSchema, "list.schema.json", text);
    let root = schema.root().unwrap();
    assert!(schema.schema().is_recursive(&root.name));

    let TypeNode::Record(node) = &root.node else {
        panic!("Node is not a record");
    };
    let next = node.field("next").unwrap();
    let target = match &next.ty {
        TypeNode::Choice(c) => c.nullable_inner().cloned(),
        other => Some(other.clone()),
    };
    assert_eq!(target, Some(TypeNode::reference(root.name.clone())));
}

fn shapes() -> ResolvedSchema {
    let mut schema = Schema::new();
    let circle = QualifiedName::parse("p.Circle");
    let square = QualifiedName::parse("p.Square");
    schema.add(NamedType::record(
        circle.clone(),
        vec![Field::required("radius", TypeNode::primitive(Scalar::Float64))],
    ));
    schema.add(NamedType::record(
        square.clone(),
        vec![Field::required("side", TypeNode::primitive(Scalar::Int64))],
    ));
    let root = QualifiedName::parse("p.Shape");
    schema.add(NamedType::new(
        root.clone(),
        TypeNode::choice(vec![
            TypeNode::reference(circle),
            TypeNode::reference(square),
            TypeNode::string(),
        ]),
    ));
    schema.root = Some(root);
    resolve(schema)
}

#[test]
fn root_union_keeps_its_name_through_avro() {
    let original = shapes();
    for named_types in [NamedTypePolicy::Reference, NamedTypePolicy::Inline] {
        let options = ExportOptions {
            named_types,
            ..ExportOptions::default()
        };
        let avro = export(Dialect::Avro, &original, &options);
        let doc: Value = serde_json::from_str(&avro).unwrap();
        assert_eq!(doc[2], json!({ "type": "string", "polyschema": { "union": "p.Shape" } }));

        let back = import(Dialect::Avro, "unrelated.avsc", &avro);
        assert_eq!(back.root().map(|r| r.name.full()), Some("p.Shape".to_string()));
        assert_eq!(back.schema(), original.schema(), "{named_types:?}");
    }

    let options = ExportOptions {
        lossy: LossyPolicy::Fail,
        ..ExportOptions::default()
    };
    let err = exporter(Dialect::Avro).unwrap().export(&original, &options).unwrap_err();
    assert_eq!(err.to_string(), "avro: unsupported construct at /types/p.Shape: named union");
}

#[test]
fn huge_length_bounds_resolve() {
    let text = r#"{
        "title": "Id",
        "oneOf": [
            { "type": "integer" },
            { "type": "string", "minLength": 1000000000000000000 }
        ]
    }"#;
    let schema = import(Dialect::JsonSchema, "id.schema.json", text);
    let TypeNode::Choice(choice) = &schema.root().unwrap().node else {
        panic!("Id is not a choice");
    };
    let resolution = choice.resolution.as_ref().unwrap();
    assert_eq!(resolution.dispatch(&json!(7)), Some(0));
    assert_eq!(resolution.dispatch(&json!("a")), Some(1));
}
