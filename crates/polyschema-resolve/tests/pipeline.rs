use polyschema_core::{
    ChoiceType, ConversionContext, Dialect, Field, NamedType, QualifiedName, RecordType, Scalar,
    Schema, TypeNode,
};
use polyschema_resolve::resolve;
use serde_json::json;

fn record(fields: Vec<Field>) -> TypeNode {
    TypeNode::Record(RecordType {
        fields,
        ..RecordType::default()
    })
}

/// An order with inline nested records, an optional nullable field and an
/// anonymous union of two inline records.
fn order() -> Schema {
    let mut schema = Schema::new();
    schema.add(NamedType::record(
        QualifiedName::parse("Order"),
        vec![
            Field::required("id", TypeNode::primitive(Scalar::Uuid)),
            Field::optional("note", TypeNode::choice(vec![TypeNode::null(), TypeNode::string()])),
            Field::required(
                "shipping",
                record(vec![
                    Field::required("street", TypeNode::string()),
                    Field::required("geo", record(vec![Field::required("lat", TypeNode::primitive(Scalar::Float64))])),
                ]),
            ),
            Field::required(
                "payment",
                TypeNode::choice(vec![
                    record(vec![Field::required("iban", TypeNode::string())]),
                    record(vec![Field::required("card", TypeNode::string())]),
                ]),
            ),
        ],
    ));
    schema.root = Some(QualifiedName::parse("Order"));
    schema
}

fn run() -> polyschema_core::ResolvedSchema {
    let mut ctx = ConversionContext::new(Dialect::JsonSchema).with_uri("urn:acme:orders");
    resolve(order(), &mut ctx).unwrap()
}

#[test]
fn resolves_names_and_unions() {
    let resolved = run();
    let names: Vec<String> = resolved.closure().iter().map(|d| d.name.full()).collect();
    assert_eq!(
        names,
        vec![
            "acme.orders.Order",
            "acme.orders.Shipping",
            "acme.orders.Geo",
            "acme.orders.PaymentOption1",
            "acme.orders.PaymentOption2",
        ]
    );

    let TypeNode::Record(order) = &resolved.root().unwrap().node else {
        panic!("root is not a record");
    };
    assert_eq!(order.field("note").unwrap().ty, TypeNode::string());
    let TypeNode::Choice(ChoiceType { resolution: Some(res), .. }) = &order.field("payment").unwrap().ty else {
        panic!("payment is not a resolved choice");
    };
    assert_eq!(res.dispatch(&json!({"card": "4111"})), Some(1));
}

#[test]
fn repeated_runs_are_identical() {
    assert_eq!(run(), run());
}

#[test]
fn dangling_reference_fails() {
    let mut schema = order();
    schema.add(NamedType::record(
        QualifiedName::parse("Broken"),
        vec![Field::required("x", TypeNode::reference(QualifiedName::parse("Missing")))],
    ));
    let mut ctx = ConversionContext::new(Dialect::Avro);
    let err = resolve(schema, &mut ctx).unwrap_err();
    assert!(matches!(err, polyschema_core::Error::UnresolvedReference { .. }));
}
