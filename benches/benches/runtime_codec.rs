use criterion::{Criterion, black_box, criterion_group, criterion_main};
use polyschema::core::Dialect;
use polyschema::{Converter, Document};
use polyschema_runtime::{ContentType, Synthesizer, codec};

fn bench_codec(c: &mut Criterion) {
    let path = format!(
        "{}/../crates/polyschema-formats/tests/fixtures/order.schema.json",
        env!("CARGO_MANIFEST_DIR")
    );
    let document = Document::read(path.as_ref()).expect("fixture");
    let schema = Converter::default()
        .import(Dialect::JsonSchema, &document)
        .expect("order schema");
    let type_name = schema.root().expect("root").name.full();
    let values = Synthesizer::new(3).instances(&schema, &type_name, 64).expect("instances");

    let mut group = c.benchmark_group("codec");
    for content_type in ContentType::ALL {
        let encoded: Vec<Vec<u8>> = values
            .iter()
            .map(|v| codec::encode(&schema, &type_name, v, content_type).expect("encode"))
            .collect();
        group.bench_function(format!("encode {content_type}"), |b| {
            b.iter(|| {
                for value in &values {
                    black_box(codec::encode(&schema, &type_name, value, content_type).expect("encode"));
                }
            })
        });
        group.bench_function(format!("decode {content_type}"), |b| {
            b.iter(|| {
                for data in &encoded {
                    black_box(codec::decode(&schema, &type_name, data, content_type).expect("decode"));
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
