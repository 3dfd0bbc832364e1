use criterion::{Criterion, black_box, criterion_group, criterion_main};
use polyschema::core::Dialect;
use polyschema::{Converter, Document, Job, Target};

fn fixture(name: &str) -> Document {
    let path = format!(
        "{}/../crates/polyschema-formats/tests/fixtures/{name}",
        env!("CARGO_MANIFEST_DIR")
    );
    Document::read(path.as_ref()).expect("fixture")
}

fn bench_convert(c: &mut Criterion) {
    let converter = Converter::default();
    let order = fixture("order.schema.json");
    let drawing = fixture("drawing.avsc");

    let mut group = c.benchmark_group("convert");
    for target in ["avro", "json-schema", "rust", "typescript"] {
        let target = Target::parse(target).expect("target");
        group.bench_function(format!("order.schema.json -> {}", target.name()), |b| {
            b.iter(|| converter.convert(Dialect::JsonSchema, black_box(&order), target))
        });
    }
    group.bench_function("drawing.avsc -> json-schema", |b| {
        b.iter(|| converter.convert(Dialect::Avro, black_box(&drawing), Target::Dialect(Dialect::JsonSchema)))
    });
    group.finish();

    let jobs: Vec<Job> = (0..32)
        .map(|i| Job {
            source: Dialect::JsonSchema,
            document: order.clone(),
            target: Target::Dialect(if i % 2 == 0 { Dialect::Avro } else { Dialect::Ir }),
        })
        .collect();
    c.bench_function("convert_batch/32", |b| b.iter(|| converter.convert_batch(black_box(&jobs))));
}

criterion_group!(benches, bench_convert);
criterion_main!(benches);
