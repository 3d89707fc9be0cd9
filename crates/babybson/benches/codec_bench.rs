use babybson::{decode_document, encode_document, Document, DocumentWriter, EncodeResult, Value};
use criterion::{criterion_group, criterion_main, Criterion};

fn sample() -> Document {
    Document::builder()
        .append("name", "Ada")
        .append("age", 16i64)
        .append("active", true)
        .append("score", 99.5f64)
        .build()
}

fn nested() -> Document {
    Document::builder()
        .append("name", "Ada")
        .append_document("address", |b| {
            b.append("street", "123 Main St").append("city", "London")
        })
        .append_array("tags", (0..32).map(Value::Int32))
        .build()
}

fn bench_document_creation(c: &mut Criterion) {
    c.bench_function("document_create", |b| b.iter(sample));
}

fn bench_document_encode(c: &mut Criterion) {
    let doc = sample();
    c.bench_function("document_encode", |b| b.iter(|| encode_document(&doc)));
}

fn bench_document_decode(c: &mut Criterion) {
    let encoded = encode_document(&sample()).unwrap();
    c.bench_function("document_decode", |b| b.iter(|| decode_document(&encoded)));
}

fn bench_nested_document(c: &mut Criterion) {
    let doc = nested();
    let encoded = encode_document(&doc).unwrap();
    c.bench_function("nested_document_encode", |b| b.iter(|| encode_document(&doc)));
    c.bench_function("nested_document_decode", |b| b.iter(|| decode_document(&encoded)));
}

fn bench_streaming_writer(c: &mut Criterion) {
    c.bench_function("writer_encode", |b| {
        b.iter(|| -> EncodeResult<Vec<u8>> {
            let mut writer = DocumentWriter::new();
            writer.append("name", "Ada")?;
            writer.append("age", 16i64)?;
            writer.start_array("tags")?;
            for i in 0..32 {
                writer.push(i)?;
            }
            writer.end_array()?;
            writer.finish()
        })
    });
}

criterion_group!(
    benches,
    bench_document_creation,
    bench_document_encode,
    bench_document_decode,
    bench_nested_document,
    bench_streaming_writer,
);

criterion_main!(benches);
