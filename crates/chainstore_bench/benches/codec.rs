//! Document codec benchmarks.

use chainstore_bench::random_document;
use chainstore_codec::{from_cbor, from_json, to_canonical_cbor, MutableDict, Value};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn nested(depth: usize, width: usize) -> Value {
    if depth == 0 {
        Value::from("leaf")
    } else {
        Value::dict((0..width).map(|i| (format!("key_{i}"), nested(depth - 1, width))))
    }
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let mut rng = rand::thread_rng();

    for fields in [4, 16, 64] {
        let value = random_document(&mut rng, fields);
        group.bench_with_input(BenchmarkId::new("document", fields), &value, |b, value| {
            b.iter(|| black_box(to_canonical_cbor(black_box(value)).unwrap()));
        });
    }

    let value = nested(4, 4);
    group.bench_function("nested_4x4", |b| {
        b.iter(|| black_box(to_canonical_cbor(black_box(&value)).unwrap()));
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let mut rng = rand::thread_rng();

    for fields in [4, 16, 64] {
        let bytes = to_canonical_cbor(&random_document(&mut rng, fields)).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("document", fields), &bytes, |b, bytes| {
            b.iter(|| black_box(from_cbor(black_box(bytes)).unwrap()));
        });
    }
    group.finish();
}

fn bench_overlay(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let value = random_document(&mut rng, 32);

    c.bench_function("overlay_set_reencode", |b| {
        b.iter(|| {
            let mut dict = MutableDict::from_value(value.clone()).unwrap();
            dict.set("field_3", "patched");
            black_box(dict.reencode().unwrap())
        });
    });
}

fn bench_json(c: &mut Criterion) {
    let json = format!(
        "[{}]",
        (0..100)
            .map(|i| format!(r#"{{"id":"p{i}","name":"Person {i}","age":{i},"tags":["a","b"]}}"#))
            .collect::<Vec<_>>()
            .join(",")
    );
    let mut group = c.benchmark_group("json");
    group.throughput(Throughput::Bytes(json.len() as u64));
    group.bench_function("from_json_100_docs", |b| {
        b.iter(|| black_box(from_json(black_box(&json)).unwrap()));
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_overlay, bench_json);
criterion_main!(benches);
