//! Serializer benchmarks for tether-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::Value;
use tether_protocol::{JsonSerializer, Message, MsgPackSerializer, Payload, Serializer};

fn sample(size: usize) -> Message {
    let mut payload = Payload::new();
    payload.insert("body".into(), Value::String("x".repeat(size)));
    Message::new("room:lobby", "new_msg", payload, Some(2))
}

fn bench_encode(c: &mut Criterion) {
    let msg = sample(64);

    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("json_64B", |b| {
        b.iter(|| JsonSerializer.encode(black_box(&msg)))
    });
    group.bench_function("msgpack_64B", |b| {
        b.iter(|| MsgPackSerializer.encode(black_box(&msg)))
    });
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let msg = sample(64);
    let json = JsonSerializer.encode(&msg).unwrap();
    let msgpack = MsgPackSerializer.encode(&msg).unwrap();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(json.len() as u64));
    group.bench_function("json_64B", |b| {
        b.iter(|| JsonSerializer.decode(black_box(json.as_bytes())))
    });
    group.bench_function("msgpack_64B", |b| {
        b.iter(|| MsgPackSerializer.decode(black_box(msgpack.as_bytes())))
    });
    group.finish();
}

fn bench_roundtrip(c: &mut Criterion) {
    let msg = sample(256);

    c.bench_function("json_roundtrip_256B", |b| {
        b.iter(|| {
            let frame = JsonSerializer.encode(black_box(&msg)).unwrap();
            JsonSerializer.decode(black_box(frame.as_bytes())).unwrap()
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_roundtrip);
criterion_main!(benches);
