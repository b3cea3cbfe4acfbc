//! IPC throughput benchmark.
//!
//! Measures frame read/write latency, request decoding, and a full
//! `tools/call` dispatch against an in-memory people store using Criterion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use toolbridge::ipc::codec::{read_frame, write_frame, MSG_REQUEST};
use toolbridge::ipc::protocol::{decode, encode, WireRequest};
use toolbridge::ipc::router::route_request;
use toolbridge::ipc::{ConnectionState, ServerContext};
use toolbridge::tools;

const MAX_FRAME: u32 = 5 * 1024 * 1024;

fn bench_write_frame(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let payload_sizes: &[usize] = &[1, 64, 1024, 4096, 65536];

    let mut group = c.benchmark_group("write_frame");
    for &size in payload_sizes {
        let payload = vec![0xABu8; size];
        group.bench_with_input(BenchmarkId::from_parameter(size), &payload, |b, p| {
            b.iter(|| {
                rt.block_on(async {
                    let mut buf = Vec::with_capacity(size + 5);
                    write_frame(&mut buf, MSG_REQUEST, black_box(p)).await.unwrap();
                    buf
                })
            });
        });
    }
    group.finish();
}

fn bench_read_frame(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let payload_sizes: &[usize] = &[1, 64, 1024, 4096, 65536];

    let mut group = c.benchmark_group("read_frame");
    for &size in payload_sizes {
        let payload = vec![0xABu8; size];
        let wire = rt.block_on(async {
            let mut buf = Vec::new();
            write_frame(&mut buf, MSG_REQUEST, &payload).await.unwrap();
            buf
        });

        group.bench_with_input(BenchmarkId::from_parameter(size), &wire, |b, w| {
            b.iter(|| {
                rt.block_on(async {
                    let mut cursor = Cursor::new(black_box(w.as_slice()));
                    read_frame(&mut cursor, MAX_FRAME).await.unwrap()
                })
            });
        });
    }
    group.finish();
}

fn bench_decode_request(c: &mut Criterion) {
    let request = WireRequest {
        id: "bench-1".to_string(),
        method: "tools/call".to_string(),
        params: json!({
            "name": "read_data",
            "arguments": {"query": "SELECT name, age FROM people WHERE age > 30"}
        }),
    };
    let payload = encode(&request).unwrap();

    c.bench_function("decode_call_request", |b| {
        b.iter(|| decode::<WireRequest>(black_box(&payload)).unwrap());
    });
}

fn bench_call_tool(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("bench.db");
    let registry = tools::store_registry(db.to_str().unwrap(), false).unwrap();
    let ctx = ServerContext {
        registry: Arc::new(registry),
        name: "people-store".to_string(),
        path: None,
        request_timeout: Duration::from_secs(5),
    };

    let mut state = ConnectionState::default();
    rt.block_on(async {
        route_request(&ctx, &mut state, "initialize", json!({})).await.unwrap();
        for i in 0..32 {
            let insert = format!(
                "INSERT INTO people (name, age, profession) VALUES ('p{}', {}, 'Tester')",
                i,
                20 + i
            );
            route_request(
                &ctx,
                &mut state,
                "tools/call",
                json!({"name": "add_data", "arguments": {"query": insert}}),
            )
            .await
            .unwrap();
        }
    });

    c.bench_function("call_read_data_32_rows", |b| {
        b.iter(|| {
            rt.block_on(async {
                route_request(
                    &ctx,
                    &mut state,
                    "tools/call",
                    black_box(json!({"name": "read_data"})),
                )
                .await
                .unwrap()
            })
        });
    });
}

criterion_group!(
    benches,
    bench_write_frame,
    bench_read_frame,
    bench_decode_request,
    bench_call_tool
);
criterion_main!(benches);
