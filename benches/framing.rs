// SPDX-License-Identifier: MIT
//
// Framing hot-path benchmarks.
//
// Run with:
//   cargo bench --bench framing
//
// Groups:
//   encode_first  — building the first wire chunk for payloads of various sizes
//   decode_header — pulling count/tag back out of a first chunk

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pipemesh::frame::{decode_header, encode_first, ANY_TAG};

const SIZES: &[(&str, usize)] = &[
    ("zero_0", 0),
    ("small_64", 64),
    ("first_chunk_504", 504),
    ("multi_chunk_4096", 4096),
];

fn bench_encode_first(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_first");

    for &(label, size) in SIZES {
        let payload = vec![0xABu8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(label), &payload, |b, data| {
            b.iter(|| black_box(encode_first(ANY_TAG, data)));
        });
    }

    group.finish();
}

fn bench_decode_header(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_header");
    let (chunk, _) = encode_first(7, &[0xCDu8; 64]);

    group.bench_function("decode_header", |b| {
        b.iter(|| black_box(decode_header(&chunk)));
    });

    group.finish();
}

criterion_group!(benches, bench_encode_first, bench_decode_header);
criterion_main!(benches);
