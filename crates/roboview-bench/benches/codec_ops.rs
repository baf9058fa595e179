//! Criterion micro-benchmarks for message decoding and encoding.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use roboview_bench::{encoded, match_profile};
use roboview_protocol::{encode_frame, peek_header, Decoder};

/// Benchmark: decode one full frame of a 22-agent match.
fn bench_decode_full_frame(c: &mut Criterion) {
    let frames = match_profile(1);
    let message = encoded(&frames).remove(0);

    c.bench_function("decode_full_frame_22", |b| {
        b.iter(|| {
            let frame = Decoder::new().decode(message.as_bytes()).unwrap();
            black_box(&frame);
        });
    });
}

/// Benchmark: decode one second of deltas (50 frames) with a carried decoder.
fn bench_decode_second(c: &mut Criterion) {
    let messages = encoded(&match_profile(50));

    c.bench_function("decode_second_22", |b| {
        b.iter(|| {
            let mut decoder = Decoder::new();
            for m in &messages {
                black_box(decoder.decode(m.as_bytes()).unwrap());
            }
        });
    });
}

/// Benchmark: header-only scan as used by the log index.
fn bench_peek_header(c: &mut Criterion) {
    let messages = encoded(&match_profile(50));

    c.bench_function("peek_header_second", |b| {
        b.iter(|| {
            for m in &messages {
                black_box(peek_header(m.as_bytes()).unwrap());
            }
        });
    });
}

/// Benchmark: encode one full frame.
fn bench_encode_full_frame(c: &mut Criterion) {
    let frame = match_profile(1).remove(0);

    c.bench_function("encode_full_frame_22", |b| {
        b.iter(|| black_box(encode_frame(&frame)));
    });
}

criterion_group!(
    benches,
    bench_decode_full_frame,
    bench_decode_second,
    bench_peek_header,
    bench_encode_full_frame
);
criterion_main!(benches);
