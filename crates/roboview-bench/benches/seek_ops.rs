//! Criterion benchmarks for log seeking with and without checkpoints.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use roboview_bench::{match_profile, AGENTS};
use roboview_protocol::Framing;
use roboview_source::LogCursor;
use roboview_test_utils::{moving_team, temp_log};

/// Benchmark: seek into a log with a full frame every second.
fn bench_seek_anchored(c: &mut Criterion) {
    let frames = match_profile(1_500);
    let log = temp_log(&frames, Framing::LengthPrefixed).unwrap();
    let mut cursor = LogCursor::open(log.path(), None).unwrap();
    cursor.frame_count().unwrap();

    c.bench_function("seek_anchored_30s", |b| {
        let mut k = 0usize;
        b.iter(|| {
            k = (k + 997) % frames.len();
            black_box(cursor.seek_frame(k).unwrap());
        });
    });
}

/// Benchmark: seek into a delta-only log, replaying from the start versus
/// from in-memory checkpoints.
fn bench_seek_deltas(c: &mut Criterion) {
    let frames = moving_team(1_500, AGENTS, 0);
    let log = temp_log(&frames, Framing::LengthPrefixed).unwrap();

    let mut group = c.benchmark_group("seek_deltas_30s");
    for interval in [None, Some(100)] {
        let mut cursor = LogCursor::open(log.path(), interval).unwrap();
        while cursor.next_frame().unwrap().is_some() {}
        let name = match interval {
            Some(n) => format!("checkpoint_{n}"),
            None => "from_start".to_owned(),
        };
        group.bench_function(name, |b| {
            let mut k = 0usize;
            b.iter(|| {
                k = (k + 997) % frames.len();
                black_box(cursor.seek_frame(k).unwrap());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_seek_anchored, bench_seek_deltas);
criterion_main!(benches);
