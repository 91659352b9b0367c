//! Benchmark suite for the hot per-notification path.
//!
//! Isolates frame decoding and batch accumulation from the async transport
//! so the per-sample cost can be measured and optimized directly.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use zephy_monitor::{Accumulator, Sample};

/// A fully populated frame as the firmware sends it.
fn full_frame() -> Vec<u8> {
    STANDARD.encode("10432,20911,97,68,38.4").into_bytes()
}

/// A short frame with trailing channels absent.
fn short_frame() -> Vec<u8> {
    STANDARD.encode("10432,20911").into_bytes()
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");
    group.throughput(Throughput::Elements(1));

    let full = full_frame();
    group.bench_function("full", |b| {
        b.iter(|| {
            let sample = zephy_monitor::decode(black_box(&full));
            black_box(sample)
        })
    });

    let short = short_frame();
    group.bench_function("short", |b| {
        b.iter(|| {
            let sample = zephy_monitor::decode(black_box(&short));
            black_box(sample)
        })
    });

    group.finish();
}

fn bench_accumulate(c: &mut Criterion) {
    let mut group = c.benchmark_group("accumulate");
    group.throughput(Throughput::Elements(500));

    let sample = Sample::at(chrono::Local::now(), 10432, 20911, 97, 68, 38.4);
    group.bench_function("fill_batch_of_500", |b| {
        b.iter(|| {
            let mut accumulator = Accumulator::new();
            let mut flushed = None;
            for _ in 0..500 {
                if let Some(batch) = accumulator.collect(black_box(sample.clone())) {
                    flushed = Some(batch);
                }
            }
            black_box(flushed)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_accumulate);
criterion_main!(benches);
