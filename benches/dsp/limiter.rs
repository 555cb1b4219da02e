//! Benchmarks for the master limiter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use morphsynth::dsp::dynamics::Limiter;

use crate::BLOCK_SIZES;

pub fn bench_limiter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/limiter");

    for &size in BLOCK_SIZES {
        // hot sine that keeps the limiter working
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.03).sin() * 1.8).collect();

        let mut limiter = Limiter::new(48_000.0, -1.0);
        group.bench_with_input(BenchmarkId::new("stereo_linked", size), &size, |b, _| {
            b.iter(|| {
                let mut sum = 0.0f32;
                for &sample in &input {
                    let (l, r) = limiter.process(black_box(sample), black_box(sample * 0.5));
                    sum += l + r;
                }
                sum
            })
        });
    }

    group.finish();
}
