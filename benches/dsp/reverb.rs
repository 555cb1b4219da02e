//! Benchmarks for the convolution reverb.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use morphsynth::dsp::{random::DeterministicRandom, reverb::ConvolutionReverb};

use crate::BLOCK_SIZES;

pub fn bench_reverb(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/reverb");
    let sample_rate = 48_000.0;

    for &size in BLOCK_SIZES {
        // impulse-like start with a quiet tail
        let input: Vec<f32> = (0..size)
            .map(|i| {
                if i < 10 {
                    1.0 - (i as f32 / 10.0)
                } else {
                    (i as f32 * 0.05).sin() * 0.1
                }
            })
            .collect();

        for (name, room) in [("small_room", 0.5), ("large_room", 3.0)] {
            let mut rng = DeterministicRandom::new(1);
            let mut reverb = ConvolutionReverb::new(sample_rate, room, &mut rng);
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    let mut sum = 0.0f32;
                    for &sample in &input {
                        let (l, r) = reverb.process(black_box(sample), black_box(-sample));
                        sum += l + r;
                    }
                    sum
                })
            });
        }
    }

    group.finish();
}
