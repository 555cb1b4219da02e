//! Benchmarks for the whole engine: voices, matrix, drums, master and FX.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use morphsynth::{synth::Lane, EngineConfig, Synth};

use crate::BLOCK_SIZES;

pub fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/engine");

    for &size in BLOCK_SIZES {
        let mut left = vec![0.0f32; size];
        let mut right = vec![0.0f32; size];

        // one held chord with the rhythm bus ducking it
        let Ok(mut synth) = Synth::new(EngineConfig::default()) else {
            return;
        };
        if synth.load_preset("Pulse Gate Reese").is_err() {
            return;
        }
        synth.set_rhythm(true);
        for note in ["C2", "G2", "D#3", "A#3"] {
            let _ = synth.note_on(note, 0.9, Lane::Manual);
        }
        group.bench_with_input(BenchmarkId::new("chord_rhythm", size), &size, |b, _| {
            b.iter(|| synth.render(black_box(&mut left), black_box(&mut right)))
        });

        // every voice busy
        let Ok(mut synth) = Synth::new(EngineConfig::default()) else {
            return;
        };
        for note in 0..16u8 {
            let _ = synth.note_on(40 + note, 0.8, Lane::Manual);
        }
        group.bench_with_input(BenchmarkId::new("full_pool", size), &size, |b, _| {
            b.iter(|| synth.render(black_box(&mut left), black_box(&mut right)))
        });
    }

    group.finish();
}
