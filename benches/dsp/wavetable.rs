//! Benchmarks for wavetable playback and table lookup.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use morphsynth::dsp::{oscillator::TableOscillator, wavetable::WavetableManager};

use crate::BLOCK_SIZES;

pub fn bench_wavetable(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/wavetable");
    let tables = WavetableManager::new();
    let sample_rate = 48_000.0;

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        let Some(handle) = tables.lookup("reeseBlend", 0.5) else {
            continue;
        };
        let table = tables.table(handle);
        let mut osc = TableOscillator::new();
        group.bench_with_input(BenchmarkId::new("playback", size), &size, |b, _| {
            b.iter(|| {
                for out in buffer.iter_mut() {
                    *out = osc.next_sample(black_box(table), 110.0, sample_rate);
                }
            })
        });

        // morph sweep: one lookup per 32-sample control block
        let mut osc = TableOscillator::new();
        let mut morph = 0.0f32;
        group.bench_with_input(BenchmarkId::new("morph_sweep", size), &size, |b, _| {
            b.iter(|| {
                for chunk in buffer.chunks_mut(32) {
                    morph = (morph + 0.01) % 1.0;
                    let Some(handle) = tables.lookup("smoothSaw", black_box(morph)) else {
                        continue;
                    };
                    let table = tables.table(handle);
                    for out in chunk.iter_mut() {
                        *out = osc.next_sample(table, 110.0, sample_rate);
                    }
                }
            })
        });
    }

    // building every bank happens once per engine
    group.bench_function("build_bank", |b| b.iter(|| black_box(WavetableManager::new())));

    group.finish();
}
