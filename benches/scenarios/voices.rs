//! Benchmarks for a full voice pool.

use std::{hint::black_box, sync::Arc};

use criterion::{BenchmarkId, Criterion};
use morphsynth::{
    dsp::wavetable::WavetableManager,
    graph::node::{RenderCtx, StereoNode},
    patch::PresetLibrary,
    synth::{pool::VoicePool, Lane},
    MAX_VOICES,
};

use crate::BLOCK_SIZES;

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");
    let sample_rate = 48_000.0;
    let tables = Arc::new(WavetableManager::new());
    let Ok(presets) = PresetLibrary::factory() else {
        return;
    };

    for preset in ["Deep Liquid Bass", "Air Pad"] {
        let Ok(patch) = presets.get(preset) else {
            continue;
        };

        for &size in BLOCK_SIZES {
            let mut pool = VoicePool::new(MAX_VOICES, sample_rate, Arc::clone(&tables));
            pool.update_from_state(&patch, 0.0);
            for i in 0..MAX_VOICES {
                let index = pool.allocate(Lane::Manual, false).index();
                let age = pool.next_age();
                if let Some(voice) = pool.get_mut(index) {
                    voice.trigger(36 + i as u8 * 3, 0.9, Lane::Manual, age, 0.0);
                }
            }

            let mut left = vec![0.0f32; size];
            let mut right = vec![0.0f32; size];
            let mut time = 0.0;
            let dt = size as f64 / sample_rate as f64;
            let id = format!("{}_x16", preset.to_lowercase().replace(' ', "_"));
            group.bench_with_input(BenchmarkId::new(id, size), &size, |b, _| {
                b.iter(|| {
                    left.fill(0.0);
                    right.fill(0.0);
                    let ctx = RenderCtx::new(sample_rate).at(time);
                    pool.render_stereo(black_box(&mut left), black_box(&mut right), &ctx);
                    time += dt;
                })
            });
        }
    }

    group.finish();
}
