//! Drum hits for the rhythm bus.
//!
//! Each hit is a one-shot node scheduled at an absolute start time. It
//! renders silence before its start, its sound up to its stop time, and
//! reports itself inactive once rendered past the stop.
//!
//! # Example
//!
//! ```ignore
//! use morphsynth::voices;
//!
//! let noise = voices::noise_table(48_000.0, &mut rng);
//! let kick = voices::kick(start);
//! let snare = voices::snare(start, &noise, 48_000.0);
//! let hat = voices::hihat(start, &noise, 48_000.0);
//! ```

mod hihat;
mod kick;
mod snare;

use std::sync::Arc;

pub use hihat::hihat;
pub use kick::{kick, Kick};
pub use snare::snare;

use crate::{
    dsp::{filter::SVFilter, ramp::Automation, random::DeterministicRandom},
    graph::node::{GraphNode, RenderCtx},
};

/// Seconds of shared noise the noise hits read from.
pub const NOISE_SECONDS: f32 = 0.5;

/// White noise shared by every noise hit of a bus.
pub fn noise_table(sample_rate: f32, rng: &mut DeterministicRandom) -> Arc<[f32]> {
    let len = ((sample_rate * NOISE_SECONDS) as usize).max(1);
    (0..len).map(|_| rng.next_bipolar()).collect()
}

/// Filtered noise burst with an exponential gain decay.
pub struct NoiseHit {
    start: f64,
    stop: f64,
    noise: Arc<[f32]>,
    pos: usize,
    filter: SVFilter,
    gain: Automation,
    done: bool,
}

impl NoiseHit {
    pub fn new(
        start: f64,
        noise: &Arc<[f32]>,
        mut filter: SVFilter,
        level: f32,
        decay: f64,
        length: f64,
        sample_rate: f32,
    ) -> Self {
        filter.update(sample_rate);
        let mut gain = Automation::new(level);
        gain.set_immediate(level, start);
        gain.exponential_ramp_to(0.001, start + decay);
        Self {
            start,
            stop: start + length,
            noise: Arc::clone(noise),
            pos: 0,
            filter,
            gain,
            done: false,
        }
    }
}

impl GraphNode for NoiseHit {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        let dt = ctx.dt();
        for (i, sample) in out.iter_mut().enumerate() {
            let t = ctx.time + i as f64 * dt;
            if t < self.start || t >= self.stop || self.noise.is_empty() {
                *sample = 0.0;
                continue;
            }
            let x = self.noise[self.pos % self.noise.len()];
            self.pos += 1;
            *sample = self.filter.process(x) * self.gain.value_at(t);
        }
        if ctx.time + out.len() as f64 * dt >= self.stop {
            self.done = true;
        }
    }

    fn is_active(&self) -> bool {
        !self.done
    }
}

/// Any hit the bus can hold, without boxing on the audio thread.
pub enum DrumHit {
    Kick(Kick),
    Noise(NoiseHit),
}

impl DrumHit {
    pub fn start(&self) -> f64 {
        match self {
            DrumHit::Kick(kick) => kick.start(),
            DrumHit::Noise(hit) => hit.start,
        }
    }
}

impl GraphNode for DrumHit {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        match self {
            DrumHit::Kick(kick) => kick.render_block(out, ctx),
            DrumHit::Noise(hit) => hit.render_block(out, ctx),
        }
    }

    fn is_active(&self) -> bool {
        match self {
            DrumHit::Kick(kick) => kick.is_active(),
            DrumHit::Noise(hit) => hit.is_active(),
        }
    }
}
