//! Kick drum.
//!
//! A sine with a falling pitch: the drop from 90 Hz to 40 Hz over a quarter
//! second is what makes it punch rather than hum.
//!
//! # How It Works
//!
//! 1. Sine oscillator provides the body
//! 2. Frequency ramps exponentially 90 Hz -> 40 Hz over 0.25 s
//! 3. Gain ramps exponentially 1 -> 0.001 over the same span
//! 4. The hit stops at 0.26 s
//!
//! # Variations
//!
//! - Longer ramps = boomy 808-style kick
//! - Higher start pitch = more "click" attack

use crate::{
    dsp::{oscillator::OscillatorBlock, ramp::Automation},
    graph::node::{GraphNode, RenderCtx},
    voices::DrumHit,
};

const START_HZ: f32 = 90.0;
const END_HZ: f32 = 40.0;
const DECAY: f64 = 0.25;
const LENGTH: f64 = 0.26;

pub struct Kick {
    start: f64,
    stop: f64,
    osc: OscillatorBlock,
    frequency: Automation,
    gain: Automation,
    done: bool,
}

impl Kick {
    pub fn new(start: f64) -> Self {
        let mut frequency = Automation::new(START_HZ);
        frequency.set_immediate(START_HZ, start);
        frequency.exponential_ramp_to(END_HZ, start + DECAY);

        let mut gain = Automation::new(1.0);
        gain.set_immediate(1.0, start);
        gain.exponential_ramp_to(0.001, start + DECAY);

        Self {
            start,
            stop: start + LENGTH,
            osc: OscillatorBlock::sine(),
            frequency,
            gain,
            done: false,
        }
    }

    pub fn start(&self) -> f64 {
        self.start
    }
}

impl GraphNode for Kick {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        let dt = ctx.dt();
        for (i, sample) in out.iter_mut().enumerate() {
            let t = ctx.time + i as f64 * dt;
            *sample = if t < self.start || t >= self.stop {
                0.0
            } else {
                self.osc.next_sample(self.frequency.value_at(t), ctx.sample_rate)
                    * self.gain.value_at(t)
            };
        }
        if ctx.time + out.len() as f64 * dt >= self.stop {
            self.done = true;
        }
    }

    fn is_active(&self) -> bool {
        !self.done
    }
}

/// Schedule a kick starting at `start` seconds.
pub fn kick(start: f64) -> DrumHit {
    DrumHit::Kick(Kick::new(start))
}
