use std::f32::consts::TAU;

use crate::{
    dsp::{
        delay::DelayLine, filter::SVFilter, ramp::Automation, random::DeterministicRandom,
        reverb::ConvolutionReverb,
    },
    graph::node::{Modulatable, RenderCtx, StereoNode},
    patch::FxSettings,
    CONTROL_SMOOTH,
};

/*
FX Section
==========

Three sends run in parallel from the same input and are summed with the
dry signal:

    in ──┬── dry 0.7 ───────────────────────────────────┐
         ├── chorus ── wet 0.25 ────────────────────────┤
         ├── delay ─┬─ wet (delay.mix) ─────────────────┼──► out
         │     ▲    └─ HP 200 ─ LP 8k ─ feedback ┐      │
         │     └─────────────────────────────────┘      │
         └── reverb ── wet (reverb.mix) ────────────────┘

Chorus
------

A short delay (18 ms) whose time is swept by a sine LFO:

    delay(t) = 18 ms + sin(2π · rate · t) · depth · 3 ms

As the delay shortens and lengthens the copy is pitched slightly up and
down; mixed with the dry signal it sounds like several players. Both
channels share the sweep.

Delay
-----

A feedback comb. The tap is taken before the feedback filters, so the
first echo is full range and every repeat after it loses lows and highs:

    tap    = line[time]
    line  <- in + LP(HP(tap)) · feedback

Reverb
------

Convolution with a decaying noise burst; see `dsp::reverb`.
*/

/// Chorus centre delay in seconds.
const CHORUS_BASE: f32 = 0.018;
/// Chorus sweep per unit of depth, in seconds.
const CHORUS_SPAN: f32 = 0.003;
const CHORUS_WET: f32 = 0.25;
const DRY: f32 = 0.7;
/// Longest delay time in seconds.
const MAX_DELAY: f32 = 2.0;
const MOD_GLIDE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FxParam {
    DelayMix,
    ReverbMix,
    ChorusDepth,
}

struct Chorus {
    lines: [DelayLine; 2],
    phase: f32,
    rate: f32,
    /// Sweep amplitude in seconds.
    depth: Automation,
}

impl Chorus {
    fn new(sample_rate: f32) -> Self {
        let capacity = ((CHORUS_BASE + CHORUS_SPAN * 2.0) * sample_rate) as usize + 4;
        Self {
            lines: [
                DelayLine::with_capacity(capacity),
                DelayLine::with_capacity(capacity),
            ],
            phase: 0.0,
            rate: 0.8,
            depth: Automation::new(0.002),
        }
    }

    #[inline]
    fn process(&mut self, left: f32, right: f32, t: f64, sample_rate: f32) -> (f32, f32) {
        let sweep = self.phase.sin() * self.depth.value_at(t);
        self.phase = (self.phase + TAU * self.rate / sample_rate) % TAU;
        let delay = ((CHORUS_BASE + sweep) * sample_rate).max(1.0);

        let [line_l, line_r] = &mut self.lines;
        let out = (
            line_l.read_interpolated(delay),
            line_r.read_interpolated(delay),
        );
        line_l.write(left);
        line_r.write(right);
        out
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.reset();
        }
    }
}

struct FeedbackDelay {
    lines: [DelayLine; 2],
    highpass: [SVFilter; 2],
    lowpass: [SVFilter; 2],
    time: Automation,
    feedback: f32,
    mix: Automation,
}

impl FeedbackDelay {
    fn new(sample_rate: f32) -> Self {
        let capacity = (MAX_DELAY * sample_rate) as usize + 4;
        let highpass = || {
            let mut filter = SVFilter::highpass(200.0);
            filter.update(sample_rate);
            filter
        };
        let lowpass = || {
            let mut filter = SVFilter::lowpass(8000.0);
            filter.update(sample_rate);
            filter
        };
        Self {
            lines: [
                DelayLine::with_capacity(capacity),
                DelayLine::with_capacity(capacity),
            ],
            highpass: [highpass(), highpass()],
            lowpass: [lowpass(), lowpass()],
            time: Automation::new(0.3),
            feedback: 0.35,
            mix: Automation::new(0.25),
        }
    }

    #[inline]
    fn process(&mut self, input: [f32; 2], t: f64, sample_rate: f32) -> [f32; 2] {
        let delay = (self.time.value_at(t).clamp(0.0, MAX_DELAY) * sample_rate).max(1.0);
        let mix = self.mix.value_at(t);
        let mut out = [0.0; 2];
        for ch in 0..2 {
            let tap = self.lines[ch].read_interpolated(delay);
            let fed = self.lowpass[ch].process(self.highpass[ch].process(tap));
            self.lines[ch].write(input[ch] + fed * self.feedback);
            out[ch] = tap * mix;
        }
        out
    }

    fn reset(&mut self) {
        for ch in 0..2 {
            self.lines[ch].reset();
            self.highpass[ch].reset();
            self.lowpass[ch].reset();
        }
    }
}

/// Build a reverb for `size` away from the audio thread, for
/// [`SynthMessage::SetReverb`](crate::synth::SynthMessage::SetReverb).
pub fn build_reverb(sample_rate: f32, size: f32, seed: u32) -> Box<ConvolutionReverb> {
    let mut rng = DeterministicRandom::new(seed);
    Box::new(ConvolutionReverb::new(sample_rate, size, &mut rng))
}

/// Chorus, delay and reverb sends around a dry path.
pub struct FxSection {
    sample_rate: f32,
    chorus: Chorus,
    delay: FeedbackDelay,
    reverb: Box<ConvolutionReverb>,
    reverb_mix: Automation,
    rng: DeterministicRandom,
}

impl FxSection {
    pub fn new(sample_rate: f32, seed: u32) -> Self {
        let mut rng = DeterministicRandom::new(seed);
        let reverb = Box::new(ConvolutionReverb::new(sample_rate, 1.0, &mut rng));
        Self {
            sample_rate,
            chorus: Chorus::new(sample_rate),
            delay: FeedbackDelay::new(sample_rate),
            reverb,
            reverb_mix: Automation::new(0.3),
            rng,
        }
    }

    /// Push the patch FX settings. The reverb impulse is only rebuilt when
    /// the room size changed.
    pub fn set_state(&mut self, fx: &FxSettings, now: f64) {
        self.chorus
            .depth
            .glide(fx.chorus.depth * CHORUS_SPAN, now, CONTROL_SMOOTH);
        self.chorus.rate = fx.chorus.rate.max(0.0);

        self.delay.time.glide(fx.delay.time, now, CONTROL_SMOOTH);
        self.delay.feedback = fx.delay.feedback.clamp(0.0, 0.95);
        self.delay.mix.glide(fx.delay.mix, now, CONTROL_SMOOTH);

        self.reverb_mix.glide(fx.reverb.mix, now, CONTROL_SMOOTH);
        if self.reverb.set_size(fx.reverb.size, &mut self.rng) {
            log::debug!("reverb impulse rebuilt for size {:.2}", fx.reverb.size);
        }
    }

    pub fn reverb_size(&self) -> f32 {
        self.reverb.size()
    }

    /// Swap in a reverb built elsewhere and hand back the old one. A
    /// following `set_state` with the same size keeps it as is.
    pub fn replace_reverb(&mut self, reverb: Box<ConvolutionReverb>) -> Box<ConvolutionReverb> {
        std::mem::replace(&mut self.reverb, reverb)
    }

    pub fn advance(&mut self, now: f64) {
        self.chorus.depth.advance(now);
        self.delay.time.advance(now);
        self.delay.mix.advance(now);
        self.reverb_mix.advance(now);
    }

    /// Clear every tail.
    pub fn reset(&mut self) {
        self.chorus.reset();
        self.delay.reset();
        self.reverb.reset();
    }
}

impl StereoNode for FxSection {
    fn render_stereo(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx) {
        let sr = self.sample_rate;
        let dt = ctx.dt();
        for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            let t = ctx.time + i as f64 * dt;
            let (x_l, x_r) = (*l, *r);

            let (chorus_l, chorus_r) = self.chorus.process(x_l, x_r, t, sr);
            let [delay_l, delay_r] = self.delay.process([x_l, x_r], t, sr);
            let (verb_l, verb_r) = self.reverb.process(x_l, x_r);
            let verb_mix = self.reverb_mix.value_at(t);

            *l = x_l * DRY + chorus_l * CHORUS_WET + delay_l + verb_l * verb_mix;
            *r = x_r * DRY + chorus_r * CHORUS_WET + delay_r + verb_r * verb_mix;
        }
    }
}

impl Modulatable for FxSection {
    type Param = FxParam;

    fn get_param(&self, param: FxParam) -> f32 {
        match param {
            FxParam::DelayMix => self.delay.mix.last_event().1,
            FxParam::ReverbMix => self.reverb_mix.last_event().1,
            FxParam::ChorusDepth => self.chorus.depth.last_event().1 / CHORUS_SPAN,
        }
    }

    fn apply_modulation(&mut self, param: FxParam, value: f32, now: f64) {
        let value = value.clamp(0.0, 1.0);
        match param {
            FxParam::DelayMix => self.delay.mix.glide(value, now, MOD_GLIDE),
            FxParam::ReverbMix => self.reverb_mix.glide(value, now, MOD_GLIDE),
            FxParam::ChorusDepth => {
                self.chorus
                    .depth
                    .glide(value * CHORUS_SPAN, now, MOD_GLIDE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{DelaySettings, ReverbSettings};
    use float_cmp::approx_eq;
    use more_asserts::assert_gt;

    const SR: f32 = 48_000.0;

    fn dry_only() -> FxSettings {
        FxSettings {
            delay: DelaySettings {
                mix: 0.0,
                ..DelaySettings::default()
            },
            reverb: ReverbSettings {
                mix: 0.0,
                ..ReverbSettings::default()
            },
            ..FxSettings::default()
        }
    }

    #[test]
    fn test_dry_path_gain() {
        let mut fx = FxSection::new(SR, 1);
        fx.set_state(&dry_only(), 0.0);
        let mut left = vec![0.0; 64];
        let mut right = vec![0.0; 64];
        left[0] = 1.0;
        right[0] = -1.0;
        fx.render_stereo(&mut left, &mut right, &RenderCtx::new(SR).at(1.0));
        assert!(approx_eq!(f32, left[0], 0.7));
        assert!(approx_eq!(f32, right[0], -0.7));
    }

    #[test]
    fn test_delay_echo_lands_at_delay_time() {
        let mut fx = FxSection::new(SR, 1);
        let mut settings = dry_only();
        settings.delay.time = 0.1;
        settings.delay.mix = 1.0;
        settings.delay.feedback = 0.0;
        settings.chorus.depth = 0.0;
        fx.set_state(&settings, 0.0);

        let frames = 6000;
        let mut left = vec![0.0; frames];
        let mut right = vec![0.0; frames];
        left[0] = 1.0;
        fx.render_stereo(&mut left, &mut right, &RenderCtx::new(SR).at(1.0));

        let echo = 4800;
        assert_gt!(left[echo].abs(), 0.9);
        assert!(left[echo + 200..].iter().all(|x| x.abs() < 1e-3));
    }

    #[test]
    fn test_reverb_rebuilds_only_on_size_change() {
        let mut fx = FxSection::new(SR, 1);
        let mut settings = FxSettings::default();
        settings.reverb.size = 2.0;
        fx.set_state(&settings, 0.0);
        assert_eq!(fx.reverb_size(), 2.0);
        fx.set_state(&settings, 0.1);
        assert_eq!(fx.reverb_size(), 2.0);
    }

    #[test]
    fn test_prebuilt_reverb_is_kept_by_set_state() {
        let mut fx = FxSection::new(SR, 1);
        let old = fx.replace_reverb(build_reverb(SR, 2.5, 7));
        assert_eq!(old.size(), 1.0);

        let rng = fx.rng.clone();
        let mut settings = FxSettings::default();
        settings.reverb.size = 2.5;
        fx.set_state(&settings, 0.0);
        assert_eq!(fx.reverb_size(), 2.5);
        // no rebuild: no noise was drawn
        assert_eq!(fx.rng, rng);
    }

    #[test]
    fn test_modulation_writes() {
        let mut fx = FxSection::new(SR, 1);
        fx.apply_modulation(FxParam::ChorusDepth, 0.5, 0.0);
        assert!(approx_eq!(f32, fx.get_param(FxParam::ChorusDepth), 0.5, epsilon = 1e-6));
        fx.apply_modulation(FxParam::DelayMix, 2.0, 0.0);
        assert_eq!(fx.get_param(FxParam::DelayMix), 1.0);
    }
}
