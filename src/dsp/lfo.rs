//! Low Frequency Oscillator (LFO) shapes and phase math.

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::dsp::random::DeterministicRandom;

/*
Patch LFOs
==========

Up to three LFOs feed the modulation matrix. None of them keeps a running
phase; each is read straight off the engine clock:

    rate  = rate · bpm / 60        when synced (cycles per beat)
    phase = (t · rate + offset) mod 1

so a late control tick still lands on the right phase.

    shape         value at phase p (bipolar)
    sine          sin(2π p)
    triangle      1 - 4 |p - 0.5|
    sawtooth      2 (p - 0.5)
    square        +1 below 0.5, -1 above
    sample-hold   one seeded draw per cycle, taken when the phase wraps

"user" parses and plays as a sine. Sources that are naturally 0..1
(envelopes, velocity) go through `unipolar_to_bipolar` first.
*/

/// Slowest rate an LFO runs at, in Hz.
pub const MIN_RATE: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LfoShape {
    #[default]
    Sine,
    Triangle,
    Sawtooth,
    Square,
    SampleHold,
    User,
}

impl LfoShape {
    pub fn as_str(self) -> &'static str {
        match self {
            LfoShape::Sine => "sine",
            LfoShape::Triangle => "triangle",
            LfoShape::Sawtooth => "sawtooth",
            LfoShape::Square => "square",
            LfoShape::SampleHold => "sample-hold",
            LfoShape::User => "user",
        }
    }

    /// Bipolar value of a stateless shape at `phase` in [0, 1).
    ///
    /// Sample-hold needs state; see [`LfoState`].
    #[inline]
    pub fn evaluate(self, phase: f32) -> f32 {
        match self {
            LfoShape::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            LfoShape::Sawtooth => 2.0 * (phase - 0.5),
            LfoShape::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            LfoShape::Sine | LfoShape::User | LfoShape::SampleHold => (phase * TAU).sin(),
        }
    }
}

// Unknown names fall back to sine rather than failing a whole patch.
impl From<String> for LfoShape {
    fn from(name: String) -> Self {
        match name.as_str() {
            "triangle" => LfoShape::Triangle,
            "sawtooth" => LfoShape::Sawtooth,
            "square" => LfoShape::Square,
            "sample-hold" => LfoShape::SampleHold,
            "user" => LfoShape::User,
            _ => LfoShape::Sine,
        }
    }
}

impl From<LfoShape> for String {
    fn from(shape: LfoShape) -> Self {
        shape.as_str().to_string()
    }
}

/// Rate in Hz after the floor and optional tempo sync.
///
/// A zero rate reads as 0.1 Hz, matching an unset control.
#[inline]
pub fn effective_rate(rate: f32, sync: bool, bpm: f32) -> f64 {
    let rate = if rate == 0.0 || !rate.is_finite() { 0.1 } else { rate as f64 };
    let rate = rate.max(MIN_RATE);
    if sync {
        rate * bpm as f64 / 60.0
    } else {
        rate
    }
}

/// Phase in [0, 1) at engine time `time`.
#[inline]
pub fn lfo_phase(time: f64, rate: f64, offset: f32) -> f32 {
    let offset = (offset as f64).rem_euclid(1.0);
    let phase = (time * rate + offset).rem_euclid(1.0) as f32;
    if phase >= 1.0 {
        0.0
    } else {
        phase
    }
}

/// Per-LFO runtime state (the sample-hold memory).
#[derive(Debug, Clone, PartialEq)]
pub struct LfoState {
    held: f32,
    last_phase: f32,
}

impl LfoState {
    pub fn new(rng: &mut DeterministicRandom) -> Self {
        Self {
            held: rng.next_bipolar(),
            last_phase: 0.0,
        }
    }

    /// Bipolar output of `shape` at `phase`, drawing a new sample-hold value
    /// only when the phase wrapped since the previous call.
    pub fn value(&mut self, shape: LfoShape, phase: f32, rng: &mut DeterministicRandom) -> f32 {
        match shape {
            LfoShape::SampleHold => {
                if phase < self.last_phase {
                    self.held = rng.next_bipolar();
                }
                self.last_phase = phase;
                self.held
            }
            other => other.evaluate(phase),
        }
    }

    pub fn held(&self) -> f32 {
        self.held
    }
}

/// Convert unipolar signal (0.0 to 1.0) to bipolar (-1.0 to +1.0),
/// clamped.
///
/// Every matrix source that reads a 0-1 engine value goes through here.
#[inline]
pub fn unipolar_to_bipolar(unipolar: f32) -> f32 {
    (unipolar * 2.0 - 1.0).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unipolar_to_bipolar() {
        assert!((unipolar_to_bipolar(0.0) + 1.0).abs() < 1e-6);
        assert!(unipolar_to_bipolar(0.5).abs() < 1e-6);
        assert!((unipolar_to_bipolar(1.0) - 1.0).abs() < 1e-6);
        assert_eq!(unipolar_to_bipolar(3.0), 1.0);
    }

    #[test]
    fn test_shapes_at_key_phases() {
        assert!((LfoShape::Sine.evaluate(0.25) - 1.0).abs() < 1e-6);
        assert_eq!(LfoShape::Triangle.evaluate(0.5), 1.0);
        assert_eq!(LfoShape::Triangle.evaluate(0.0), -1.0);
        assert_eq!(LfoShape::Sawtooth.evaluate(0.0), -1.0);
        assert_eq!(LfoShape::Square.evaluate(0.49), 1.0);
        assert_eq!(LfoShape::Square.evaluate(0.5), -1.0);
        assert!((LfoShape::User.evaluate(0.25) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tempo_sync_scales_rate() {
        assert_eq!(effective_rate(0.5, false, 140.0), 0.5f32 as f64);
        assert!((effective_rate(0.5, true, 120.0) - 1.0).abs() < 1e-9);
        assert_eq!(effective_rate(0.0, false, 120.0), 0.1);
        assert_eq!(effective_rate(-3.0, false, 120.0), MIN_RATE);
    }

    #[test]
    fn test_phase_wraps_with_offset() {
        assert!((lfo_phase(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
        assert!((lfo_phase(0.75, 1.0, 0.5) - 0.25).abs() < 1e-6);
        assert!((lfo_phase(2.0, 3.0, 1.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sample_hold_redraws_once_per_cycle() {
        let mut rng = DeterministicRandom::new(7);
        let mut state = LfoState::new(&mut rng);
        let first = state.held();

        // 60 ticks across one cycle: no wrap, no redraw
        for i in 0..60 {
            let phase = i as f32 / 60.0;
            assert_eq!(state.value(LfoShape::SampleHold, phase, &mut rng), first);
        }

        let after_wrap = state.value(LfoShape::SampleHold, 0.01, &mut rng);
        assert_ne!(after_wrap, first);
        assert_eq!(state.value(LfoShape::SampleHold, 0.02, &mut rng), after_wrap);
    }

    #[test]
    fn test_unknown_shape_name_is_sine() {
        let shape: LfoShape = serde_json::from_str("\"wobble\"").unwrap();
        assert_eq!(shape, LfoShape::Sine);
        let json = serde_json::to_string(&LfoShape::SampleHold).unwrap();
        assert_eq!(json, "\"sample-hold\"");
    }
}
