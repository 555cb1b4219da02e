//! Snare drum.
//!
//! Real snares have metal wires under the bottom head that buzz when the
//! drum is struck. Noise high-passed at 1.2 kHz stands in for the wires.
//!
//! # How It Works
//!
//! 1. The bus's shared noise table provides the rattle
//! 2. High-pass at 1200 Hz removes the rumble
//! 3. Gain ramps exponentially 0.5 -> 0.001 over 0.18 s
//! 4. The hit stops at 0.2 s
//!
//! # Variations
//!
//! - Higher filter = brighter, snappier
//! - Longer decay = looser snare sound

use std::sync::Arc;

use crate::{
    dsp::filter::SVFilter,
    voices::{DrumHit, NoiseHit},
};

/// Schedule a snare starting at `start` seconds.
pub fn snare(start: f64, noise: &Arc<[f32]>, sample_rate: f32) -> DrumHit {
    DrumHit::Noise(NoiseHit::new(
        start,
        noise,
        SVFilter::highpass(1200.0),
        0.5,
        0.18,
        0.2,
        sample_rate,
    ))
}
