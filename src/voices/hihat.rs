//! Hi-hat (closed).
//!
//! A tight, short burst of filtered noise on every step, the backbone of
//! the rhythm bus.
//!
//! # How It Works
//!
//! 1. The bus's shared noise table provides the "metallic" character
//! 2. High-pass at 6 kHz keeps only the sizzle
//! 3. Gain ramps exponentially 0.2 -> 0.001 over 0.08 s
//! 4. The hit stops at 0.1 s
//!
//! # Variations
//!
//! - Longer decay = open hi-hat
//! - Lower filter = darker, jazzier hat

use std::sync::Arc;

use crate::{
    dsp::filter::SVFilter,
    voices::{DrumHit, NoiseHit},
};

/// Schedule a closed hi-hat starting at `start` seconds.
pub fn hihat(start: f64, noise: &Arc<[f32]>, sample_rate: f32) -> DrumHit {
    DrumHit::Noise(NoiseHit::new(
        start,
        noise,
        SVFilter::highpass(6000.0),
        0.2,
        0.08,
        0.1,
        sample_rate,
    ))
}
