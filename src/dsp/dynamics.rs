//! Dynamics processors: the master limiter and the per-voice transient shaper.

use crate::dsp::filter::SVFilter;
use crate::io::converter::{db_to_gain, gain_to_db};

/*
Limiter
=======

A limiter is a compressor with a very high ratio. Every sample, the louder
of the two channels is measured in dB and compared with the threshold:

    over       = level_db - threshold_db
    reduction  = max(over, 0) · (1 - 1/ratio)      (hard knee)

At ratio 20 a signal 10 dB over the threshold comes out 0.5 dB over it.
The reduction does not jump; it is smoothed by a one-pole follower with a
fast attack (gain drops quickly) and a slower release (gain recovers):

    coeff      = 1 - e^(-1 / (time · sample_rate))
    smoothed  += (reduction - smoothed) · coeff

Both channels get the same gain so the stereo image does not shift.
*/

/// Stereo-linked peak limiter.
#[derive(Debug, Clone)]
pub struct Limiter {
    threshold_db: f32,
    ratio: f32,
    attack_coeff: f32,
    release_coeff: f32,
    reduction_db: f32,
}

impl Limiter {
    pub const RATIO: f32 = 20.0;
    pub const ATTACK: f32 = 0.002;
    pub const RELEASE: f32 = 0.05;

    pub fn new(sample_rate: f32, threshold_db: f32) -> Self {
        Self {
            threshold_db,
            ratio: Self::RATIO,
            attack_coeff: one_pole_coeff(Self::ATTACK, sample_rate),
            release_coeff: one_pole_coeff(Self::RELEASE, sample_rate),
            reduction_db: 0.0,
        }
    }

    pub fn set_threshold(&mut self, threshold_db: f32) {
        self.threshold_db = threshold_db;
    }

    pub fn threshold(&self) -> f32 {
        self.threshold_db
    }

    /// Current gain reduction in dB (positive).
    pub fn reduction(&self) -> f32 {
        self.reduction_db
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let peak = left.abs().max(right.abs());
        let over = gain_to_db(peak) - self.threshold_db;
        let target = if over > 0.0 {
            over * (1.0 - 1.0 / self.ratio)
        } else {
            0.0
        };

        let coeff = if target > self.reduction_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.reduction_db += (target - self.reduction_db) * coeff;

        let gain = db_to_gain(-self.reduction_db);
        (left * gain, right * gain)
    }

    pub fn reset(&mut self) {
        self.reduction_db = 0.0;
    }
}

/// Per-sample smoothing coefficient for a time constant in seconds.
#[inline]
pub fn one_pole_coeff(time: f32, sample_rate: f32) -> f32 {
    let samples = (time * sample_rate).max(1.0);
    1.0 - (-1.0 / samples).exp()
}

/// Detector corner frequency of the transient shaper.
const DETECTOR_HZ: f32 = 600.0;
/// Detector contribution to both branch gains.
const DETECTOR_GAIN: f32 = 0.6;

/// Attack/sustain shaper driven by a low-passed, rectified copy of the input.
///
/// The attack and sustain branches both carry the input; the detector
/// lifts both gains while the low end is moving.
#[derive(Debug, Clone)]
pub struct TransientShaper {
    detector: SVFilter,
    attack: f32,
    sustain: f32,
}

impl TransientShaper {
    pub fn new(sample_rate: f32) -> Self {
        let mut detector = SVFilter::lowpass(DETECTOR_HZ);
        detector.update(sample_rate);
        Self {
            detector,
            attack: 1.0,
            sustain: 1.0,
        }
    }

    pub fn set(&mut self, attack: f32, sustain: f32) {
        self.attack = attack;
        self.sustain = sustain;
    }

    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let follow = self.detector.process(sample).abs() * DETECTOR_GAIN;
        sample * (self.attack + follow) + sample * (self.sustain + follow)
    }

    pub fn reset(&mut self) {
        self.detector.reset();
    }
}
