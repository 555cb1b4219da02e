//! Distortion / Waveshaping
//!
//! Distortion adds harmonics by reshaping the waveform. The "drive" parameter
//! controls how aggressively the signal is pushed into the nonlinear region.
//!
//! # How Waveshaping Works
//!
//! A waveshaper applies a transfer function to each sample:
//!   output = f(input)
//!
//! Here f is a lookup table sampled over the input range [-1, 1]:
//!
//!   curve[i] = tanh(x_i * drive),   x_i = 2 * i / (N - 1) - 1
//!
//! Inputs are mapped onto the table and linearly interpolated; anything
//! beyond ±1 reads the end points, so the curve also acts as a clipper.
//!
//! # Why a Table
//!
//! `tanh` per sample is expensive across sixteen voices, and the curve only
//! changes when the patch changes. Rebuilding the table is the expensive
//! part, so callers gate rebuilds on a meaningful drive change.
//!
//! # Drive Values
//!
//!   1.0  = Gentle rounding of peaks
//!   1.5  = Warm saturation
//!   3.0  = Obvious distortion (the sub oscillator's maximum)

/// Points in a soft-clip curve.
pub const CURVE_SIZE: usize = 1024;

/// Table-driven tanh waveshaper.
#[derive(Debug, Clone)]
pub struct SoftClipper {
    curve: Box<[f32; CURVE_SIZE]>,
    drive: f32,
}

impl SoftClipper {
    pub fn new(drive: f32) -> Self {
        let mut clipper = Self {
            curve: Box::new([0.0; CURVE_SIZE]),
            drive,
        };
        clipper.rebuild(drive);
        clipper
    }

    /// Recompute the curve in place for a new drive.
    pub fn rebuild(&mut self, drive: f32) {
        self.drive = drive;
        let last = (CURVE_SIZE - 1) as f32;
        for (i, point) in self.curve.iter_mut().enumerate() {
            let x = (i as f32 / last) * 2.0 - 1.0;
            *point = (x * drive).tanh();
        }
    }

    pub fn drive(&self) -> f32 {
        self.drive
    }

    #[inline]
    pub fn process(&self, sample: f32) -> f32 {
        let last = CURVE_SIZE - 1;
        let pos = ((sample.clamp(-1.0, 1.0) + 1.0) * 0.5) * last as f32;
        let i0 = (pos as usize).min(last);
        let i1 = (i0 + 1).min(last);
        let frac = pos - i0 as f32;
        self.curve[i0] + (self.curve[i1] - self.curve[i0]) * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_matches_tanh() {
        let clipper = SoftClipper::new(1.05);
        for x in [-0.9f32, -0.3, 0.0, 0.25, 0.8] {
            let expected = (x * 1.05).tanh();
            assert!((clipper.process(x) - expected).abs() < 1e-3, "x={x}");
        }
    }

    #[test]
    fn test_out_of_range_input_clips_to_endpoints() {
        let clipper = SoftClipper::new(2.0);
        assert!((clipper.process(5.0) - 2.0f32.tanh()).abs() < 1e-6);
        assert!((clipper.process(-5.0) + 2.0f32.tanh()).abs() < 1e-6);
    }

    #[test]
    fn test_rebuild_changes_curve() {
        let mut clipper = SoftClipper::new(1.0);
        let before = clipper.process(0.5);
        clipper.rebuild(3.0);
        assert_eq!(clipper.drive(), 3.0);
        assert!(clipper.process(0.5) > before);
    }
}
