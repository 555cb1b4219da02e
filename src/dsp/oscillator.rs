use std::f32::consts::TAU;

/// Fixed waveforms rendered directly from the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscillatorWaveform {
    Sine,
    Square,
}

/// Phase accumulator with a fixed waveform.
///
/// Phase is kept in cycles ([0, 1)) rather than radians so table and
/// analytic oscillators share the same bookkeeping.
#[derive(Debug, Clone)]
pub struct OscillatorBlock {
    waveform: OscillatorWaveform,
    phase: f32,
}

impl OscillatorBlock {
    pub fn new(waveform: OscillatorWaveform) -> Self {
        Self {
            waveform,
            phase: 0.0,
        }
    }

    pub fn sine() -> Self {
        Self::new(OscillatorWaveform::Sine)
    }

    pub fn square() -> Self {
        Self::new(OscillatorWaveform::Square)
    }

    #[inline]
    pub fn next_sample(&mut self, frequency: f32, sample_rate: f32) -> f32 {
        let p = self.phase;
        let out = match self.waveform {
            OscillatorWaveform::Sine => (p * TAU).sin(),
            OscillatorWaveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        };
        self.phase = advance(self.phase, frequency / sample_rate);
        out
    }

    pub fn render(&mut self, out: &mut [f32], frequency: f32, sample_rate: f32) {
        for sample in out.iter_mut() {
            *sample = self.next_sample(frequency, sample_rate);
        }
    }

    pub fn reset(&mut self, phase: f32) {
        self.phase = phase.rem_euclid(1.0);
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }
}

/// Phase accumulator reading a single-cycle table with linear interpolation.
#[derive(Debug, Clone, Default)]
pub struct TableOscillator {
    phase: f32,
}

impl TableOscillator {
    pub fn new() -> Self {
        Self { phase: 0.0 }
    }

    #[inline]
    pub fn next_sample(&mut self, table: &[f32], frequency: f32, sample_rate: f32) -> f32 {
        let len = table.len();
        if len == 0 {
            return 0.0;
        }
        let pos = self.phase * len as f32;
        let i0 = (pos as usize) % len;
        let i1 = (i0 + 1) % len;
        let frac = pos - pos.floor();
        let out = table[i0] + (table[i1] - table[i0]) * frac;
        self.phase = advance(self.phase, frequency / sample_rate);
        out
    }

    pub fn reset(&mut self, phase: f32) {
        self.phase = phase.rem_euclid(1.0);
    }
}

/// Wrap-safe phase increment; handles negative and > 1 increments from FM.
#[inline]
fn advance(phase: f32, increment: f32) -> f32 {
    let next = phase + increment;
    if (0.0..1.0).contains(&next) {
        next
    } else if next.is_finite() {
        let wrapped = next.rem_euclid(1.0);
        if wrapped < 1.0 {
            wrapped
        } else {
            0.0
        }
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_output_range() {
        let mut osc = OscillatorBlock::sine();
        let mut buffer = vec![0.0; 1024];
        osc.render(&mut buffer, 440.0, 48_000.0);
        assert!(buffer.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(buffer.iter().any(|s| *s > 0.99));
    }

    #[test]
    fn test_square_is_bipolar() {
        let mut osc = OscillatorBlock::square();
        let mut buffer = vec![0.0; 480];
        osc.render(&mut buffer, 100.0, 48_000.0);
        assert!(buffer.iter().all(|s| *s == 1.0 || *s == -1.0));
        assert_eq!(buffer[0], 1.0);
        assert_eq!(buffer[300], -1.0);
    }

    #[test]
    fn test_table_oscillator_interpolates() {
        let table = [0.0, 1.0, 0.0, -1.0];
        let mut osc = TableOscillator::new();
        // Quarter-sample steps through a 4-sample table
        let sr = 16.0;
        let freq = 1.0;
        let a = osc.next_sample(&table, freq, sr);
        let b = osc.next_sample(&table, freq, sr);
        let c = osc.next_sample(&table, freq, sr);
        assert!((a - 0.0).abs() < 1e-6);
        assert!((b - 0.25).abs() < 1e-6);
        assert!((c - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_negative_frequency_wraps() {
        let mut osc = OscillatorBlock::square();
        for _ in 0..100 {
            osc.next_sample(-300.0, 48_000.0);
            assert!((0.0..1.0).contains(&osc.phase()));
        }
    }

    #[test]
    fn test_empty_table_is_silent() {
        let mut osc = TableOscillator::new();
        assert_eq!(osc.next_sample(&[], 440.0, 48_000.0), 0.0);
    }
}
