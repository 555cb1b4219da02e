/// Circular delay buffer with fractional reads.
///
/// Reads are relative to the next write: a delay of 1 returns the most
/// recently written sample.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn with_capacity(samples: usize) -> Self {
        Self {
            buffer: vec![0.0; samples.max(3)],
            write_pos: 0,
        }
    }

    /// Longest delay the buffer can represent, in samples.
    pub fn max_delay(&self) -> usize {
        self.buffer.len() - 1
    }

    #[inline]
    pub fn write(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos = (self.write_pos + 1) % self.buffer.len();
    }

    #[inline]
    pub fn read(&self, delay_samples: usize) -> f32 {
        let len = self.buffer.len();
        let delay = delay_samples.clamp(1, len - 1);
        self.buffer[(self.write_pos + len - delay) % len]
    }

    /// Linear interpolation between the two samples around `delay_samples`.
    #[inline]
    pub fn read_interpolated(&self, delay_samples: f32) -> f32 {
        let len = self.buffer.len();
        let delay = delay_samples.clamp(1.0, (len - 2) as f32);
        let whole = delay.floor();
        let frac = delay - whole;
        let d0 = whole as usize;
        let a = self.buffer[(self.write_pos + len - d0) % len];
        let b = self.buffer[(self.write_pos + len - d0 - 1) % len];
        a + (b - a) * frac
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_delay() {
        let mut line = DelayLine::with_capacity(16);
        for i in 1..=5 {
            line.write(i as f32);
        }
        assert_eq!(line.read(1), 5.0);
        assert_eq!(line.read(3), 3.0);
    }

    #[test]
    fn test_fractional_delay_interpolates() {
        let mut line = DelayLine::with_capacity(16);
        for i in 1..=5 {
            line.write(i as f32);
        }
        assert!((line.read_interpolated(1.5) - 4.5).abs() < 1e-6);
        assert!((line.read_interpolated(2.25) - 3.75).abs() < 1e-6);
    }

    #[test]
    fn test_delay_is_clamped_to_capacity() {
        let mut line = DelayLine::with_capacity(4);
        for i in 0..10 {
            line.write(i as f32);
        }
        assert!(line.read(100).is_finite());
        assert!(line.read_interpolated(1e9).is_finite());
        assert_eq!(line.max_delay(), 3);
    }
}
