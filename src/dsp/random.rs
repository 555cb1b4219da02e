//! Seeded xorshift32 generator.
//!
//! Every "random" thing the engine does (patch randomization, sample-hold
//! LFOs, the Random modulation source, drum noise, reverb impulses) draws from
//! one of these, so a run is reproducible from its seed. There is no hidden
//! global generator.

/// 32-bit xorshift generator (shifts 13, 17, 5).
///
/// A seed of zero is a fixed point and yields zeros forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterministicRandom {
    seed: u32,
}

impl DeterministicRandom {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn set_seed(&mut self, seed: u32) {
        self.seed = seed;
    }

    /// Current internal state (the last produced raw value).
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Advance and return a value in [0, 1].
    pub fn next(&mut self) -> f64 {
        let mut x = self.seed;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.seed = x;
        x as f64 / u32::MAX as f64
    }

    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        self.next() as f32
    }

    /// Linear interpolation between `min` and `max` by the next draw.
    pub fn next_range(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.next()
    }

    /// Uniform draw in [-1, 1], used for noise and bipolar sources.
    #[inline]
    pub fn next_bipolar(&mut self) -> f32 {
        (self.next() * 2.0 - 1.0) as f32
    }

    /// Pick an element; `None` for an empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let index = (self.next() * items.len() as f64).floor() as usize % items.len();
        items.get(index)
    }
}

impl Default for DeterministicRandom {
    fn default() -> Self {
        Self::new(1_234_567)
    }
}
