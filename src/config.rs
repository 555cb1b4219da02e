use crate::MAX_VOICES;

/// Engine construction parameters.
///
/// Everything the engine needs up front is carried here and handed to each
/// component constructor; there is no ambient engine state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Audio sample rate in Hz.
    pub sample_rate: f32,
    /// How often the modulation/sidechain/scheduler tick runs, in Hz.
    pub control_rate_hz: f32,
    /// Size of the voice pool (clamped to 1..=16).
    pub max_voices: usize,
    /// Seed for every engine-internal random draw (sample-hold, Random
    /// source, noise, reverb impulse).
    pub seed: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            control_rate_hz: 60.0,
            max_voices: MAX_VOICES,
            seed: 1_234_567,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_control_rate(mut self, hz: f32) -> Self {
        self.control_rate_hz = hz;
        self
    }

    pub fn voice_count(&self) -> usize {
        self.max_voices.clamp(1, MAX_VOICES)
    }

    /// Frames between two control ticks (at least one).
    pub fn control_period_frames(&self) -> u64 {
        let rate = self.control_rate_hz.max(1.0);
        (self.sample_rate / rate).round().max(1.0) as u64
    }

    /// Control tick period in seconds, as seen by the sample clock.
    pub fn control_period_secs(&self) -> f64 {
        self.control_period_frames() as f64 / self.sample_rate as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_period_is_sample_aligned() {
        let config = EngineConfig::default();
        assert_eq!(config.control_period_frames(), 800);
        assert!((config.control_period_secs() - 800.0 / 48_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_voice_count_is_clamped() {
        let mut config = EngineConfig::default();
        config.max_voices = 64;
        assert_eq!(config.voice_count(), MAX_VOICES);
        config.max_voices = 0;
        assert_eq!(config.voice_count(), 1);
    }
}
