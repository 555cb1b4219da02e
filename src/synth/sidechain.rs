use crate::patch::SidechainSettings;

/// Samples in the RMS analysis window.
pub const WINDOW: usize = 256;

/// Control-rate envelope follower behind ducking and the
/// EnvelopeFollower modulation source.
///
/// The audio path pushes samples into a ring; every control tick the RMS
/// of the last `WINDOW` samples becomes a target the value chases with
/// separate attack and release time constants.
#[derive(Debug, Clone)]
pub struct SidechainFollower {
    window: [f32; WINDOW],
    pos: usize,
    amount: f32,
    attack: f32,
    release: f32,
    period: f32,
    value: f32,
}

impl SidechainFollower {
    pub fn new(period: f64) -> Self {
        Self {
            window: [0.0; WINDOW],
            pos: 0,
            amount: 0.4,
            attack: 0.02,
            release: 0.18,
            period: period as f32,
            value: 0.0,
        }
    }

    pub fn set(&mut self, settings: &SidechainSettings) {
        self.set_amount(settings.amount);
        self.set_attack(settings.attack);
        self.set_release(settings.release);
    }

    pub fn set_amount(&mut self, amount: f32) {
        self.amount = amount.clamp(0.0, 1.0);
    }

    pub fn set_attack(&mut self, seconds: f32) {
        self.attack = seconds.max(0.005);
    }

    pub fn set_release(&mut self, seconds: f32) {
        self.release = seconds.max(0.02);
    }

    /// Current follower output in [0, 1].
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Feed the detector.
    pub fn push(&mut self, samples: &[f32]) {
        // only the tail can survive in the window
        let tail = &samples[samples.len().saturating_sub(WINDOW)..];
        for &sample in tail {
            self.window[self.pos] = sample;
            self.pos = (self.pos + 1) % WINDOW;
        }
    }

    pub fn rms(&self) -> f32 {
        let sum: f32 = self.window.iter().map(|x| x * x).sum();
        (sum / WINDOW as f32).sqrt()
    }

    /// One control step; returns the new value.
    pub fn tick(&mut self) -> f32 {
        let target = (self.rms() * self.amount * 2.0).clamp(0.0, 1.0);
        let tau = if target > self.value {
            self.attack
        } else {
            self.release
        };
        let coeff = 1.0 - (-self.period / tau).exp();
        self.value += (target - self.value) * coeff;
        self.value
    }

    pub fn reset(&mut self) {
        self.window = [0.0; WINDOW];
        self.pos = 0;
        self.value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use more_asserts::{assert_ge, assert_le};

    const PERIOD: f64 = 800.0 / 48_000.0;

    #[test]
    fn test_settings_are_clamped() {
        let mut follower = SidechainFollower::new(PERIOD);
        follower.set(&SidechainSettings {
            amount: 3.0,
            attack: 0.0,
            release: 0.0,
            ..SidechainSettings::default()
        });
        follower.push(&[1.0; WINDOW]);
        assert!(approx_eq!(f32, follower.rms(), 1.0));
        follower.tick();
        // target = clamp(1 * 1 * 2) = 1; attack floor 5 ms
        let expected = 1.0 - (-(PERIOD as f32) / 0.005).exp();
        assert!(approx_eq!(f32, follower.value(), expected, epsilon = 1e-5));
    }

    #[test]
    fn test_attack_then_release() {
        let mut follower = SidechainFollower::new(PERIOD);
        follower.set(&SidechainSettings {
            amount: 0.5,
            attack: 0.04,
            release: 0.24,
            ..SidechainSettings::default()
        });

        let attack_ticks = (3.0 * 0.04 / PERIOD).ceil() as usize;
        for _ in 0..attack_ticks {
            follower.push(&[1.0; 800]);
            follower.tick();
        }
        assert_ge!(follower.value(), 0.95);

        let release_ticks = (3.0 * 0.24 / PERIOD).ceil() as usize;
        let peak = follower.value();
        for _ in 0..release_ticks {
            follower.push(&[0.0; 800]);
            follower.tick();
        }
        assert_le!(follower.value(), peak * 0.05);
    }
}
