use crate::dsp::ramp::Automation;
use crate::patch::EnvelopeSettings;

/*
ADSR Envelope Shapes
====================

The envelope does not run per sample. It is a shape writer: on trigger and
on release it schedules linear ramps onto an `Automation` lane (a voice
gain, the MOD envelope) and the lane does the per-sample work.

Vocabulary
----------

  depth       The peak the attack reaches: clamp(velocity, 0, 1).

  curve       Exponent applied to the sustain level. The segments stay
              linear; only the level the decay lands on is bent.

                  sustain_level = depth * sustain^curve

  decay end   t0 + attack + decay. Returned by `trigger` so the caller knows
              when the sustain plateau begins.


The Shape
---------

  Level
  depth ┐     ╱╲
        │    ╱  ╲___________
    S'  │   ╱               ╲
        │  ╱                 ╲
 ~0.0   └─╱───────────────────╲──→ Time
         t0  +a   +a+d        t1   t1+release

Trigger holds whatever value the lane has at t0 (so a retrigger during a
release rises from where it is, never from zero), ramps to depth by t0+a,
then to S' = depth * sustain^curve by t0+a+d.

Release holds the current value at t1 and ramps to 1e-4 over `release`.
Every segment is linear, which keeps each one trivially invertible:

    value(t) = from + (to - from) * (t - start) / duration
*/

/// Floor the release segment ends on.
pub const RELEASE_FLOOR: f32 = 1e-4;

/// Stateless ADSR shape evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeGenerator {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f32,
    pub release: f64,
    pub curve: f32,
}

impl Default for EnvelopeGenerator {
    fn default() -> Self {
        Self {
            attack: 0.01,
            decay: 0.12,
            sustain: 0.7,
            release: 0.3,
            curve: 1.0,
        }
    }
}

impl EnvelopeGenerator {
    pub fn new(attack: f64, decay: f64, sustain: f32, release: f64, curve: f32) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
            curve,
        }
    }

    pub fn set(&mut self, settings: &EnvelopeSettings) {
        self.attack = settings.attack.max(0.0) as f64;
        self.decay = settings.decay.max(0.0) as f64;
        self.sustain = settings.sustain.clamp(0.0, 1.0);
        self.release = settings.release.max(0.0) as f64;
        self.curve = settings.curve.max(0.5);
    }

    /// Level the decay lands on for a given velocity.
    pub fn sustain_level(&self, velocity: f32) -> f32 {
        velocity.clamp(0.0, 1.0) * self.sustain.powf(self.curve)
    }

    /// Schedule attack and decay on `target`; returns the decay end time.
    pub fn trigger(&self, target: &mut Automation, velocity: f32, t0: f64) -> f64 {
        let depth = velocity.clamp(0.0, 1.0);
        target.cancel_and_hold(t0);
        if self.attack > 0.0 {
            target.linear_ramp_to(depth, t0 + self.attack);
        } else {
            target.set_value_at(depth, t0);
        }
        let decay_end = t0 + self.attack + self.decay;
        target.linear_ramp_to(depth * self.sustain.powf(self.curve), decay_end);
        decay_end
    }

    /// Schedule the release on `target`; returns the time it reaches the floor.
    pub fn release(&self, target: &mut Automation, t1: f64) -> f64 {
        target.cancel_and_hold(t1);
        target.linear_ramp_to(RELEASE_FLOOR, t1 + self.release);
        t1 + self.release
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn test_trigger_reaches_peak_and_sustain() {
        let env = EnvelopeGenerator::new(0.1, 0.2, 0.5, 0.3, 1.0);
        let mut lane = Automation::new(0.0);
        let decay_end = env.trigger(&mut lane, 1.0, 0.0);

        assert!(approx_eq!(f64, decay_end, 0.3, epsilon = 1e-12));
        assert!(approx_eq!(f32, lane.value_at(0.1), 1.0, epsilon = 1e-5));
        assert!(approx_eq!(f32, lane.value_at(0.3), 0.5, epsilon = 1e-5));
        assert!(approx_eq!(f32, lane.value_at(10.0), 0.5, epsilon = 1e-5));
    }

    #[test]
    fn test_curve_bends_sustain_level() {
        let env = EnvelopeGenerator::new(0.01, 0.01, 0.5, 0.1, 2.0);
        let mut lane = Automation::new(0.0);
        env.trigger(&mut lane, 0.8, 0.0);
        assert!(approx_eq!(f32, lane.value_at(1.0), 0.8 * 0.25, epsilon = 1e-5));
        assert!(approx_eq!(f32, env.sustain_level(0.8), 0.2, epsilon = 1e-6));
    }

    #[test]
    fn test_zero_attack_jumps_to_depth() {
        let env = EnvelopeGenerator::new(0.0, 0.2, 0.5, 0.3, 1.0);
        let mut lane = Automation::new(0.0);
        env.trigger(&mut lane, 0.6, 1.0);
        assert!(approx_eq!(f32, lane.value_at(1.0), 0.6, epsilon = 1e-6));
        assert!(approx_eq!(f32, lane.value_at(1.2), 0.3, epsilon = 1e-5));
    }

    #[test]
    fn test_velocity_is_clamped() {
        let env = EnvelopeGenerator::new(0.1, 0.1, 1.0, 0.1, 1.0);
        let mut lane = Automation::new(0.0);
        env.trigger(&mut lane, 3.0, 0.0);
        assert!(approx_eq!(f32, lane.value_at(0.1), 1.0, epsilon = 1e-6));
    }

    #[test]
    fn test_release_starts_from_current_value() {
        let env = EnvelopeGenerator::new(0.1, 0.2, 0.5, 0.4, 1.0);
        let mut lane = Automation::new(0.0);
        env.trigger(&mut lane, 1.0, 0.0);

        // Release halfway up the attack
        let end = env.release(&mut lane, 0.05);
        assert!(approx_eq!(f64, end, 0.45, epsilon = 1e-12));
        assert!(approx_eq!(f32, lane.value_at(0.05), 0.5, epsilon = 1e-5));
        assert!(lane.value_at(0.25) < 0.5);
        assert!(approx_eq!(f32, lane.value_at(0.45), RELEASE_FLOOR, epsilon = 1e-6));
    }

    #[test]
    fn test_retrigger_rises_from_release_level() {
        let env = EnvelopeGenerator::new(0.1, 0.1, 0.5, 1.0, 1.0);
        let mut lane = Automation::new(0.0);
        env.trigger(&mut lane, 1.0, 0.0);
        env.release(&mut lane, 1.0);
        let before = lane.value_at(1.5);
        env.trigger(&mut lane, 1.0, 1.5);
        assert!(approx_eq!(f32, lane.value_at(1.5), before, epsilon = 1e-6));
        assert!(approx_eq!(f32, lane.value_at(1.6), 1.0, epsilon = 1e-5));
    }
}
