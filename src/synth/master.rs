use crate::{
    dsp::{distortion::SoftClipper, dynamics::Limiter, ramp::Automation},
    graph::node::{Modulatable, RenderCtx, StereoNode},
    CONTROL_SMOOTH,
};

/// Drive of the bus soft clipper.
const PRE_SATURATION: f32 = 1.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterParam {
    Volume,
}

/// Soft clip, master gain, then the limiter.
pub struct MasterBus {
    clipper: SoftClipper,
    volume: Automation,
    limiter: Limiter,
}

impl MasterBus {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            clipper: SoftClipper::new(PRE_SATURATION),
            volume: Automation::new(0.8),
            limiter: Limiter::new(sample_rate, -1.0),
        }
    }

    pub fn set_volume(&mut self, volume: f32, now: f64) {
        self.volume
            .glide(volume.clamp(0.0, 1.0), now, CONTROL_SMOOTH);
    }

    /// Limiter threshold in dB.
    pub fn set_ceiling(&mut self, db: f32) {
        self.limiter.set_threshold(db);
    }

    pub fn ceiling(&self) -> f32 {
        self.limiter.threshold()
    }

    pub fn volume_at(&self, t: f64) -> f32 {
        self.volume.value_at(t)
    }

    pub fn advance(&mut self, now: f64) {
        self.volume.advance(now);
    }

    pub fn reset(&mut self) {
        self.limiter.reset();
    }
}

impl StereoNode for MasterBus {
    fn render_stereo(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx) {
        let dt = ctx.dt();
        for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            let gain = self.volume.value_at(ctx.time + i as f64 * dt);
            let (ol, or) = self.limiter.process(
                self.clipper.process(*l) * gain,
                self.clipper.process(*r) * gain,
            );
            *l = ol;
            *r = or;
        }
    }
}

impl Modulatable for MasterBus {
    type Param = MasterParam;

    fn get_param(&self, param: MasterParam) -> f32 {
        match param {
            MasterParam::Volume => self.volume.last_event().1,
        }
    }

    fn apply_modulation(&mut self, param: MasterParam, value: f32, now: f64) {
        match param {
            MasterParam::Volume => self.set_volume(value, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::converter::gain_to_db;
    use more_asserts::assert_le;

    const SR: f32 = 48_000.0;

    #[test]
    fn test_silence_stays_silent() {
        let mut bus = MasterBus::new(SR);
        let mut left = vec![0.0; 256];
        let mut right = vec![0.0; 256];
        bus.render_stereo(&mut left, &mut right, &RenderCtx::new(SR));
        assert!(left.iter().chain(&right).all(|&x| x == 0.0));
    }

    #[test]
    fn test_output_never_exceeds_clipper_range() {
        let mut bus = MasterBus::new(SR);
        bus.set_volume(1.0, 0.0);
        let mut left = vec![8.0; 4800];
        let mut right = vec![-8.0; 4800];
        bus.render_stereo(&mut left, &mut right, &RenderCtx::new(SR).at(0.1));
        for x in left.iter().chain(&right) {
            assert_le!(x.abs(), 1.0);
        }
        // settled output sits near the ceiling
        assert_le!(gain_to_db(left[4799].abs()), 0.0);
    }

    #[test]
    fn test_volume_modulation_is_clamped() {
        let mut bus = MasterBus::new(SR);
        bus.apply_modulation(MasterParam::Volume, 1.7, 0.0);
        assert_eq!(bus.get_param(MasterParam::Volume), 1.0);
        assert_eq!(bus.volume_at(1.0), 1.0);
        bus.set_ceiling(-6.0);
        assert_eq!(bus.ceiling(), -6.0);
    }
}
