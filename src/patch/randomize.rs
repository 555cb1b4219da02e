use crate::dsp::random::DeterministicRandom;
use crate::patch::Patch;

/// Perturb the randomizable subset of `patch` from `seed`.
///
/// Fields are drawn in a fixed order, so the same seed applied to the same
/// patch always produces the same result.
pub fn randomize(patch: &mut Patch, seed: u32) {
    let mut rng = DeterministicRandom::new(seed);
    let mut range = |min: f64, max: f64| rng.next_range(min, max) as f32;

    patch.oscillators.osc_a.morph = range(0.0, 1.0);
    patch.oscillators.osc_b.morph = range(0.0, 1.0);
    patch.sub.level = range(0.5, 0.9);
    patch.fm.index = range(0.05, 0.45);
    patch.filters.filter1.cutoff = range(80.0, 260.0);
    patch.filters.filter2.cutoff = range(400.0, 1200.0);
    patch.envelopes.amp.attack = range(0.005, 0.05);
    patch.fx.chorus.depth = range(0.1, 0.4);
    patch.sidechain.amount = range(0.15, 0.35);
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::{assert_ge, assert_le};

    #[test]
    fn test_same_seed_same_patch() {
        let mut a = Patch::default();
        let mut b = Patch::default();
        randomize(&mut a, 42);
        randomize(&mut b, 42);
        assert_eq!(a, b);

        let mut c = Patch::default();
        randomize(&mut c, 43);
        assert_ne!(a, c);
    }

    #[test]
    fn test_only_the_randomizable_fields_move() {
        let base = Patch::default();
        let mut patch = base.clone();
        randomize(&mut patch, 1_234_567);

        assert_ge!(patch.filters.filter1.cutoff, 80.0);
        assert_le!(patch.filters.filter1.cutoff, 260.0);
        assert_ge!(patch.sidechain.amount, 0.15);
        assert_le!(patch.sidechain.amount, 0.35);

        // first draw of seed 1234567
        assert!((patch.oscillators.osc_a.morph - 0.009787032).abs() < 1e-6);

        assert_eq!(patch.global, base.global);
        assert_eq!(patch.filters.filter2.resonance, base.filters.filter2.resonance);
        assert_eq!(patch.envelopes.amp.release, base.envelopes.amp.release);
        assert_eq!(patch.lfo, base.lfo);
    }

    #[test]
    fn test_randomized_patch_stays_valid() {
        for seed in [1u32, 7, 99, 123_456, u32::MAX] {
            let mut patch = Patch::default();
            randomize(&mut patch, seed);
            let before = patch.clone();
            patch.validate().unwrap();
            patch.sanitize().unwrap();
            assert_eq!(patch, before, "seed {seed} produced out-of-range values");
        }
    }
}
