//! Panning law.

/*
Equal-Power Panning
===================

A mono signal is placed in the stereo field by splitting it into two
weighted copies. Linear weights (1 - x, x) dip in loudness at the centre
because power, not amplitude, adds. Equal-power weights keep the perceived
level constant:

    x      = (pan + 1) / 2          pan ∈ [-1, 1]
    left   = cos(x · π/2)
    right  = sin(x · π/2)

    pan    left    right
    -1.0   1.000   0.000
     0.0   0.707   0.707
    +1.0   0.000   1.000
*/

use std::f32::consts::FRAC_PI_2;

/// Left/right gains for a pan position in [-1, 1].
#[inline]
pub fn equal_power(pan: f32) -> (f32, f32) {
    let x = (pan.clamp(-1.0, 1.0) + 1.0) * 0.5;
    let angle = x * FRAC_PI_2;
    (angle.cos(), angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_is_equal_power() {
        let (l, r) = equal_power(0.0);
        assert!((l - r).abs() < 1e-6);
        assert!((l * l + r * r - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hard_pans() {
        let (l, r) = equal_power(-1.0);
        assert!((l - 1.0).abs() < 1e-6 && r.abs() < 1e-6);
        let (l, r) = equal_power(3.0);
        assert!(l.abs() < 1e-6 && (r - 1.0).abs() < 1e-6);
    }
}
