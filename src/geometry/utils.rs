//! # utils
//!
//! Geometric utilities.

use std::f64::consts::{PI, TAU};

/// Absolute difference between two angles, wrapped into [0, pi].
pub fn wrapped_angle_diff(a_rad: f64, b_rad: f64) -> f64 {
    let diff = (a_rad - b_rad).abs() % TAU;
    if diff >= PI {
        TAU - diff
    } else {
        diff
    }
}

/// Overlap length of the intervals `[a_min, a_max]` and `[b_min, b_max]`; zero when disjoint.
pub fn interval_overlap(a_min: f64, a_max: f64, b_min: f64, b_max: f64) -> f64 {
    (a_max.min(b_max) - a_min.max(b_min)).max(0.0)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::{interval_overlap, wrapped_angle_diff};

    #[test]
    fn test_wrapped_angle_diff() {
        assert!((wrapped_angle_diff(0.1, -0.1) - 0.2).abs() < 1e-12);
        assert!((wrapped_angle_diff(PI - 0.1, -PI + 0.1) - 0.2).abs() < 1e-12);
        assert!((wrapped_angle_diff(5.0 * PI, 0.0) - PI).abs() < 1e-12);
        assert!(wrapped_angle_diff(3.0, 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_interval_overlap() {
        assert_eq!(interval_overlap(0., 2., 1., 3.), 1.);
        assert_eq!(interval_overlap(0., 1., 2., 3.), 0.);
    }
}
