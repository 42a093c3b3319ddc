use core::f64::consts::{PI, TAU};

use num_traits::Float;

#[macro_export]
macro_rules! signed_mod {
    ($dividend:expr, $divisor:expr) => {
        (($dividend % $divisor) + $divisor) % $divisor
    };
}
#[macro_export]
macro_rules! lerp {
    ($value1:expr, $value2:expr, $t:expr) => {
        $value1 + ($value2 - $value1) * $t
    };
}

pub use lerp;
pub use signed_mod;

/// Wraps an angle in radians into (-π, π].
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = signed_mod!(angle, TAU);
    if wrapped > PI {
        wrapped - TAU
    } else {
        wrapped
    }
}

/// Wraps an angle in degrees into (-180, 180].
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = signed_mod!(angle, 360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Shortest signed rotation from `current` to `target`, both in degrees.
pub fn smallest_angle_deg(target: f64, current: f64) -> f64 {
    wrap_degrees(target - current)
}

/// -1, 0 or 1. Unlike `f64::signum`, zero maps to zero.
pub fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Clamps only when a limit pair is configured. `(0, 0)` means unlimited.
pub fn clamp_limits(value: f64, lower: f64, upper: f64) -> f64 {
    if lower == 0.0 && upper == 0.0 {
        value
    } else {
        value.clamp(lower, upper)
    }
}

/// Splits throttle and steer into left/right outputs, scaled down together
/// so neither side exceeds 1.
pub fn arcade_desaturate(lateral: f64, angular: f64) -> (f64, f64) {
    let left = lateral - angular;
    let right = lateral + angular;
    let sum = (lateral.abs() + angular.abs()).max(1.0);
    (left / sum, right / sum)
}

/// Least-squares line through `(x, y)` points as `(slope, intercept)`.
/// `None` with fewer than two distinct x values.
pub fn linear_regression(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let (sxy, sxx) = points.iter().fold((0.0, 0.0), |(sxy, sxx), &(x, y)| {
        (sxy + (x - mean_x) * (y - mean_y), sxx + (x - mean_x) * (x - mean_x))
    });
    if points.len() < 2 || !(sxx > 1e-12) {
        return None;
    }
    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn wrap_angle_range() {
        assert_relative_eq!(wrap_angle(PI), PI);
        assert_relative_eq!(wrap_angle(-PI), PI);
        assert_relative_eq!(wrap_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_angle(-5.0 * TAU + 0.25), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn smallest_angle_crosses_zero() {
        assert_relative_eq!(smallest_angle_deg(10.0, 350.0), 20.0);
        assert_relative_eq!(smallest_angle_deg(350.0, 10.0), -20.0);
        assert_relative_eq!(smallest_angle_deg(90.0, 90.0), 0.0);
    }

    #[test]
    fn desaturate_keeps_ratio() {
        let (left, right) = arcade_desaturate(1.0, 1.0);
        assert_relative_eq!(left, 0.0);
        assert_relative_eq!(right, 1.0);
        let (left, right) = arcade_desaturate(0.5, -0.25);
        assert_relative_eq!(left, 0.75);
        assert_relative_eq!(right, 0.25);
    }

    #[test]
    fn regression_fits_a_line() {
        let (slope, intercept) = linear_regression(&[(0.0, 1.0), (1.0, 3.1), (2.0, 4.9), (3.0, 7.0)]).unwrap();
        assert_relative_eq!(slope, 1.98, epsilon = 1e-9);
        assert_relative_eq!(intercept, 1.03, epsilon = 1e-9);
        assert_eq!(linear_regression(&[(1.0, 1.0), (1.0, 2.0)]), None);
        assert_eq!(linear_regression(&[]), None);
    }

    #[test]
    fn limits_of_zero_are_ignored() {
        assert_eq!(clamp_limits(5.0, 0.0, 0.0), 5.0);
        assert_eq!(clamp_limits(5.0, -1.0, 1.0), 1.0);
        assert_eq!(lerp!(2.0, 4.0, 0.25), 2.5);
    }
}
