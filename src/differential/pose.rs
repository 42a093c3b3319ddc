use core::ops::{Add, Sub};

use nalgebra::{Rotation2, Vector2};
use num_traits::{AsPrimitive, Float, Num};

use crate::utils::math::wrap_angle;

/// Below this rotation the exponential map switches to its series expansion.
const SMALL_ANGLE: f64 = 1e-9;

/// Position in inches and heading in radians, counter-clockwise from +x.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Pose {
    pub position: Vector2<f64>,
    pub orientation: f64,
}

/// A motion expressed in the robot's own frame: `dx` forward, `dy` to the
/// left, `dtheta` counter-clockwise.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Twist {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

impl Twist {
    pub fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Self { dx, dy, dtheta }
    }
}

impl Sub for Pose {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            position: self.position - rhs.position,
            orientation: wrap_angle(self.orientation - rhs.orientation),
        }
    }
}

impl Add for Pose {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            position: self.position + rhs.position,
            orientation: wrap_angle(self.orientation + rhs.orientation),
        }
    }
}

impl Pose {
    /// Heading is wrapped into (-π, π].
    pub fn new<T: Num + AsPrimitive<f64>, U: Num + AsPrimitive<f64>, V: Num + AsPrimitive<f64>>(
        x: T,
        y: U,
        orientation: V,
    ) -> Self {
        Self {
            position: Vector2::<f64>::new(x.as_(), y.as_()),
            orientation: wrap_angle(orientation.as_()),
        }
    }

    pub fn from_degrees(x: f64, y: f64, degrees: f64) -> Self {
        Self::new(x, y, degrees.to_radians())
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn heading_degrees(&self) -> f64 {
        self.orientation.to_degrees()
    }

    pub fn distance_to(&self, pose: &Self) -> f64 {
        self.position.metric_distance(&pose.position)
    }

    /// Rotates a global vector into this pose's frame.
    pub fn to_local(&self, point: &Vector2<f64>) -> Vector2<f64> {
        Rotation2::new(-self.orientation) * (point - self.position)
    }

    /// Applies a robot-relative twist along a constant-curvature arc.
    ///
    /// With `dtheta == 0` this is exactly a straight-line step.
    pub fn exp(&self, twist: Twist) -> Pose {
        let (s, c) = arc_factors(twist.dtheta);
        let local = Vector2::new(twist.dx * s - twist.dy * c, twist.dx * c + twist.dy * s);
        Pose {
            position: self.position + Rotation2::new(self.orientation) * local,
            orientation: wrap_angle(self.orientation + twist.dtheta),
        }
    }

    /// The twist that carries this pose onto `end`. Inverse of [`Pose::exp`].
    pub fn log(&self, end: &Pose) -> Twist {
        let dtheta = wrap_angle(end.orientation - self.orientation);
        let local = self.to_local(&end.position);
        let (s, c) = arc_factors(dtheta);
        let det = s * s + c * c;
        if det == 0.0 {
            return Twist::new(0.0, 0.0, dtheta);
        }
        Twist::new(
            (s * local.x + c * local.y) / det,
            (s * local.y - c * local.x) / det,
            dtheta,
        )
    }
}

/// `sin(θ)/θ` and `(1 - cos(θ))/θ`.
fn arc_factors(dtheta: f64) -> (f64, f64) {
    if dtheta.abs() < SMALL_ANGLE {
        (1.0 - dtheta * dtheta / 6.0, dtheta / 2.0)
    } else {
        (dtheta.sin() / dtheta, (1.0 - dtheta.cos()) / dtheta)
    }
}
