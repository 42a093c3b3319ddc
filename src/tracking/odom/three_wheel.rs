use alloc::boxed::Box;

use bon::Builder;

use super::wheel_delta;
use crate::{
    differential::pose::{Pose, Twist},
    tracking::{Encoder, OdometryVariant},
};

#[derive(Clone, Debug, Builder)]
pub struct ThreeWheelConfig {
    /// Distance between the two parallel wheels, in inches.
    pub track_width: f64,

    /// How far ahead of the center of rotation the off-axis wheel sits.
    /// Negative when it is behind.
    pub off_axis_center_dist: f64,
}

/// Two parallel tracking wheels plus one perpendicular wheel.
///
/// The perpendicular wheel measures sideways motion, so skidding and strafing
/// are tracked. Positive travel on it means the robot moved to its left.
pub struct ThreeWheelOdometry {
    left: Box<dyn Encoder>,
    right: Box<dyn Encoder>,
    off_axis: Box<dyn Encoder>,
    config: ThreeWheelConfig,

    previous_left: Option<f64>,
    previous_right: Option<f64>,
    previous_off_axis: Option<f64>,
}

impl ThreeWheelOdometry {
    pub fn new(
        left: Box<dyn Encoder>,
        right: Box<dyn Encoder>,
        off_axis: Box<dyn Encoder>,
        config: ThreeWheelConfig,
    ) -> Self {
        Self {
            left,
            right,
            off_axis,
            config,
            previous_left: None,
            previous_right: None,
            previous_off_axis: None,
        }
    }
}

impl OdometryVariant for ThreeWheelOdometry {
    fn update(&mut self, previous: Pose) -> Pose {
        let delta_left = wheel_delta(self.left.as_ref(), &mut self.previous_left);
        let delta_right = wheel_delta(self.right.as_ref(), &mut self.previous_right);
        let delta_off_axis = wheel_delta(self.off_axis.as_ref(), &mut self.previous_off_axis);

        let delta_heading = (delta_right - delta_left) / self.config.track_width;
        // Rotation alone spins the off-axis wheel; only the rest is strafe.
        let strafe = delta_off_axis - delta_heading * self.config.off_axis_center_dist;

        previous.exp(Twist::new(
            (delta_left + delta_right) / 2.0,
            strafe,
            delta_heading,
        ))
    }
}
