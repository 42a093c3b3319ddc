use alloc::boxed::Box;

use bon::Builder;

use super::wheel_delta;
use crate::{
    differential::pose::{Pose, Twist},
    tracking::{Encoder, HeadingSensor, OdometryVariant},
    utils::math::wrap_angle,
};

#[derive(Clone, Debug, Builder)]
pub struct TankOdometryConfig {
    /// Distance between the left and right tracking wheels, in inches.
    pub track_width: f64,
}

/// Odometry for a skid-steer chassis from left/right wheel travel.
///
/// With an inertial sensor the heading comes from it. Without one it is
/// inferred from the difference in wheel travel.
pub struct TankOdometry {
    left: Box<dyn Encoder>,
    right: Box<dyn Encoder>,
    imu: Option<Box<dyn HeadingSensor>>,
    config: TankOdometryConfig,

    previous_left: Option<f64>,
    previous_right: Option<f64>,
    /// Added to the raw sensor heading to get the field heading.
    heading_offset: f64,
    /// Set when the pose was re-anchored while the IMU had no reading. The
    /// next reading is lined up with the heading at that point.
    offset_stale: bool,
}

impl TankOdometry {
    pub fn new(
        left: Box<dyn Encoder>,
        right: Box<dyn Encoder>,
        imu: Option<Box<dyn HeadingSensor>>,
        config: TankOdometryConfig,
    ) -> Self {
        Self {
            left,
            right,
            imu,
            config,
            previous_left: None,
            previous_right: None,
            heading_offset: 0.0,
            offset_stale: false,
        }
    }

    fn imu_heading(&self) -> Option<f64> {
        self.imu.as_ref().and_then(|imu| imu.heading())
    }
}

impl OdometryVariant for TankOdometry {
    fn update(&mut self, previous: Pose) -> Pose {
        let delta_left = wheel_delta(self.left.as_ref(), &mut self.previous_left);
        let delta_right = wheel_delta(self.right.as_ref(), &mut self.previous_right);

        let delta_heading = match self.imu_heading() {
            Some(raw) => {
                if self.offset_stale {
                    self.heading_offset = previous.orientation - raw;
                    self.offset_stale = false;
                }
                wrap_angle(raw + self.heading_offset - previous.orientation)
            }
            None => (delta_right - delta_left) / self.config.track_width,
        };

        previous.exp(Twist::new(
            (delta_left + delta_right) / 2.0,
            0.0,
            delta_heading,
        ))
    }

    fn set_position(&mut self, pose: &Pose) {
        match self.imu_heading() {
            Some(raw) => {
                self.heading_offset = pose.orientation - raw;
                self.offset_stale = false;
            }
            None => self.offset_stale = self.imu.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use core::f64::consts::{FRAC_PI_2, PI};

    use approx::assert_relative_eq;

    use super::*;
    use crate::tracking::sim::{SimEncoder, SimHeading};

    fn setup(imu: Option<SimHeading>) -> (TankOdometry, SimEncoder, SimEncoder) {
        let (left, right) = (SimEncoder::new(), SimEncoder::new());
        let mut odometry = TankOdometry::new(
            Box::new(left.clone()),
            Box::new(right.clone()),
            imu.map(|imu| Box::new(imu) as Box<dyn HeadingSensor>),
            TankOdometryConfig::builder().track_width(10.0).build(),
        );
        odometry.update(Pose::default());
        (odometry, left, right)
    }

    #[test]
    fn straight_line() {
        let (mut odometry, left, right) = setup(None);
        left.add(12.0);
        right.add(12.0);
        let pose = odometry.update(Pose::new(0.0, 0.0, FRAC_PI_2));
        assert_relative_eq!(pose.x(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(pose.y(), 12.0);
    }

    #[test]
    fn turn_in_place_from_encoders() {
        let (mut odometry, left, right) = setup(None);
        let mut pose = Pose::new(5.0, 5.0, 0.0);
        // Half a turn counter-clockwise: each wheel travels π * r.
        for _ in 0..20 {
            left.add(-5.0 * PI / 20.0);
            right.add(5.0 * PI / 20.0);
            pose = odometry.update(pose);
        }
        assert_relative_eq!(pose.x(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(pose.y(), 5.0, epsilon = 1e-9);
        assert_relative_eq!(pose.orientation.abs(), PI, epsilon = 1e-9);
    }

    #[test]
    fn arc_is_integrated_exactly() {
        let (mut odometry, left, right) = setup(None);
        // Radius 20 arc through a quarter turn in a single update.
        left.add(15.0 * FRAC_PI_2);
        right.add(25.0 * FRAC_PI_2);
        let pose = odometry.update(Pose::default());
        assert_relative_eq!(pose.x(), 20.0, epsilon = 1e-9);
        assert_relative_eq!(pose.y(), 20.0, epsilon = 1e-9);
        assert_relative_eq!(pose.orientation, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn imu_heading_overrides_wheels() {
        let imu = SimHeading::default();
        imu.0.set(Some(0.0));
        let (mut odometry, left, right) = setup(Some(imu.clone()));
        odometry.set_position(&Pose::new(0.0, 0.0, FRAC_PI_2));
        // Wheels slip and disagree, the IMU says we did not turn.
        left.add(10.0);
        right.add(14.0);
        let pose = odometry.update(Pose::new(0.0, 0.0, FRAC_PI_2));
        assert_relative_eq!(pose.orientation, FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(pose.y(), 12.0, epsilon = 1e-9);

        imu.0.set(Some(-0.5));
        let pose = odometry.update(pose);
        assert_relative_eq!(pose.orientation, FRAC_PI_2 - 0.5, epsilon = 1e-12);
    }

    #[test]
    fn reanchoring_during_imu_dropout() {
        let imu = SimHeading::default();
        imu.0.set(Some(1.0));
        let (mut odometry, left, right) = setup(Some(imu.clone()));
        let anchored = Pose::new(0.0, 0.0, -FRAC_PI_2);

        imu.0.set(None);
        odometry.set_position(&anchored);
        // Without the IMU the wheels carry the heading.
        let pose = odometry.update(anchored);
        assert_relative_eq!(pose.orientation, -FRAC_PI_2, epsilon = 1e-12);

        // The IMU comes back at an unrelated raw value; no jump.
        imu.0.set(Some(2.5));
        left.add(6.0);
        right.add(6.0);
        let pose = odometry.update(pose);
        assert_relative_eq!(pose.orientation, -FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(pose.y(), -6.0, epsilon = 1e-9);

        imu.0.set(Some(2.7));
        let pose = odometry.update(pose);
        assert_relative_eq!(pose.orientation, -FRAC_PI_2 + 0.2, epsilon = 1e-12);
    }

    #[test]
    fn failed_reads_hold_last_value() {
        let (mut odometry, left, right) = setup(None);
        left.add(3.0);
        right.add(3.0);
        let pose = odometry.update(Pose::default());
        left.fail();
        let pose = odometry.update(pose);
        assert_relative_eq!(pose.x(), 3.0);
        left.set(5.0);
        right.add(2.0);
        let pose = odometry.update(pose);
        assert_relative_eq!(pose.x(), 5.0, epsilon = 1e-9);
    }
}
