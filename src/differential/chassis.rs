use alloc::{boxed::Box, rc::Rc};
use core::cell::{Cell, RefCell};

use bon::Builder;
use log::debug;
use nalgebra::Vector2;
use num_traits::Float;

use super::pose::{Pose, Twist};
use crate::{
    controllers::Feedback,
    tracking::OdometryBase,
    utils::math::{arcade_desaturate, smallest_angle_deg, wrap_degrees},
};

/// The motor side of a tank chassis.
pub trait Drivetrain {
    /// Left and right outputs as fractions of full power in [-1, 1].
    fn drive_tank(&mut self, left: f64, right: f64);

    /// Measured left and right wheel speeds as fractions of top speed, if
    /// the motors report them.
    fn wheel_velocities(&self) -> Option<(f64, f64)> {
        None
    }

    /// Puts the motors into a safe, stopped state.
    fn stop(&mut self) {
        self.drive_tank(0.0, 0.0);
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Clone, Debug, Builder)]
pub struct TankDriveConfig {
    /// Distance between the left and right wheels, in inches.
    pub track_width: f64,

    /// Within this many inches of a point, heading correction is turned off
    /// since the angle to the point gets noisy.
    #[builder(default = 2.0)]
    pub correction_cutoff: f64,
}

/// A tank chassis that owns the drivetrain output.
///
/// Holds the motors, a handle to odometry, and the feedback loops used by the
/// point-to-point motions. Each motion method is meant to be called once per
/// control tick and returns `true` when it has finished.
pub struct TankDrive {
    drivetrain: RefCell<Box<dyn Drivetrain>>,
    odometry: Rc<dyn OdometryBase>,
    drive_feedback: RefCell<Box<dyn Feedback>>,
    turn_feedback: RefCell<Box<dyn Feedback>>,
    config: TankDriveConfig,
    motion_initialized: Cell<bool>,
    /// Target captured on the first tick of a relative motion.
    relative_target: Cell<Option<Pose>>,
}

impl TankDrive {
    pub fn new(
        drivetrain: Box<dyn Drivetrain>,
        odometry: Rc<dyn OdometryBase>,
        drive_feedback: Box<dyn Feedback>,
        turn_feedback: Box<dyn Feedback>,
        config: TankDriveConfig,
    ) -> Self {
        Self {
            drivetrain: RefCell::new(drivetrain),
            odometry,
            drive_feedback: RefCell::new(drive_feedback),
            turn_feedback: RefCell::new(turn_feedback),
            config,
            motion_initialized: Cell::new(false),
            relative_target: Cell::new(None),
        }
    }

    pub fn odometry(&self) -> &Rc<dyn OdometryBase> {
        &self.odometry
    }

    pub fn pose(&self) -> Pose {
        self.odometry.pose()
    }

    pub fn track_width(&self) -> f64 {
        self.config.track_width
    }

    pub fn drive_tank(&self, left: f64, right: f64) {
        self.drivetrain
            .borrow_mut()
            .drive_tank(left.clamp(-1.0, 1.0), right.clamp(-1.0, 1.0));
    }

    pub fn wheel_velocities(&self) -> Option<(f64, f64)> {
        self.drivetrain.borrow().wheel_velocities()
    }

    /// `forward` drives straight, positive `turn` rotates counter-clockwise.
    pub fn drive_arcade(&self, forward: f64, turn: f64) {
        let (left, right) = arcade_desaturate(forward, turn);
        self.drive_tank(left, right);
    }

    /// Stops the motors and forgets any motion in progress.
    pub fn stop(&self) {
        self.reset_auto();
        self.drivetrain.borrow_mut().stop();
    }

    /// Clears the per-motion state so the next motion starts fresh.
    pub fn reset_auto(&self) {
        self.motion_initialized.set(false);
        self.relative_target.set(None);
    }

    fn relative_target(&self, offset: impl FnOnce(Pose) -> Pose) -> Pose {
        match self.relative_target.get() {
            Some(target) => target,
            None => {
                let target = offset(self.odometry.pose());
                self.relative_target.set(Some(target));
                target
            }
        }
    }

    /// Drives `inches` along the heading held when the motion started.
    /// Negative distances back up.
    pub fn drive_forward(&self, inches: f64, max_speed: f64) -> bool {
        let target = self.relative_target(|start| start.exp(Twist::new(inches, 0.0, 0.0)));
        let direction = if inches < 0.0 {
            Direction::Reverse
        } else {
            Direction::Forward
        };
        self.drive_to_point(target.x(), target.y(), direction, max_speed)
    }

    /// Turns by `degrees` relative to the heading held when the motion
    /// started. Positive is counter-clockwise.
    pub fn turn_degrees(&self, degrees: f64, max_speed: f64) -> bool {
        let target = self.relative_target(|start| Pose {
            orientation: start.orientation + degrees.to_radians(),
            ..start
        });
        self.turn_to_heading(target.orientation.to_degrees(), max_speed)
    }

    /// Turns in place to face a field point.
    pub fn turn_to_point(&self, x: f64, y: f64, max_speed: f64) -> bool {
        let target = self.relative_target(|start| {
            let offset = Vector2::new(x, y) - start.position;
            Pose {
                orientation: offset.y.atan2(offset.x),
                ..start
            }
        });
        self.turn_to_heading(target.orientation.to_degrees(), max_speed)
    }

    /// Drives to a field point, correcting heading along the way.
    pub fn drive_to_point(&self, x: f64, y: f64, direction: Direction, max_speed: f64) -> bool {
        let pose = self.odometry.pose();
        let local = pose.to_local(&Vector2::new(x, y));

        let (along, angle_to_point) = match direction {
            Direction::Forward => (local.x, local.y.atan2(local.x).to_degrees()),
            Direction::Reverse => (local.x, (-local.y).atan2(-local.x).to_degrees()),
        };
        let distance = local.norm();

        let mut drive_feedback = self.drive_feedback.borrow_mut();
        let mut turn_feedback = self.turn_feedback.borrow_mut();
        if !self.motion_initialized.get() {
            drive_feedback.init(-along, 0.0);
            turn_feedback.init(-angle_to_point, 0.0);
            self.motion_initialized.set(true);
            debug!("driving to ({x:.1}, {y:.1}) from {:?}", pose.position);
        }

        drive_feedback.set_limits(-max_speed.abs(), max_speed.abs());
        turn_feedback.set_limits(-max_speed.abs(), max_speed.abs());
        let drive_output = drive_feedback.update(-along);
        let turn_output = if distance < self.config.correction_cutoff {
            0.0
        } else {
            turn_feedback.update(-wrap_degrees(angle_to_point))
        };

        if drive_feedback.is_on_target() {
            drop(drive_feedback);
            drop(turn_feedback);
            self.stop();
            return true;
        }

        self.drive_arcade(drive_output, turn_output);
        false
    }

    /// Turns in place to a field heading in degrees.
    pub fn turn_to_heading(&self, heading_deg: f64, max_speed: f64) -> bool {
        let current = self.odometry.pose().heading_degrees();
        let error = smallest_angle_deg(heading_deg, current);

        let mut turn_feedback = self.turn_feedback.borrow_mut();
        if !self.motion_initialized.get() {
            turn_feedback.init(-error, 0.0);
            self.motion_initialized.set(true);
            debug!("turning to {heading_deg:.1} deg from {current:.1} deg");
        }

        turn_feedback.set_limits(-max_speed.abs(), max_speed.abs());
        let output = turn_feedback.update(-error);

        if turn_feedback.is_on_target() {
            drop(turn_feedback);
            self.stop();
            return true;
        }

        self.drive_tank(-output, output);
        false
    }
}

#[cfg(test)]
pub(crate) mod sim {
    //! A kinematic tank chassis used to exercise the motion code.

    use alloc::{boxed::Box, rc::Rc};
    use core::{cell::Cell, time::Duration};

    use super::{Drivetrain, TankDrive, TankDriveConfig};
    use crate::{
        controllers::{Pid, PidConfig},
        differential::pose::{Pose, Twist},
        tracking::{
            odom::tank::{TankOdometry, TankOdometryConfig},
            sim::SimEncoder,
            Odometry, OdometryBase,
        },
        utils::clock::ManualClock,
    };

    pub const TRACK_WIDTH: f64 = 12.0;
    /// Wheel speed at full output, in inches per second.
    pub const TOP_SPEED: f64 = 60.0;
    pub const CONTROL_PERIOD: Duration = Duration::from_millis(20);

    #[derive(Default)]
    pub struct SimState {
        pub pose: Cell<Pose>,
        pub left: Cell<f64>,
        pub right: Cell<f64>,
        pub stops: Cell<usize>,
        pub left_travel: Cell<f64>,
        pub right_travel: Cell<f64>,
    }

    /// Drives a shared [`SimState`].
    pub struct SimDrivetrain(pub Rc<SimState>);

    impl Drivetrain for SimDrivetrain {
        fn drive_tank(&mut self, left: f64, right: f64) {
            self.0.left.set(left);
            self.0.right.set(right);
        }

        // The simulated wheels reach their commanded speed instantly.
        fn wheel_velocities(&self) -> Option<(f64, f64)> {
            Some((self.0.left.get(), self.0.right.get()))
        }

        fn stop(&mut self) {
            self.drive_tank(0.0, 0.0);
            self.0.stops.set(self.0.stops.get() + 1);
        }
    }

    impl SimState {
        pub fn new(pose: Pose) -> Rc<Self> {
            let state = Self::default();
            state.pose.set(pose);
            Rc::new(state)
        }

        /// Integrates the commanded outputs for `dt` seconds, where an output
        /// of 1 moves a wheel at `top_speed` inches per second.
        pub fn step(&self, dt: f64, top_speed: f64, track_width: f64) {
            let dl = self.left.get() * top_speed * dt;
            let dr = self.right.get() * top_speed * dt;
            self.left_travel.set(self.left_travel.get() + dl);
            self.right_travel.set(self.right_travel.get() + dr);
            let twist = Twist::new((dl + dr) / 2.0, 0.0, (dr - dl) / track_width);
            self.pose.set(self.pose.get().exp(twist));
        }

        pub fn is_stopped(&self) -> bool {
            self.left.get() == 0.0 && self.right.get() == 0.0
        }
    }

    /// A simulated chassis tracked by real tank odometry on simulated
    /// encoders.
    pub struct Rig {
        pub clock: Rc<ManualClock>,
        pub state: Rc<SimState>,
        pub odometry: Rc<Odometry<TankOdometry>>,
        pub drive: Rc<TankDrive>,
        left: SimEncoder,
        right: SimEncoder,
    }

    impl Rig {
        pub fn new(start: Pose) -> Self {
            let clock = ManualClock::new();
            let state = SimState::new(start);
            let (left, right) = (SimEncoder::new(), SimEncoder::new());
            let odometry = Odometry::new(
                TankOdometry::new(
                    Box::new(left.clone()),
                    Box::new(right.clone()),
                    None,
                    TankOdometryConfig::builder().track_width(TRACK_WIDTH).build(),
                ),
                clock.clone(),
            );
            odometry.update();
            odometry.set_position(start);

            let drive_pid = PidConfig::builder()
                .p(0.1)
                .deadband(0.5)
                .on_target_time(0.1)
                .build();
            let turn_pid = PidConfig::builder()
                .p(0.02)
                .deadband(1.0)
                .on_target_time(0.1)
                .build();
            let drive = Rc::new(TankDrive::new(
                Box::new(SimDrivetrain(state.clone())),
                odometry.clone(),
                Box::new(Pid::new(drive_pid, clock.clone())),
                Box::new(Pid::new(turn_pid, clock.clone())),
                TankDriveConfig::builder().track_width(TRACK_WIDTH).build(),
            ));

            Self {
                clock,
                state,
                odometry,
                drive,
                left,
                right,
            }
        }

        /// Moves the chassis for one control period and refreshes odometry.
        pub fn advance(&self) {
            self.state
                .step(CONTROL_PERIOD.as_secs_f64(), TOP_SPEED, TRACK_WIDTH);
            self.left.set(self.state.left_travel.get());
            self.right.set(self.state.right_travel.get());
            self.clock.advance(CONTROL_PERIOD);
            self.odometry.update();
        }

        /// Calls `motion` once per control period until it reports done.
        /// Returns the number of periods it took, or `None` if it ran out.
        pub fn run_until(&self, max_ticks: usize, mut motion: impl FnMut() -> bool) -> Option<usize> {
            for tick in 0..max_ticks {
                if motion() {
                    return Some(tick);
                }
                self.advance();
            }
            None
        }
    }
}
