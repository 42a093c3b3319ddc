//! Commands that move the chassis through [`TankDrive`].
//!
//! Each one clears the chassis' motion state on its first step and stops the
//! motors if it is cancelled or runs out of time.

use alloc::rc::Rc;

use super::{AutoCommand, CommandContext};
use crate::{
    differential::{
        chassis::{Direction, TankDrive},
        pose::Pose,
    },
    tracking::OdometryBase,
};

macro_rules! drive_command {
    ($name:ident, |$this:ident, $drive:ident| $motion:expr) => {
        impl AutoCommand for $name {
            fn run(&mut self, _ctx: &mut CommandContext) -> bool {
                if !self.started {
                    self.drive.reset_auto();
                    self.started = true;
                }
                let $this = &*self;
                let $drive = &self.drive;
                $motion
            }

            fn on_timeout(&mut self) {
                self.drive.stop();
            }

            fn cancel(&mut self) {
                self.drive.stop();
            }
        }
    };
}

#[derive(Clone)]
pub struct DriveForward {
    drive: Rc<TankDrive>,
    inches: f64,
    max_speed: f64,
    started: bool,
}

impl DriveForward {
    pub fn new(drive: Rc<TankDrive>, inches: f64, max_speed: f64) -> Self {
        Self {
            drive,
            inches,
            max_speed,
            started: false,
        }
    }
}

drive_command!(DriveForward, |this, drive| drive.drive_forward(this.inches, this.max_speed));

#[derive(Clone)]
pub struct TurnDegrees {
    drive: Rc<TankDrive>,
    degrees: f64,
    max_speed: f64,
    started: bool,
}

impl TurnDegrees {
    pub fn new(drive: Rc<TankDrive>, degrees: f64, max_speed: f64) -> Self {
        Self {
            drive,
            degrees,
            max_speed,
            started: false,
        }
    }
}

drive_command!(TurnDegrees, |this, drive| drive.turn_degrees(this.degrees, this.max_speed));

#[derive(Clone)]
pub struct TurnToHeading {
    drive: Rc<TankDrive>,
    heading_deg: f64,
    max_speed: f64,
    started: bool,
}

impl TurnToHeading {
    pub fn new(drive: Rc<TankDrive>, heading_deg: f64, max_speed: f64) -> Self {
        Self {
            drive,
            heading_deg,
            max_speed,
            started: false,
        }
    }
}

drive_command!(TurnToHeading, |this, drive| drive
    .turn_to_heading(this.heading_deg, this.max_speed));

#[derive(Clone)]
pub struct DriveToPoint {
    drive: Rc<TankDrive>,
    x: f64,
    y: f64,
    direction: Direction,
    max_speed: f64,
    started: bool,
}

impl DriveToPoint {
    pub fn new(drive: Rc<TankDrive>, x: f64, y: f64, direction: Direction, max_speed: f64) -> Self {
        Self {
            drive,
            x,
            y,
            direction,
            max_speed,
            started: false,
        }
    }
}

drive_command!(DriveToPoint, |this, drive| drive
    .drive_to_point(this.x, this.y, this.direction, this.max_speed));

#[derive(Clone)]
pub struct TurnToPoint {
    drive: Rc<TankDrive>,
    x: f64,
    y: f64,
    max_speed: f64,
    started: bool,
}

impl TurnToPoint {
    pub fn new(drive: Rc<TankDrive>, x: f64, y: f64, max_speed: f64) -> Self {
        Self {
            drive,
            x,
            y,
            max_speed,
            started: false,
        }
    }
}

drive_command!(TurnToPoint, |this, drive| drive
    .turn_to_point(this.x, this.y, this.max_speed));

/// Stops the drivetrain and finishes.
#[derive(Clone)]
pub struct DriveStop {
    drive: Rc<TankDrive>,
}

impl DriveStop {
    pub fn new(drive: Rc<TankDrive>) -> Self {
        Self { drive }
    }
}

impl AutoCommand for DriveStop {
    fn run(&mut self, _ctx: &mut CommandContext) -> bool {
        self.drive.stop();
        true
    }
}

/// Re-anchors odometry to a known pose.
#[derive(Clone)]
pub struct OdomSetPosition {
    odometry: Rc<dyn OdometryBase>,
    pose: Pose,
}

impl OdomSetPosition {
    pub fn new(odometry: Rc<dyn OdometryBase>, pose: Pose) -> Self {
        Self { odometry, pose }
    }
}

impl AutoCommand for OdomSetPosition {
    fn run(&mut self, _ctx: &mut CommandContext) -> bool {
        self.odometry.set_position(self.pose);
        true
    }
}
