use alloc::{boxed::Box, rc::Rc};
use core::f64::consts::PI;

use bon::Builder;
use log::debug;
use num_traits::Float;

use super::path::Path;
use crate::{
    commands::{AutoCommand, CommandContext},
    controllers::Feedback,
    differential::chassis::{Direction, TankDrive},
    error::{ConfigError, Result},
    utils::math::wrap_angle,
};

#[derive(Clone, Debug, Builder)]
pub struct PurePursuitConfig {
    /// Radius of the lookahead circle, in inches.
    pub lookahead: f64,

    /// Fraction of full power.
    #[builder(default = 1.0)]
    pub max_speed: f64,

    /// Speed to be carrying at the end of the path. Above zero the follower
    /// hands over without stopping, for chaining into another motion.
    #[builder(default = 0.0)]
    pub end_speed: f64,

    /// Distance before the end over which speed ramps toward `end_speed`.
    #[builder(default = 12.0)]
    pub slowdown: f64,

    /// Floor for the ramp, so the chassis never stalls short of the end.
    #[builder(default = 0.15)]
    pub min_speed: f64,

    /// The path counts as finished within this much arc length of its end.
    #[builder(default = 0.5)]
    pub tolerance: f64,

    /// Chassis speed, in inches per second, below which a stopped follower
    /// reports done.
    #[builder(default = 2.0)]
    pub stop_speed: f64,

    #[builder(default = Direction::Forward)]
    pub direction: Direction,
}

/// Follows a [`Path`] by steering toward a point a fixed distance ahead.
///
/// Progress along the path only ever moves forward, so a chassis knocked
/// backward or off the path does not chase points it already passed.
#[derive(Clone)]
pub struct PurePursuit {
    drive: Rc<TankDrive>,
    path: Rc<Path>,
    config: PurePursuitConfig,
    side_feedback: Option<(Box<dyn Feedback>, Box<dyn Feedback>)>,

    progress: f64,
    lookahead_progress: f64,
    started: bool,
    arrived: bool,
}

impl PurePursuit {
    /// Fails when the lookahead radius is not a positive distance.
    pub fn new(drive: Rc<TankDrive>, path: impl Into<Rc<Path>>, config: PurePursuitConfig) -> Result<Self> {
        if !(config.lookahead.is_finite() && config.lookahead > 0.0) {
            return Err(ConfigError::Malformed("lookahead must be a positive distance"));
        }
        Ok(Self {
            drive,
            path: path.into(),
            config,
            side_feedback: None,
            progress: 0.0,
            lookahead_progress: 0.0,
            started: false,
            arrived: false,
        })
    }

    /// Closes the loop on each side's wheel speed with a copy of `feedback`.
    /// Without this, or without wheel speed readings, outputs are open loop.
    pub fn with_side_feedback(mut self, feedback: Box<dyn Feedback>) -> Self {
        self.side_feedback = Some((feedback.clone(), feedback));
        self
    }

    /// Arc length of the closest point reached so far.
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Arc length of the current lookahead point.
    pub fn lookahead_progress(&self) -> f64 {
        self.lookahead_progress
    }

    fn begin(&mut self) {
        self.drive.reset_auto();
        self.progress = 0.0;
        self.lookahead_progress = 0.0;
        self.arrived = false;
        if let Some((left, right)) = &mut self.side_feedback {
            left.init(0.0, 0.0);
            right.init(0.0, 0.0);
        }
        self.started = true;
        debug!("following a {:.1} in path", self.path.length());
    }

    fn speed(&self, remaining: f64) -> f64 {
        let config = &self.config;
        if remaining >= config.slowdown || config.slowdown <= 0.0 {
            return config.max_speed;
        }
        let ramp = config.end_speed + (config.max_speed - config.end_speed) * remaining / config.slowdown;
        ramp.max(config.min_speed)
    }

    /// One control tick. Returns `true` when the path is finished.
    pub fn step(&mut self) -> bool {
        if !self.started {
            self.begin();
        }

        let mut pose = self.drive.pose();
        if self.config.direction == Direction::Reverse {
            pose.orientation = wrap_angle(pose.orientation + PI);
        }

        self.progress = self.path.closest(&pose.position, self.progress);
        let remaining = self.path.remaining(self.progress);
        if self.arrived || remaining < self.config.tolerance {
            if self.config.end_speed > 0.0 {
                return true;
            }
            if !self.arrived {
                debug!("path finished, waiting to stop");
                self.drive.stop();
                self.arrived = true;
            }
            return self.drive.odometry().speed() < self.config.stop_speed;
        }

        let lookahead = self
            .path
            .lookahead(&pose.position, self.config.lookahead, self.progress);
        self.lookahead_progress = self.lookahead_progress.max(lookahead);
        let target = pose.to_local(&self.path.point_at(self.lookahead_progress));

        let curvature = match target.norm_squared() {
            distance_sq if distance_sq > 1e-9 => 2.0 * target.y / distance_sq,
            _ => 0.0,
        };
        let speed = self.speed(remaining);
        let half_track = curvature * self.drive.track_width() / 2.0;
        let (mut left, mut right) = (speed * (1.0 - half_track), speed * (1.0 + half_track));
        let peak = left.abs().max(right.abs());
        if peak > speed && peak > 0.0 {
            left *= speed / peak;
            right *= speed / peak;
        }
        if self.config.direction == Direction::Reverse {
            (left, right) = (-right, -left);
        }

        if let (Some((left_feedback, right_feedback)), Some((measured_left, measured_right))) =
            (&mut self.side_feedback, self.drive.wheel_velocities())
        {
            left += left_feedback.update(measured_left - left);
            right += right_feedback.update(measured_right - right);
        }
        self.drive.drive_tank(left, right);
        false
    }
}

impl AutoCommand for PurePursuit {
    fn run(&mut self, _ctx: &mut CommandContext) -> bool {
        self.step()
    }

    fn on_timeout(&mut self) {
        self.drive.stop();
    }

    fn cancel(&mut self) {
        self.drive.stop();
    }
}
