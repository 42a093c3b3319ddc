use num_traits::Float;

use super::MotionState;
use crate::error::{ConfigError, Result};

/// A velocity-limited, acceleration-limited move between two positions.
///
/// The move accelerates, cruises at `max_v`, then decelerates. When the
/// distance is too short to reach `max_v` the cruise disappears and the
/// profile peaks at the highest velocity that still allows stopping in time.
#[derive(Clone, Copy, Debug)]
pub struct TrapezoidProfile {
    max_v: f64,
    accel: f64,
    decel: f64,

    start: f64,
    end: f64,
    start_vel: f64,
    end_vel: f64,

    // Derived whenever endpoints change. Distances and velocities here are
    // magnitudes along the direction of travel.
    direction: f64,
    entry_vel: f64,
    exit_vel: f64,
    peak_vel: f64,
    accel_time: f64,
    cruise_time: f64,
    decel_time: f64,
    accel_dist: f64,
    cruise_dist: f64,
}

impl TrapezoidProfile {
    /// Fails when either limit is not a positive, finite number.
    pub fn new(max_v: f64, accel: f64) -> Result<Self> {
        if !(max_v.is_finite() && accel.is_finite() && max_v > 0.0 && accel > 0.0) {
            return Err(ConfigError::InvalidProfile { max_v, accel });
        }
        let mut profile = Self {
            max_v,
            accel,
            decel: accel,
            start: 0.0,
            end: 0.0,
            start_vel: 0.0,
            end_vel: 0.0,
            direction: 1.0,
            entry_vel: 0.0,
            exit_vel: 0.0,
            peak_vel: 0.0,
            accel_time: 0.0,
            cruise_time: 0.0,
            decel_time: 0.0,
            accel_dist: 0.0,
            cruise_dist: 0.0,
        };
        profile.precalculate();
        Ok(profile)
    }

    /// Uses a separate deceleration limit for the ramp down.
    pub fn with_decel(mut self, decel: f64) -> Result<Self> {
        if !(decel.is_finite() && decel > 0.0) {
            return Err(ConfigError::InvalidProfile {
                max_v: self.max_v,
                accel: decel,
            });
        }
        self.decel = decel;
        self.precalculate();
        Ok(self)
    }

    pub fn set_endpts(&mut self, start: f64, end: f64) {
        self.start = start;
        self.end = end;
        self.precalculate();
    }

    /// Velocities at the start and end of the move, as speeds along the
    /// direction of travel.
    ///
    /// An end speed that can't be reached over the distance is lowered to the
    /// fastest reachable one, and a start speed too fast to slow down from is
    /// lowered the same way.
    pub fn set_vel_endpts(&mut self, start_vel: f64, end_vel: f64) {
        self.start_vel = start_vel.abs().min(self.max_v);
        self.end_vel = end_vel.abs().min(self.max_v);
        self.precalculate();
    }

    pub fn set_max_v(&mut self, max_v: f64) -> Result<()> {
        if !(max_v.is_finite() && max_v > 0.0) {
            return Err(ConfigError::InvalidProfile {
                max_v,
                accel: self.accel,
            });
        }
        self.max_v = max_v;
        self.precalculate();
        Ok(())
    }

    pub fn total_time(&self) -> f64 {
        self.accel_time + self.cruise_time + self.decel_time
    }

    /// Speed the profile actually finishes at.
    pub fn end_velocity(&self) -> f64 {
        self.exit_vel
    }

    /// Highest speed the profile reaches.
    pub fn peak_velocity(&self) -> f64 {
        self.peak_vel
    }

    /// Samples the profile `t` seconds after it starts. Times outside the
    /// move are clamped to its ends.
    pub fn calculate(&self, t: f64) -> MotionState {
        let total = self.total_time();
        if t >= total {
            return MotionState {
                time: t,
                pos: self.end,
                vel: self.direction * self.exit_vel,
                accel: 0.0,
            };
        }
        let t = t.max(0.0);

        let (distance, vel, accel) = if t < self.accel_time {
            (
                self.entry_vel * t + 0.5 * self.accel * t * t,
                self.entry_vel + self.accel * t,
                self.accel,
            )
        } else if t < self.accel_time + self.cruise_time {
            let tc = t - self.accel_time;
            (self.accel_dist + self.peak_vel * tc, self.peak_vel, 0.0)
        } else {
            let td = t - self.accel_time - self.cruise_time;
            (
                self.accel_dist + self.cruise_dist + self.peak_vel * td
                    - 0.5 * self.decel * td * td,
                self.peak_vel - self.decel * td,
                -self.decel,
            )
        };

        MotionState {
            time: t,
            pos: self.start + self.direction * distance,
            vel: self.direction * vel,
            accel: self.direction * accel,
        }
    }

    fn precalculate(&mut self) {
        let distance = (self.end - self.start).abs();
        self.direction = if self.end >= self.start { 1.0 } else { -1.0 };

        let vf = self
            .end_vel
            .min((self.start_vel * self.start_vel + 2.0 * self.accel * distance).sqrt());
        let v0 = self
            .start_vel
            .min((vf * vf + 2.0 * self.decel * distance).sqrt());
        self.entry_vel = v0;
        self.exit_vel = vf;

        let full_accel_dist = (self.max_v * self.max_v - v0 * v0) / (2.0 * self.accel);
        let full_decel_dist = (self.max_v * self.max_v - vf * vf) / (2.0 * self.decel);

        self.peak_vel = if full_accel_dist + full_decel_dist <= distance {
            self.max_v
        } else {
            // Triangular: the ramps meet before reaching max_v.
            let (a, d) = (self.accel, self.decel);
            ((2.0 * a * d * distance + d * v0 * v0 + a * vf * vf) / (a + d))
                .sqrt()
                .max(v0.max(vf).min(self.max_v))
        };

        self.accel_time = ((self.peak_vel - v0) / self.accel).max(0.0);
        self.decel_time = ((self.peak_vel - vf) / self.decel).max(0.0);
        self.accel_dist = v0 * self.accel_time + 0.5 * self.accel * self.accel_time * self.accel_time;
        let decel_dist =
            self.peak_vel * self.decel_time - 0.5 * self.decel * self.decel_time * self.decel_time;
        self.cruise_dist = (distance - self.accel_dist - decel_dist).max(0.0);
        self.cruise_time = self.cruise_dist / self.peak_vel.max(f64::EPSILON);
    }
}
