use core::time::Duration;

use bon::Builder;
use log::warn;
use num_traits::Float;

use super::Feedback;
use crate::utils::{
    clock::SharedClock,
    math::{clamp_limits, smallest_angle_deg},
};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum ErrorMethod {
    /// `target - measurement`.
    #[default]
    Linear,
    /// Shortest way around a circle, for measurements in degrees.
    Angular,
}

#[derive(Clone, Debug, Builder)]
pub struct PidConfig {
    #[builder(default)]
    pub p: f64,
    #[builder(default)]
    pub i: f64,
    #[builder(default)]
    pub d: f64,

    /// How close the error must be to zero to count as on target.
    #[builder(default)]
    pub deadband: f64,

    /// Seconds the error must stay inside the deadband before the loop
    /// reports it is on target.
    #[builder(default)]
    pub on_target_time: f64,

    #[builder(default)]
    pub error_method: ErrorMethod,
}

/// A PID loop with integral clamping and an on-target dwell.
#[derive(Clone)]
pub struct Pid {
    config: PidConfig,
    clock: SharedClock,

    target: f64,
    measurement: f64,
    output: f64,
    accumulated_error: f64,
    previous_error: f64,
    previous_time: Option<Duration>,

    lower_limit: f64,
    upper_limit: f64,

    /// When the error last entered the deadband.
    in_deadband_since: Option<Duration>,
    on_target: bool,
}

impl Pid {
    pub fn new(config: PidConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            target: 0.0,
            measurement: 0.0,
            output: 0.0,
            accumulated_error: 0.0,
            previous_error: 0.0,
            previous_time: None,
            lower_limit: 0.0,
            upper_limit: 0.0,
            in_deadband_since: None,
            on_target: false,
        }
    }

    pub fn config(&self) -> &PidConfig {
        &self.config
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    /// Moves the set-point without clearing accumulated state.
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    pub fn error(&self) -> f64 {
        match self.config.error_method {
            ErrorMethod::Linear => self.target - self.measurement,
            ErrorMethod::Angular => smallest_angle_deg(self.target, self.measurement),
        }
    }

    /// Clears the integral, derivative history and dwell timer.
    pub fn reset(&mut self) {
        self.accumulated_error = 0.0;
        self.previous_error = 0.0;
        self.previous_time = None;
        self.in_deadband_since = None;
        self.on_target = false;
    }

    /// Like [`Feedback::update`], but subtracts an expected rate of change
    /// from the derivative term. Used when tracking a moving set-point.
    pub fn update_with_velocity(&mut self, measurement: f64, target_velocity: f64) -> f64 {
        self.measurement = measurement;
        let now = self.clock.now();
        let error = self.error();

        let dt = match self.previous_time {
            Some(previous) => now.saturating_sub(previous).as_secs_f64(),
            None => 0.0,
        };
        let d_term = if dt > 0.0 {
            self.config.d * ((error - self.previous_error) / dt - target_velocity)
        } else {
            if self.previous_time.is_some() {
                warn!("PID updated twice in the same instant, skipping derivative term");
            }
            0.0
        };

        let mut output = self.config.p * error + d_term;

        // Integral clamping: stop accumulating once the output saturates.
        let limited = self.lower_limit != 0.0 || self.upper_limit != 0.0;
        if !limited || (output < self.upper_limit && output > self.lower_limit) {
            self.accumulated_error += error * dt;
        }
        output += self.config.i * self.accumulated_error;

        self.previous_time = Some(now);
        self.previous_error = error;
        self.output = clamp_limits(output, self.lower_limit, self.upper_limit);

        self.update_dwell(error, now);
        self.output
    }

    fn update_dwell(&mut self, error: f64, now: Duration) {
        if error.abs() < self.config.deadband {
            let since = *self.in_deadband_since.get_or_insert(now);
            self.on_target = now.saturating_sub(since).as_secs_f64() >= self.config.on_target_time;
        } else {
            self.in_deadband_since = None;
            self.on_target = false;
        }
    }
}

impl Feedback for Pid {
    fn init(&mut self, start: f64, target: f64) {
        self.target = target;
        self.measurement = start;
        self.reset();
    }

    fn update(&mut self, measurement: f64) -> f64 {
        self.update_with_velocity(measurement, 0.0)
    }

    fn get(&self) -> f64 {
        self.output
    }

    fn set_limits(&mut self, lower: f64, upper: f64) {
        self.lower_limit = lower;
        self.upper_limit = upper;
    }

    fn is_on_target(&self) -> bool {
        self.on_target
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;

    use approx::assert_relative_eq;

    use super::*;
    use crate::utils::clock::ManualClock;

    fn dwell_pid(clock: &Rc<ManualClock>) -> Pid {
        let config = PidConfig::builder()
            .p(1.0)
            .deadband(0.5)
            .on_target_time(0.3)
            .build();
        let mut pid = Pid::new(config, clock.clone());
        pid.init(0.0, 10.0);
        pid
    }

    #[test]
    fn proportional_output() {
        let clock = ManualClock::new();
        let mut pid = Pid::new(PidConfig::builder().p(0.5).build(), clock.clone());
        pid.init(0.0, 10.0);
        assert_relative_eq!(pid.update(4.0), 3.0);
        assert_relative_eq!(pid.get(), 3.0);
    }

    #[test]
    fn brief_entry_into_deadband_is_not_on_target() {
        let clock = ManualClock::new();
        let mut pid = dwell_pid(&clock);

        pid.update(9.8);
        assert!(!pid.is_on_target());
        clock.advance(Duration::from_millis(100));
        pid.update(8.0);
        assert!(!pid.is_on_target());

        // Re-entering restarts the dwell.
        for _ in 0..2 {
            clock.advance(Duration::from_millis(100));
            pid.update(10.1);
            assert!(!pid.is_on_target());
        }
    }

    #[test]
    fn on_target_once_dwell_elapses() {
        let clock = ManualClock::new();
        let mut pid = dwell_pid(&clock);

        pid.update(9.9);
        for _ in 0..2 {
            clock.advance(Duration::from_millis(100));
            pid.update(10.2);
            assert!(!pid.is_on_target());
        }
        clock.advance(Duration::from_millis(100));
        pid.update(9.7);
        assert!(pid.is_on_target());
    }

    #[test]
    fn integral_stops_accumulating_when_saturated() {
        let clock = ManualClock::new();
        let config = PidConfig::builder().p(1.0).i(1.0).build();
        let mut pid = Pid::new(config, clock.clone());
        pid.init(0.0, 100.0);
        pid.set_limits(-1.0, 1.0);
        pid.update(0.0);
        for _ in 0..50 {
            clock.advance(Duration::from_millis(20));
            assert_relative_eq!(pid.update(0.0), 1.0);
        }
        // Removing the limits exposes an integral that never wound up.
        pid.set_limits(0.0, 0.0);
        clock.advance(Duration::from_millis(20));
        assert_relative_eq!(pid.update(99.0), 1.0 + 0.02, epsilon = 1e-9);
    }

    #[test]
    fn angular_error_takes_short_way() {
        let clock = ManualClock::new();
        let config = PidConfig::builder()
            .p(1.0)
            .error_method(ErrorMethod::Angular)
            .build();
        let mut pid = Pid::new(config, clock.clone());
        pid.init(350.0, 10.0);
        assert_relative_eq!(pid.update(350.0), 20.0);
    }
}
