use super::{FeedForward, Feedback, Pid};
use crate::utils::math::{clamp_limits, sign};

/// A PID loop with a feedforward term layered on top.
#[derive(Clone)]
pub struct PidFf {
    pid: Pid,
    feedforward: FeedForward,
    output: f64,
    lower_limit: f64,
    upper_limit: f64,
}

impl PidFf {
    pub fn new(pid: Pid, feedforward: FeedForward) -> Self {
        Self {
            pid,
            feedforward,
            output: 0.0,
            lower_limit: 0.0,
            upper_limit: 0.0,
        }
    }

    pub fn set_target(&mut self, target: f64) {
        self.pid.set_target(target);
    }

    /// Feedback plus the full feedforward for a desired velocity and
    /// acceleration.
    pub fn update_with_motion(&mut self, measurement: f64, velocity: f64, acceleration: f64) -> f64 {
        let feedback = self.pid.update(measurement);
        let output = feedback + self.feedforward.calculate_with_hint(velocity, acceleration, feedback);
        self.output = clamp_limits(output, self.lower_limit, self.upper_limit);
        self.output
    }
}

impl Feedback for PidFf {
    fn init(&mut self, start: f64, target: f64) {
        self.pid.init(start, target);
    }

    /// Without a motion reference only the static friction term is added.
    fn update(&mut self, measurement: f64) -> f64 {
        let feedback = self.pid.update(measurement);
        let static_term = self.feedforward.config().ks * sign(feedback);
        self.output = clamp_limits(feedback + static_term, self.lower_limit, self.upper_limit);
        self.output
    }

    fn get(&self) -> f64 {
        self.output
    }

    fn set_limits(&mut self, lower: f64, upper: f64) {
        self.lower_limit = lower;
        self.upper_limit = upper;
    }

    fn is_on_target(&self) -> bool {
        self.pid.is_on_target()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        controllers::{FeedForwardConfig, PidConfig},
        utils::clock::ManualClock,
    };

    fn pidff() -> PidFf {
        let clock = ManualClock::new();
        let pid = Pid::new(PidConfig::builder().p(0.1).build(), clock);
        let ff = FeedForward::new(FeedForwardConfig::builder().ks(0.05).kv(0.01).build());
        let mut pidff = PidFf::new(pid, ff);
        pidff.init(0.0, 10.0);
        pidff
    }

    #[test]
    fn static_friction_pushes_with_feedback() {
        let mut pidff = pidff();
        assert_relative_eq!(pidff.update(5.0), 0.5 + 0.05);
        assert_relative_eq!(pidff.update(15.0), -0.5 - 0.05);
    }

    #[test]
    fn motion_reference_adds_velocity_term() {
        let mut pidff = pidff();
        pidff.set_limits(-0.6, 0.6);
        assert_relative_eq!(pidff.update_with_motion(8.0, 20.0, 0.0), 0.2 + 0.05 + 0.2);
        assert_relative_eq!(pidff.update_with_motion(0.0, 20.0, 0.0), 0.6);
    }
}
