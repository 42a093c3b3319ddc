use log::debug;
use num_traits::Float;

use super::Feedback;
use crate::{lerp, utils::math::{clamp_limits, sign}};

/// Take-back-half velocity control, mostly for flywheels.
///
/// The output integrates the error. Each time the error changes sign the
/// output is pulled back toward the value it had at the previous crossing.
#[derive(Clone, Debug)]
pub struct TakeBackHalf {
    gain: f64,
    /// Where to land between the previous crossing and the current output on
    /// the first crossing. Later crossings always split halfway.
    first_cross_split: f64,
    on_target_threshold: f64,

    target: f64,
    output: f64,
    tbh: f64,
    previous_error: f64,
    first_cross: bool,
    lower_limit: f64,
    upper_limit: f64,
}

impl TakeBackHalf {
    pub fn new(gain: f64, first_cross_split: f64, on_target_threshold: f64) -> Self {
        Self {
            gain,
            first_cross_split,
            on_target_threshold: on_target_threshold.abs(),
            target: 0.0,
            output: 0.0,
            tbh: 0.0,
            previous_error: 0.0,
            first_cross: true,
            lower_limit: 0.0,
            upper_limit: 0.0,
        }
    }

    pub fn target(&self) -> f64 {
        self.target
    }
}

impl Feedback for TakeBackHalf {
    fn init(&mut self, start: f64, target: f64) {
        if target == self.target {
            return;
        }
        self.first_cross = true;
        self.tbh = self.output;
        self.target = target;
        self.previous_error = target - start;
    }

    fn update(&mut self, measurement: f64) -> f64 {
        if self.target == 0.0 {
            self.output = 0.0;
            self.tbh = 0.0;
            return 0.0;
        }

        let error = self.target - measurement;
        self.output += self.gain * error;

        if sign(error) != sign(self.previous_error) {
            let split = if self.first_cross {
                debug!("take-back-half first crossing at {measurement:.1}");
                self.first_cross = false;
                self.first_cross_split
            } else {
                0.5
            };
            self.output = lerp!(self.tbh, self.output, split);
            self.tbh = self.output;
        }
        self.previous_error = error;

        self.output = clamp_limits(self.output, self.lower_limit, self.upper_limit);
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
        self.previous_error.abs() < self.on_target_threshold
    }
}
