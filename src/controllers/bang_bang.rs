use num_traits::Float;

use super::Feedback;

/// Full output below the set-point, low output above it, nothing inside
/// the threshold.
#[derive(Clone, Debug)]
pub struct BangBang {
    threshold: f64,
    lower: f64,
    upper: f64,
    target: f64,
    measurement: f64,
    output: f64,
}

impl BangBang {
    pub fn new(threshold: f64, lower: f64, upper: f64) -> Self {
        Self {
            threshold: threshold.abs(),
            lower,
            upper,
            target: lower,
            measurement: lower,
            output: 0.0,
        }
    }
}

impl Feedback for BangBang {
    fn init(&mut self, start: f64, target: f64) {
        self.measurement = start;
        self.target = target;
    }

    fn update(&mut self, measurement: f64) -> f64 {
        self.measurement = measurement;
        self.output = if (measurement - self.target).abs() < self.threshold {
            0.0
        } else if measurement > self.target {
            self.lower
        } else {
            self.upper
        };
        self.output
    }

    fn get(&self) -> f64 {
        self.output
    }

    fn set_limits(&mut self, lower: f64, upper: f64) {
        self.lower = lower;
        self.upper = upper;
    }

    fn is_on_target(&self) -> bool {
        (self.measurement - self.target).abs() < self.threshold
    }
}
