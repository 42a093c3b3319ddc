use bon::Builder;

use crate::utils::math::sign;

#[derive(Clone, Copy, Debug, Default, Builder)]
pub struct FeedForwardConfig {
    /// Output needed to overcome static friction.
    #[builder(default)]
    pub ks: f64,
    #[builder(default)]
    pub kv: f64,
    #[builder(default)]
    pub ka: f64,
    /// Constant offset, for mechanisms working against gravity.
    #[builder(default)]
    pub kg: f64,
}

/// Open-loop output computed from a desired velocity and acceleration.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeedForward {
    config: FeedForwardConfig,
}

impl FeedForward {
    pub fn new(config: FeedForwardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeedForwardConfig {
        &self.config
    }

    pub fn calculate(&self, velocity: f64, acceleration: f64) -> f64 {
        self.calculate_with_hint(velocity, acceleration, 0.0)
    }

    /// When `velocity` is zero the static term takes the sign of
    /// `feedback_output`, so a closed loop holding position still gets
    /// help breaking friction.
    pub fn calculate_with_hint(&self, velocity: f64, acceleration: f64, feedback_output: f64) -> f64 {
        let direction = if velocity != 0.0 {
            sign(velocity)
        } else {
            sign(feedback_output)
        };
        self.config.ks * direction
            + self.config.kv * velocity
            + self.config.ka * acceleration
            + self.config.kg
    }

    /// Largest velocity reachable with `max_output`, or 0 without a `kv`.
    pub fn max_velocity(&self, max_output: f64) -> f64 {
        if self.config.kv == 0.0 {
            return 0.0;
        }
        max_output / self.config.kv
    }
}
