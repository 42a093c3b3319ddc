pub mod trapezoid;

pub use trapezoid::TrapezoidProfile;

/// One sample of a motion profile.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct MotionState {
    pub time: f64,
    pub pos: f64,
    pub vel: f64,
    pub accel: f64,
}
