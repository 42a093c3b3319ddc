pub mod bang_bang;
pub mod feedforward;
pub mod motion_controller;
pub mod pid;
pub mod pidff;
pub mod take_back_half;

pub use bang_bang::BangBang;
pub use feedforward::{FeedForward, FeedForwardConfig};
pub use motion_controller::MotionController;
pub use pid::{ErrorMethod, Pid, PidConfig};
pub use pidff::PidFf;
pub use take_back_half::TakeBackHalf;

dyn_clone::clone_trait_object!(Feedback);

/// A closed loop that turns a set-point and a measurement into an output.
///
/// `update` is called once per control tick with the latest measurement.
pub trait Feedback: dyn_clone::DynClone {
    /// Resets internal state and aims at `target`, starting from `start`.
    fn init(&mut self, start: f64, target: f64);

    fn update(&mut self, measurement: f64) -> f64;

    /// The output computed by the last `update`.
    fn get(&self) -> f64;

    /// Bounds the output. `(0, 0)` removes the bounds.
    fn set_limits(&mut self, lower: f64, upper: f64);

    fn is_on_target(&self) -> bool;
}
