pub mod flywheel;

pub use flywheel::{Flywheel, FlywheelMotor};
