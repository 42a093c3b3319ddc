//! vexide implementations of the hardware traits.

pub mod motor_group;
pub mod sensors;
pub mod serial;

pub use motor_group::{MotorGroup, TankMotors};
pub use sensors::{Imu, OdomWheel};
pub use serial::CoprocessorPort;
