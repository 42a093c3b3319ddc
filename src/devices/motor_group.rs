use alloc::{rc::Rc, vec::Vec};
use core::cell::RefCell;

use vexide::prelude::{Motor, Position};

use crate::{differential::chassis::Drivetrain, subsystems::flywheel::FlywheelMotor};

/// Motors that always get the same command.
pub struct MotorGroup {
    motors: Vec<Motor>,
}

impl MotorGroup {
    pub fn new(motors: Vec<Motor>) -> Self {
        Self { motors }
    }

    pub fn size(&self) -> usize {
        self.motors.len()
    }

    /// `output` is a fraction of full voltage in [-1, 1].
    pub fn set_output(&mut self, output: f64) {
        let voltage = output.clamp(-1.0, 1.0) * Motor::V5_MAX_VOLTAGE;
        for motor in self.motors.iter_mut() {
            let _ = motor.set_voltage(voltage);
        }
    }

    pub fn brake(&mut self) {
        for motor in self.motors.iter_mut() {
            let _ = motor.brake(vexide::prelude::BrakeMode::Brake);
        }
    }

    /// Averages over the motors that answered, or `None` if none did.
    fn average(&self, read: impl Fn(&Motor) -> Option<f64>) -> Option<f64> {
        let readings: Vec<f64> = self.motors.iter().filter_map(read).collect();
        if readings.is_empty() {
            return None;
        }
        Some(readings.iter().sum::<f64>() / readings.len() as f64)
    }

    /// Average shaft speed in rpm.
    pub fn velocity(&self) -> Option<f64> {
        self.average(|motor| motor.velocity().ok())
    }

    /// Average speed as a fraction of each motor's free speed.
    pub fn velocity_fraction(&self) -> Option<f64> {
        self.average(|motor| {
            let max_rpm = motor.gearset().ok()?.max_rpm();
            Some(motor.velocity().ok()? / max_rpm)
        })
    }

    /// Average shaft rotation in revolutions.
    pub fn revolutions(&self) -> Option<f64> {
        self.average(|motor| motor.position().ok().map(|position| position.as_revolutions()))
    }

    pub fn reset_position(&mut self) {
        for motor in self.motors.iter_mut() {
            let _ = motor.set_position(Position::from_revolutions(0.0));
        }
    }
}

impl FlywheelMotor for MotorGroup {
    fn set_output(&mut self, output: f64) {
        MotorGroup::set_output(self, output);
    }

    fn rpm(&self) -> Option<f64> {
        self.velocity()
    }

    fn stop(&mut self) {
        // Coast.
        MotorGroup::set_output(self, 0.0);
    }
}

/// Left and right sides of a tank chassis. The groups are shared so the
/// same motors can double as odometry wheels.
pub struct TankMotors {
    pub left: Rc<RefCell<MotorGroup>>,
    pub right: Rc<RefCell<MotorGroup>>,
}

impl TankMotors {
    pub fn new(left: Rc<RefCell<MotorGroup>>, right: Rc<RefCell<MotorGroup>>) -> Self {
        Self { left, right }
    }
}

impl Drivetrain for TankMotors {
    fn drive_tank(&mut self, left: f64, right: f64) {
        self.left.borrow_mut().set_output(left);
        self.right.borrow_mut().set_output(right);
    }

    fn wheel_velocities(&self) -> Option<(f64, f64)> {
        Some((
            self.left.borrow().velocity_fraction()?,
            self.right.borrow().velocity_fraction()?,
        ))
    }

    fn stop(&mut self) {
        self.left.borrow_mut().brake();
        self.right.borrow_mut().brake();
    }
}
