use alloc::rc::Rc;
use core::{cell::RefCell, f64::consts::PI};

use vexide::prelude::{AdiEncoder, InertialSensor, Position, RotationSensor};

use super::motor_group::MotorGroup;
use crate::tracking::{Encoder, HeadingSensor};

enum WheelSource {
    Rotation(RotationSensor),
    Adi(AdiEncoder),
    /// Integrated motor encoders.
    Motors(Rc<RefCell<MotorGroup>>),
}

/// A tracking wheel, measured in inches of travel.
pub struct OdomWheel {
    source: WheelSource,
    /// Diameter in inches.
    wheel_diameter: f64,
    /// Wheel revolutions per sensor revolution.
    gear_ratio: f64,
}

impl OdomWheel {
    pub fn from_rotation(rotation: RotationSensor, wheel_diameter: f64, gear_ratio: f64) -> Self {
        Self {
            source: WheelSource::Rotation(rotation),
            wheel_diameter,
            gear_ratio,
        }
    }

    pub fn from_adi_encoder(encoder: AdiEncoder, wheel_diameter: f64, gear_ratio: f64) -> Self {
        Self {
            source: WheelSource::Adi(encoder),
            wheel_diameter,
            gear_ratio,
        }
    }

    /// Uses the drive motors themselves. `gear_ratio` is wheel revolutions
    /// per motor revolution.
    pub fn from_motors(motors: Rc<RefCell<MotorGroup>>, wheel_diameter: f64, gear_ratio: f64) -> Self {
        Self {
            source: WheelSource::Motors(motors),
            wheel_diameter,
            gear_ratio,
        }
    }
}

impl Encoder for OdomWheel {
    fn position(&self) -> Option<f64> {
        let revolutions = match &self.source {
            WheelSource::Rotation(rotation) => rotation.position().ok()?.as_revolutions(),
            WheelSource::Adi(encoder) => encoder.position().ok()?.as_revolutions(),
            WheelSource::Motors(motors) => motors.borrow().revolutions()?,
        };
        Some(revolutions * self.gear_ratio * PI * self.wheel_diameter)
    }

    fn reset(&mut self) {
        match &mut self.source {
            WheelSource::Rotation(rotation) => {
                let _ = rotation.set_position(Position::from_revolutions(0.0));
            }
            WheelSource::Adi(_) => {}
            WheelSource::Motors(motors) => motors.borrow_mut().reset_position(),
        }
    }
}

/// The V5 inertial sensor as a counter-clockwise heading source.
pub struct Imu {
    sensor: InertialSensor,
    /// Corrects the sensor's small per-unit gain error.
    scalar: f64,
}

impl Imu {
    pub fn new(sensor: InertialSensor, scalar: f64) -> Self {
        Self { sensor, scalar }
    }

    pub async fn calibrate(&mut self) {
        if self.sensor.calibrate().await.is_err() {
            log::warn!("inertial sensor calibration failed");
        }
    }
}

impl HeadingSensor for Imu {
    fn heading(&self) -> Option<f64> {
        // The sensor counts clockwise in degrees.
        let rotation = self.sensor.rotation().ok()?;
        Some(-(rotation * self.scalar).to_radians())
    }

    fn reset(&mut self) {
        let _ = self.sensor.set_rotation(0.0);
    }
}
