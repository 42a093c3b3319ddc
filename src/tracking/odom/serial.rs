use alloc::{boxed::Box, vec::Vec};

use log::warn;
use nalgebra::Vector2;
use num_traits::Float;

use super::cobs;
use crate::{
    differential::pose::Pose,
    tracking::{MotionEstimate, OdometryVariant, SerialPort},
    utils::math::wrap_angle,
};

pub const METER_TO_INCH: f64 = 39.37007874015748;

// Fixed-point scales used by the coprocessor's int16 registers.
pub const INT16_TO_METER: f64 = 0.000_305_175_781_25;
pub const INT16_TO_MPS: f64 = 0.000_152_587_890_625;
pub const INT16_TO_MPSS: f64 = 0.004_788_403_320_312_5;
pub const INT16_TO_RAD: f64 = 9.587_379_924_285_257e-5;
pub const INT16_TO_RPS: f64 = 0.001_065_264_892_578_1;
pub const INT16_TO_RPSS: f64 = 0.095_873_799_242_852_6;

/// Position, velocity and acceleration, three int16 registers each.
pub const PACKET_LEN: usize = 18;

/// Longest frame accepted before the receive buffer is dropped.
const MAX_FRAME_LEN: usize = PACKET_LEN + 2;

/// Little-endian `(x, y, h)` register triple, already scaled.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Registers {
    pub xy: Vector2<f64>,
    pub h: f64,
}

impl Registers {
    pub fn decode(raw: &[u8], xy_scale: f64, h_scale: f64) -> Self {
        let register = |i: usize| i16::from_le_bytes([raw[i], raw[i + 1]]) as f64;
        Self {
            xy: Vector2::new(register(0) * xy_scale, register(2) * xy_scale),
            h: register(4) * h_scale,
        }
    }

    pub fn encode(&self, xy_scale: f64, h_scale: f64) -> [u8; 6] {
        let mut raw = [0; 6];
        let values = [self.xy.x / xy_scale, self.xy.y / xy_scale, self.h / h_scale];
        for (chunk, value) in raw.chunks_exact_mut(2).zip(values) {
            chunk.copy_from_slice(&(value.round() as i16).to_le_bytes());
        }
        raw
    }
}

/// Pose reported by a tracking coprocessor over a serial link.
///
/// Packets are COBS framed. Each update drains whatever bytes have arrived
/// and applies the newest complete packet; with nothing new the pose is left
/// as is.
pub struct SerialOdometry {
    port: Box<dyn SerialPort>,
    buffer: Vec<u8>,
    previous_position: Registers,
    reported: Option<MotionEstimate>,
}

impl SerialOdometry {
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            buffer: Vec::with_capacity(MAX_FRAME_LEN),
            previous_position: Registers::default(),
            reported: None,
        }
    }

    fn receive(&mut self) -> Option<[u8; PACKET_LEN]> {
        let mut latest = None;
        while let Some(byte) = self.port.read_byte() {
            if byte == cobs::DELIMITER {
                self.buffer.push(byte);
                match cobs::decode(&self.buffer).map(<[u8; PACKET_LEN]>::try_from) {
                    Some(Ok(packet)) => latest = Some(packet),
                    _ => warn!("dropping malformed odometry packet of {} bytes", self.buffer.len()),
                }
                self.buffer.clear();
            } else if self.buffer.len() >= MAX_FRAME_LEN {
                warn!("odometry serial buffer overflow");
                self.buffer.clear();
            } else {
                self.buffer.push(byte);
            }
        }
        latest
    }
}

impl OdometryVariant for SerialOdometry {
    fn update(&mut self, previous: Pose) -> Pose {
        let Some(packet) = self.receive() else {
            return previous;
        };

        let position = Registers::decode(&packet[0..6], INT16_TO_METER * METER_TO_INCH, INT16_TO_RAD);
        let velocity = Registers::decode(&packet[6..12], INT16_TO_MPS * METER_TO_INCH, INT16_TO_RPS);
        let acceleration =
            Registers::decode(&packet[12..18], INT16_TO_MPSS * METER_TO_INCH, INT16_TO_RPSS);

        let speed = velocity.xy.norm();
        self.reported = Some(MotionEstimate {
            speed,
            // Rate of change of speed: acceleration projected onto velocity.
            accel: if speed > 0.0 {
                velocity.xy.dot(&acceleration.xy) / speed
            } else {
                0.0
            },
            angular_speed_deg: velocity.h.to_degrees(),
            angular_accel_deg: acceleration.h.to_degrees(),
        });

        let pose = Pose {
            position: previous.position + (position.xy - self.previous_position.xy),
            orientation: wrap_angle(previous.orientation + (position.h - self.previous_position.h)),
        };
        self.previous_position = position;
        pose
    }

    fn reported_motion(&self) -> Option<MotionEstimate> {
        self.reported
    }
}

#[cfg(test)]
mod tests {
    use alloc::{collections::VecDeque, rc::Rc};
    use core::cell::RefCell;

    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        tracking::{Odometry, OdometryBase},
        utils::clock::ManualClock,
    };

    #[derive(Clone, Default)]
    struct Loopback(Rc<RefCell<VecDeque<u8>>>);

    impl SerialPort for Loopback {
        fn read_byte(&mut self) -> Option<u8> {
            self.0.borrow_mut().pop_front()
        }
    }

    impl Loopback {
        fn send(&self, position: Registers, velocity: Registers, acceleration: Registers) {
            let mut packet = Vec::new();
            packet.extend(position.encode(INT16_TO_METER * METER_TO_INCH, INT16_TO_RAD));
            packet.extend(velocity.encode(INT16_TO_MPS * METER_TO_INCH, INT16_TO_RPS));
            packet.extend(acceleration.encode(INT16_TO_MPSS * METER_TO_INCH, INT16_TO_RPSS));
            self.0.borrow_mut().extend(cobs::encode(&packet));
        }
    }

    fn registers(x: f64, y: f64, h: f64) -> Registers {
        Registers {
            xy: Vector2::new(x, y),
            h,
        }
    }

    #[test]
    fn register_layout_is_little_endian() {
        let raw = [0x34, 0x12, 0xFF, 0xFF, 0x00, 0x80];
        let decoded = Registers::decode(&raw, 1.0, 1.0);
        assert_eq!(decoded.xy, Vector2::new(4660.0, -1.0));
        assert_eq!(decoded.h, -32768.0);
        assert_eq!(decoded.encode(1.0, 1.0), raw);
    }

    #[test]
    fn applies_newest_packet_and_reported_motion() {
        let port = Loopback::default();
        let odometry = Odometry::new(SerialOdometry::new(Box::new(port.clone())), ManualClock::new());

        // Nothing received yet: pose untouched.
        odometry.update();
        assert_eq!(odometry.pose(), Pose::default());

        port.send(registers(1.0, 2.0, 0.1), registers(0.0, 0.0, 0.0), registers(0.0, 0.0, 0.0));
        port.send(registers(10.0, 5.0, 0.5), registers(30.0, 40.0, 1.0), registers(6.0, 8.0, 0.0));
        odometry.update();

        let pose = odometry.pose();
        assert_relative_eq!(pose.x(), 10.0, epsilon = 0.02);
        assert_relative_eq!(pose.y(), 5.0, epsilon = 0.02);
        assert_relative_eq!(pose.orientation, 0.5, epsilon = 1e-3);
        assert_relative_eq!(odometry.speed(), 50.0, epsilon = 0.05);
        assert_relative_eq!(odometry.accel(), 10.0, epsilon = 0.5);
        assert_relative_eq!(odometry.angular_speed_deg(), 1.0_f64.to_degrees(), epsilon = 0.1);
    }

    #[test]
    fn set_position_offsets_later_packets() {
        let port = Loopback::default();
        let odometry = Odometry::new(SerialOdometry::new(Box::new(port.clone())), ManualClock::new());
        let still = registers(0.0, 0.0, 0.0);

        port.send(registers(5.0, 0.0, 0.0), still, still);
        odometry.update();
        odometry.set_position(Pose::new(-48.0, 12.0, 0.0));
        port.send(registers(8.0, 0.0, 0.0), still, still);
        odometry.update();
        assert_relative_eq!(odometry.pose().x(), -45.0, epsilon = 0.02);
        assert_relative_eq!(odometry.pose().y(), 12.0, epsilon = 0.02);
    }

    #[test]
    fn corrupt_bytes_are_skipped() {
        let port = Loopback::default();
        let odometry = Odometry::new(SerialOdometry::new(Box::new(port.clone())), ManualClock::new());
        port.0.borrow_mut().extend([0x09, 0x01, 0x02, 0x00]);
        odometry.update();
        assert_eq!(odometry.pose(), Pose::default());

        let still = registers(0.0, 0.0, 0.0);
        port.send(registers(3.0, 4.0, 0.0), still, still);
        odometry.update();
        assert_relative_eq!(odometry.pose().y(), 4.0, epsilon = 0.02);
    }
}
