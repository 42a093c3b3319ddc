use vexide::{devices::smart::serial::SerialPort as VexSerialPort, io::Read};

use crate::tracking::SerialPort;

/// Generic serial on a smart port, fed by a tracking coprocessor.
pub struct CoprocessorPort {
    port: VexSerialPort,
}

impl CoprocessorPort {
    pub fn new(port: VexSerialPort) -> Self {
        Self { port }
    }
}

impl SerialPort for CoprocessorPort {
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = [0; 1];
        match self.port.read(&mut byte) {
            Ok(1) => Some(byte[0]),
            _ => None,
        }
    }
}
