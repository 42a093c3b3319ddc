//! Consistent Overhead Byte Stuffing.
//!
//! Frames carry no zero bytes except the trailing delimiter, so a receiver can
//! resynchronize on any zero it sees.

use alloc::vec::Vec;

pub const DELIMITER: u8 = 0x00;

/// Encodes `data` and appends the delimiter.
pub fn encode(data: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(data.len() + data.len() / 254 + 2);
    let mut code_index = 0;
    let mut code: u8 = 1;
    encoded.push(0);

    for (i, &byte) in data.iter().enumerate() {
        let more = i + 1 < data.len();
        if byte == 0 {
            encoded[code_index] = code;
            code_index = encoded.len();
            encoded.push(0);
            code = 1;
        } else {
            encoded.push(byte);
            code += 1;
            if code == 0xFF && more {
                encoded[code_index] = code;
                code_index = encoded.len();
                encoded.push(0);
                code = 1;
            }
        }
    }
    encoded[code_index] = code;
    encoded.push(DELIMITER);
    encoded
}

/// Decodes one frame, stopping at the first delimiter.
///
/// Returns `None` when a block runs past the end of the frame or contains a
/// stray zero.
pub fn decode(frame: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = Vec::with_capacity(frame.len());
    let mut i = 0;
    while i < frame.len() {
        let code = frame[i];
        if code == DELIMITER {
            break;
        }
        i += 1;
        let end = i + code as usize - 1;
        let block = frame.get(i..end)?;
        if block.contains(&DELIMITER) {
            return None;
        }
        decoded.extend_from_slice(block);
        i = end;

        let at_end = frame.get(i).map_or(true, |&next| next == DELIMITER);
        if code != 0xFF && !at_end {
            decoded.push(0);
        }
    }
    Some(decoded)
}
