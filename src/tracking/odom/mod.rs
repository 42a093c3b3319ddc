pub mod cobs;
pub mod serial;
pub mod tank;
pub mod three_wheel;

use super::Encoder;

/// Reads an encoder, falling back to the last good reading, and returns the
/// new reading along with the distance travelled since `previous`.
///
/// The first successful reading only anchors the wheel.
pub(crate) fn wheel_delta(encoder: &dyn Encoder, previous: &mut Option<f64>) -> f64 {
    let reading = encoder.position().or(*previous);
    let delta = match (reading, *previous) {
        (Some(new), Some(old)) => new - old,
        _ => 0.0,
    };
    *previous = reading;
    delta
}
