use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::frame::DecodeError;

/// Number of digital sensors on the bench board.
pub const SENSOR_COUNT: usize = 16;

/// Minimum length of a sensor poll response: the two bitmap bytes live at
/// offsets 2 and 3.
pub const SENSOR_RESPONSE_LEN: usize = 4;

/// `(byte offset, bit)` within the response for each sensor, indexed by
/// sensor number minus one. Bit 7 of each bitmap byte is the lowest-numbered
/// sensor in its group. The interleaved numbering (byte 2 carries sensors
/// 1-4 and 9-12, byte 3 carries 5-8 and 13-16) is a hardware contract.
const SENSOR_BITS: [(usize, u8); SENSOR_COUNT] = [
    (2, 7), // Sensor 1
    (2, 6), // Sensor 2
    (2, 5), // Sensor 3
    (2, 4), // Sensor 4
    (3, 7), // Sensor 5
    (3, 6), // Sensor 6
    (3, 5), // Sensor 7
    (3, 4), // Sensor 8
    (2, 3), // Sensor 9
    (2, 2), // Sensor 10
    (2, 1), // Sensor 11
    (2, 0), // Sensor 12
    (3, 3), // Sensor 13
    (3, 2), // Sensor 14
    (3, 1), // Sensor 15
    (3, 0), // Sensor 16
];

/// Snapshot of all 16 digital sensors from one poll cycle.
/// Recomputed on every poll; consumers keep only the most recent sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorState {
    active: [bool; SENSOR_COUNT],
}

impl SensorState {
    /// Whether the given sensor (one-based, as labelled on the bench) is
    /// active. Returns `None` for sensor numbers outside 1..=16.
    pub fn is_active(&self, sensor: u8) -> Option<bool> {
        if sensor == 0 || sensor as usize > SENSOR_COUNT {
            return None;
        }
        Some(self.active[sensor as usize - 1])
    }

    /// Iterate over `(sensor number, active)` pairs in sensor order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, bool)> + '_ {
        self.active
            .iter()
            .enumerate()
            .map(|(slot, &active)| (slot as u8 + 1, active))
    }
}

impl Display for SensorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Sensors ")?;
        for active in self.active {
            write!(f, "{}", if active { '1' } else { '0' })?;
        }
        write!(f, ">")
    }
}

/// Decode a sensor poll response into a [`SensorState`].
///
/// Only length sufficiency is validated here; the connection layer returns
/// whatever bytes arrived and this is the single place that decides whether
/// they are usable.
pub fn decode_sensor_response(response: &[u8]) -> Result<SensorState, DecodeError> {
    if response.len() < SENSOR_RESPONSE_LEN {
        return Err(DecodeError::MalformedResponse {
            got: response.len(),
            expected: SENSOR_RESPONSE_LEN,
        });
    }

    let mut active = [false; SENSOR_COUNT];
    for (slot, &(byte, bit)) in SENSOR_BITS.iter().enumerate() {
        active[slot] = (response[byte] >> bit) & 1 == 1;
    }
    Ok(SensorState { active })
}
