use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// First byte of every request frame.
pub const FRAME_HEAD: u8 = 0x7E;

/// Last byte of every request frame.
pub const FRAME_TAIL: u8 = 0xAA;

const OPCODE_POLL_SENSORS: u8 = 0xB0;
const OPCODE_RELAY: u8 = 0xB1;
const OPCODE_INTERNAL_MOTOR: u8 = 0xB2;
const OPCODE_EXTERNAL_MOTOR: u8 = 0xB3;
const OPCODE_LOAD_CELL: u8 = 0xB4;

const RELAY_ENERGIZE: u8 = 0x01;
const RELAY_RELEASE: u8 = 0x00;
const MOTOR_CW: u8 = 0x00;
const MOTOR_CCW: u8 = 0xFF;

/// Valid relay ids on the bench board.
pub const RELAY_IDS: RangeInclusive<u8> = 1..=7;

/// Valid internal motor ids.
pub const INTERNAL_MOTOR_IDS: RangeInclusive<u8> = 1..=6;

/// Valid external motor ids.
pub const EXTERNAL_MOTOR_IDS: RangeInclusive<u8> = 1..=4;

/// Valid load cell indices. One-based in the API, zero-based on the wire.
pub const LOAD_CELL_INDICES: RangeInclusive<u8> = 1..=16;

/// A request the controller can put on the wire. Ids are one-based as
/// printed on the bench hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    PollSensors,
    RelayOn(u8),
    RelayOff(u8),
    InternalMotorCw(u8),
    InternalMotorCcw(u8),
    ExternalMotorControl(u8),
    ReadLoadCell(u8),
}

/// Spin direction for the internal motors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorDirection {
    Clockwise,
    CounterClockwise,
}

/// Represents errors in building a request frame.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// The command was built with an id outside the range the board accepts.
    #[error("{name} {value} is outside the valid range {min}..={max}")]
    InvalidParameter {
        name: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },
}

/// Represents errors in interpreting a response.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// The response was shorter than the expected reply shape requires.
    #[error("response too short: got {got} bytes, expected at least {expected}")]
    MalformedResponse { got: usize, expected: usize },
}

fn check_range(name: &'static str, value: u8, range: RangeInclusive<u8>) -> Result<u8, FrameError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(FrameError::InvalidParameter {
            name,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

impl Command {
    /// Encode this command into its wire frame.
    ///
    /// Every frame is 3, 4 or 5 bytes, starts with [`FRAME_HEAD`] and ends
    /// with [`FRAME_TAIL`]. The layouts are a fixed hardware contract.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let frame = match *self {
            Command::PollSensors => vec![FRAME_HEAD, OPCODE_POLL_SENSORS, FRAME_TAIL],
            Command::RelayOn(relay) => {
                let relay = check_range("relay", relay, RELAY_IDS)?;
                vec![FRAME_HEAD, OPCODE_RELAY, relay, RELAY_ENERGIZE, FRAME_TAIL]
            }
            Command::RelayOff(relay) => {
                let relay = check_range("relay", relay, RELAY_IDS)?;
                vec![FRAME_HEAD, OPCODE_RELAY, relay, RELAY_RELEASE, FRAME_TAIL]
            }
            Command::InternalMotorCw(motor) => {
                let motor = check_range("internal motor", motor, INTERNAL_MOTOR_IDS)?;
                vec![FRAME_HEAD, OPCODE_INTERNAL_MOTOR, motor, MOTOR_CW, FRAME_TAIL]
            }
            Command::InternalMotorCcw(motor) => {
                let motor = check_range("internal motor", motor, INTERNAL_MOTOR_IDS)?;
                vec![FRAME_HEAD, OPCODE_INTERNAL_MOTOR, motor, MOTOR_CCW, FRAME_TAIL]
            }
            Command::ExternalMotorControl(motor) => {
                let motor = check_range("external motor", motor, EXTERNAL_MOTOR_IDS)?;
                // The direction field is unused for external motors and
                // must stay 0x00.
                vec![FRAME_HEAD, OPCODE_EXTERNAL_MOTOR, motor, 0x00, FRAME_TAIL]
            }
            Command::ReadLoadCell(cell) => {
                let cell = check_range("load cell", cell, LOAD_CELL_INDICES)?;
                // One-based in the API, zero-based on the wire.
                vec![FRAME_HEAD, OPCODE_LOAD_CELL, cell - 1, FRAME_TAIL]
            }
        };
        Ok(frame)
    }
}
