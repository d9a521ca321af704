//! Wire protocol for the test-bench board.
//!
//! Commands are fixed-layout binary frames bounded by a head and tail byte.
//! Encoding and decoding are pure functions with no I/O; the connection
//! layer hands raw response bytes to the decoders defined here.

pub mod frame;
pub mod loadcell;
pub mod sensors;

pub use frame::{Command, DecodeError, FrameError, MotorDirection, FRAME_HEAD, FRAME_TAIL};
pub use loadcell::decode_load_cell_response;
pub use sensors::{decode_sensor_response, SensorState, SENSOR_COUNT};
