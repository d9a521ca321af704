use crate::frame::DecodeError;

/// Minimum length of a load cell response: four value bytes at offset 2.
pub const LOAD_CELL_RESPONSE_LEN: usize = 6;

/// Decode a load cell response into its measurement.
///
/// Bytes 2..6 of the response carry a little-endian IEEE-754 32-bit float.
/// An older batch format packed sixteen little-endian u32 values instead; it
/// is legacy and does not match the single-cell request this decoder pairs
/// with, so it is deliberately not implemented.
pub fn decode_load_cell_response(response: &[u8]) -> Result<f32, DecodeError> {
    if response.len() < LOAD_CELL_RESPONSE_LEN {
        return Err(DecodeError::MalformedResponse {
            got: response.len(),
            expected: LOAD_CELL_RESPONSE_LEN,
        });
    }

    let mut raw = [0u8; 4];
    raw.copy_from_slice(&response[2..6]);
    Ok(f32::from_le_bytes(raw))
}
