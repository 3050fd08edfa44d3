use super::FrameError;

/// Length of the MBAP prefix that carries the frame length.
pub const MBAP_PREFIX_LEN: usize = 6;

/// Largest frame a Modbus TCP peer may send (MBAP header + 253 byte PDU).
pub const MAX_FRAME_LEN: usize = 260;

/// Parse the first six bytes of a Modbus TCP frame and return the total frame
/// length, prefix included.
pub fn parse_mbap_header(buf: [u8; MBAP_PREFIX_LEN]) -> Result<usize, FrameError> {
    let protocol_id = u16::from_be_bytes([buf[2], buf[3]]);
    if protocol_id != 0 {
        return Err(FrameError::Header(format!(
            "unexpected protocol id 0x{protocol_id:04X}"
        )));
    }
    let remaining = u16::from_be_bytes([buf[4], buf[5]]) as usize;
    // unit id + function code at the very least
    if remaining < 2 || MBAP_PREFIX_LEN + remaining > MAX_FRAME_LEN {
        return Err(FrameError::Header(format!("invalid length field {remaining}")));
    }
    Ok(MBAP_PREFIX_LEN + remaining)
}
