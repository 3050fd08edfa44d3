use rmodbus::{client::ModbusRequest, ModbusProto};

use super::FrameError;

/// Build a Modbus TCP "write single register" (0x06) request.
pub fn generate_pull_set_holding_request(
    unit_id: u8,
    transaction_id: u16,
    address: u16,
    value: u16,
) -> Result<(ModbusRequest, Vec<u8>), FrameError> {
    let mut request = ModbusRequest::new(unit_id, ModbusProto::TcpUdp);
    request.tr_id = transaction_id;
    let mut raw = Vec::new();
    request.generate_set_holding(address, value, &mut raw)?;
    Ok((request, raw))
}

/// Check the echo of a 0x06 request.
pub fn parse_pull_set_holding(request: &ModbusRequest, response: &[u8]) -> Result<(), FrameError> {
    request.parse_ok(response)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let (_, raw) = generate_pull_set_holding_request(240, 1, 4, 0x000F).unwrap();
        assert_eq!(
            raw,
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0xF0, 0x06, 0x00, 0x04, 0x00, 0x0F]
        );
    }

    #[test]
    fn test_echo_is_accepted() {
        let (request, raw) = generate_pull_set_holding_request(240, 1, 4, 0x000F).unwrap();
        assert!(parse_pull_set_holding(&request, &raw).is_ok());
    }
}
