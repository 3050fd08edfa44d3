use rmodbus::{client::ModbusRequest, ModbusProto};

use super::FrameError;

/// Build a Modbus TCP "read holding registers" (0x03) request.
pub fn generate_pull_get_holdings_request(
    unit_id: u8,
    transaction_id: u16,
    start_address: u16,
    count: u16,
) -> Result<(ModbusRequest, Vec<u8>), FrameError> {
    let mut request = ModbusRequest::new(unit_id, ModbusProto::TcpUdp);
    request.tr_id = transaction_id;
    let mut raw = Vec::new();
    request.generate_get_holdings(start_address, count, &mut raw)?;
    Ok((request, raw))
}

/// Decode the register values of a 0x03 response. Exception responses and
/// transaction mismatches surface as [`FrameError::Modbus`].
pub fn parse_pull_get_holdings(
    request: &ModbusRequest,
    response: &[u8],
) -> Result<Vec<u16>, FrameError> {
    let mut values = Vec::new();
    request.parse_u16(response, &mut values)?;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_layout() {
        let (_, raw) = generate_pull_get_holdings_request(240, 7, 107, 2).unwrap();
        assert_eq!(
            raw,
            vec![0x00, 0x07, 0x00, 0x00, 0x00, 0x06, 0xF0, 0x03, 0x00, 0x6B, 0x00, 0x02]
        );
    }

    #[test]
    fn test_parse_two_registers() {
        let (request, _) = generate_pull_get_holdings_request(240, 7, 107, 2).unwrap();
        let response = [
            0x00, 0x07, 0x00, 0x00, 0x00, 0x07, 0xF0, 0x03, 0x04, 0x00, 0x01, 0xE2, 0x40,
        ];
        assert_eq!(
            parse_pull_get_holdings(&request, &response).unwrap(),
            vec![0x0001, 0xE240]
        );
    }

    #[test]
    fn test_exception_response_is_an_error() {
        let (request, _) = generate_pull_get_holdings_request(240, 9, 500, 1).unwrap();
        // illegal data address
        let response = [0x00, 0x09, 0x00, 0x00, 0x00, 0x03, 0xF0, 0x83, 0x02];
        assert!(parse_pull_get_holdings(&request, &response).is_err());
    }
}
