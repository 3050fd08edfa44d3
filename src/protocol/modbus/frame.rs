use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::{
    header::{parse_mbap_header, MBAP_PREFIX_LEN},
    FrameError,
};

/// Read exactly one Modbus TCP frame from `stream`.
///
/// Not cancellation safe: dropping the future halfway leaves the rest of the
/// frame in the socket. Callers must discard the stream in that case.
pub async fn read_modbus_frame<R>(stream: &mut R) -> Result<Bytes, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; MBAP_PREFIX_LEN];
    stream.read_exact(&mut header_buf).await?;

    let len = parse_mbap_header(header_buf)?;

    let mut full_buf = BytesMut::with_capacity(len);
    full_buf.extend_from_slice(&header_buf);
    full_buf.resize(len, 0);
    stream.read_exact(&mut full_buf[MBAP_PREFIX_LEN..]).await?;

    log::trace!(
        "Received Modbus frame: {}",
        full_buf
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" "),
    );

    Ok(full_buf.freeze())
}
