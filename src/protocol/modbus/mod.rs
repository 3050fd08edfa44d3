//! Modbus TCP framing on top of `rmodbus`.
//!
//! Only the two function codes the module needs are implemented: read holding
//! registers (0x03) and write single register (0x06).
mod frame;
mod header;
mod pull_get_holdings;
mod pull_set_holdings;

use derive_more::{Display, Error, From};

pub use frame::read_modbus_frame;
pub use header::{parse_mbap_header, MAX_FRAME_LEN, MBAP_PREFIX_LEN};
pub use pull_get_holdings::{generate_pull_get_holdings_request, parse_pull_get_holdings};
pub use pull_set_holdings::{generate_pull_set_holding_request, parse_pull_set_holding};

use crate::protocol::fault::ChannelFault;

#[derive(Debug, Display, Error, From)]
pub enum FrameError {
    #[display("i/o error: {_0}")]
    Io(std::io::Error),

    #[display("bad frame header: {_0}")]
    #[from(ignore)]
    Header(#[error(not(source))] String),

    #[display("modbus error: {_0:?}")]
    Modbus(#[error(not(source))] rmodbus::ErrorKind),
}

impl From<FrameError> for ChannelFault {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(err) => ChannelFault::connection_lost(err.to_string()),
            FrameError::Header(message) => ChannelFault::protocol(message),
            FrameError::Modbus(kind) => ChannelFault::protocol(format!("{kind:?}")),
        }
    }
}
