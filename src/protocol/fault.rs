/// Fault taxonomy for the register link.
///
/// [`ChannelFault`] classifies what went wrong with a single transaction,
/// [`DeviceFault`] says which device operation it broke. None of them is
/// fatal: the device keeps its last known values and retries on the next
/// refresh cycle.
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ChannelFault {
    #[display("request timed out after {after:?}")]
    Timeout { after: Duration },

    #[display("protocol exception: {message}")]
    Protocol { message: String },

    #[display("connection lost: {message}")]
    ConnectionLost { message: String },

    #[display("malformed response: expected {expected} registers, got {actual}")]
    Malformed { expected: u16, actual: usize },

    #[display("not connected")]
    NotConnected,
}

/// Coarse class used for logging and for deciding whether the session must
/// be re-established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultClass {
    #[display("timeout")]
    Timeout,
    #[display("protocol")]
    Protocol,
    #[display("connection")]
    Connection,
}

impl ChannelFault {
    pub fn protocol(message: impl Into<String>) -> Self {
        ChannelFault::Protocol {
            message: message.into(),
        }
    }

    pub fn connection_lost(message: impl Into<String>) -> Self {
        ChannelFault::ConnectionLost {
            message: message.into(),
        }
    }

    pub fn class(&self) -> FaultClass {
        match self {
            ChannelFault::Timeout { .. } => FaultClass::Timeout,
            // A short response is handled exactly like a protocol exception.
            ChannelFault::Protocol { .. } | ChannelFault::Malformed { .. } => FaultClass::Protocol,
            ChannelFault::ConnectionLost { .. } | ChannelFault::NotConnected => {
                FaultClass::Connection
            }
        }
    }

    /// Whether the TCP session is gone and must be re-established.
    pub fn is_link_down(&self) -> bool {
        self.class() == FaultClass::Connection
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum DeviceFault {
    #[display("cannot reach device: {source}")]
    Connection { source: ChannelFault },

    #[display("reading register {address} failed: {source}")]
    Read { address: u16, source: ChannelFault },

    #[display("writing register {address} failed: {source}")]
    Write { address: u16, source: ChannelFault },

    #[display("wireless sensor {index} was not discovered")]
    UnknownSensor { index: usize },
}

impl DeviceFault {
    pub fn address(&self) -> Option<u16> {
        match self {
            DeviceFault::Read { address, .. } | DeviceFault::Write { address, .. } => {
                Some(*address)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_classes() {
        assert_eq!(
            ChannelFault::Timeout {
                after: Duration::from_secs(5)
            }
            .class(),
            FaultClass::Timeout
        );
        assert_eq!(
            ChannelFault::Malformed {
                expected: 2,
                actual: 1
            }
            .class(),
            FaultClass::Protocol
        );
        assert!(ChannelFault::connection_lost("reset by peer").is_link_down());
        assert!(!ChannelFault::protocol("illegal data address").is_link_down());
    }

    #[test]
    fn test_device_fault_display_and_source() {
        let fault = DeviceFault::Write {
            address: 4,
            source: ChannelFault::NotConnected,
        };
        assert_eq!(fault.to_string(), "writing register 4 failed: not connected");
        assert_eq!(fault.address(), Some(4));
        let source = std::error::Error::source(&fault).map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("not connected"));
    }
}
