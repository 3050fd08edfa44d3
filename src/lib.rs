//! Neptun: Modbus TCP register codec and state synchronizer for Neptun Smart
//! water-leak control modules.
//!
//! The crate decodes the module's holding registers into typed fields (valves,
//! alarms, wired lines, relay policy, wireless sensors, water counters) and
//! keeps a local model in sync over an unreliable link. Reads that fail leave
//! the last known values in place; writes modify one field of a shared
//! register without touching its neighbours.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use neptun::{DeviceState, LoggingSink};
//! use neptun::protocol::{register::Zone, transport::TcpTransportConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let mut device = DeviceState::over_tcp(
//!     "bathroom",
//!     TcpTransportConfig::new("192.168.1.40", 503),
//!     Arc::new(LoggingSink),
//! );
//! device.init_sensors().await?;
//! device.refresh().await;
//! println!("first valve open: {:?}", device.is_valve_open(Zone::First));
//! # Ok(())
//! # }
//! ```

pub mod api;
#[doc(hidden)]
pub mod cli;
pub mod core;
pub mod protocol;

pub use api::*;
pub use crate::core::poller::{DeviceHandle, DevicePoller, PollerCommand};
