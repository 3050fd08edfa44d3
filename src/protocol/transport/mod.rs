/// Register transport seam.
///
/// The device model never talks to a socket directly; it goes through a
/// [`ModbusTransport`]. [`TcpTransport`] is the real Modbus TCP client,
/// [`MemoryTransport`] simulates a module's register bank for tests and demos.
mod memory;
mod tcp;

use async_trait::async_trait;

pub use memory::{MemoryTransport, ReadBehaviour};
pub use tcp::{TcpTransport, TcpTransportConfig};

use crate::protocol::fault::ChannelFault;

#[async_trait]
pub trait ModbusTransport: Send {
    /// Establish (or re-establish) the session.
    async fn connect(&mut self) -> Result<(), ChannelFault>;

    /// Drop the session. Safe to call when not connected.
    async fn close(&mut self);

    fn is_connected(&self) -> bool;

    /// Function 0x03. Must return exactly `count` registers on success.
    async fn read_holding_registers(
        &mut self,
        unit_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, ChannelFault>;

    /// Function 0x06.
    async fn write_register(
        &mut self,
        unit_id: u8,
        address: u16,
        value: u16,
    ) -> Result<(), ChannelFault>;

    /// Human readable peer description, used in diagnostics.
    fn endpoint(&self) -> String;
}
