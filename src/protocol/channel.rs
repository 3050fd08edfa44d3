/// Typed register access for one device.
///
/// Reads never propagate faults: they return `None` and the fault is logged
/// with its class, so callers can treat absence as "unknown this cycle".
/// Writes report success or failure. Every transaction is bounded by the
/// request timeout; a timeout cancels only that transaction.
use std::time::Duration;
use tokio::time::timeout;

use super::{
    fault::{ChannelFault, DeviceFault, FaultClass},
    register::{BitRegister, RegisterSpec, DEFAULT_UNIT_ID},
    transport::ModbusTransport,
};
use crate::{
    api::traits::Diagnostics,
    core::logs::{DiagnosticEvent, DiagnosticLevel, Direction, LifecyclePhase},
};

#[derive(Debug, Clone, Copy)]
pub struct ChannelTimeouts {
    /// Bound on establishing the session, retries included.
    pub connect: Duration,
    /// Bound on a single read or write.
    pub request: Duration,
}

impl Default for ChannelTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(5),
        }
    }
}

pub struct ModbusChannel {
    transport: Box<dyn ModbusTransport>,
    unit_id: u8,
    timeouts: ChannelTimeouts,
    diagnostics: Diagnostics,
}

impl ModbusChannel {
    pub fn new(transport: Box<dyn ModbusTransport>, diagnostics: Diagnostics) -> Self {
        Self {
            transport,
            unit_id: DEFAULT_UNIT_ID,
            timeouts: ChannelTimeouts::default(),
            diagnostics,
        }
    }

    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_timeouts(mut self, timeouts: ChannelTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn endpoint(&self) -> String {
        self.transport.endpoint()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub async fn connect(&mut self) -> Result<(), DeviceFault> {
        let result = match timeout(self.timeouts.connect, self.transport.connect()).await {
            Ok(result) => result,
            Err(_) => {
                self.transport.close().await;
                Err(ChannelFault::Timeout {
                    after: self.timeouts.connect,
                })
            }
        };

        match result {
            Ok(()) => {
                self.diagnostics.emit(
                    DiagnosticLevel::Info,
                    format!("Connected to {}", self.transport.endpoint()),
                    Some(DiagnosticEvent::Lifecycle {
                        phase: LifecyclePhase::Connected,
                    }),
                );
                Ok(())
            }
            Err(source) => {
                self.report(&source, Direction::Connect, None);
                Err(DeviceFault::Connection { source })
            }
        }
    }

    pub async fn disconnect(&mut self) {
        self.transport.close().await;
        self.diagnostics.emit(
            DiagnosticLevel::Info,
            format!("Disconnected from {}", self.transport.endpoint()),
            Some(DiagnosticEvent::Lifecycle {
                phase: LifecyclePhase::Disconnected,
            }),
        );
    }

    /// Read a register block of the declared width, reporting the fault.
    pub async fn fetch(&mut self, spec: RegisterSpec) -> Result<Vec<u16>, ChannelFault> {
        let result = match timeout(
            self.timeouts.request,
            self.transport
                .read_holding_registers(self.unit_id, spec.address, spec.width),
        )
        .await
        {
            Ok(Ok(values)) if values.len() == spec.width as usize => Ok(values),
            Ok(Ok(values)) => Err(ChannelFault::Malformed {
                expected: spec.width,
                actual: values.len(),
            }),
            Ok(Err(fault)) => Err(fault),
            Err(_) => Err(ChannelFault::Timeout {
                after: self.timeouts.request,
            }),
        };

        if let Err(fault) = &result {
            self.report(fault, Direction::Read, Some(spec.address));
        }
        result
    }

    pub async fn read_uint16(&mut self, address: u16) -> Option<u16> {
        self.fetch(RegisterSpec::single(address))
            .await
            .ok()
            .map(|values| values[0])
    }

    /// Two consecutive registers, high word first.
    pub async fn read_uint32(&mut self, address: u16) -> Option<u32> {
        self.fetch(RegisterSpec::double(address))
            .await
            .ok()
            .map(|values| (u32::from(values[0]) << 16) | u32::from(values[1]))
    }

    pub async fn read_bits16(&mut self, address: u16) -> Option<BitRegister> {
        self.read_uint16(address).await.map(BitRegister::decode)
    }

    pub async fn write_uint16(&mut self, address: u16, value: u16) -> Result<(), ChannelFault> {
        let result = match timeout(
            self.timeouts.request,
            self.transport.write_register(self.unit_id, address, value),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ChannelFault::Timeout {
                after: self.timeouts.request,
            }),
        };

        match &result {
            Ok(()) => self.diagnostics.emit(
                DiagnosticLevel::Debug,
                format!("Wrote 0x{value:04X} to register {address}"),
                Some(DiagnosticEvent::RegisterWritten { address, value }),
            ),
            Err(fault) => self.report(fault, Direction::Write, Some(address)),
        }
        result
    }

    pub async fn write_bits16(
        &mut self,
        address: u16,
        register: BitRegister,
    ) -> Result<(), ChannelFault> {
        self.write_uint16(address, register.encode()).await
    }

    fn report(&self, fault: &ChannelFault, direction: Direction, address: Option<u16>) {
        let class = fault.class();
        let level = match class {
            FaultClass::Connection => DiagnosticLevel::Error,
            FaultClass::Timeout | FaultClass::Protocol => DiagnosticLevel::Warning,
        };
        let target = match address {
            Some(address) => format!(" register {address}"),
            None => String::new(),
        };
        let verb = match direction {
            Direction::Read => "read",
            Direction::Write => "write",
            Direction::Connect => "connect",
        };
        self.diagnostics.emit(
            level,
            format!(
                "{class} fault on {verb}{target} ({}): {fault}",
                self.transport.endpoint()
            ),
            Some(DiagnosticEvent::Fault {
                class,
                direction,
                address,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::traits::MemorySink,
        protocol::transport::{MemoryTransport, ReadBehaviour},
    };
    use std::sync::Arc;

    fn channel(transport: &MemoryTransport, sink: &MemorySink) -> ModbusChannel {
        ModbusChannel::new(
            Box::new(transport.clone()),
            Diagnostics::new("test", Arc::new(sink.clone())),
        )
        .with_timeouts(ChannelTimeouts {
            connect: Duration::from_millis(200),
            request: Duration::from_millis(50),
        })
    }

    #[tokio::test]
    async fn test_typed_reads() {
        let transport = MemoryTransport::with_registers(&[(0, 0x0180)]);
        transport.set_register_u32(107, 123_456);
        let sink = MemorySink::new(100);
        let mut channel = channel(&transport, &sink);
        channel.connect().await.unwrap();

        assert_eq!(channel.read_uint16(0).await, Some(0x0180));
        assert_eq!(channel.read_uint32(107).await, Some(123_456));
        let bits = channel.read_bits16(0).await.unwrap();
        assert!(bits.bit(7));
        assert!(bits.bit(8));
    }

    #[tokio::test]
    async fn test_read_faults_become_none_and_are_classified() {
        let transport = MemoryTransport::new();
        let sink = MemorySink::new(100);
        let mut channel = channel(&transport, &sink);
        channel.connect().await.unwrap();
        sink.clear();

        transport.set_read_behaviour(1, ReadBehaviour::Short);
        transport.set_read_behaviour(2, ReadBehaviour::Stall);
        transport.set_read_behaviour(3, ReadBehaviour::Fail(ChannelFault::connection_lost("reset")));
        assert_eq!(channel.read_uint16(1).await, None);
        assert_eq!(channel.read_uint16(2).await, None);
        assert_eq!(channel.read_uint16(3).await, None);

        let classes: Vec<FaultClass> = sink
            .events()
            .into_iter()
            .filter_map(|event| match event {
                DiagnosticEvent::Fault { class, .. } => Some(class),
                _ => None,
            })
            .collect();
        assert_eq!(
            classes,
            vec![FaultClass::Protocol, FaultClass::Timeout, FaultClass::Connection]
        );
    }

    #[tokio::test]
    async fn test_write_reports_failure() {
        let transport = MemoryTransport::new();
        let sink = MemorySink::new(100);
        let mut channel = channel(&transport, &sink);
        assert!(channel.write_uint16(4, 1).await.is_err());

        channel.connect().await.unwrap();
        channel
            .write_bits16(4, BitRegister::decode(0b11))
            .await
            .unwrap();
        assert_eq!(transport.register(4), 0b11);
    }

    #[tokio::test]
    async fn test_unreachable_device_fails_to_connect() {
        let transport = MemoryTransport::new();
        transport.set_reachable(false);
        let sink = MemorySink::new(100);
        let mut channel = channel(&transport, &sink);
        assert!(matches!(
            channel.connect().await,
            Err(DeviceFault::Connection { .. })
        ));
        assert!(!channel.is_connected());
    }
}
