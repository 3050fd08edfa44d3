use crate::protocol::{channel::ModbusChannel, register::RegisterMap};

/// Protocol units per cubic meter.
pub const UNITS_PER_CUBIC_METER: f64 = 1000.0;

/// A water meter wired to one of the module's counter inputs.
#[derive(Debug, Clone)]
pub struct CounterState {
    slot: u16,
    value: Option<u32>,
}

impl CounterState {
    pub fn new(slot: u16) -> Self {
        Self { slot, value: None }
    }

    pub fn slot(&self) -> u16 {
        self.slot
    }

    pub fn address(&self) -> u16 {
        RegisterMap::counter_value(self.slot).address
    }

    /// Accumulated value in protocol units (liters).
    pub fn raw_value(&self) -> Option<u32> {
        self.value
    }

    pub fn cubic_meters(&self) -> Option<f64> {
        self.value
            .map(|value| f64::from(value) / UNITS_PER_CUBIC_METER)
    }

    pub async fn refresh(&mut self, channel: &mut ModbusChannel) -> bool {
        match channel.read_uint32(self.address()).await {
            Some(value) => {
                self.value = Some(value);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::traits::{Diagnostics, NoOpSink},
        protocol::transport::{MemoryTransport, ReadBehaviour},
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn test_counter_scaling_and_stale_value() {
        let transport = MemoryTransport::new();
        transport.set_register_u32(109, 123_456);
        let mut channel = ModbusChannel::new(
            Box::new(transport.clone()),
            Diagnostics::new("test", Arc::new(NoOpSink)),
        );
        channel.connect().await.unwrap();

        let mut counter = CounterState::new(1);
        assert_eq!(counter.address(), 109);
        assert!(counter.refresh(&mut channel).await);
        assert_eq!(counter.raw_value(), Some(123_456));
        assert_eq!(counter.cubic_meters(), Some(123.456));

        transport.set_read_behaviour(110, ReadBehaviour::Short);
        assert!(!counter.refresh(&mut channel).await);
        assert_eq!(counter.raw_value(), Some(123_456));
    }
}
