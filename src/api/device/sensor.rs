use crate::protocol::{
    channel::ModbusChannel,
    fault::DeviceFault,
    register::{map::sensor_bits, BitRegister, RegisterMap, ZoneGroup},
};

/// A paired wireless leak sensor.
///
/// Config and status are refreshed independently; a failed read keeps the
/// previous value of that register only.
#[derive(Debug, Clone)]
pub struct WirelessSensorState {
    slot: u16,
    config: Option<u16>,
    status: Option<BitRegister>,
}

impl WirelessSensorState {
    pub fn new(slot: u16) -> Self {
        Self {
            slot,
            config: None,
            status: None,
        }
    }

    /// 1-based number, as shown by the module.
    pub fn number(&self) -> u16 {
        self.slot + 1
    }

    pub fn config_address(&self) -> u16 {
        RegisterMap::wireless_sensor_config(self.slot).address
    }

    pub fn status_address(&self) -> u16 {
        RegisterMap::wireless_sensor_status(self.slot).address
    }

    pub fn group_config(&self) -> Option<u16> {
        self.config
    }

    /// `None` when unknown or when the module reports a code outside 1..=3.
    pub fn group(&self) -> Option<ZoneGroup> {
        self.config.and_then(ZoneGroup::from_repr)
    }

    pub fn status(&self) -> Option<BitRegister> {
        self.status
    }

    pub fn battery(&self) -> Option<u8> {
        let (msb, lsb) = sensor_bits::BATTERY;
        self.status.map(|status| status.field(msb, lsb) as u8)
    }

    /// Signal strength, 0..=7.
    pub fn signal(&self) -> Option<u8> {
        let (msb, lsb) = sensor_bits::SIGNAL;
        self.status.map(|status| status.field(msb, lsb) as u8)
    }

    pub fn is_alert(&self) -> Option<bool> {
        self.status.map(|status| status.bit(sensor_bits::ALERT))
    }

    pub fn is_discharged(&self) -> Option<bool> {
        self.status.map(|status| status.bit(sensor_bits::DISCHARGED))
    }

    pub fn is_lost(&self) -> Option<bool> {
        self.status.map(|status| status.bit(sensor_bits::LOST))
    }

    /// Re-read config and status. Returns whether both reads succeeded.
    pub async fn refresh(&mut self, channel: &mut ModbusChannel) -> bool {
        let config = channel.read_uint16(self.config_address()).await;
        if config.is_some() {
            self.config = config;
        }
        let status = channel.read_bits16(self.status_address()).await;
        if status.is_some() {
            self.status = status;
        }
        config.is_some() && status.is_some()
    }

    /// The local value changes before the write is confirmed.
    pub async fn set_group(
        &mut self,
        channel: &mut ModbusChannel,
        group: ZoneGroup,
    ) -> Result<(), DeviceFault> {
        let address = self.config_address();
        self.config = Some(group.code());
        channel
            .write_uint16(address, group.code())
            .await
            .map_err(|source| DeviceFault::Write { address, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::traits::{Diagnostics, NoOpSink},
        protocol::{
            fault::ChannelFault,
            transport::{MemoryTransport, ReadBehaviour},
        },
    };
    use std::sync::Arc;

    async fn connected(transport: &MemoryTransport) -> ModbusChannel {
        let mut channel = ModbusChannel::new(
            Box::new(transport.clone()),
            Diagnostics::new("test", Arc::new(NoOpSink)),
        );
        channel.connect().await.unwrap();
        channel
    }

    #[tokio::test]
    async fn test_status_decoding() {
        // alert, signal 0b101, battery 0x64
        let transport = MemoryTransport::with_registers(&[(8, 2), (58, 0b0110_0100_0010_1001)]);
        let mut channel = connected(&transport).await;

        let mut sensor = WirelessSensorState::new(1);
        assert_eq!(sensor.number(), 2);
        assert!(sensor.refresh(&mut channel).await);
        assert_eq!(sensor.group(), Some(ZoneGroup::Second));
        assert_eq!(sensor.battery(), Some(0x64));
        assert_eq!(sensor.signal(), Some(0b101));
        assert_eq!(sensor.is_alert(), Some(true));
        assert_eq!(sensor.is_discharged(), Some(false));
        assert_eq!(sensor.is_lost(), Some(false));
    }

    #[tokio::test]
    async fn test_failed_status_read_keeps_config_fresh() {
        let transport = MemoryTransport::with_registers(&[(7, 1), (57, 0x6400)]);
        let mut channel = connected(&transport).await;
        let mut sensor = WirelessSensorState::new(0);
        assert!(sensor.refresh(&mut channel).await);

        transport.set_register(7, 3);
        transport.set_register(57, 0);
        transport.set_read_behaviour(57, ReadBehaviour::Fail(ChannelFault::protocol("busy")));
        assert!(!sensor.refresh(&mut channel).await);
        assert_eq!(sensor.group(), Some(ZoneGroup::Both));
        assert_eq!(sensor.battery(), Some(0x64));
    }

    #[tokio::test]
    async fn test_set_group_writes_config_register() {
        let transport = MemoryTransport::new();
        let mut channel = connected(&transport).await;
        let mut sensor = WirelessSensorState::new(4);
        sensor.set_group(&mut channel, ZoneGroup::Both).await.unwrap();
        assert_eq!(transport.register(11), 3);
        assert_eq!(sensor.group_config(), Some(3));
    }
}
