/// Synchronised model of one Neptun Smart module.
///
/// [`DeviceState`] owns the channel and one [`BitRegister`] per physical
/// configuration register. Every semantic getter decodes from that register,
/// every setter modifies it in place and writes it back, so sibling fields
/// sharing a register are never clobbered.
mod counter;
mod sensor;
mod snapshot;

use chrono::{DateTime, Local};
use std::{sync::Arc, time::Duration};
use strum::IntoEnumIterator;

pub use counter::{CounterState, UNITS_PER_CUBIC_METER};
pub use sensor::WirelessSensorState;
pub use snapshot::{
    CounterSnapshot, DeviceSnapshot, LineSnapshot, ModuleSnapshot, RelaySnapshot, SensorSnapshot,
};

use crate::{
    api::traits::{DiagnosticSink, Diagnostics},
    core::logs::{DiagnosticEvent, DiagnosticLevel, LifecyclePhase},
    protocol::{
        channel::{ChannelTimeouts, ModbusChannel},
        fault::{ChannelFault, DeviceFault},
        register::{
            map::{module_bits, COUNTER_ENABLED_BIT, COUNTER_SLOTS, MAX_WIRELESS_SENSORS},
            BitRegister, Line, LineKind, RegisterMap, RegisterSpec, RelayKind, RelayPolicy, Zone,
            ZoneGroup,
        },
        transport::{ModbusTransport, TcpTransport, TcpTransportConfig},
    },
};

/// Upper bound on the module-level reads of one refresh cycle.
pub const DEFAULT_CYCLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Alarm flags of both valve groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmState {
    pub first_group: bool,
    pub second_group: bool,
}

/// Registers held as bitfields by the device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owned {
    Module,
    /// Index 0 holds lines 1/2, index 1 lines 3/4.
    LinePair(usize),
    WiredStatus,
    Relay,
}

impl Owned {
    fn of_line(line: Line) -> Self {
        Owned::LinePair(line.index() / 2)
    }

    fn spec(self) -> RegisterSpec {
        match self {
            Owned::Module => RegisterMap::MODULE_CONFIG,
            Owned::LinePair(0) => RegisterMap::INPUT_LINE_1_2_CONFIG,
            Owned::LinePair(_) => RegisterMap::INPUT_LINE_3_4_CONFIG,
            Owned::WiredStatus => RegisterMap::STATUS_WIRED_LINE,
            Owned::Relay => RegisterMap::RELAY_CONFIG,
        }
    }
}

pub struct DeviceState {
    name: String,
    host: String,
    port: u16,
    channel: ModbusChannel,
    diagnostics: Diagnostics,
    cycle_timeout: Duration,

    connected: bool,
    last_refresh: Option<DateTime<Local>>,

    module_config: Option<BitRegister>,
    line_config: [Option<BitRegister>; 2],
    line_status: Option<BitRegister>,
    relay_config: Option<BitRegister>,

    /// Count reported at discovery time.
    discovered_sensor_count: Option<u16>,
    reported_sensor_count: Option<u16>,
    sensors: Vec<WirelessSensorState>,
    counters: Vec<CounterState>,
}

impl DeviceState {
    pub fn new(
        name: &str,
        host: &str,
        port: u16,
        transport: Box<dyn ModbusTransport>,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Self {
        let diagnostics = Diagnostics::new(name, sink);
        Self {
            name: name.to_string(),
            host: host.to_string(),
            port,
            channel: ModbusChannel::new(transport, diagnostics.clone()),
            diagnostics,
            cycle_timeout: DEFAULT_CYCLE_TIMEOUT,
            connected: false,
            last_refresh: None,
            module_config: None,
            line_config: [None; 2],
            line_status: None,
            relay_config: None,
            discovered_sensor_count: None,
            reported_sensor_count: None,
            sensors: Vec::new(),
            counters: Vec::new(),
        }
    }

    /// Device reached over Modbus TCP.
    pub fn over_tcp(name: &str, config: TcpTransportConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        let host = config.host.clone();
        let port = config.port;
        Self::new(name, &host, port, Box::new(TcpTransport::new(config)), sink)
    }

    pub fn with_timeouts(mut self, timeouts: ChannelTimeouts) -> Self {
        self.channel = self.channel.with_timeouts(timeouts);
        self
    }

    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.channel = self.channel.with_unit_id(unit_id);
        self
    }

    pub fn with_cycle_timeout(mut self, cycle_timeout: Duration) -> Self {
        self.cycle_timeout = cycle_timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_refresh(&self) -> Option<DateTime<Local>> {
        self.last_refresh
    }

    // ---- Lifecycle ----

    /// Discover wireless sensors and counters. Runs once at setup; the
    /// collections are never resized afterwards.
    ///
    /// On a connect failure the device stays usable with empty collections.
    pub async fn init_sensors(&mut self) -> Result<(), DeviceFault> {
        self.sensors.clear();
        self.counters.clear();
        self.discovered_sensor_count = None;

        if let Err(fault) = self.ensure_connected().await {
            self.mark_disconnected(&fault);
            return Err(fault);
        }

        let reported = match self
            .channel
            .read_uint16(RegisterMap::COUNT_OF_CONNECTED_WIRELESS_SENSORS.address)
            .await
        {
            Some(count) => count,
            None => {
                self.diagnostics
                    .warn("Wireless sensor count unavailable, assuming no sensors");
                0
            }
        };
        if reported > MAX_WIRELESS_SENSORS {
            self.diagnostics.warn(format!(
                "Module reports {reported} wireless sensors, only {MAX_WIRELESS_SENSORS} are addressable"
            ));
        }
        self.discovered_sensor_count = Some(reported);
        self.reported_sensor_count = Some(reported);

        for slot in 0..reported.min(MAX_WIRELESS_SENSORS) {
            let mut sensor = WirelessSensorState::new(slot);
            if sensor.refresh(&mut self.channel).await {
                self.sensors.push(sensor);
            } else {
                self.diagnostics.warn(format!(
                    "Wireless sensor {} did not answer, skipping it",
                    sensor.number()
                ));
            }
        }

        for slot in 0..COUNTER_SLOTS {
            let config = self
                .channel
                .read_bits16(RegisterMap::counter_config(slot).address)
                .await;
            if !config.is_some_and(|config| config.bit(COUNTER_ENABLED_BIT)) {
                continue;
            }
            let mut counter = CounterState::new(slot);
            if counter.refresh(&mut self.channel).await {
                self.counters.push(counter);
            } else {
                self.diagnostics
                    .warn(format!("Counter {} is enabled but unreadable", slot + 1));
            }
        }

        self.diagnostics.emit(
            DiagnosticLevel::Info,
            format!(
                "Discovered {} wireless sensors and {} counters",
                self.sensors.len(),
                self.counters.len()
            ),
            Some(DiagnosticEvent::Lifecycle {
                phase: LifecyclePhase::Discovered,
            }),
        );
        Ok(())
    }

    /// One polling cycle. Never fails: faults are logged, the affected fields
    /// keep their last known values and `is_connected` tells whether the
    /// cycle reached the module.
    ///
    /// The cycle timeout bounds the module-level reads only. Sensors and
    /// counters follow, each read bounded by the request timeout alone.
    pub async fn refresh(&mut self) {
        let cycle_timeout = self.cycle_timeout;
        let outcome = match tokio::time::timeout(cycle_timeout, self.refresh_module()).await {
            Ok(Ok(())) => self.refresh_children().await,
            Ok(Err(fault)) => Err(fault),
            Err(_) => Err(DeviceFault::Connection {
                source: ChannelFault::Timeout {
                    after: cycle_timeout,
                },
            }),
        };
        match outcome {
            Ok(()) => self.last_refresh = Some(Local::now()),
            Err(fault) => self.mark_disconnected(&fault),
        }
    }

    pub async fn disconnect(&mut self) {
        self.channel.disconnect().await;
        self.connected = false;
    }

    async fn ensure_connected(&mut self) -> Result<(), DeviceFault> {
        if self.connected && self.channel.is_connected() {
            return Ok(());
        }
        self.channel.connect().await?;
        self.connected = true;
        Ok(())
    }

    /// Fails when a failed read turned out to have dropped the session.
    fn link_alive(channel: &ModbusChannel) -> Result<(), DeviceFault> {
        if channel.is_connected() {
            Ok(())
        } else {
            Err(DeviceFault::Connection {
                source: ChannelFault::NotConnected,
            })
        }
    }

    async fn refresh_module(&mut self) -> Result<(), DeviceFault> {
        self.ensure_connected().await?;

        let spec = RegisterMap::MODULE_CONFIG;
        let module = self
            .channel
            .fetch(spec)
            .await
            .map_err(|source| DeviceFault::Read {
                address: spec.address,
                source,
            })?;
        self.module_config = Some(BitRegister::decode(module[0]));

        for owned in [
            Owned::LinePair(0),
            Owned::LinePair(1),
            Owned::WiredStatus,
            Owned::Relay,
        ] {
            match self.channel.read_bits16(owned.spec().address).await {
                Some(register) => *self.slot_mut(owned) = Some(register),
                None => Self::link_alive(&self.channel)?,
            }
        }

        match self
            .channel
            .read_uint16(RegisterMap::COUNT_OF_CONNECTED_WIRELESS_SENSORS.address)
            .await
        {
            Some(count) => self.observe_sensor_count(count),
            None => Self::link_alive(&self.channel)?,
        }
        Ok(())
    }

    /// A missing child reading only aborts when it took the session down.
    async fn refresh_children(&mut self) -> Result<(), DeviceFault> {
        for sensor in self.sensors.iter_mut() {
            if !sensor.refresh(&mut self.channel).await {
                Self::link_alive(&self.channel)?;
            }
        }
        for counter in self.counters.iter_mut() {
            if !counter.refresh(&mut self.channel).await {
                Self::link_alive(&self.channel)?;
            }
        }
        Ok(())
    }

    fn observe_sensor_count(&mut self, count: u16) {
        let changed = self.reported_sensor_count != Some(count);
        self.reported_sensor_count = Some(count);
        if !changed {
            return;
        }
        if let Some(discovered) = self.discovered_sensor_count {
            if discovered != count {
                self.diagnostics.emit(
                    DiagnosticLevel::Warning,
                    format!(
                        "Module now reports {count} wireless sensors, {} were discovered at setup; restart discovery to track them",
                        self.sensors.len()
                    ),
                    Some(DiagnosticEvent::SensorCountChanged {
                        discovered: self.sensors.len(),
                        reported: count,
                    }),
                );
            }
        }
    }

    fn mark_disconnected(&mut self, fault: &DeviceFault) {
        let was_connected = self.connected;
        self.connected = false;
        self.diagnostics.emit(
            DiagnosticLevel::Warning,
            format!("Refresh cycle aborted: {fault}"),
            Some(DiagnosticEvent::Lifecycle {
                phase: LifecyclePhase::CycleAborted,
            }),
        );
        if was_connected {
            self.diagnostics.emit(
                DiagnosticLevel::Error,
                "Device is now disconnected, keeping last known values".to_string(),
                Some(DiagnosticEvent::Lifecycle {
                    phase: LifecyclePhase::Disconnected,
                }),
            );
        }
    }

    // ---- Register plumbing ----

    fn slot(&self, owned: Owned) -> Option<BitRegister> {
        match owned {
            Owned::Module => self.module_config,
            Owned::LinePair(pair) => self.line_config[pair],
            Owned::WiredStatus => self.line_status,
            Owned::Relay => self.relay_config,
        }
    }

    fn slot_mut(&mut self, owned: Owned) -> &mut Option<BitRegister> {
        match owned {
            Owned::Module => &mut self.module_config,
            Owned::LinePair(pair) => &mut self.line_config[pair],
            Owned::WiredStatus => &mut self.line_status,
            Owned::Relay => &mut self.relay_config,
        }
    }

    /// Read-modify-write of one owned register. A register never read is
    /// fetched first. The local copy is updated before the write completes.
    async fn modify<F>(&mut self, owned: Owned, mutate: F) -> Result<(), DeviceFault>
    where
        F: FnOnce(&mut BitRegister),
    {
        self.ensure_connected().await?;
        let spec = owned.spec();

        let mut register = match self.slot(owned) {
            Some(register) => register,
            None => {
                let values = self.channel.fetch(spec).await.map_err(|source| {
                    self.note_link(&source);
                    DeviceFault::Read {
                        address: spec.address,
                        source,
                    }
                })?;
                BitRegister::decode(values[0])
            }
        };
        mutate(&mut register);
        *self.slot_mut(owned) = Some(register);

        match self.channel.write_bits16(spec.address, register).await {
            Ok(()) => Ok(()),
            Err(source) => {
                self.note_link(&source);
                Err(DeviceFault::Write {
                    address: spec.address,
                    source,
                })
            }
        }
    }

    fn note_link(&mut self, fault: &ChannelFault) {
        if fault.is_link_down() {
            self.connected = false;
        }
    }

    fn module_flag(&self, bit: usize) -> Option<bool> {
        self.module_config.map(|register| register.bit(bit))
    }

    async fn set_module_flag(&mut self, bit: usize, value: bool) -> Result<(), DeviceFault> {
        self.modify(Owned::Module, |register| register.set_bit(bit, value))
            .await
    }

    // ---- Module flags ----

    pub fn module_config(&self) -> Option<BitRegister> {
        self.module_config
    }

    pub fn alarm_state(&self) -> Option<AlarmState> {
        self.module_config.map(|register| AlarmState {
            first_group: register.bit(module_bits::FIRST_GROUP_ALARM),
            second_group: register.bit(module_bits::SECOND_GROUP_ALARM),
        })
    }

    pub fn is_valve_open(&self, zone: Zone) -> Option<bool> {
        self.module_flag(Self::valve_bit(zone))
    }

    pub async fn set_valve_open(&mut self, zone: Zone, open: bool) -> Result<(), DeviceFault> {
        self.set_module_flag(Self::valve_bit(zone), open).await
    }

    fn valve_bit(zone: Zone) -> usize {
        match zone {
            Zone::First => module_bits::FIRST_VALVE_OPEN,
            Zone::Second => module_bits::SECOND_VALVE_OPEN,
        }
    }

    pub fn is_floor_washing_mode(&self) -> Option<bool> {
        self.module_flag(module_bits::FLOOR_WASHING_MODE)
    }

    pub async fn set_floor_washing_mode(&mut self, enabled: bool) -> Result<(), DeviceFault> {
        self.set_module_flag(module_bits::FLOOR_WASHING_MODE, enabled)
            .await
    }

    pub fn are_sensors_discharged(&self) -> Option<bool> {
        self.module_flag(module_bits::SENSORS_DISCHARGED)
    }

    pub fn are_sensors_lost(&self) -> Option<bool> {
        self.module_flag(module_bits::SENSORS_LOST)
    }

    /// Wireless sensor pairing mode.
    pub fn is_pairing_mode(&self) -> Option<bool> {
        self.module_flag(module_bits::PAIRING_MODE)
    }

    pub async fn set_pairing_mode(&mut self, enabled: bool) -> Result<(), DeviceFault> {
        self.set_module_flag(module_bits::PAIRING_MODE, enabled)
            .await
    }

    pub fn is_dual_group_mode(&self) -> Option<bool> {
        self.module_flag(module_bits::DUAL_GROUP_MODE)
    }

    /// Enabling also moves every wired line and every discovered wireless
    /// sensor to [`ZoneGroup::Both`]. The writes are not atomic; the first
    /// failing one stops the sequence and earlier writes stay applied.
    pub async fn set_dual_group_mode(&mut self, enabled: bool) -> Result<(), DeviceFault> {
        self.set_module_flag(module_bits::DUAL_GROUP_MODE, enabled)
            .await?;
        if !enabled {
            return Ok(());
        }
        for line in Line::iter() {
            self.set_line_group(line, ZoneGroup::Both).await?;
        }
        for index in 0..self.sensors.len() {
            self.set_sensor_group(index, ZoneGroup::Both).await?;
        }
        Ok(())
    }

    pub fn close_valve_on_sensor_loss(&self) -> Option<bool> {
        self.module_flag(module_bits::CLOSE_VALVE_ON_SENSOR_LOSS)
    }

    pub async fn set_close_valve_on_sensor_loss(&mut self, enabled: bool) -> Result<(), DeviceFault> {
        self.set_module_flag(module_bits::CLOSE_VALVE_ON_SENSOR_LOSS, enabled)
            .await
    }

    pub fn are_buttons_locked(&self) -> Option<bool> {
        self.module_flag(module_bits::BUTTONS_LOCKED)
    }

    pub async fn set_buttons_locked(&mut self, locked: bool) -> Result<(), DeviceFault> {
        self.set_module_flag(module_bits::BUTTONS_LOCKED, locked)
            .await
    }

    // ---- Wired lines ----

    /// Whether the line currently detects a leak.
    pub fn line_status(&self, line: Line) -> Option<bool> {
        self.line_status.map(|register| register.bit(line.status_bit()))
    }

    pub fn line_kind(&self, line: Line) -> Option<LineKind> {
        self.slot(Owned::of_line(line))
            .map(|register| LineKind::from_flag(register.bit(line.slot().type_bit)))
    }

    pub async fn set_line_kind(&mut self, line: Line, kind: LineKind) -> Result<(), DeviceFault> {
        let type_bit = line.slot().type_bit;
        self.modify(Owned::of_line(line), |register| {
            register.set_bit(type_bit, kind.flag())
        })
        .await
    }

    /// `None` when unknown or when both group bits are clear.
    pub fn line_group(&self, line: Line) -> Option<ZoneGroup> {
        let slot = line.slot();
        self.slot(Owned::of_line(line))
            .and_then(|register| ZoneGroup::from_repr(register.field(slot.group_msb, slot.group_lsb)))
    }

    pub async fn set_line_group(&mut self, line: Line, group: ZoneGroup) -> Result<(), DeviceFault> {
        let slot = line.slot();
        self.modify(Owned::of_line(line), |register| {
            register.set_field(slot.group_msb, slot.group_lsb, group.code())
        })
        .await
    }

    // ---- Relay ----

    pub fn relay_policy(&self, kind: RelayKind) -> Option<RelayPolicy> {
        let (msb, lsb) = kind.bits();
        self.relay_config
            .and_then(|register| RelayPolicy::from_repr(register.field(msb, lsb)))
    }

    pub async fn set_relay_policy(
        &mut self,
        kind: RelayKind,
        policy: RelayPolicy,
    ) -> Result<(), DeviceFault> {
        let (msb, lsb) = kind.bits();
        self.modify(Owned::Relay, |register| {
            register.set_field(msb, lsb, policy.code())
        })
        .await
    }

    // ---- Children ----

    /// Last count reported by the module. May differ from `sensors().len()`.
    pub fn wireless_sensor_count(&self) -> Option<u16> {
        self.reported_sensor_count
    }

    pub fn sensors(&self) -> &[WirelessSensorState] {
        &self.sensors
    }

    pub fn sensor(&self, index: usize) -> Option<&WirelessSensorState> {
        self.sensors.get(index)
    }

    /// `index` is the position in [`Self::sensors`].
    pub async fn set_sensor_group(
        &mut self,
        index: usize,
        group: ZoneGroup,
    ) -> Result<(), DeviceFault> {
        if index >= self.sensors.len() {
            return Err(DeviceFault::UnknownSensor { index });
        }
        self.ensure_connected().await?;
        let result = self.sensors[index]
            .set_group(&mut self.channel, group)
            .await;
        if let Err(DeviceFault::Write { source, .. }) = &result {
            self.note_link(source);
        }
        result
    }

    pub fn counters(&self) -> &[CounterState] {
        &self.counters
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        let module = self.module_config.map(|register| ModuleSnapshot {
            first_valve_open: register.bit(module_bits::FIRST_VALVE_OPEN),
            second_valve_open: register.bit(module_bits::SECOND_VALVE_OPEN),
            floor_washing_mode: register.bit(module_bits::FLOOR_WASHING_MODE),
            first_group_alarm: register.bit(module_bits::FIRST_GROUP_ALARM),
            second_group_alarm: register.bit(module_bits::SECOND_GROUP_ALARM),
            sensors_discharged: register.bit(module_bits::SENSORS_DISCHARGED),
            sensors_lost: register.bit(module_bits::SENSORS_LOST),
            pairing_mode: register.bit(module_bits::PAIRING_MODE),
            dual_group_mode: register.bit(module_bits::DUAL_GROUP_MODE),
            close_valve_on_sensor_loss: register.bit(module_bits::CLOSE_VALVE_ON_SENSOR_LOSS),
            buttons_locked: register.bit(module_bits::BUTTONS_LOCKED),
        });

        DeviceSnapshot {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            connected: self.connected,
            last_refresh: self.last_refresh,
            module,
            lines: Line::iter()
                .map(|line| LineSnapshot {
                    line: line.number(),
                    kind: self.line_kind(line),
                    group: self.line_group(line),
                    alarm: self.line_status(line),
                })
                .collect(),
            relay: RelaySnapshot {
                valve_close: self.relay_policy(RelayKind::ValveClose),
                alert: self.relay_policy(RelayKind::Alert),
            },
            wireless_sensor_count: self.reported_sensor_count,
            sensors: self
                .sensors
                .iter()
                .map(|sensor| SensorSnapshot {
                    number: sensor.number(),
                    group: sensor.group(),
                    battery: sensor.battery(),
                    signal: sensor.signal(),
                    alert: sensor.is_alert(),
                    discharged: sensor.is_discharged(),
                    lost: sensor.is_lost(),
                })
                .collect(),
            counters: self
                .counters
                .iter()
                .map(|counter| CounterSnapshot {
                    slot: counter.slot(),
                    address: counter.address(),
                    raw: counter.raw_value(),
                    cubic_meters: counter.cubic_meters(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::traits::MemorySink, protocol::transport::MemoryTransport};

    fn device(transport: &MemoryTransport) -> (DeviceState, MemorySink) {
        let sink = MemorySink::new(200);
        let device = DeviceState::new(
            "kitchen",
            "memory",
            0,
            Box::new(transport.clone()),
            Arc::new(sink.clone()),
        )
        .with_timeouts(ChannelTimeouts {
            connect: Duration::from_millis(200),
            request: Duration::from_millis(50),
        });
        (device, sink)
    }

    #[tokio::test]
    async fn test_setter_reads_unknown_register_first() {
        // Lines 1/2 register: line 1 button in group 1, line 2 sensor in group 2.
        let transport = MemoryTransport::with_registers(&[(1, 0b0000_0101_0000_0010)]);
        let (mut device, _) = device(&transport);

        device.set_line_group(Line::Two, ZoneGroup::Both).await.unwrap();
        let written = BitRegister::decode(transport.register(1));
        assert_eq!(written.field(14, 15), 3);
        assert_eq!(written.field(6, 7), 1);
        assert!(written.bit(5));
        assert_eq!(device.line_kind(Line::One), Some(LineKind::Button));
        assert_eq!(device.line_group(Line::One), Some(ZoneGroup::First));
    }

    #[tokio::test]
    async fn test_relay_policy_both_uses_two_bits() {
        let transport = MemoryTransport::new();
        let (mut device, _) = device(&transport);
        device
            .set_relay_policy(RelayKind::Alert, RelayPolicy::Both)
            .await
            .unwrap();
        device
            .set_relay_policy(RelayKind::ValveClose, RelayPolicy::SecondGroup)
            .await
            .unwrap();
        assert_eq!(transport.register(4), 0b0000_0000_0000_1011);
        assert_eq!(device.relay_policy(RelayKind::Alert), Some(RelayPolicy::Both));
        assert_eq!(
            device.relay_policy(RelayKind::ValveClose),
            Some(RelayPolicy::SecondGroup)
        );
    }

    #[tokio::test]
    async fn test_unknown_sensor_index() {
        let transport = MemoryTransport::new();
        let (mut device, _) = device(&transport);
        assert_eq!(
            device.set_sensor_group(0, ZoneGroup::First).await,
            Err(DeviceFault::UnknownSensor { index: 0 })
        );
    }

    #[tokio::test]
    async fn test_sensor_count_change_is_logged_once() {
        let transport = MemoryTransport::with_registers(&[(6, 1), (7, 1)]);
        let (mut device, sink) = device(&transport);
        device.init_sensors().await.unwrap();
        device.refresh().await;
        transport.set_register(6, 2);
        device.refresh().await;
        device.refresh().await;

        let changes = sink
            .events()
            .into_iter()
            .filter(|event| matches!(event, DiagnosticEvent::SensorCountChanged { .. }))
            .count();
        assert_eq!(changes, 1);
        assert_eq!(device.sensors().len(), 1);
        assert_eq!(device.wireless_sensor_count(), Some(2));
    }
}
