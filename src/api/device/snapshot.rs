use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::protocol::register::{LineKind, RelayPolicy, ZoneGroup};

/// Plain copy of everything a device exposes, taken between two operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub connected: bool,
    pub last_refresh: Option<DateTime<Local>>,
    pub module: Option<ModuleSnapshot>,
    pub lines: Vec<LineSnapshot>,
    pub relay: RelaySnapshot,
    pub wireless_sensor_count: Option<u16>,
    pub sensors: Vec<SensorSnapshot>,
    pub counters: Vec<CounterSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSnapshot {
    pub first_valve_open: bool,
    pub second_valve_open: bool,
    pub floor_washing_mode: bool,
    pub first_group_alarm: bool,
    pub second_group_alarm: bool,
    pub sensors_discharged: bool,
    pub sensors_lost: bool,
    pub pairing_mode: bool,
    pub dual_group_mode: bool,
    pub close_valve_on_sensor_loss: bool,
    pub buttons_locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub line: u8,
    pub kind: Option<LineKind>,
    pub group: Option<ZoneGroup>,
    pub alarm: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelaySnapshot {
    pub valve_close: Option<RelayPolicy>,
    pub alert: Option<RelayPolicy>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSnapshot {
    pub number: u16,
    pub group: Option<ZoneGroup>,
    pub battery: Option<u8>,
    pub signal: Option<u8>,
    pub alert: Option<bool>,
    pub discharged: Option<bool>,
    pub lost: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub slot: u16,
    pub address: u16,
    pub raw: Option<u32>,
    pub cubic_meters: Option<f64>,
}

fn show<T: fmt::Debug>(value: &Option<T>) -> String {
    match value {
        Some(value) => format!("{value:?}"),
        None => "?".to_string(),
    }
}

impl fmt::Display for DeviceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.connected { "online" } else { "offline" };
        writeln!(f, "{} ({}:{}) {state}", self.name, self.host, self.port)?;

        match &self.module {
            Some(module) => {
                writeln!(
                    f,
                    "  valves: first={} second={}",
                    if module.first_valve_open { "open" } else { "closed" },
                    if module.second_valve_open { "open" } else { "closed" },
                )?;
                writeln!(
                    f,
                    "  alarms: first={} second={} discharged={} lost={}",
                    module.first_group_alarm,
                    module.second_group_alarm,
                    module.sensors_discharged,
                    module.sensors_lost
                )?;
                writeln!(
                    f,
                    "  modes: floor_washing={} pairing={} dual_group={} close_on_loss={} locked={}",
                    module.floor_washing_mode,
                    module.pairing_mode,
                    module.dual_group_mode,
                    module.close_valve_on_sensor_loss,
                    module.buttons_locked
                )?;
            }
            None => writeln!(f, "  module state unknown")?,
        }

        for line in &self.lines {
            writeln!(
                f,
                "  line {}: kind={} group={} alarm={}",
                line.line,
                show(&line.kind),
                show(&line.group),
                show(&line.alarm)
            )?;
        }
        writeln!(
            f,
            "  relay: valve_close={} alert={}",
            show(&self.relay.valve_close),
            show(&self.relay.alert)
        )?;

        writeln!(
            f,
            "  wireless sensors: {} reported, {} tracked",
            show(&self.wireless_sensor_count),
            self.sensors.len()
        )?;
        for sensor in &self.sensors {
            writeln!(
                f,
                "    #{}: group={} battery={} signal={} alert={} discharged={} lost={}",
                sensor.number,
                show(&sensor.group),
                show(&sensor.battery),
                show(&sensor.signal),
                show(&sensor.alert),
                show(&sensor.discharged),
                show(&sensor.lost)
            )?;
        }
        for counter in &self.counters {
            match counter.cubic_meters {
                Some(volume) => writeln!(f, "  counter {}: {volume:.3} m3", counter.slot + 1)?,
                None => writeln!(f, "  counter {}: ?", counter.slot + 1)?,
            }
        }
        Ok(())
    }
}
