/// Holding-register catalog of the Neptun Smart module.
///
/// Addresses are zero-based protocol addresses. Bit offsets are MSB-first,
/// see [`super::bits::BitRegister`].
use serde::{Deserialize, Serialize};

/// Fixed Modbus unit identifier answered by the module.
pub const DEFAULT_UNIT_ID: u8 = 240;

/// Default TCP port of the module's Modbus gateway.
pub const DEFAULT_PORT: u16 = 503;

/// Number of counter slots probed during discovery.
pub const COUNTER_SLOTS: u16 = 8;

/// Upper bound on paired wireless sensors (configuration block size).
pub const MAX_WIRELESS_SENSORS: u16 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterSpec {
    pub address: u16,
    /// Width in registers, 1 or 2.
    pub width: u16,
}

impl RegisterSpec {
    pub const fn single(address: u16) -> Self {
        Self { address, width: 1 }
    }

    pub const fn double(address: u16) -> Self {
        Self { address, width: 2 }
    }

    /// Spec of the `index`-th element of a contiguous block starting here.
    pub const fn offset(self, index: u16) -> Self {
        Self {
            address: self.address + index * self.width,
            width: self.width,
        }
    }
}

pub struct RegisterMap;

impl RegisterMap {
    pub const MODULE_CONFIG: RegisterSpec = RegisterSpec::single(0);
    pub const INPUT_LINE_1_2_CONFIG: RegisterSpec = RegisterSpec::single(1);
    pub const INPUT_LINE_3_4_CONFIG: RegisterSpec = RegisterSpec::single(2);
    pub const STATUS_WIRED_LINE: RegisterSpec = RegisterSpec::single(3);
    pub const RELAY_CONFIG: RegisterSpec = RegisterSpec::single(4);
    pub const COUNT_OF_CONNECTED_WIRELESS_SENSORS: RegisterSpec = RegisterSpec::single(6);
    pub const FIRST_WIRELESS_SENSOR_CONFIG: RegisterSpec = RegisterSpec::single(7);
    pub const FIRST_WIRELESS_SENSOR_STATUS: RegisterSpec = RegisterSpec::single(57);
    pub const FIRST_COUNTER: RegisterSpec = RegisterSpec::double(107);
    pub const FIRST_COUNTER_CONFIG: RegisterSpec = RegisterSpec::single(123);

    pub const fn wireless_sensor_config(index: u16) -> RegisterSpec {
        Self::FIRST_WIRELESS_SENSOR_CONFIG.offset(index)
    }

    pub const fn wireless_sensor_status(index: u16) -> RegisterSpec {
        Self::FIRST_WIRELESS_SENSOR_STATUS.offset(index)
    }

    pub const fn counter_config(slot: u16) -> RegisterSpec {
        Self::FIRST_COUNTER_CONFIG.offset(slot)
    }

    pub const fn counter_value(slot: u16) -> RegisterSpec {
        Self::FIRST_COUNTER.offset(slot)
    }
}

/// Flag offsets inside the module configuration register.
pub mod module_bits {
    pub const BUTTONS_LOCKED: usize = 3;
    pub const CLOSE_VALVE_ON_SENSOR_LOSS: usize = 4;
    pub const DUAL_GROUP_MODE: usize = 5;
    pub const SECOND_VALVE_OPEN: usize = 6;
    pub const FIRST_VALVE_OPEN: usize = 7;
    pub const PAIRING_MODE: usize = 8;
    pub const SENSORS_LOST: usize = 11;
    pub const SENSORS_DISCHARGED: usize = 12;
    pub const SECOND_GROUP_ALARM: usize = 13;
    pub const FIRST_GROUP_ALARM: usize = 14;
    pub const FLOOR_WASHING_MODE: usize = 15;
}

/// Layout of one half of a line configuration register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSlot {
    pub type_bit: usize,
    pub group_msb: usize,
    pub group_lsb: usize,
}

/// Each line config register packs two lines; the odd line uses the first slot.
pub mod line_bits {
    use super::LineSlot;

    pub const FIRST_OF_PAIR: LineSlot = LineSlot {
        type_bit: 5,
        group_msb: 6,
        group_lsb: 7,
    };
    pub const SECOND_OF_PAIR: LineSlot = LineSlot {
        type_bit: 13,
        group_msb: 14,
        group_lsb: 15,
    };

    /// Alarm flag per wired line in the wired-line status register.
    pub const STATUS: [usize; 4] = [15, 14, 13, 12];
}

pub mod relay_bits {
    /// Switch relay when a valve closes.
    pub const VALVE_CLOSE: (usize, usize) = (12, 13);
    /// Switch relay on alert.
    pub const ALERT: (usize, usize) = (14, 15);
}

pub mod sensor_bits {
    pub const BATTERY: (usize, usize) = (0, 7);
    /// Bit 12 is the most significant bit of the signal level.
    pub const SIGNAL: (usize, usize) = (12, 10);
    pub const LOST: usize = 13;
    pub const DISCHARGED: usize = 14;
    pub const ALERT: usize = 15;
}

/// A counter slot is active when this flag of its config register is set.
pub const COUNTER_ENABLED_BIT: usize = 15;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_addresses_are_contiguous() {
        assert_eq!(RegisterMap::wireless_sensor_config(0).address, 7);
        assert_eq!(RegisterMap::wireless_sensor_config(3).address, 10);
        assert_eq!(RegisterMap::wireless_sensor_status(2).address, 59);
        assert_eq!(RegisterMap::counter_config(7).address, 130);
    }

    #[test]
    fn test_counters_are_two_registers_wide() {
        let slot = RegisterMap::counter_value(3);
        assert_eq!(slot.width, 2);
        assert_eq!(slot.address, 113);
        assert_eq!(RegisterMap::counter_value(COUNTER_SLOTS - 1).address + 2, RegisterMap::FIRST_COUNTER_CONFIG.address);
    }

    #[test]
    fn test_sensor_blocks_do_not_overlap() {
        let last_config = RegisterMap::wireless_sensor_config(MAX_WIRELESS_SENSORS - 1).address;
        let last_status = RegisterMap::wireless_sensor_status(MAX_WIRELESS_SENSORS - 1).address;
        assert!(last_config < RegisterMap::FIRST_WIRELESS_SENSOR_STATUS.address);
        assert!(last_status < RegisterMap::FIRST_COUNTER.address);
    }
}
