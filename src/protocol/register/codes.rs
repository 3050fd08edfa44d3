use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{EnumIter, FromRepr};

use super::map::{line_bits, relay_bits, LineSlot, RegisterMap, RegisterSpec};

/// One of the four wired leak-detection inputs.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, FromRepr, Serialize, Deserialize)]
pub enum Line {
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
}

impl Line {
    pub fn number(self) -> u8 {
        self as u8
    }

    /// Zero-based position, used to index per-line tables.
    pub fn index(self) -> usize {
        self as usize - 1
    }

    /// The configuration register shared with the neighbouring line.
    pub fn config_register(self) -> RegisterSpec {
        match self {
            Line::One | Line::Two => RegisterMap::INPUT_LINE_1_2_CONFIG,
            Line::Three | Line::Four => RegisterMap::INPUT_LINE_3_4_CONFIG,
        }
    }

    pub fn slot(self) -> LineSlot {
        match self {
            Line::One | Line::Three => line_bits::FIRST_OF_PAIR,
            Line::Two | Line::Four => line_bits::SECOND_OF_PAIR,
        }
    }

    pub fn status_bit(self) -> usize {
        line_bits::STATUS[self.index()]
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}", self.number())
    }
}

/// Valve zone.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, FromRepr, Serialize, Deserialize)]
pub enum Zone {
    First = 1,
    Second = 2,
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::First => write!(f, "first"),
            Zone::Second => write!(f, "second"),
        }
    }
}

/// Alarm group membership of a line or wireless sensor.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, FromRepr, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneGroup {
    First = 1,
    Second = 2,
    Both = 3,
}

impl ZoneGroup {
    pub fn code(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ZoneGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneGroup::First => write!(f, "first"),
            ZoneGroup::Second => write!(f, "second"),
            ZoneGroup::Both => write!(f, "both"),
        }
    }
}

/// What a wired input is physically connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Sensor,
    Button,
}

impl LineKind {
    pub fn from_flag(flag: bool) -> Self {
        if flag {
            LineKind::Button
        } else {
            LineKind::Sensor
        }
    }

    pub fn flag(self) -> bool {
        matches!(self, LineKind::Button)
    }
}

/// Which groups switch the relay.
#[repr(u16)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumIter, FromRepr, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RelayPolicy {
    #[default]
    NoSwitch = 0,
    FirstGroup = 1,
    SecondGroup = 2,
    Both = 3,
}

impl RelayPolicy {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// The two relay triggers configured in the relay register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayKind {
    ValveClose,
    Alert,
}

impl RelayKind {
    pub fn bits(self) -> (usize, usize) {
        match self {
            RelayKind::ValveClose => relay_bits::VALVE_CLOSE,
            RelayKind::Alert => relay_bits::ALERT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_lines_share_registers_in_pairs() {
        assert_eq!(Line::One.config_register(), Line::Two.config_register());
        assert_eq!(Line::Three.config_register(), Line::Four.config_register());
        assert_ne!(Line::One.config_register(), Line::Three.config_register());
        assert_ne!(Line::One.slot(), Line::Two.slot());
    }

    #[test]
    fn test_codes_round_trip_through_repr() {
        for group in ZoneGroup::iter() {
            assert_eq!(ZoneGroup::from_repr(group.code()), Some(group));
        }
        assert_eq!(ZoneGroup::from_repr(0), None);
        for policy in RelayPolicy::iter() {
            assert_eq!(RelayPolicy::from_repr(policy.code()), Some(policy));
        }
        assert_eq!(Line::from_repr(5), None);
        assert_eq!(Line::iter().map(Line::status_bit).collect::<Vec<_>>(), vec![15, 14, 13, 12]);
    }
}
