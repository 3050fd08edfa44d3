/// 16-bit register viewed as an ordered sequence of flags.
///
/// The device documentation numbers bits MSB-first: index 0 is the most
/// significant bit of the word and index 15 the least significant one. Every
/// offset used in [`super::map`] follows that numbering.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of flags in one holding register.
pub const REGISTER_WIDTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BitRegister(u16);

impl BitRegister {
    /// Decode a raw register value.
    pub const fn decode(raw: u16) -> Self {
        Self(raw)
    }

    /// Build a register from an MSB-first flag list.
    ///
    /// A list shorter than 16 entries is padded with leading zeros, exactly
    /// like the binary rendering of a small number. Entries past the 16th are
    /// rejected.
    pub fn from_flags(flags: &[bool]) -> Option<Self> {
        if flags.len() > REGISTER_WIDTH {
            return None;
        }
        let raw = flags
            .iter()
            .fold(0u16, |acc, flag| (acc << 1) | u16::from(*flag));
        Some(Self(raw))
    }

    /// Raw value ready for transmission.
    pub const fn encode(self) -> u16 {
        self.0
    }

    /// All 16 flags, MSB first.
    pub fn flags(self) -> [bool; REGISTER_WIDTH] {
        let mut out = [false; REGISTER_WIDTH];
        for (index, slot) in out.iter_mut().enumerate() {
            *slot = self.bit(index);
        }
        out
    }

    fn mask(index: usize) -> u16 {
        debug_assert!(index < REGISTER_WIDTH, "bit index {index} out of range");
        1u16 << (REGISTER_WIDTH - 1 - index)
    }

    pub fn bit(self, index: usize) -> bool {
        self.0 & Self::mask(index) != 0
    }

    pub fn set_bit(&mut self, index: usize, value: bool) {
        let mask = Self::mask(index);
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// Read the group of flags from `msb` to `lsb` (inclusive) as an unsigned
    /// integer, `msb` being the most significant flag of the result.
    ///
    /// The walk may go in either direction: `field(6, 7)` reads two flags in
    /// register order, `field(12, 10)` reads three flags with index 12 as the
    /// top bit of the value.
    pub fn field(self, msb: usize, lsb: usize) -> u16 {
        field_indices(msb, lsb).fold(0u16, |acc, index| (acc << 1) | u16::from(self.bit(index)))
    }

    /// Store `value` into the flags from `msb` to `lsb` (inclusive). Bits of
    /// `value` that do not fit the field width are ignored; flags outside the
    /// field are left untouched.
    pub fn set_field(&mut self, msb: usize, lsb: usize, value: u16) {
        let indices: Vec<usize> = field_indices(msb, lsb).collect();
        let width = indices.len();
        for (position, index) in indices.into_iter().enumerate() {
            let shift = width - 1 - position;
            self.set_bit(index, (value >> shift) & 1 == 1);
        }
    }
}

fn field_indices(msb: usize, lsb: usize) -> Box<dyn Iterator<Item = usize>> {
    if msb <= lsb {
        Box::new(msb..=lsb)
    } else {
        Box::new((lsb..=msb).rev())
    }
}

impl From<u16> for BitRegister {
    fn from(raw: u16) -> Self {
        Self::decode(raw)
    }
}

impl From<BitRegister> for u16 {
    fn from(register: BitRegister) -> Self {
        register.encode()
    }
}

impl fmt::Display for BitRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016b}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_every_value() {
        for raw in 0..=u16::MAX {
            assert_eq!(BitRegister::decode(raw).encode(), raw);
        }
    }

    #[test]
    fn test_msb_first_numbering() {
        let register = BitRegister::decode(0b1000_0000_0000_0001);
        assert!(register.bit(0));
        assert!(register.bit(15));
        assert!(!register.bit(1));
        assert_eq!(register.to_string(), "1000000000000001");
    }

    #[test]
    fn test_set_bit_leaves_other_bits_alone() {
        // A spread of patterns keeps the run short while still covering
        // sparse, dense and alternating states.
        let seeds = [0x0000u16, 0xFFFF, 0xAAAA, 0x5555, 0x1234, 0x8001, 0x7FFE, 0xF00F];
        for seed in seeds.into_iter().chain((0..=u16::MAX).step_by(257)) {
            for index in 0..REGISTER_WIDTH {
                for value in [false, true] {
                    let before = BitRegister::decode(seed);
                    let mut after = before;
                    after.set_bit(index, value);
                    assert_eq!(after.bit(index), value);
                    for other in (0..REGISTER_WIDTH).filter(|other| *other != index) {
                        assert_eq!(after.bit(other), before.bit(other), "seed {seed:#06x} index {index}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_short_flag_list_is_left_padded() {
        let register = BitRegister::from_flags(&[true, false, true]).unwrap();
        assert_eq!(register.encode(), 0b101);
        assert!(register.bit(13));
        assert!(!register.bit(14));
        assert!(register.bit(15));
        assert!(BitRegister::from_flags(&[false; 17]).is_none());
        assert_eq!(BitRegister::from_flags(&register.flags()), Some(register));
    }

    #[test]
    fn test_field_reads_in_both_directions() {
        let mut register = BitRegister::default();
        register.set_bit(6, true);
        assert_eq!(register.field(6, 7), 2);
        assert_eq!(register.field(7, 6), 1);

        let status = BitRegister::decode(0b1100_1000_0000_1000);
        // battery lives in the upper byte
        assert_eq!(status.field(0, 7), 0b1100_1000);
        // signal: bit 12 is the top bit, bit 10 the bottom one
        assert_eq!(status.field(12, 10), 0b100);
    }

    #[test]
    fn test_set_field_only_touches_the_field() {
        let mut register = BitRegister::decode(0xFFFF);
        register.set_field(12, 13, 0b01);
        assert_eq!(register.field(12, 13), 0b01);
        assert_eq!(register.encode(), 0xFFFF & !BitRegister::mask(12));

        let mut register = BitRegister::default();
        register.set_field(12, 10, 5);
        assert_eq!(register.field(12, 10), 5);
        assert!(register.bit(12));
        assert!(!register.bit(11));
        assert!(register.bit(10));
    }
}
