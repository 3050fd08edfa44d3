mod bits;
mod codes;
pub mod map;

pub use bits::{BitRegister, REGISTER_WIDTH};
pub use codes::{Line, LineKind, RelayKind, RelayPolicy, Zone, ZoneGroup};
pub use map::{RegisterMap, RegisterSpec, DEFAULT_PORT, DEFAULT_UNIT_ID};
