pub mod device;
pub mod traits;

pub use device::{
    AlarmState, CounterState, DeviceSnapshot, DeviceState, WirelessSensorState,
    DEFAULT_CYCLE_TIMEOUT,
};
pub use traits::{DiagnosticSink, Diagnostics, LoggingSink, MemorySink, NoOpSink};
