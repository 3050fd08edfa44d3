/// Runtime pieces shared by the CLI and library users:
/// - Diagnostic records emitted by devices
/// - Per-device locking and background polling
pub mod logs;
pub mod poller;

pub use logs::{DiagnosticEntry, DiagnosticEvent, DiagnosticLevel};
pub use poller::{DeviceHandle, DevicePoller, PollerCommand};
