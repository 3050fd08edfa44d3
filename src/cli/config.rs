use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc, time::Duration};

use crate::{
    api::{device::DeviceState, traits::DiagnosticSink},
    protocol::{
        channel::ChannelTimeouts,
        register::{DEFAULT_PORT, DEFAULT_UNIT_ID},
        transport::TcpTransportConfig,
    },
};

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_unit_id() -> u8 {
    DEFAULT_UNIT_ID
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_cycle_timeout_ms() -> u64 {
    10000
}

fn default_connect_retries() -> u32 {
    3
}

/// Slack on top of the per-attempt connect budget, so the transport's last
/// attempt reports its own fault instead of racing the channel timeout.
const CONNECT_SLACK: Duration = Duration::from_millis(500);

/// One Neptun module to poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    /// Delay between refresh cycles
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Bound on a single connect attempt
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Bound on a single register read or write
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Bound on the module-level reads of a refresh cycle
    #[serde(default = "default_cycle_timeout_ms")]
    pub cycle_timeout_ms: u64,
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
}

impl DeviceConfig {
    pub fn new(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: host.to_string(),
            port: default_port(),
            unit_id: default_unit_id(),
            poll_interval_ms: default_poll_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            cycle_timeout_ms: default_cycle_timeout_ms(),
            connect_retries: default_connect_retries(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Device name must not be empty");
        }
        if self.host.trim().is_empty() {
            bail!("Device {}: host must not be empty", self.name);
        }
        if self.port == 0 {
            bail!("Device {}: port must not be 0", self.name);
        }
        if self.poll_interval_ms < 1000 {
            bail!(
                "Device {}: poll interval must be at least 1000 ms, got {}",
                self.name,
                self.poll_interval_ms
            );
        }
        for (label, value) in [
            ("connect timeout", self.connect_timeout_ms),
            ("request timeout", self.request_timeout_ms),
            ("cycle timeout", self.cycle_timeout_ms),
        ] {
            if value == 0 {
                bail!("Device {}: {label} must be greater than 0", self.name);
            }
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn transport_config(&self) -> TcpTransportConfig {
        TcpTransportConfig {
            host: self.host.clone(),
            port: self.port,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            connect_retries: self.connect_retries,
        }
    }

    pub fn channel_timeouts(&self) -> ChannelTimeouts {
        ChannelTimeouts {
            // Every retry gets its own attempt timeout.
            connect: Duration::from_millis(
                self.connect_timeout_ms
                    .saturating_mul(u64::from(self.connect_retries.max(1))),
            ) + CONNECT_SLACK,
            request: Duration::from_millis(self.request_timeout_ms),
        }
    }

    /// Build the Modbus TCP device described by this entry.
    pub fn build_device(&self, sink: Arc<dyn DiagnosticSink>) -> DeviceState {
        DeviceState::over_tcp(&self.name, self.transport_config(), sink)
            .with_unit_id(self.unit_id)
            .with_timeouts(self.channel_timeouts())
            .with_cycle_timeout(Duration::from_millis(self.cycle_timeout_ms))
    }
}

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeptunConfig {
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl NeptunConfig {
    pub fn from_json(json_str: &str) -> Result<Self> {
        Ok(serde_json::from_str(json_str)?)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Read a configuration file, picking the format from its extension
    /// (`.toml` or `.json`).
    pub fn from_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let path = file_path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|err| anyhow!("Failed to read {}: {err}", path.display()))?;
        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content)?,
            Some("json") => Self::from_json(&content)?,
            other => bail!(
                "Unsupported configuration format {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            bail!("No device configured");
        }
        for device in &self.devices {
            device.validate()?;
        }
        for (index, device) in self.devices.iter().enumerate() {
            if self.devices[..index]
                .iter()
                .any(|other| other.name == device.name)
            {
                bail!("Device name {} is used more than once", device.name);
            }
        }
        Ok(())
    }
}
