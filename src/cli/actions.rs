use anyhow::{anyhow, Result};
use clap::ArgMatches;
use std::{sync::Arc, time::Duration};

use super::config::{DeviceConfig, NeptunConfig};
use crate::{
    api::{
        device::{DeviceSnapshot, DeviceState},
        traits::{DiagnosticSink, LoggingSink},
    },
    core::poller::{DeviceHandle, DevicePoller},
    protocol::register::Zone,
};

/// Name used for a single `--host` device without `--name`.
pub const DEFAULT_DEVICE_NAME: &str = "neptun";

/// Valve action requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValveCommand {
    pub zone: Zone,
    pub open: bool,
}

/// Collect the device list from `--config` or from `--host`/`--port`/`--name`.
pub fn load_config(matches: &ArgMatches) -> Result<NeptunConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => NeptunConfig::from_file(path)?,
        None => {
            let host = matches
                .get_one::<String>("host")
                .ok_or_else(|| anyhow!("Either --config or --host is required"))?;
            let name = matches
                .get_one::<String>("name")
                .map(String::as_str)
                .unwrap_or(DEFAULT_DEVICE_NAME);
            let mut device = DeviceConfig::new(name, host);
            if let Some(port) = matches.get_one::<u16>("port") {
                device.port = *port;
            }
            NeptunConfig {
                devices: vec![device],
            }
        }
    };

    if let Some(interval) = matches.get_one::<u64>("interval") {
        for device in config.devices.iter_mut() {
            device.poll_interval_ms = *interval;
        }
    }
    config.validate()?;
    Ok(config)
}

pub fn valve_command(matches: &ArgMatches) -> Result<Option<ValveCommand>> {
    let requested = match (
        matches.get_one::<u8>("open-valve"),
        matches.get_one::<u8>("close-valve"),
    ) {
        (Some(zone), _) => Some((*zone, true)),
        (None, Some(zone)) => Some((*zone, false)),
        (None, None) => None,
    };
    requested
        .map(|(zone, open)| {
            Zone::from_repr(zone)
                .map(|zone| ValveCommand { zone, open })
                .ok_or_else(|| anyhow!("Unknown valve zone {zone}"))
        })
        .transpose()
}

fn print_snapshot(snapshot: &DeviceSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
    } else {
        print!("{snapshot}");
    }
    Ok(())
}

/// Connect, discover children and apply the valve command if any.
async fn prepare(config: &DeviceConfig, valve: Option<ValveCommand>) -> DeviceState {
    let sink: Arc<dyn DiagnosticSink> = Arc::new(LoggingSink);
    let mut device = config.build_device(sink);
    if let Err(err) = device.init_sensors().await {
        log::warn!("{}: discovery failed, continuing offline: {err}", config.name);
    }

    if let Some(ValveCommand { zone, open }) = valve {
        let action = if open { "open" } else { "close" };
        match device.set_valve_open(zone, open).await {
            Ok(()) => log::info!("{}: requested {action} of {zone} valve", config.name),
            Err(err) => log::error!("{}: failed to {action} {zone} valve: {err}", config.name),
        }
    }
    device
}

/// Refresh every configured device once and print its state.
pub async fn run_once(config: &NeptunConfig, valve: Option<ValveCommand>, json: bool) -> Result<()> {
    for device_config in &config.devices {
        let mut device = prepare(device_config, valve).await;
        device.refresh().await;
        print_snapshot(&device.snapshot(), json)?;
        device.disconnect().await;
    }
    Ok(())
}

/// Poll every configured device until Ctrl+C.
pub async fn run_persist(
    config: &NeptunConfig,
    valve: Option<ValveCommand>,
    json: bool,
) -> Result<()> {
    let mut pollers = Vec::new();
    for device_config in &config.devices {
        let device = prepare(device_config, valve).await;
        let handle = DeviceHandle::new(device);
        pollers.push((
            handle.clone(),
            DevicePoller::spawn(handle, device_config.poll_interval()),
        ));
    }

    let (merged_tx, merged_rx) = flume::unbounded::<DeviceSnapshot>();
    for (_, poller) in &pollers {
        let snapshots = poller.snapshots();
        let merged_tx = merged_tx.clone();
        tokio::spawn(async move {
            while let Ok(snapshot) = snapshots.recv_async().await {
                if merged_tx.send(snapshot).is_err() {
                    break;
                }
            }
        });
    }
    drop(merged_tx);

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(|err| anyhow!("Failed to listen for Ctrl+C: {err}"))?;
                log::info!("Received Ctrl+C, stopping");
                break;
            }
            snapshot = merged_rx.recv_async() => match snapshot {
                Ok(snapshot) => print_snapshot(&snapshot, json)?,
                Err(_) => break,
            },
        }
    }

    for (handle, poller) in pollers {
        poller.stop().await?;
        // Bound the goodbye so a dead link cannot block exit.
        let _ = tokio::time::timeout(Duration::from_secs(2), async {
            handle.lock().await.disconnect().await;
        })
        .await;
    }
    Ok(())
}

pub async fn run(matches: &ArgMatches) -> Result<()> {
    let config = load_config(matches)?;
    let valve = valve_command(matches)?;
    let json = matches.get_flag("json");

    if matches.get_flag("once") {
        run_once(&config, valve, json).await
    } else {
        run_persist(&config, valve, json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::build_command;

    #[test]
    fn test_single_host_configuration() {
        let matches = build_command()
            .try_get_matches_from([
                "neptun", "--host", "10.0.0.7", "--name", "cellar", "--port", "5020",
                "--interval", "2000",
            ])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].name, "cellar");
        assert_eq!(config.devices[0].port, 5020);
        assert_eq!(config.devices[0].poll_interval_ms, 2000);
    }

    #[test]
    fn test_single_host_without_name_uses_default() {
        let matches = build_command()
            .try_get_matches_from(["neptun", "--host", "10.0.0.7"])
            .unwrap();
        let config = load_config(&matches).unwrap();
        assert_eq!(config.devices[0].name, DEFAULT_DEVICE_NAME);
        assert_eq!(config.devices[0].port, 503);
    }

    #[test]
    fn test_interval_below_minimum_is_rejected() {
        let matches = build_command()
            .try_get_matches_from(["neptun", "--host", "10.0.0.7", "--interval", "10"])
            .unwrap();
        assert!(load_config(&matches).is_err());
    }

    #[test]
    fn test_valve_command() {
        let matches = build_command()
            .try_get_matches_from(["neptun", "--host", "x", "--open-valve", "2"])
            .unwrap();
        assert_eq!(
            valve_command(&matches).unwrap(),
            Some(ValveCommand {
                zone: Zone::Second,
                open: true
            })
        );
    }
}
