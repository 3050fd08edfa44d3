/// Device polling demo
///
/// Without arguments the demo runs against a simulated module held in memory,
/// so it works without hardware. Pass `HOST [PORT]` to poll a real module.
use anyhow::Result;
use std::{sync::Arc, time::Duration};

use _main::{
    api::{DeviceState, LoggingSink},
    protocol::{
        register::{Line, RelayKind, RelayPolicy, Zone, ZoneGroup},
        transport::{MemoryTransport, TcpTransportConfig},
    },
    DeviceHandle, DevicePoller,
};

fn simulated_module() -> MemoryTransport {
    let transport = MemoryTransport::with_registers(&[
        // Both valves open, dual group mode
        (0, 0b0000_0111_0000_0000),
        // Line 1 sensor in group 1, line 2 button in group 2
        (1, 0b0000_0001_0000_0110),
        // Wired line 3 reports a leak
        (3, 0b0000_0000_0000_0100),
        (6, 2),
        (7, 1),
        (8, 3),
        (57, 0b1100_1000_0001_0000),
        (58, 0b0101_0000_0000_1000),
        (123, 0b0000_0000_0000_0001),
    ]);
    transport.set_register_u32(107, 123_456);
    transport
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut device = match args.get(1) {
        Some(host) => {
            let port = match args.get(2) {
                Some(port) => port.parse()?,
                None => 503,
            };
            log::info!("Polling module at {host}:{port}");
            DeviceState::over_tcp("demo", TcpTransportConfig::new(host, port), Arc::new(LoggingSink))
        }
        None => {
            log::info!("No host given, using a simulated module");
            DeviceState::new(
                "simulated",
                "memory",
                0,
                Box::new(simulated_module()),
                Arc::new(LoggingSink),
            )
        }
    };

    if let Err(err) = device.init_sensors().await {
        log::warn!("Discovery failed: {err}");
    }
    device.refresh().await;
    print!("{}", device.snapshot());

    for line in [Line::One, Line::Two, Line::Three, Line::Four] {
        log::info!(
            "{line}: kind={:?} group={:?} leak={:?}",
            device.line_kind(line),
            device.line_group(line),
            device.line_status(line)
        );
    }
    for counter in device.counters() {
        log::info!(
            "Counter {} reads {:?} m3",
            counter.slot() + 1,
            counter.cubic_meters()
        );
    }

    if args.len() == 1 {
        device.set_line_group(Line::Two, ZoneGroup::Both).await?;
        device
            .set_relay_policy(RelayKind::Alert, RelayPolicy::Both)
            .await?;
        device.set_valve_open(Zone::Second, false).await?;
    }

    let handle = DeviceHandle::new(device);
    let poller = DevicePoller::spawn(handle.clone(), Duration::from_secs(1));
    let snapshots = poller.snapshots();
    for _ in 0..3 {
        if let Ok(snapshot) = snapshots.recv_async().await {
            log::info!(
                "{} connected={} alarms={:?}",
                snapshot.name,
                snapshot.connected,
                snapshot
                    .module
                    .map(|module| (module.first_group_alarm, module.second_group_alarm))
            );
        }
    }
    poller.stop().await?;
    handle.lock().await.disconnect().await;
    Ok(())
}
