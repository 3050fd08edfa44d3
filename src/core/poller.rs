/// Per-device serialization point and background polling.
///
/// All access to a [`DeviceState`] goes through one [`DeviceHandle`], whose
/// async mutex makes refresh cycles and user writes take turns on the single
/// Modbus session. [`DevicePoller`] refreshes on an interval and publishes a
/// [`DeviceSnapshot`] after each cycle.
use anyhow::{anyhow, Result};
use std::{sync::Arc, time::Duration};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::api::device::{DeviceSnapshot, DeviceState};

#[derive(Clone)]
pub struct DeviceHandle {
    inner: Arc<Mutex<DeviceState>>,
}

impl DeviceHandle {
    pub fn new(device: DeviceState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(device)),
        }
    }

    /// Run `f` with exclusive access to the device.
    ///
    /// ```rust,ignore
    /// handle.with(|device| Box::pin(device.set_valve_open(Zone::First, false))).await?;
    /// ```
    pub async fn with<F, T>(&self, f: F) -> T
    where
        F: for<'a> FnOnce(
            &'a mut DeviceState,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>,
    {
        let mut device = self.inner.lock().await;
        f(&mut device).await
    }

    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, DeviceState> {
        self.inner.lock().await
    }

    pub async fn refresh(&self) -> DeviceSnapshot {
        let mut device = self.inner.lock().await;
        device.refresh().await;
        device.snapshot()
    }

    pub async fn snapshot(&self) -> DeviceSnapshot {
        self.inner.lock().await.snapshot()
    }
}

/// Control messages understood by the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerCommand {
    /// Refresh immediately instead of waiting for the next tick.
    RefreshNow,
    Stop,
}

pub struct DevicePoller {
    control_tx: flume::Sender<PollerCommand>,
    snapshot_rx: flume::Receiver<DeviceSnapshot>,
    handle: JoinHandle<()>,
}

impl DevicePoller {
    /// Spawn the poll loop on the current tokio runtime.
    pub fn spawn(device: DeviceHandle, interval: Duration) -> Self {
        let (control_tx, control_rx) = flume::unbounded();
        let (snapshot_tx, snapshot_rx) = flume::bounded(1);
        let handle = tokio::spawn(poll_loop(
            device,
            interval,
            control_rx,
            (snapshot_tx, snapshot_rx.clone()),
        ));
        Self {
            control_tx,
            snapshot_rx,
            handle,
        }
    }

    /// Latest snapshot only: one nobody received is replaced by the next.
    pub fn snapshots(&self) -> flume::Receiver<DeviceSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn refresh_now(&self) -> Result<()> {
        self.control_tx
            .send(PollerCommand::RefreshNow)
            .map_err(|_| anyhow!("Poller has already stopped"))
    }

    /// Ask the loop to exit and wait for it. A cycle in progress completes
    /// first.
    pub async fn stop(self) -> Result<()> {
        // The loop may already be gone, which is what we want anyway.
        let _ = self.control_tx.send(PollerCommand::Stop);
        self.handle
            .await
            .map_err(|err| anyhow!("Poller task failed: {err}"))
    }
}

async fn poll_loop(
    device: DeviceHandle,
    interval: Duration,
    control_rx: flume::Receiver<PollerCommand>,
    (snapshot_tx, snapshot_rx): (flume::Sender<DeviceSnapshot>, flume::Receiver<DeviceSnapshot>),
) {
    let name = device.lock().await.name().to_string();
    log::info!("Starting poller for {name}, interval {interval:?}");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            command = control_rx.recv_async() => match command {
                Ok(PollerCommand::RefreshNow) => ticker.reset(),
                Ok(PollerCommand::Stop) | Err(_) => break,
            },
        }

        let snapshot = device.refresh().await;
        if let Err(flume::TrySendError::Full(snapshot)) = snapshot_tx.try_send(snapshot) {
            let _ = snapshot_rx.try_recv();
            if snapshot_tx.try_send(snapshot).is_err() {
                log::debug!("Dropped a snapshot of {name}, a newer one is queued");
            }
        }
    }

    log::info!("Poller for {name} exited cleanly");
}
