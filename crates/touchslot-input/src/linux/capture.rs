//! Hot-plug evdev capture.
//!
//! A scanner re-enumerates `/dev/input` every 400 ms. Each newly seen
//! device whose name matches the pattern and whose kind is wanted gets its
//! own reader task. The reader grabs the device exclusively and forwards
//! its events batched up to each `SYN_REPORT`. When a reader ends the
//! device is forgotten so that a replug is picked up by the next scan.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use evdev::Device;
use regex::Regex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use touchslot_types::{codes, DeviceKind, EventBatch, RawEvent};
use tracing::{debug, info, warn};

use super::probe::device_caps;
use crate::error::InputError;
use crate::probe::is_own_device;
use crate::InputCapture;

const RESCAN_INTERVAL: Duration = Duration::from_millis(400);

type Tracked = Arc<Mutex<HashSet<PathBuf>>>;

pub struct HotplugCapture {
    pattern: Regex,
    kinds: Vec<DeviceKind>,
    task: Option<JoinHandle<()>>,
    shutdown_tx: Option<watch::Sender<bool>>,
}

impl HotplugCapture {
    /// Capture devices whose name matches `pattern` and whose kind is in
    /// `kinds`.
    pub fn new(pattern: &str, kinds: &[DeviceKind]) -> Result<Self, InputError> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            kinds: kinds.to_vec(),
            task: None,
            shutdown_tx: None,
        })
    }
}

#[async_trait]
impl InputCapture for HotplugCapture {
    async fn start(&mut self, tx: mpsc::Sender<EventBatch>) -> Result<(), InputError> {
        if self.task.is_some() {
            return Err(InputError::Other(anyhow::anyhow!("capture already started")));
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        let pattern = self.pattern.clone();
        let kinds = self.kinds.clone();
        self.task = Some(tokio::spawn(scan_loop(pattern, kinds, tx, shutdown_rx)));
        info!(pattern = %self.pattern, "input capture started");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), InputError> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("input capture shut down");
        Ok(())
    }
}

async fn scan_loop(
    pattern: Regex,
    kinds: Vec<DeviceKind>,
    tx: mpsc::Sender<EventBatch>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let tracked: Tracked = Arc::new(Mutex::new(HashSet::new()));
    let mut readers: Vec<JoinHandle<()>> = Vec::new();
    let mut ticker = tokio::time::interval(RESCAN_INTERVAL);

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break,
            _ = ticker.tick() => {}
        }
        readers.retain(|h| !h.is_finished());

        for (path, device) in evdev::enumerate() {
            let seen = tracked.lock().map(|t| t.contains(&path)).unwrap_or(true);
            if seen {
                continue;
            }
            let name = device.name().unwrap_or_default().to_string();
            if is_own_device(&name) || !pattern.is_match(&name) {
                continue;
            }
            let kind = device_caps(&device).classify();
            if !kinds.contains(&kind) {
                continue;
            }
            if let Ok(mut t) = tracked.lock() {
                t.insert(path.clone());
            }
            info!(device = %name, path = %path.display(), %kind, "tracking device");
            readers.push(tokio::spawn(read_device(
                path,
                device,
                name,
                kind,
                tx.clone(),
                shutdown_rx.clone(),
                Arc::clone(&tracked),
            )));
        }
    }

    for h in readers {
        let _ = h.await;
    }
}

async fn read_device(
    path: PathBuf,
    mut device: Device,
    name: String,
    kind: DeviceKind,
    tx: mpsc::Sender<EventBatch>,
    mut shutdown_rx: watch::Receiver<bool>,
    tracked: Tracked,
) {
    if let Err(e) = device.grab() {
        warn!(device = %name, error = %e, "failed to grab device");
    }
    match device.into_event_stream() {
        Ok(mut stream) => {
            let mut pending = Vec::new();
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    result = stream.next_event() => {
                        let ev = match result {
                            Ok(ev) => ev,
                            Err(e) => {
                                info!(device = %name, error = %e, "device removed");
                                break;
                            }
                        };
                        let raw = RawEvent::new(ev.event_type().0, ev.code(), ev.value());
                        if raw.is_syn_report() {
                            if pending.is_empty() {
                                continue;
                            }
                            let batch = EventBatch::new(name.clone(), kind, std::mem::take(&mut pending));
                            if tx.send(batch).await.is_err() {
                                break;
                            }
                        } else if raw.kind != codes::EV_SYN {
                            pending.push(raw);
                        }
                    }
                }
            }
        }
        Err(e) => warn!(path = %path.display(), error = %e, "failed to create event stream"),
    }
    forget(&tracked, &path);
}

fn forget(tracked: &Tracked, path: &Path) {
    if let Ok(mut t) = tracked.lock() {
        t.remove(path);
    }
    debug!(path = %path.display(), "forgot device");
}
