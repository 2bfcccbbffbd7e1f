//! Core daemon orchestration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use touchslot_input::{InputCapture, InputEmulation};
use touchslot_types::{DeviceKind, EventBatch, OrientationCell, PassthroughEvent, PointerFrame};
use tracing::{debug, info, warn};

use crate::allocator::Allocator;
use crate::engine::{Engine, EngineOptions};
use crate::error::DaemonError;
use crate::mapping::Mapping;
use crate::mixer::Mixer;
use crate::pointer::{Pointer, PointerBounds};
use crate::profile::GamepadProfile;
use crate::setup;

/// Events processed by the daemon's main loop.
#[derive(Debug)]
pub enum DaemonEvent {
    /// A batch from a captured device.
    Input(EventBatch),
    /// Re-read the mapping file.
    Reload,
    /// Shutdown signal.
    Shutdown,
}

/// The touchslot daemon: capture in, touch frames and passthrough out.
pub struct Daemon {
    engine: Arc<Engine>,
    capture: Box<dyn InputCapture>,
    emulation: Box<dyn InputEmulation>,
    mixer: Option<Mixer>,
    pointer: Option<Pointer>,
    orientation: OrientationCell,
    mapping_path: Option<PathBuf>,
    event_tx: mpsc::Sender<DaemonEvent>,
    event_rx: mpsc::Receiver<DaemonEvent>,
    passthrough_rx: mpsc::Receiver<PassthroughEvent>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Daemon {
    /// Create a new daemon instance.
    pub fn new(
        allocator: Arc<Allocator>,
        mapping: Mapping,
        profiles: HashMap<String, GamepadProfile>,
        capture: Box<dyn InputCapture>,
        emulation: Box<dyn InputEmulation>,
        options: EngineOptions,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let (passthrough_tx, passthrough_rx) = mpsc::channel(1024);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = Engine::new(
            allocator,
            mapping,
            profiles,
            passthrough_tx,
            shutdown_rx,
            options,
        );

        Self {
            engine,
            capture,
            emulation,
            mixer: None,
            pointer: None,
            orientation: OrientationCell::default(),
            mapping_path: None,
            event_tx,
            event_rx,
            passthrough_rx,
            shutdown_tx,
            tasks: Vec::new(),
        }
    }

    /// Re-inject the physical touchscreen through `mixer`.
    #[must_use]
    pub fn with_mixer(mut self, mixer: Mixer) -> Self {
        self.mixer = Some(mixer);
        self
    }

    /// The orientation cell shared with the backend and the mixer.
    #[must_use]
    pub fn with_orientation(mut self, orientation: OrientationCell) -> Self {
        self.orientation = orientation;
        self
    }

    /// File re-read on [`DaemonEvent::Reload`].
    #[must_use]
    pub fn with_mapping_path(mut self, path: PathBuf) -> Self {
        self.mapping_path = Some(path);
        self
    }

    /// Route mouse passthrough through an on-screen pointer.
    #[must_use]
    pub fn with_pointer(mut self, bounds: PointerBounds, frames: mpsc::Sender<PointerFrame>) -> Self {
        let (pointer, task) = Pointer::spawn(
            Arc::clone(self.engine.allocator()),
            bounds,
            self.orientation.clone(),
            frames,
            self.shutdown_signal(),
        );
        self.pointer = Some(pointer);
        self.tasks.push(task);
        self
    }

    /// Get a clone of the event sender for feeding events into the daemon.
    pub fn event_sender(&self) -> mpsc::Sender<DaemonEvent> {
        self.event_tx.clone()
    }

    /// A receiver that flips to `true` once the daemon shuts down.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Run the daemon event loop.
    pub async fn run(&mut self) -> Result<(), DaemonError> {
        let (input_tx, mut input_rx) = mpsc::channel::<EventBatch>(1024);
        self.capture.start(input_tx).await?;

        // Forward captured input to daemon events
        let capture_event_tx = self.event_tx.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(batch) = input_rx.recv().await {
                if capture_event_tx
                    .send(DaemonEvent::Input(batch))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }));

        self.tasks.extend(self.engine.spawn_loops());
        self.engine.allocator().reset_resolution().await;
        let mut mode_rx = self.engine.subscribe_mode();

        info!("daemon running");

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(DaemonEvent::Input(batch)) => self.handle_input(&batch).await,
                        Some(DaemonEvent::Reload) => self.reload().await,
                        Some(DaemonEvent::Shutdown) | None => {
                            info!("shutting down");
                            break;
                        }
                    }
                }
                Some(event) = self.passthrough_rx.recv() => {
                    self.handle_passthrough(event).await;
                }
                Ok(()) = mode_rx.changed() => {
                    let on = *mode_rx.borrow_and_update();
                    if let Some(pointer) = self.pointer.as_mut() {
                        pointer.set_mapping(on).await;
                    }
                }
            }
        }

        self.shutdown().await
    }

    async fn handle_input(&mut self, batch: &EventBatch) {
        if batch.kind != DeviceKind::Touch {
            self.engine.handle_batch(batch).await;
            return;
        }
        match self.mixer.as_mut() {
            Some(mixer) => {
                mixer
                    .apply(&batch.events, self.orientation.get(), self.engine.allocator())
                    .await;
            }
            None => debug!(device = %batch.device, "touch input without mixer, ignoring"),
        }
    }

    async fn handle_passthrough(&mut self, event: PassthroughEvent) {
        let event = match self.pointer.as_mut() {
            Some(pointer) => match pointer.handle(event).await {
                Some(event) => event,
                None => return,
            },
            None => event,
        };
        if let Err(e) = self.emulation.emit(event).await {
            warn!(?event, error = %e, "passthrough write failed");
        }
    }

    async fn reload(&mut self) {
        let Some(path) = self.mapping_path.clone() else {
            warn!("reload requested but no mapping file is set");
            return;
        };
        match setup::load_mapping(&path) {
            Ok(mapping) => self.engine.replace_mapping(mapping).await,
            Err(e) => warn!(path = %path.display(), error = %e, "reload failed, keeping current mapping"),
        }
    }

    async fn shutdown(&mut self) -> Result<(), DaemonError> {
        info!("daemon shutting down");
        self.shutdown_tx.send_replace(true);

        // Shut down capture and emulation
        self.capture.shutdown().await?;
        self.emulation.shutdown().await?;
        self.engine.allocator().shutdown().await;

        for task in self.tasks.drain(..) {
            task.abort();
        }

        info!("daemon shut down complete");
        Ok(())
    }
}
