//! The virtual touch-slot engine.
//!
//! [`Engine`] owns every piece of shared state the control paths need: the
//! allocator, the current mapping, held key actions, stick values and the
//! view and wheel fingers. Its behaviour is split by concern across
//! [`crate::actions`], [`crate::stick`] and [`crate::router`].

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use touchslot_types::{CanonicalPoint, PassthroughEvent, PixelPoint, SlotId};
use tracing::{debug, info, warn};

use crate::allocator::Allocator;
use crate::jitter::Jitter;
use crate::mapping::Mapping;
use crate::profile::GamepadProfile;
use crate::state::{ActionStates, ModeFlag, StickValues, WheelKeys};

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub jitter: Jitter,
    /// Log accumulated view motion and accept arrow-key nudges.
    pub measure_mode: bool,
    /// Lift the view finger after this much idle time; zero never lifts.
    pub auto_release: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            jitter: Jitter::default(),
            measure_mode: false,
            auto_release: Duration::from_millis(200),
        }
    }
}

/// The finger that turns the camera.
#[derive(Debug, Default)]
pub(crate) struct ViewState {
    pub slot: Option<SlotId>,
    pub at: CanonicalPoint,
    pub idle_ticks: u64,
    pub total: (i64, i64),
}

/// The finger on the virtual left stick.
#[derive(Debug, Default)]
pub(crate) struct WheelState {
    pub slot: Option<SlotId>,
}

pub struct Engine {
    pub(crate) allocator: Arc<Allocator>,
    mapping: RwLock<Arc<Mapping>>,
    pub(crate) profiles: HashMap<String, GamepadProfile>,
    pub(crate) mode: ModeFlag,
    pub(crate) states: ActionStates,
    pub(crate) sticks: StickValues,
    pub(crate) wheel_keys: WheelKeys,
    pub(crate) view: Mutex<ViewState>,
    pub(crate) wheel: Mutex<WheelState>,
    pub(crate) select_held: AtomicBool,
    passthrough: mpsc::Sender<PassthroughEvent>,
    shutdown: watch::Receiver<bool>,
    pub(crate) options: EngineOptions,
}

impl Engine {
    pub fn new(
        allocator: Arc<Allocator>,
        mapping: Mapping,
        profiles: HashMap<String, GamepadProfile>,
        passthrough: mpsc::Sender<PassthroughEvent>,
        shutdown: watch::Receiver<bool>,
        options: EngineOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            allocator,
            mapping: RwLock::new(Arc::new(mapping)),
            profiles,
            mode: ModeFlag::new(),
            states: ActionStates::default(),
            sticks: StickValues::new(),
            wheel_keys: WheelKeys::default(),
            view: Mutex::new(ViewState::default()),
            wheel: Mutex::new(WheelState::default()),
            select_held: AtomicBool::new(false),
            passthrough,
            shutdown,
            options,
        })
    }

    pub fn mapping(&self) -> Arc<Mapping> {
        Arc::clone(&self.mapping.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn allocator(&self) -> &Arc<Allocator> {
        &self.allocator
    }

    pub fn is_mapping_on(&self) -> bool {
        self.mode.is_on()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<bool> {
        self.mode.subscribe()
    }

    pub fn held_actions(&self) -> usize {
        self.states.len()
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sleep unless shutdown arrives first. Returns `false` on shutdown.
    pub(crate) async fn sleep(&self, duration: Duration) -> bool {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow_and_update() {
            return false;
        }
        tokio::select! {
            () = tokio::time::sleep(duration) => true,
            _ = shutdown.changed() => false,
        }
    }

    pub(crate) fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.clone()
    }

    pub(crate) fn jittered(&self, p: PixelPoint) -> PixelPoint {
        self.options.jitter.apply(p)
    }

    /// Queue an event for the passthrough device without waiting.
    ///
    /// The daemon loop that drains this channel is also the one routing
    /// input into the engine, so a full queue drops the event.
    pub(crate) fn passthrough(&self, event: PassthroughEvent) {
        match self.passthrough.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "passthrough queue full, dropping event");
            }
            Err(TrySendError::Closed(event)) => {
                debug!(?event, "passthrough channel closed, dropping event");
            }
        }
    }

    /// Toggle key mapping.
    ///
    /// Everything the engine is holding is let go first, so no finger is
    /// left on the screen across the switch.
    pub async fn switch_mode(&self) {
        {
            let mut view = self.view.lock().await;
            view.total = (0, 0);
            view.slot = self.allocator.release(view.slot.take()).await;
        }
        for key in self.states.keys() {
            let slot = self.states.key_up(&key);
            self.allocator.release(slot).await;
        }
        self.wheel_keys.clear();
        let on = self.mode.toggle();
        if on {
            info!("mapping on");
        } else {
            info!("mapping off");
        }
    }

    /// Swap in a new mapping. Mapping is forced off and the view and wheel
    /// fingers are lifted before the swap.
    pub async fn replace_mapping(&self, mapping: Mapping) {
        if self.mode.is_on() {
            self.switch_mode().await;
        }
        self.release_wheel().await;
        {
            let mut view = self.view.lock().await;
            view.slot = self.allocator.release(view.slot.take()).await;
            *view = ViewState::default();
        }
        let screen = mapping.screen;
        *self.mapping.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(mapping);
        self.allocator.set_screen(screen).await;
        self.allocator.reset_resolution().await;
        info!(
            width = screen.width,
            height = screen.height,
            "mapping reloaded"
        );
    }

    /// Start the periodic stick loops.
    pub fn spawn_loops(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut tasks = vec![
            tokio::spawn(Arc::clone(self).run_view_loop()),
            tokio::spawn(Arc::clone(self).run_wheel_loop()),
        ];
        if !self.options.auto_release.is_zero() {
            tasks.push(tokio::spawn(Arc::clone(self).run_idle_release_loop()));
        }
        tasks
    }
}
