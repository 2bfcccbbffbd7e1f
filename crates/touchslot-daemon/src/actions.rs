//! The key-action state machine.
//!
//! Every logical key transition lands in [`Engine::handle_key`]. Depending
//! on the mapping mode it toggles modes, steers the wheel, runs a mapped
//! touch action or passes the key through to the virtual keyboard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use touchslot_types::keys::{key_code, BTN_RS, BTN_SELECT, KEY_LEFTSHIFT};
use touchslot_types::{KeyState, PassthroughEvent, PixelPoint, SlotId};
use tracing::debug;

use crate::engine::Engine;
use crate::mapping::{ActionKind, Mapping};
use crate::state::ActionState;

/// How long CLICK holds its finger, and the stagger between MULT_PRESS
/// fingers.
pub const TAP: Duration = Duration::from_millis(8);

/// How long a wheel tick holds its synthetic key in mapping mode.
pub const WHEEL_CLICK: Duration = Duration::from_millis(50);

/// Device name used for synthetic wheel keys.
pub const WHEEL_DEVICE: &str = "MOUSE_WHEEL";

const MEASURE_NUDGES: [(&str, i32, i32); 4] = [
    ("KEY_LEFT", -1, 0),
    ("KEY_RIGHT", 1, 0),
    ("KEY_UP", 0, -1),
    ("KEY_DOWN", 0, 1),
];

impl Engine {
    /// Handle one logical key transition from `device`.
    pub async fn handle_key(self: &Arc<Self>, key: &str, state: KeyState, device: &str) {
        let mut key = key.to_string();
        let mut device = device.to_string();
        loop {
            if key.is_empty() {
                return;
            }
            if key == BTN_SELECT && state != KeyState::Repeat {
                self.select_held
                    .store(state == KeyState::Down, Ordering::SeqCst);
            }
            if key == BTN_RS && state == KeyState::Up && self.select_held.load(Ordering::SeqCst) {
                self.switch_mode().await;
                return;
            }

            let mapping = self.mapping();
            if mapping.switch_keys.iter().any(|k| *k == key) {
                if state == KeyState::Up {
                    self.switch_mode().await;
                }
                return;
            }

            if self.mode.is_on() {
                self.handle_mapped_key(&mapping, &key, state).await;
                return;
            }

            if let Some(profile) = self.profiles.get(&device) {
                let Some(mapped) = profile.map_keyboard.get(&key) else {
                    debug!(%device, %key, "gamepad key has no keyboard mapping");
                    return;
                };
                key = mapped.clone();
                device = format!("{device}_joystick_mapped");
                continue;
            }

            match key_code(&key) {
                Some(code) => self.passthrough(PassthroughEvent::Key { code, state }),
                None => debug!(%device, %key, "no key code, not passing through"),
            }
            return;
        }
    }

    async fn handle_mapped_key(self: &Arc<Self>, mapping: &Mapping, key: &str, state: KeyState) {
        if let Some(direction) = mapping.wheel.keys.iter().position(|k| k == key) {
            match state {
                KeyState::Down => self.wheel_keys.set_held(direction, true),
                KeyState::Up => self.wheel_keys.set_held(direction, false),
                KeyState::Repeat => {}
            }
            return;
        }

        if mapping.wheel.shift_enabled && key == KEY_LEFTSHIFT {
            match (mapping.wheel.shift_toggle, state) {
                (true, KeyState::Down) => self.wheel_keys.toggle_shift(),
                (false, KeyState::Down) => self.wheel_keys.set_shift(true),
                (false, KeyState::Up) => self.wheel_keys.set_shift(false),
                _ => {}
            }
            return;
        }

        if self.options.measure_mode && state == KeyState::Up {
            if let Some((_, dx, dy)) = MEASURE_NUDGES.iter().find(|(k, _, _)| *k == key) {
                self.view_move(*dx, *dy).await;
                return;
            }
        }

        let Some(action) = mapping.actions.get(key) else {
            debug!(%key, "no touch mapping for key");
            return;
        };
        let held = self.states.contains(key);
        match state {
            KeyState::Down if !held => self.action_down(key, action).await,
            KeyState::Up if held => {
                let slot = self.states.key_up(key);
                self.allocator.release(slot).await;
            }
            _ => {}
        }
    }

    async fn action_down(self: &Arc<Self>, key: &str, action: &ActionKind) {
        debug!(%key, action = action.name(), "action down");
        match action {
            ActionKind::Press { at } => {
                let slot = self.allocator.require_px(self.jittered(*at)).await;
                self.states.insert(key, ActionState::Press(slot));
            }
            ActionKind::Click { at } => {
                tokio::spawn(Arc::clone(self).click(*at));
            }
            ActionKind::AutoFire { at, down, interval } => {
                let running = Arc::new(AtomicBool::new(true));
                self.states
                    .insert(key, ActionState::AutoFire(Arc::clone(&running)));
                tokio::spawn(Arc::clone(self).auto_fire(
                    key.to_string(),
                    *at,
                    *down,
                    *interval,
                    running,
                ));
            }
            ActionKind::MultPress { points } => {
                let (tx, rx) = oneshot::channel();
                self.states.insert(key, ActionState::MultPress(Some(tx)));
                tokio::spawn(Arc::clone(self).mult_press(key.to_string(), points.clone(), rx));
            }
            ActionKind::Drag { points, interval } => {
                tokio::spawn(Arc::clone(self).drag(points.clone(), *interval));
            }
        }
    }

    async fn click(self: Arc<Self>, at: PixelPoint) {
        let slot = self.allocator.require_px(self.jittered(at)).await;
        if self.sleep(TAP).await {
            self.allocator.release(slot).await;
        }
    }

    async fn auto_fire(
        self: Arc<Self>,
        key: String,
        at: PixelPoint,
        down: Duration,
        interval: Duration,
        running: Arc<AtomicBool>,
    ) {
        loop {
            let slot = self.allocator.require_px(self.jittered(at)).await;
            if !self.sleep(down).await {
                return;
            }
            self.allocator.release(slot).await;
            if !self.sleep(interval).await {
                return;
            }
            if !running.load(Ordering::SeqCst) {
                break;
            }
        }
        self.states.remove_auto_fire(&key, &running);
        debug!(%key, "auto fire stopped");
    }

    async fn mult_press(
        self: Arc<Self>,
        key: String,
        points: Vec<PixelPoint>,
        released: oneshot::Receiver<()>,
    ) {
        let mut held: Vec<Option<SlotId>> = Vec::with_capacity(points.len());
        for point in points {
            held.push(self.allocator.require_px(self.jittered(point)).await);
            if !self.sleep(TAP).await {
                return;
            }
        }

        let mut shutdown = self.shutdown_signal();
        tokio::select! {
            _ = released => {}
            _ = shutdown.changed() => return,
        }

        self.states.remove(&key);
        for slot in held.into_iter().rev() {
            self.allocator.release(slot).await;
            if !self.sleep(TAP).await {
                return;
            }
        }
    }

    async fn drag(self: Arc<Self>, points: Vec<PixelPoint>, interval: Duration) {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return;
        };
        let slot = self.allocator.require_px(*first).await;
        if !self.sleep(interval).await {
            return;
        }
        for point in points.iter().skip(1).take(points.len().saturating_sub(2)) {
            self.allocator.move_px(slot, self.jittered(*point)).await;
            if !self.sleep(interval).await {
                return;
            }
        }
        self.allocator.move_px(slot, *last).await;
        self.allocator.release(slot).await;
    }

    /// A wheel tick in mapping mode: the synthetic key goes down, then up
    /// after [`WHEEL_CLICK`].
    pub(crate) fn quick_click(self: &Arc<Self>, key: &'static str) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.handle_key(key, KeyState::Down, WHEEL_DEVICE).await;
            if engine.sleep(WHEEL_CLICK).await {
                engine.handle_key(key, KeyState::Up, WHEEL_DEVICE).await;
            }
        });
    }
}
