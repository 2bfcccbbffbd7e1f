//! Shared engine state.
//!
//! Everything here is touched from several tasks. The maps sit behind
//! `std::sync::Mutex` and are only locked for a load or a store, never
//! across an `.await`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{oneshot, watch};
use touchslot_types::SlotId;

use crate::profile::StickAxis;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Whether key mapping is on, with a watch channel for observers.
pub struct ModeFlag {
    on: AtomicBool,
    tx: watch::Sender<bool>,
}

impl Default for ModeFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeFlag {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            on: AtomicBool::new(false),
            tx,
        }
    }

    pub fn is_on(&self) -> bool {
        self.on.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Flip the flag and notify watchers. Returns the new value.
    pub fn toggle(&self) -> bool {
        let on = !self.on.fetch_xor(true, Ordering::SeqCst);
        self.tx.send_replace(on);
        on
    }
}

/// Per-key state of a held action.
#[derive(Debug)]
pub enum ActionState {
    /// The finger a PRESS put down.
    Press(Option<SlotId>),
    /// Cleared to stop an AUTO_FIRE loop after its current cycle.
    AutoFire(Arc<AtomicBool>),
    /// Fired to release a MULT_PRESS. Taken out by the first UP.
    MultPress(Option<oneshot::Sender<()>>),
}

/// At most one [`ActionState`] per key name.
#[derive(Debug, Default)]
pub struct ActionStates {
    map: Mutex<HashMap<String, ActionState>>,
}

impl ActionStates {
    pub fn contains(&self, key: &str) -> bool {
        lock(&self.map).contains_key(key)
    }

    pub fn insert(&self, key: &str, state: ActionState) {
        lock(&self.map).insert(key.to_string(), state);
    }

    pub fn remove(&self, key: &str) -> Option<ActionState> {
        lock(&self.map).remove(key)
    }

    /// Remove `key` only if it still holds this AUTO_FIRE flag.
    pub fn remove_auto_fire(&self, key: &str, flag: &Arc<AtomicBool>) -> bool {
        let mut map = lock(&self.map);
        match map.get(key) {
            Some(ActionState::AutoFire(current)) if Arc::ptr_eq(current, flag) => {
                map.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.map).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.map).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.map).is_empty()
    }

    /// Apply a key-up to whatever state `key` holds.
    ///
    /// PRESS entries are removed and their slot returned for release.
    /// AUTO_FIRE loops are told to stop and remove themselves. MULT_PRESS
    /// signals are taken and fired; the task removes the entry.
    pub fn key_up(&self, key: &str) -> Option<SlotId> {
        let mut map = lock(&self.map);
        if matches!(map.get(key)?, ActionState::Press(_)) {
            return match map.remove(key) {
                Some(ActionState::Press(slot)) => slot,
                _ => None,
            };
        }
        match map.get_mut(key)? {
            ActionState::Press(_) => None,
            ActionState::AutoFire(running) => {
                running.store(false, Ordering::SeqCst);
                None
            }
            ActionState::MultPress(signal) => {
                if let Some(tx) = signal.take() {
                    let _ = tx.send(());
                }
                None
            }
        }
    }
}

/// Latest normalized value of every logical stick axis, plus which gamepad
/// moved last (its profile supplies the deadzones).
#[derive(Debug)]
pub struct StickValues {
    values: Mutex<HashMap<StickAxis, f64>>,
    active_gamepad: Mutex<Option<String>>,
}

impl Default for StickValues {
    fn default() -> Self {
        Self::new()
    }
}

impl StickValues {
    pub fn new() -> Self {
        let values = StickAxis::ALL.iter().map(|a| (*a, a.rest())).collect();
        Self {
            values: Mutex::new(values),
            active_gamepad: Mutex::new(None),
        }
    }

    pub fn get(&self, axis: StickAxis) -> f64 {
        lock(&self.values)
            .get(&axis)
            .copied()
            .unwrap_or_else(|| axis.rest())
    }

    /// Store a value, returning the previous one.
    pub fn set(&self, axis: StickAxis, value: f64) -> f64 {
        lock(&self.values)
            .insert(axis, value)
            .unwrap_or_else(|| axis.rest())
    }

    pub fn active_gamepad(&self) -> Option<String> {
        lock(&self.active_gamepad).clone()
    }

    pub fn set_active_gamepad(&self, name: &str) {
        let mut active = lock(&self.active_gamepad);
        if active.as_deref() != Some(name) {
            *active = Some(name.to_string());
        }
    }
}

/// Keyboard inputs of the virtual left stick.
#[derive(Debug)]
pub struct WheelKeys {
    /// Up, left, down, right.
    held: Mutex<[bool; 4]>,
    shift: AtomicBool,
    pub wasd_released: AtomicBool,
    pub analog_released: AtomicBool,
}

impl Default for WheelKeys {
    fn default() -> Self {
        Self {
            held: Mutex::new([false; 4]),
            shift: AtomicBool::new(false),
            wasd_released: AtomicBool::new(true),
            analog_released: AtomicBool::new(true),
        }
    }
}

impl WheelKeys {
    pub fn held(&self) -> [bool; 4] {
        *lock(&self.held)
    }

    pub fn set_held(&self, direction: usize, down: bool) {
        if let Some(flag) = lock(&self.held).get_mut(direction) {
            *flag = down;
        }
    }

    pub fn shift(&self) -> bool {
        self.shift.load(Ordering::SeqCst)
    }

    pub fn set_shift(&self, on: bool) {
        self.shift.store(on, Ordering::SeqCst);
    }

    pub fn toggle_shift(&self) {
        self.shift.fetch_xor(true, Ordering::SeqCst);
    }

    /// Forget every held direction and the shift state.
    pub fn clear(&self) {
        *lock(&self.held) = [false; 4];
        self.shift.store(false, Ordering::SeqCst);
        self.analog_released.store(true, Ordering::SeqCst);
    }

    pub fn both_released(&self) -> bool {
        self.wasd_released.load(Ordering::SeqCst) && self.analog_released.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_toggle_notifies() {
        let mode = ModeFlag::new();
        let rx = mode.subscribe();
        assert!(!mode.is_on());
        assert!(mode.toggle());
        assert!(mode.is_on());
        assert!(*rx.borrow());
        assert!(!mode.toggle());
        assert!(!*rx.borrow());
    }

    #[test]
    fn press_key_up_removes_and_returns_slot() {
        let states = ActionStates::default();
        states.insert("KEY_F", ActionState::Press(Some(SlotId(3))));
        assert_eq!(states.key_up("KEY_F"), Some(SlotId(3)));
        assert!(!states.contains("KEY_F"));
        assert_eq!(states.key_up("KEY_F"), None);
    }

    #[test]
    fn auto_fire_key_up_clears_flag_but_keeps_entry() {
        let states = ActionStates::default();
        let flag = Arc::new(AtomicBool::new(true));
        states.insert("KEY_R", ActionState::AutoFire(Arc::clone(&flag)));
        states.key_up("KEY_R");
        assert!(!flag.load(Ordering::SeqCst));
        assert!(states.contains("KEY_R"));

        let other = Arc::new(AtomicBool::new(true));
        assert!(!states.remove_auto_fire("KEY_R", &other));
        assert!(states.remove_auto_fire("KEY_R", &flag));
        assert!(states.is_empty());
    }

    #[test]
    fn mult_press_signal_fires_once() {
        let states = ActionStates::default();
        let (tx, mut rx) = oneshot::channel();
        states.insert("KEY_Q", ActionState::MultPress(Some(tx)));
        states.key_up("KEY_Q");
        assert!(rx.try_recv().is_ok());
        // A second UP has nothing left to fire.
        states.key_up("KEY_Q");
        assert!(states.contains("KEY_Q"));
    }

    #[test]
    fn sticks_start_at_rest() {
        let sticks = StickValues::new();
        assert!((sticks.get(StickAxis::LsX) - 0.5).abs() < f64::EPSILON);
        assert!((sticks.get(StickAxis::Rt) - 0.0).abs() < f64::EPSILON);
        let previous = sticks.set(StickAxis::Rt, 0.7);
        assert!((previous - 0.0).abs() < f64::EPSILON);
        assert!(sticks.active_gamepad().is_none());
        sticks.set_active_gamepad("rjs");
        assert_eq!(sticks.active_gamepad().as_deref(), Some("rjs"));
    }

    #[test]
    fn wheel_keys_clear() {
        let keys = WheelKeys::default();
        keys.set_held(0, true);
        keys.set_held(3, true);
        keys.toggle_shift();
        assert_eq!(keys.held(), [true, false, false, true]);
        assert!(keys.shift());
        keys.clear();
        assert_eq!(keys.held(), [false; 4]);
        assert!(!keys.shift());
    }
}
