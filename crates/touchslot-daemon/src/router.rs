//! Event routing.
//!
//! One [`EventBatch`] is everything a device reported up to a
//! `SYN_REPORT`. Relative motion is folded to its last value per axis and
//! handled first, then keys, then absolute axes, which only gamepads with a
//! profile produce meaningfully.

use std::sync::Arc;

use touchslot_types::keys::{
    key_name, BTN_DPAD_DOWN, BTN_DPAD_LEFT, BTN_DPAD_RIGHT, BTN_DPAD_UP, REL_HWHEEL_DOWN,
    REL_HWHEEL_UP, REL_WHEEL_DOWN, REL_WHEEL_UP,
};
use touchslot_types::{codes, DeviceKind, EventBatch, KeyState, PassthroughEvent, RawEvent, WheelAxis};
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::profile::{GamepadProfile, StickAxis};

/// Which of a HAT axis' two keys an edge applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HatSide {
    /// Left or up.
    Low,
    /// Right or down.
    High,
}

#[allow(clippy::cast_possible_truncation)]
fn tenths(v: f64) -> i64 {
    (v * 10.0).round() as i64
}

/// Key edges for a HAT axis moving from `last` to `new`.
///
/// Values are compared at one decimal. A jump across the centre releases
/// the old direction before pressing the new one.
pub fn hat_edges(last: f64, new: f64) -> Vec<(HatSide, KeyState)> {
    match (tenths(last), tenths(new)) {
        (5, 10) => vec![(HatSide::High, KeyState::Down)],
        (5, 0) => vec![(HatSide::Low, KeyState::Down)],
        (10, 5) => vec![(HatSide::High, KeyState::Up)],
        (0, 5) => vec![(HatSide::Low, KeyState::Up)],
        (0, 10) => vec![(HatSide::Low, KeyState::Up), (HatSide::High, KeyState::Down)],
        (10, 0) => vec![(HatSide::High, KeyState::Up), (HatSide::Low, KeyState::Down)],
        _ => Vec::new(),
    }
}

/// Trigger stages crossed moving from `last` to `new`.
///
/// Stage `i` sits at `i / 5`. Reaching it from below presses it, dropping
/// under it from at or above releases it.
pub fn trigger_edges(last: f64, new: f64) -> Vec<(u8, KeyState)> {
    (0u8..6)
        .filter_map(|i| {
            let threshold = f64::from(i) / 5.0;
            if last < threshold && new >= threshold {
                Some((i, KeyState::Down))
            } else if last >= threshold && new < threshold {
                Some((i, KeyState::Up))
            } else {
                None
            }
        })
        .collect()
}

fn hat_key(axis: StickAxis, side: HatSide) -> &'static str {
    match (axis, side) {
        (StickAxis::Hat0X, HatSide::Low) => BTN_DPAD_LEFT,
        (StickAxis::Hat0X, HatSide::High) => BTN_DPAD_RIGHT,
        (_, HatSide::Low) => BTN_DPAD_UP,
        (_, HatSide::High) => BTN_DPAD_DOWN,
    }
}

#[derive(Debug, Default)]
struct RelSummary {
    x: i32,
    y: i32,
    hwheel: i32,
    wheel: i32,
}

impl Engine {
    /// Route one batch of events from a non-touch device.
    pub async fn handle_batch(self: &Arc<Self>, batch: &EventBatch) {
        let mut rel = RelSummary::default();
        let mut keys: Vec<RawEvent> = Vec::new();
        let mut abs: Vec<RawEvent> = Vec::new();
        for event in &batch.events {
            match event.kind {
                codes::EV_KEY => keys.push(*event),
                codes::EV_ABS => abs.push(*event),
                codes::EV_REL => match event.code {
                    codes::REL_X => rel.x = event.value,
                    codes::REL_Y => rel.y = event.value,
                    codes::REL_HWHEEL => rel.hwheel = event.value,
                    codes::REL_WHEEL => rel.wheel = event.value,
                    _ => {}
                },
                _ => {}
            }
        }

        self.handle_rel(&rel).await;

        let profile = if batch.kind == DeviceKind::Gamepad {
            self.profiles.get(&batch.device)
        } else {
            None
        };
        if !keys.is_empty() {
            self.handle_key_events(&keys, profile, &batch.device).await;
        }
        if !abs.is_empty() {
            match profile {
                Some(profile) => {
                    self.handle_abs_events(&abs, profile, &batch.device)
                        .await;
                }
                None => warn!(device = %batch.device, "no gamepad profile, ignoring axes"),
            }
        }
    }

    async fn handle_rel(self: &Arc<Self>, rel: &RelSummary) {
        let on = self.mode.is_on();
        if rel.x != 0 || rel.y != 0 {
            if on {
                self.view_move(rel.x, rel.y).await;
            } else {
                self.passthrough(PassthroughEvent::MouseMove {
                    dx: rel.x,
                    dy: rel.y,
                });
            }
        }
        for (delta, axis, up, down) in [
            (rel.hwheel, WheelAxis::Horizontal, REL_HWHEEL_UP, REL_HWHEEL_DOWN),
            (rel.wheel, WheelAxis::Vertical, REL_WHEEL_UP, REL_WHEEL_DOWN),
        ] {
            if delta == 0 {
                continue;
            }
            if on {
                self.quick_click(if delta > 0 { up } else { down });
            } else {
                self.passthrough(PassthroughEvent::Wheel { axis, delta });
            }
        }
    }

    async fn handle_key_events(
        self: &Arc<Self>,
        events: &[RawEvent],
        profile: Option<&GamepadProfile>,
        device: &str,
    ) {
        for event in events {
            let Some(state) = KeyState::from_value(event.value) else {
                continue;
            };
            let name = match profile {
                Some(profile) => match profile.btn.get(&event.code) {
                    Some(name) => name.as_str(),
                    None => {
                        debug!(%device, code = event.code, "unknown gamepad button");
                        continue;
                    }
                },
                None => match key_name(event.code) {
                    Some(name) => name,
                    None => {
                        debug!(%device, code = event.code, "unknown key code");
                        continue;
                    }
                },
            };
            self.handle_key(name, state, device).await;
        }
    }

    async fn handle_abs_events(
        self: &Arc<Self>,
        events: &[RawEvent],
        profile: &GamepadProfile,
        device: &str,
    ) {
        for event in events {
            let Some(info) = profile.abs.get(&event.code) else {
                debug!(%device, code = event.code, "axis not in profile");
                continue;
            };
            let Some(axis) = StickAxis::from_name(&info.name) else {
                debug!(%device, name = %info.name, "unknown axis name");
                continue;
            };
            let value = info.normalize(event.value);
            let last = self.sticks.set(axis, value);
            match axis {
                StickAxis::Hat0X | StickAxis::Hat0Y => {
                    for (side, state) in hat_edges(last, value) {
                        self.handle_key(hat_key(axis, side), state, device).await;
                    }
                }
                StickAxis::Lt | StickAxis::Rt => {
                    let base = if axis == StickAxis::Lt { "BTN_LT" } else { "BTN_RT" };
                    for (stage, state) in trigger_edges(last, value) {
                        self.handle_key(&format!("{base}_{stage}"), state, device)
                            .await;
                        if stage == 1 {
                            self.handle_key(base, state, device).await;
                        }
                    }
                }
                StickAxis::LsX | StickAxis::LsY | StickAxis::RsX | StickAxis::RsY => {
                    self.sticks.set_active_gamepad(device);
                    let left = matches!(axis, StickAxis::LsX | StickAxis::LsY);
                    if left && self.mode.is_on() {
                        self.analog_wheel().await;
                    }
                }
            }
        }
    }
}
