//! Virtual sticks: the camera finger driven by the mouse or right stick,
//! and the movement wheel driven by WASD or the left stick.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use touchslot_types::coord::clamp_canonical;
use touchslot_types::{CanonicalPoint, PassthroughEvent, PixelPoint, CANONICAL_MAX};
use tracing::{debug, info};

use crate::engine::Engine;
use crate::profile::Stick;

/// Period of the right-stick view loop and the wheel loop.
pub const STICK_TICK: Duration = Duration::from_millis(4);

/// Period of the idle-release check for the view finger.
pub const IDLE_TICK: Duration = Duration::from_millis(50);

/// Largest distance the WASD wheel finger travels per tick, in pixels.
pub const WHEEL_STEP: f64 = 60.0;

/// Right-stick deflection to view units while mapping is on.
const RS_VIEW_GAIN: f64 = 32.0;

/// Right-stick deflection to relative mouse units while mapping is off.
const RS_MOUSE_GAIN: f64 = 24.0;

fn is_centred(x: f64, y: f64) -> bool {
    (x - 0.5).abs() < f64::EPSILON && (y - 0.5).abs() < f64::EPSILON
}

#[allow(clippy::cast_possible_truncation)]
fn deflection(v: f64, gain: f64) -> i32 {
    ((v - 0.5) * gain) as i32
}

/// Wheel target for the held directions (up, left, down, right).
///
/// Diagonals are scaled by 707/1000 so the finger stays on the circle.
pub fn wasd_target(home: PixelPoint, held: [bool; 4], range: i32) -> PixelPoint {
    let [up, left, down, right] = held;
    let mut x = 0;
    let mut y = 0;
    if up {
        y -= 1;
    }
    if down {
        y += 1;
    }
    if left {
        x -= 1;
    }
    if right {
        x += 1;
    }
    if x != 0 && y != 0 {
        home.offset(x * range * 707 / 1000, y * range * 707 / 1000)
    } else {
        home.offset(x * range, y * range)
    }
}

/// Wheel finger position with sub-pixel precision, so a run of eased steps
/// covers the full step length instead of losing a fraction to rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelPos {
    pub x: f64,
    pub y: f64,
}

impl From<PixelPoint> for WheelPos {
    fn from(p: PixelPoint) -> Self {
        Self {
            x: f64::from(p.x),
            y: f64::from(p.y),
        }
    }
}

impl WheelPos {
    /// Nearest pixel.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_pixel(self) -> PixelPoint {
        PixelPoint::new(self.x.round() as i32, self.y.round() as i32)
    }
}

/// Move `last` toward `target` by at most `step` pixels.
///
/// Lands exactly on `target` once it is within one step, so a target `d`
/// pixels away is reached in `ceil(d / step)` calls without overshooting.
pub fn ease_toward(last: WheelPos, target: PixelPoint, step: f64) -> WheelPos {
    let target = WheelPos::from(target);
    let dx = target.x - last.x;
    let dy = target.y - last.y;
    let dist = dx.hypot(dy);
    if dist <= step + 1e-9 {
        return target;
    }
    let k = step / dist;
    WheelPos {
        x: last.x + dx * k,
        y: last.y + dy * k,
    }
}

fn seam_needed(x: i64, y: i64) -> bool {
    let max = i64::from(CANONICAL_MAX);
    !(0..=max).contains(&x) || !(0..=max).contains(&y)
}

impl Engine {
    /// A stick reading after the active gamepad's deadzone. Centred when no
    /// gamepad with a profile has moved yet.
    pub fn get_stick(&self, stick: Stick) -> (f64, f64) {
        let Some(profile) = self
            .sticks
            .active_gamepad()
            .and_then(|name| self.profiles.get(&name))
        else {
            return (0.5, 0.5);
        };
        let (ax, ay) = stick.axes();
        profile.apply_deadzone(stick, self.sticks.get(ax), self.sticks.get(ay))
    }

    /// Turn the camera by a relative offset.
    ///
    /// The view finger is put down lazily at the jittered home position.
    /// When the accumulated position would leave the screen a fresh finger
    /// is put down at home, moved by the same offset, and the old one is
    /// lifted.
    pub async fn view_move(&self, dx: i32, dy: i32) {
        let mapping = self.mapping();
        let (sx, sy) = mapping.view_speed;
        let mut view = self.view.lock().await;
        if self.options.measure_mode {
            view.total.0 += i64::from(dx);
            view.total.1 += i64::from(dy);
            info!(x = view.total.0, y = view.total.1, "view moved");
        }
        view.idle_ticks = 0;

        if view.slot.is_none() {
            view.at = mapping.screen.to_canonical(self.jittered(mapping.view_home));
            view.slot = self.allocator.require(view.at).await;
        }

        let x = i64::from(view.at.x) + i64::from(dx) * sx;
        let y = i64::from(view.at.y) + i64::from(dy) * sy;
        if seam_needed(x, y) {
            let start = mapping.screen.to_canonical(self.jittered(mapping.view_home));
            let fresh = self.allocator.require(start).await;
            view.at = CanonicalPoint::new(
                clamp_canonical(i64::from(start.x) + i64::from(dx) * sx),
                clamp_canonical(i64::from(start.y) + i64::from(dy) * sy),
            );
            self.allocator.move_to(fresh, view.at).await;
            self.allocator.release(view.slot).await;
            debug!(old = ?view.slot, new = ?fresh, "view seam");
            view.slot = fresh;
        } else {
            view.at = CanonicalPoint::new(clamp_canonical(x), clamp_canonical(y));
            self.allocator.move_to(view.slot, view.at).await;
        }
    }

    /// Put the wheel finger at `target`, putting it down at home first if
    /// needed.
    pub(crate) async fn wheel_move_to(&self, target: PixelPoint) {
        let home = self.mapping().wheel.home;
        let mut wheel = self.wheel.lock().await;
        if wheel.slot.is_none() {
            wheel.slot = self.allocator.require_px(home).await;
        }
        self.allocator.move_px(wheel.slot, target).await;
    }

    pub(crate) async fn release_wheel(&self) {
        let mut wheel = self.wheel.lock().await;
        wheel.slot = self.allocator.release(wheel.slot.take()).await;
    }

    /// Follow the left stick directly with the wheel finger.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) async fn analog_wheel(&self) {
        let (x, y) = self.get_stick(Stick::Left);
        if is_centred(x, y) {
            self.wheel_keys.analog_released.store(true, Ordering::SeqCst);
            return;
        }
        self.wheel_keys.analog_released.store(false, Ordering::SeqCst);
        let wheel = self.mapping().wheel.clone();
        let range = if wheel.shift_enabled {
            wheel.shift_range
        } else {
            wheel.range
        };
        let range = f64::from(range);
        let target = wheel.home.offset(
            (range * 2.0 * (x - 0.5)) as i32,
            (range * 2.0 * (y - 0.5)) as i32,
        );
        self.wheel_move_to(target).await;
    }

    /// Right stick to camera (mapping on) or mouse motion (mapping off).
    pub(crate) async fn run_view_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown_signal();
        let mut ticker = tokio::time::interval(STICK_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            let (x, y) = self.get_stick(Stick::Right);
            if is_centred(x, y) {
                continue;
            }
            if self.mode.is_on() {
                self.view_move(deflection(x, RS_VIEW_GAIN), deflection(y, RS_VIEW_GAIN))
                    .await;
            } else {
                self.passthrough(PassthroughEvent::MouseMove {
                    dx: deflection(x, RS_MOUSE_GAIN),
                    dy: deflection(y, RS_MOUSE_GAIN),
                });
            }
        }
    }

    /// Lift the view finger once it has been still for the configured time.
    pub(crate) async fn run_idle_release_loop(self: Arc<Self>) {
        let limit = u64::try_from(self.options.auto_release.as_millis() / IDLE_TICK.as_millis())
            .unwrap_or(u64::MAX);
        let mut shutdown = self.shutdown_signal();
        let mut ticker = tokio::time::interval(IDLE_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            let mut view = self.view.lock().await;
            if view.slot.is_none() {
                continue;
            }
            view.idle_ticks += 1;
            if view.idle_ticks > limit {
                view.idle_ticks = 0;
                view.slot = self.allocator.release(view.slot.take()).await;
                debug!("view finger idle, released");
            }
        }
    }

    /// Ease the wheel finger toward the WASD target and lift it once both
    /// the keys and the left stick are released.
    pub(crate) async fn run_wheel_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown_signal();
        let mut ticker = tokio::time::interval(STICK_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = WheelPos::from(self.jittered(self.mapping().wheel.home));
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            if self.is_shutdown() {
                break;
            }
            let wheel = self.mapping().wheel.clone();
            let target = if self.mode.is_on() {
                let range = if self.wheel_keys.shift() {
                    wheel.shift_range
                } else {
                    wheel.range
                };
                wasd_target(wheel.home, self.wheel_keys.held(), range)
            } else {
                wheel.home
            };

            if target == wheel.home {
                self.wheel_keys.wasd_released.store(true, Ordering::SeqCst);
                last = WheelPos::from(self.jittered(wheel.home));
            } else {
                self.wheel_keys.wasd_released.store(false, Ordering::SeqCst);
                if last != WheelPos::from(target) {
                    last = ease_toward(last, target, WHEEL_STEP);
                    self.wheel_move_to(self.jittered(last.to_pixel())).await;
                }
            }

            if self.wheel_keys.both_released() && self.wheel.lock().await.slot.is_some() {
                self.release_wheel().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wasd_diagonal_scales() {
        let home = PixelPoint::new(0, 0);
        // W + D
        let target = wasd_target(home, [true, false, false, true], 100);
        assert_eq!(target, PixelPoint::new(70, -70));
        // A + S
        let target = wasd_target(home, [false, true, true, false], 100);
        assert_eq!(target, PixelPoint::new(-70, 70));
    }

    #[test]
    fn wasd_cardinal_and_opposites() {
        let home = PixelPoint::new(500, 500);
        assert_eq!(
            wasd_target(home, [true, false, false, false], 80),
            PixelPoint::new(500, 420)
        );
        assert_eq!(
            wasd_target(home, [false, false, false, true], 80),
            PixelPoint::new(580, 500)
        );
        assert_eq!(wasd_target(home, [true, false, true, false], 80), home);
        assert_eq!(wasd_target(home, [false; 4], 80), home);
    }

    /// Calls needed to reach `target` from `from`, checking every step stays
    /// within the bounding box of the two points.
    fn ease_calls(from: PixelPoint, target: PixelPoint) -> u32 {
        let (lo_x, hi_x) = (from.x.min(target.x), from.x.max(target.x));
        let (lo_y, hi_y) = (from.y.min(target.y), from.y.max(target.y));
        let goal = WheelPos::from(target);
        let mut last = WheelPos::from(from);
        let mut calls = 0;
        while last != goal {
            last = ease_toward(last, target, WHEEL_STEP);
            assert!(f64::from(lo_x) <= last.x && last.x <= f64::from(hi_x));
            assert!(f64::from(lo_y) <= last.y && last.y <= f64::from(hi_y));
            calls += 1;
            assert!(calls <= 100, "no convergence toward {target:?}");
        }
        calls
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn step_bound(from: PixelPoint, target: PixelPoint) -> u32 {
        let dx = f64::from(target.x - from.x);
        let dy = f64::from(target.y - from.y);
        (dx.hypot(dy) / WHEEL_STEP).ceil() as u32
    }

    #[test]
    fn easing_converges_without_overshoot() {
        // distance 500, step 60: ceil(500 / 60) = 9 calls
        assert_eq!(
            ease_calls(PixelPoint::new(0, 0), PixelPoint::new(300, 400)),
            9
        );
    }

    #[test]
    fn easing_within_step_bound_for_any_target() {
        let origin = PixelPoint::new(0, 0);
        // d = 359.45, six calls
        let odd = PixelPoint::new(-291, -211);
        assert_eq!(ease_calls(origin, odd), 6);
        assert_eq!(step_bound(origin, odd), 6);

        for ty in [-299, -211, -97, -1, 0, 13, 150, 299] {
            for tx in -300..=300 {
                let target = PixelPoint::new(tx, ty);
                let calls = ease_calls(origin, target);
                assert!(
                    calls <= step_bound(origin, target),
                    "{target:?} took {calls} calls"
                );
            }
        }
    }

    #[test]
    fn easing_from_off_grid_start() {
        let from = PixelPoint::new(517, 803);
        let target = PixelPoint::new(200, 800);
        assert_eq!(ease_calls(from, target), step_bound(from, target));
    }

    #[test]
    fn easing_snaps_within_one_step() {
        let last = WheelPos::from(PixelPoint::new(100, 100));
        let target = PixelPoint::new(130, 140);
        assert_eq!(ease_toward(last, target, WHEEL_STEP), WheelPos::from(target));
        // exactly one step away
        let target = PixelPoint::new(160, 100);
        assert_eq!(ease_toward(last, target, WHEEL_STEP), WheelPos::from(target));
    }

    #[test]
    fn wheel_pos_rounds_to_nearest_pixel() {
        let p = WheelPos { x: 10.5, y: -3.4 };
        assert_eq!(p.to_pixel(), PixelPoint::new(11, -3));
    }

    #[test]
    fn seam_detection() {
        let max = i64::from(CANONICAL_MAX);
        assert!(!seam_needed(0, max));
        assert!(seam_needed(-1, 5));
        assert!(seam_needed(5, max + 1));
    }

    #[test]
    fn deflection_truncates_toward_zero() {
        assert_eq!(deflection(1.0, RS_VIEW_GAIN), 16);
        assert_eq!(deflection(0.0, RS_MOUSE_GAIN), -12);
        assert_eq!(deflection(0.51, RS_VIEW_GAIN), 0);
    }
}
