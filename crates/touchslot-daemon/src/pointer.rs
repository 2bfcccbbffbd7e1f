//! Pointer overlay mode.
//!
//! While mapping is off the mouse does not reach the virtual mouse device.
//! Instead it drives an on-screen cursor drawn by a separate overlay
//! process, and the left button puts a real touch down under it. Keys still
//! pass through.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use touchslot_types::overlay::parse_orientation_report;
use touchslot_types::{
    codes, KeyState, OrientationCell, PassthroughEvent, PixelPoint, PointerFrame, ScreenSize,
    SlotId, WheelAxis,
};
use tracing::{debug, info, warn};

use crate::allocator::Allocator;
use crate::display::oriented;

/// Pixels scrolled per wheel tick. Wheel up drags the content down.
pub const SCROLL_PX: i32 = -40;

/// The scroll finger lifts after this long without a wheel tick.
pub const SCROLL_IDLE: Duration = Duration::from_millis(200);

const WIGGLE: Duration = Duration::from_millis(1);

/// Where the cursor may go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerBounds {
    /// The local display, following its orientation.
    Display(ScreenSize),
    /// The mapping screen, for backends driving another device.
    Mapping,
}

#[derive(Debug, Clone, Copy)]
struct ScrollTick {
    delta: i32,
    cursor: PixelPoint,
    bounds: ScreenSize,
}

pub struct Pointer {
    allocator: Arc<Allocator>,
    bounds: PointerBounds,
    orientation: OrientationCell,
    frames: mpsc::Sender<PointerFrame>,
    scroll: mpsc::Sender<ScrollTick>,
    cursor: PixelPoint,
    active: bool,
    left_down: bool,
    touch: Option<SlotId>,
}

impl Pointer {
    /// Create the pointer and start its scroll task. Cursor frames go to
    /// `frames`.
    pub fn spawn(
        allocator: Arc<Allocator>,
        bounds: PointerBounds,
        orientation: OrientationCell,
        frames: mpsc::Sender<PointerFrame>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (scroll, scroll_rx) = mpsc::channel(100);
        let task = tokio::spawn(run_scroll(Arc::clone(&allocator), scroll_rx, shutdown));
        let pointer = Self {
            allocator,
            bounds,
            orientation,
            frames,
            scroll,
            cursor: PixelPoint::new(0, 0),
            active: true,
            left_down: false,
            touch: None,
        };
        (pointer, task)
    }

    pub fn cursor(&self) -> PixelPoint {
        self.cursor
    }

    async fn bounds(&self) -> ScreenSize {
        match self.bounds {
            PointerBounds::Display(size) => oriented(size, self.orientation.get()),
            PointerBounds::Mapping => self.allocator.screen().await,
        }
    }

    async fn show(&self, frame: PointerFrame) {
        if self.frames.send(frame).await.is_err() {
            debug!("overlay link closed, dropping pointer frame");
        }
    }

    async fn show_cursor(&self) {
        self.show(PointerFrame {
            x: self.cursor.x,
            y: self.cursor.y,
            visible: true,
            down: self.left_down,
            orientation: self.orientation.get(),
        })
        .await;
    }

    /// Filter one passthrough event. Mouse input is consumed by the
    /// pointer; anything returned should go on to the virtual device.
    pub async fn handle(&mut self, event: PassthroughEvent) -> Option<PassthroughEvent> {
        if !self.active {
            return Some(event);
        }
        match event {
            PassthroughEvent::MouseMove { dx, dy } => {
                self.move_by(dx, dy).await;
                None
            }
            PassthroughEvent::Wheel {
                axis: WheelAxis::Vertical,
                delta,
            } => {
                let tick = ScrollTick {
                    delta: delta * SCROLL_PX,
                    cursor: self.cursor,
                    bounds: self.bounds().await,
                };
                if self.scroll.send(tick).await.is_err() {
                    debug!("scroll task gone");
                }
                None
            }
            PassthroughEvent::Wheel { .. } => None,
            PassthroughEvent::Key { code, state } if (codes::BTN_LEFT..=codes::BTN_TASK).contains(&code) => {
                if code == codes::BTN_LEFT {
                    self.left_button(state).await;
                }
                None
            }
            PassthroughEvent::Key { .. } => Some(event),
        }
    }

    async fn move_by(&mut self, dx: i32, dy: i32) {
        let bounds = self.bounds().await;
        let max_x = i32::try_from(bounds.width).unwrap_or(i32::MAX);
        let max_y = i32::try_from(bounds.height).unwrap_or(i32::MAX);
        self.cursor = PixelPoint::new(
            self.cursor.x.saturating_add(dx).clamp(0, max_x),
            self.cursor.y.saturating_add(dy).clamp(0, max_y),
        );
        self.show_cursor().await;
        if self.left_down {
            self.allocator
                .move_to(self.touch, bounds.to_canonical(self.cursor))
                .await;
        }
    }

    async fn left_button(&mut self, state: KeyState) {
        match state {
            KeyState::Down => {
                self.left_down = true;
                let bounds = self.bounds().await;
                self.touch = self.allocator.require(bounds.to_canonical(self.cursor)).await;
            }
            KeyState::Up => {
                self.left_down = false;
                self.touch = self.allocator.release(self.touch.take()).await;
            }
            KeyState::Repeat => return,
        }
        self.move_by(0, 0).await;
    }

    /// Follow the mapping switch: the cursor hides while mapping is on and
    /// any touch it holds is lifted.
    pub async fn set_mapping(&mut self, on: bool) {
        self.active = !on;
        if self.active {
            self.show_cursor().await;
            return;
        }
        self.show(PointerFrame::hidden(self.orientation.get())).await;
        if self.left_down {
            self.left_down = false;
            self.touch = self.allocator.release(self.touch.take()).await;
        }
    }
}

fn in_bounds(y: i32, bounds: ScreenSize) -> bool {
    y >= 0 && i64::from(y) <= i64::from(bounds.height)
}

/// Turns wheel ticks into a short vertical drag. The finger is planted at
/// the cursor on the first tick and re-planted whenever the next tick would
/// leave the screen.
async fn run_scroll(
    allocator: Arc<Allocator>,
    mut ticks: mpsc::Receiver<ScrollTick>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut slot: Option<SlotId> = None;
    let mut at = PixelPoint::new(0, 0);
    let mut bounds = ScreenSize::new(0, 0);
    loop {
        tokio::select! {
            tick = ticks.recv() => {
                let Some(tick) = tick else { return };
                bounds = tick.bounds;
                let start = tick.cursor;
                let next = at.offset(0, tick.delta);
                if slot.is_some() && in_bounds(next.y, bounds) {
                    allocator.move_to(slot, bounds.to_canonical(next)).await;
                    at = next;
                    continue;
                }
                slot = allocator.release(slot).await;
                let target = start.offset(0, tick.delta);
                if !in_bounds(target.y, bounds) {
                    continue;
                }
                slot = allocator.require(bounds.to_canonical(start)).await;
                allocator.move_to(slot, bounds.to_canonical(target)).await;
                at = target;
            }
            () = tokio::time::sleep(SCROLL_IDLE), if slot.is_some() => {
                // A small sideways wiggle stops the content from flinging.
                allocator.move_to(slot, bounds.to_canonical(at.offset(1, 0))).await;
                tokio::time::sleep(WIGGLE).await;
                allocator.move_to(slot, bounds.to_canonical(at.offset(-1, 0))).await;
                tokio::time::sleep(WIGGLE).await;
                slot = allocator.release(slot).await;
            }
            _ = shutdown.changed() => return,
        }
    }
}

/// Shuttle pointer frames to the overlay process and apply the orientation
/// it reports back.
pub async fn run_overlay_link(
    socket: UdpSocket,
    target: SocketAddr,
    mut frames: mpsc::Receiver<PointerFrame>,
    orientation: Option<OrientationCell>,
    mut shutdown: watch::Receiver<bool>,
) {
    match socket.local_addr() {
        Ok(addr) => info!(local = %addr, overlay = %target, "pointer overlay link up"),
        Err(e) => warn!(error = %e, "overlay socket has no local address"),
    }
    let mut buf = [0u8; 32];
    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else { return };
                if let Err(e) = socket.send_to(&frame.to_bytes(), target).await {
                    debug!(error = %e, "overlay send failed");
                }
            }
            result = socket.recv_from(&mut buf) => match result {
                Ok((len, peer)) => match parse_orientation_report(&buf[..len]) {
                    Ok(reported) => {
                        debug!(%peer, orientation = %reported, "overlay orientation report");
                        if let Some(cell) = &orientation {
                            cell.set(reported);
                        }
                    }
                    Err(e) => debug!(%peer, error = %e, "bad orientation report"),
                },
                Err(e) => warn!(error = %e, "overlay receive failed"),
            },
            _ = shutdown.changed() => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use touchslot_input::mock::{MockSink, MockSinkHandle};
    use touchslot_types::{Orientation, TouchOp, CANONICAL_MAX};

    use super::*;

    struct Fixture {
        pointer: Pointer,
        frames: mpsc::Receiver<PointerFrame>,
        sink: MockSinkHandle,
        _shutdown: watch::Sender<bool>,
    }

    fn fixture(orientation: Orientation) -> Fixture {
        let sink = MockSink::new();
        let handle = sink.handle();
        let allocator = Arc::new(Allocator::new(Box::new(sink), ScreenSize::new(100, 100)));
        let (frames_tx, frames) = mpsc::channel(64);
        let (shutdown_tx, shutdown) = watch::channel(false);
        let (pointer, _task) = Pointer::spawn(
            allocator,
            PointerBounds::Display(ScreenSize::new(1000, 2000)),
            OrientationCell::new(orientation),
            frames_tx,
            shutdown,
        );
        Fixture {
            pointer,
            frames,
            sink: handle,
            _shutdown: shutdown_tx,
        }
    }

    #[tokio::test]
    async fn cursor_is_clamped_to_oriented_display() {
        let mut f = fixture(Orientation::Quarter);
        assert!(f
            .pointer
            .handle(PassthroughEvent::MouseMove { dx: 5000, dy: -30 })
            .await
            .is_none());
        assert_eq!(f.pointer.cursor(), PixelPoint::new(2000, 0));
        let frame = f.frames.recv().await.unwrap();
        assert_eq!(frame.to_string(), "2000,0,1,0,1");
    }

    #[tokio::test]
    async fn left_button_touches_at_cursor_and_drags() {
        let mut f = fixture(Orientation::Natural);
        f.pointer
            .handle(PassthroughEvent::MouseMove { dx: 500, dy: 1000 })
            .await;
        f.pointer
            .handle(PassthroughEvent::Key {
                code: codes::BTN_LEFT,
                state: KeyState::Down,
            })
            .await;
        f.pointer
            .handle(PassthroughEvent::MouseMove { dx: 500, dy: 0 })
            .await;
        f.pointer
            .handle(PassthroughEvent::Key {
                code: codes::BTN_LEFT,
                state: KeyState::Up,
            })
            .await;

        let ops = f.sink.ops();
        let half = CANONICAL_MAX / 2;
        assert!(matches!(ops[0], TouchOp::Require { slot: SlotId(0), at } if at.x == half && at.y == half));
        assert!(matches!(ops.last(), Some(TouchOp::Release { slot: SlotId(0) })));
        assert!(ops
            .iter()
            .any(|op| matches!(op, TouchOp::Move { at, .. } if at.x == CANONICAL_MAX)));
    }

    #[tokio::test]
    async fn other_buttons_are_swallowed_and_keys_pass() {
        let mut f = fixture(Orientation::Natural);
        let right = PassthroughEvent::Key {
            code: codes::BTN_RIGHT,
            state: KeyState::Down,
        };
        assert!(f.pointer.handle(right).await.is_none());
        let key = PassthroughEvent::Key {
            code: 30,
            state: KeyState::Down,
        };
        assert_eq!(f.pointer.handle(key).await, Some(key));
        assert!(f.sink.ops().is_empty());
    }

    #[tokio::test]
    async fn mapping_on_hides_and_releases() {
        let mut f = fixture(Orientation::Natural);
        f.pointer
            .handle(PassthroughEvent::Key {
                code: codes::BTN_LEFT,
                state: KeyState::Down,
            })
            .await;
        f.pointer.set_mapping(true).await;
        assert!(matches!(
            f.sink.ops().last(),
            Some(TouchOp::Release { slot: SlotId(0) })
        ));
        let mut last = None;
        while let Ok(frame) = f.frames.try_recv() {
            last = Some(frame);
        }
        assert_eq!(last.map(|f| f.visible), Some(false));

        // Mapping on: mouse events are no longer the pointer's.
        let motion = PassthroughEvent::MouseMove { dx: 1, dy: 1 };
        assert_eq!(f.pointer.handle(motion).await, Some(motion));
    }

    #[tokio::test(start_paused = true)]
    async fn wheel_scrolls_then_lifts_when_idle() {
        let mut f = fixture(Orientation::Natural);
        f.pointer
            .handle(PassthroughEvent::MouseMove { dx: 500, dy: 1000 })
            .await;
        f.pointer
            .handle(PassthroughEvent::Wheel {
                axis: WheelAxis::Vertical,
                delta: 1,
            })
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let ops = f.sink.ops();
        assert!(matches!(ops[0], TouchOp::Require { .. }));
        assert!(matches!(ops[1], TouchOp::Move { .. }));
        assert_eq!(ops.len(), 2);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(matches!(f.sink.ops().last(), Some(TouchOp::Release { .. })));
    }
}
