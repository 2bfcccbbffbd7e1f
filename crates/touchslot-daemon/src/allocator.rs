//! The touch slot allocator.
//!
//! Every finger the engine puts on the screen goes through here. The slot
//! table and the output sink sit behind one async mutex, so claiming a slot
//! and emitting its op are a single step and backend writes never
//! interleave.

use tokio::sync::Mutex;
use touchslot_input::TouchSink;
use touchslot_types::{CanonicalPoint, PixelPoint, ScreenSize, SlotId, TouchFrame, TouchOp};
use tracing::{debug, warn};

/// Number of virtual fingers the engine can hold at once.
pub const SLOT_COUNT: usize = 12;

struct Inner {
    in_use: Vec<bool>,
    screen: ScreenSize,
    sink: Box<dyn TouchSink>,
}

impl Inner {
    async fn emit(&mut self, op: TouchOp) {
        let frame = TouchFrame::new(op, self.screen);
        if let Err(e) = self.sink.apply(&frame).await {
            warn!(?op, error = %e, "touch write failed, dropping op");
        }
    }
}

pub struct Allocator {
    inner: Mutex<Inner>,
}

impl Allocator {
    pub fn new(sink: Box<dyn TouchSink>, screen: ScreenSize) -> Self {
        Self::with_capacity(sink, screen, SLOT_COUNT)
    }

    pub fn with_capacity(sink: Box<dyn TouchSink>, screen: ScreenSize, slots: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                in_use: vec![false; slots],
                screen,
                sink,
            }),
        }
    }

    /// Claim the lowest free slot and put a finger down at `at`.
    ///
    /// Returns `None` and emits nothing when every slot is taken.
    pub async fn require(&self, at: CanonicalPoint) -> Option<SlotId> {
        let mut inner = self.inner.lock().await;
        let Some(index) = inner.in_use.iter().position(|used| !used) else {
            debug!(x = at.x, y = at.y, "all touch slots in use, dropping request");
            return None;
        };
        let slot = SlotId(u8::try_from(index).ok()?);
        inner.in_use[index] = true;
        inner.emit(TouchOp::Require { slot, at }).await;
        debug!(%slot, x = at.x, y = at.y, "require");
        Some(slot)
    }

    /// Like [`require`](Self::require), with `at` in mapping pixels.
    pub async fn require_px(&self, at: PixelPoint) -> Option<SlotId> {
        let screen = self.screen().await;
        self.require(screen.to_canonical(at)).await
    }

    /// Lift the finger in `slot`. Always returns `None` so callers can write
    /// `id = alloc.release(id).await`.
    ///
    /// A slot that is not held emits nothing.
    pub async fn release(&self, slot: Option<SlotId>) -> Option<SlotId> {
        let slot = slot?;
        let mut inner = self.inner.lock().await;
        match inner.in_use.get_mut(slot.index()) {
            Some(used) if *used => *used = false,
            _ => {
                debug!(%slot, "release of a free slot ignored");
                return None;
            }
        }
        inner.emit(TouchOp::Release { slot }).await;
        debug!(%slot, "release");
        None
    }

    pub async fn move_to(&self, slot: Option<SlotId>, at: CanonicalPoint) {
        let Some(slot) = slot else {
            return;
        };
        let mut inner = self.inner.lock().await;
        inner.emit(TouchOp::Move { slot, at }).await;
    }

    pub async fn move_px(&self, slot: Option<SlotId>, at: PixelPoint) {
        if slot.is_none() {
            return;
        }
        let screen = self.screen().await;
        self.move_to(slot, screen.to_canonical(at)).await;
    }

    pub async fn screen(&self) -> ScreenSize {
        self.inner.lock().await.screen
    }

    pub async fn set_screen(&self, screen: ScreenSize) {
        self.inner.lock().await.screen = screen;
    }

    /// Tell the backend the mapping resolution. Only the serial HID sink
    /// encodes this; the others ignore it.
    pub async fn reset_resolution(&self) {
        let mut inner = self.inner.lock().await;
        let ScreenSize { width, height } = inner.screen;
        inner.emit(TouchOp::ResetResolution { width, height }).await;
    }

    /// Number of slots currently held.
    pub async fn active(&self) -> usize {
        self.inner
            .lock()
            .await
            .in_use
            .iter()
            .filter(|used| **used)
            .count()
    }

    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if let Err(e) = inner.sink.shutdown().await {
            warn!(error = %e, "touch sink shutdown failed");
        }
    }
}
