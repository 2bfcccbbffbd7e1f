//! Passthrough touch mixer.
//!
//! The physical touchscreen is grabbed like any other device, so its
//! contacts have to be re-injected through the allocator or they would be
//! lost. [`Mixer`] replays the panel's multitouch protocol into per-slot
//! snapshots, diffs each batch against the previous one and turns the
//! differences into virtual-slot ops.

use touchslot_types::coord::to_canonical;
use touchslot_types::{codes, CanonicalPoint, Orientation, RawEvent, ScreenSize, SlotId};
use tracing::debug;

use crate::allocator::Allocator;

/// Hardware slots tracked on the physical panel.
pub const HW_SLOTS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct HwSlot {
    active: bool,
    x: i32,
    y: i32,
}

/// A change to one hardware slot, already translated to canonical space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixOp {
    Down { hw: usize, at: CanonicalPoint },
    Up { hw: usize },
    Move { hw: usize, at: CanonicalPoint },
}

#[derive(Debug)]
pub struct Mixer {
    display: ScreenSize,
    mt_max: (i32, i32),
    slots: [HwSlot; HW_SLOTS],
    current: usize,
    virtual_slots: [Option<SlotId>; HW_SLOTS],
}

fn scale(value: i32, extent: u32, max: i32) -> i32 {
    if max <= 0 {
        return 0;
    }
    let scaled = i64::from(value) * i64::from(extent) / i64::from(max);
    i32::try_from(scaled).unwrap_or(i32::MAX)
}

/// Map a display pixel to canonical space for the current orientation.
pub fn translate(display: ScreenSize, orientation: Orientation, x: i32, y: i32) -> CanonicalPoint {
    let (w, h) = (display.width, display.height);
    let wi = i32::try_from(w).unwrap_or(i32::MAX);
    let hi = i32::try_from(h).unwrap_or(i32::MAX);
    match orientation {
        Orientation::Natural => CanonicalPoint::new(to_canonical(x, w), to_canonical(y, h)),
        Orientation::Quarter => CanonicalPoint::new(to_canonical(y, h), to_canonical(wi - x, w)),
        Orientation::Half => {
            CanonicalPoint::new(to_canonical(wi - x, w), to_canonical(hi - y, h))
        }
        Orientation::ThreeQuarter => {
            CanonicalPoint::new(to_canonical(hi - y, h), to_canonical(x, w))
        }
    }
}

impl Mixer {
    /// `display` is the `wm size` of the device, `mt_max` the panel's
    /// `ABS_MT_POSITION_X/Y` maxima.
    pub fn new(display: ScreenSize, mt_max: (i32, i32)) -> Self {
        Self {
            display,
            mt_max,
            slots: [HwSlot::default(); HW_SLOTS],
            current: 0,
            virtual_slots: [None; HW_SLOTS],
        }
    }

    /// Fold one panel batch into the slot snapshots and return what changed.
    pub fn diff(&mut self, events: &[RawEvent], orientation: Orientation) -> Vec<MixOp> {
        let before = self.slots;
        for event in events {
            if event.kind != codes::EV_ABS {
                continue;
            }
            match event.code {
                codes::ABS_MT_SLOT => {
                    self.current = usize::try_from(event.value).unwrap_or(usize::MAX);
                }
                codes::ABS_MT_TRACKING_ID => {
                    if let Some(slot) = self.slots.get_mut(self.current) {
                        slot.active = event.value != -1;
                    }
                }
                codes::ABS_MT_POSITION_X => {
                    if let Some(slot) = self.slots.get_mut(self.current) {
                        slot.x = scale(event.value, self.display.width, self.mt_max.0);
                    }
                }
                codes::ABS_MT_POSITION_Y => {
                    if let Some(slot) = self.slots.get_mut(self.current) {
                        slot.y = scale(event.value, self.display.height, self.mt_max.1);
                    }
                }
                _ => {}
            }
        }

        let mut ops = Vec::new();
        for (hw, (old, new)) in before.iter().zip(self.slots.iter()).enumerate() {
            let at = || translate(self.display, orientation, new.x, new.y);
            match (old.active, new.active) {
                (false, true) => ops.push(MixOp::Down { hw, at: at() }),
                (true, false) => ops.push(MixOp::Up { hw }),
                (true, true) if (old.x, old.y) != (new.x, new.y) => {
                    ops.push(MixOp::Move { hw, at: at() });
                }
                _ => {}
            }
        }
        ops
    }

    /// Diff a batch and replay the result through the allocator.
    pub async fn apply(
        &mut self,
        events: &[RawEvent],
        orientation: Orientation,
        allocator: &Allocator,
    ) {
        for op in self.diff(events, orientation) {
            match op {
                MixOp::Down { hw, at } => {
                    let slot = allocator.require(at).await;
                    debug!(hw, ?slot, "physical touch down");
                    self.virtual_slots[hw] = slot;
                }
                MixOp::Up { hw } => {
                    let slot = self.virtual_slots[hw].take();
                    debug!(hw, ?slot, "physical touch up");
                    allocator.release(slot).await;
                }
                MixOp::Move { hw, at } => {
                    allocator.move_to(self.virtual_slots[hw], at).await;
                }
            }
        }
    }

    /// Virtual slot currently carrying hardware slot `hw`.
    pub fn virtual_slot(&self, hw: usize) -> Option<SlotId> {
        self.virtual_slots.get(hw).copied().flatten()
    }
}
