//! Multi-touch type B event sequences.
//!
//! The encoder tracks the slot it addressed last and the number of fingers
//! down. It omits `ABS_MT_SLOT` when the next op targets the same slot and
//! toggles `BTN_TOUCH` on the first finger down and the last finger up.

use touchslot_types::{codes, RawEvent, SlotId};

#[derive(Debug, Default)]
pub struct MtEncoder {
    active: u32,
    last_slot: Option<SlotId>,
}

impl MtEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingers currently down.
    pub fn active(&self) -> u32 {
        self.active
    }

    pub fn last_slot(&self) -> Option<SlotId> {
        self.last_slot
    }

    /// A new finger goes down at device coordinates `(x, y)`.
    pub fn require(&mut self, slot: SlotId, x: i32, y: i32) -> Vec<RawEvent> {
        let id = i32::from(slot.0);
        self.last_slot = Some(slot);
        self.active += 1;
        let mut out = Vec::with_capacity(6);
        out.push(RawEvent::abs(codes::ABS_MT_SLOT, id));
        out.push(RawEvent::abs(codes::ABS_MT_TRACKING_ID, id));
        if self.active == 1 {
            out.push(RawEvent::key(codes::BTN_TOUCH, 1));
        }
        out.push(RawEvent::abs(codes::ABS_MT_POSITION_X, x));
        out.push(RawEvent::abs(codes::ABS_MT_POSITION_Y, y));
        out.push(RawEvent::syn());
        out
    }

    pub fn release(&mut self, slot: SlotId) -> Vec<RawEvent> {
        let mut out = Vec::with_capacity(4);
        if self.last_slot != Some(slot) {
            self.last_slot = Some(slot);
            out.push(RawEvent::abs(codes::ABS_MT_SLOT, i32::from(slot.0)));
        }
        out.push(RawEvent::abs(codes::ABS_MT_TRACKING_ID, -1));
        self.active = self.active.saturating_sub(1);
        if self.active == 0 {
            out.push(RawEvent::key(codes::BTN_TOUCH, 0));
        }
        out.push(RawEvent::syn());
        out
    }

    pub fn move_to(&mut self, slot: SlotId, x: i32, y: i32) -> Vec<RawEvent> {
        let mut out = Vec::with_capacity(4);
        if self.last_slot != Some(slot) {
            self.last_slot = Some(slot);
            out.push(RawEvent::abs(codes::ABS_MT_SLOT, i32::from(slot.0)));
        }
        out.push(RawEvent::abs(codes::ABS_MT_POSITION_X, x));
        out.push(RawEvent::abs(codes::ABS_MT_POSITION_Y, y));
        out.push(RawEvent::syn());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abs(code: u16, v: i32) -> RawEvent {
        RawEvent::abs(code, v)
    }

    #[test]
    fn first_finger_presses_btn_touch() {
        let mut enc = MtEncoder::new();
        assert_eq!(
            enc.require(SlotId(0), 10, 20),
            vec![
                abs(codes::ABS_MT_SLOT, 0),
                abs(codes::ABS_MT_TRACKING_ID, 0),
                RawEvent::key(codes::BTN_TOUCH, 1),
                abs(codes::ABS_MT_POSITION_X, 10),
                abs(codes::ABS_MT_POSITION_Y, 20),
                RawEvent::syn(),
            ]
        );
        assert_eq!(
            enc.require(SlotId(1), 30, 40),
            vec![
                abs(codes::ABS_MT_SLOT, 1),
                abs(codes::ABS_MT_TRACKING_ID, 1),
                abs(codes::ABS_MT_POSITION_X, 30),
                abs(codes::ABS_MT_POSITION_Y, 40),
                RawEvent::syn(),
            ]
        );
        assert_eq!(enc.active(), 2);
    }

    #[test]
    fn same_slot_move_skips_slot_select() {
        let mut enc = MtEncoder::new();
        enc.require(SlotId(2), 0, 0);
        assert_eq!(
            enc.move_to(SlotId(2), 5, 6),
            vec![
                abs(codes::ABS_MT_POSITION_X, 5),
                abs(codes::ABS_MT_POSITION_Y, 6),
                RawEvent::syn(),
            ]
        );
    }

    #[test]
    fn switching_release_selects_slot_and_lifts_last_finger() {
        let mut enc = MtEncoder::new();
        enc.require(SlotId(0), 0, 0);
        enc.require(SlotId(1), 0, 0);
        assert_eq!(
            enc.release(SlotId(0)),
            vec![
                abs(codes::ABS_MT_SLOT, 0),
                abs(codes::ABS_MT_TRACKING_ID, -1),
                RawEvent::syn(),
            ]
        );
        assert_eq!(enc.last_slot(), Some(SlotId(0)));
        assert_eq!(
            enc.release(SlotId(1)),
            vec![
                abs(codes::ABS_MT_SLOT, 1),
                abs(codes::ABS_MT_TRACKING_ID, -1),
                RawEvent::key(codes::BTN_TOUCH, 0),
                RawEvent::syn(),
            ]
        );
        assert_eq!(enc.active(), 0);
    }

    #[test]
    fn same_slot_release_of_only_finger() {
        let mut enc = MtEncoder::new();
        enc.require(SlotId(3), 1, 1);
        assert_eq!(
            enc.release(SlotId(3)),
            vec![
                abs(codes::ABS_MT_TRACKING_ID, -1),
                RawEvent::key(codes::BTN_TOUCH, 0),
                RawEvent::syn(),
            ]
        );
    }

    #[test]
    fn switching_move_updates_last_slot() {
        let mut enc = MtEncoder::new();
        enc.require(SlotId(0), 0, 0);
        enc.require(SlotId(1), 0, 0);
        let out = enc.move_to(SlotId(0), 7, 8);
        assert_eq!(out[0], abs(codes::ABS_MT_SLOT, 0));
        assert_eq!(enc.last_slot(), Some(SlotId(0)));
    }
}
