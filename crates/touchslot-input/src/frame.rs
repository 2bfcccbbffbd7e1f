//! Fixed-size frame encoders for the bridge and HID backends.
//!
//! These backends carry the slot in every frame, so unlike the event-stream
//! backends they keep no per-connection slot state.

use touchslot_types::{from_canonical_u32, Orientation, TouchFrame, TouchOp};

/// Bytes in one accessibility-bridge record.
pub const BRIDGE_RECORD_LEN: usize = 10;

/// Bytes in one HID touch report.
pub const HID_REPORT_LEN: usize = 12;

/// Report header of the serial HID microcontroller.
pub const SERIAL_HEADER: u8 = 0xF4;

/// Report header of the USB gadget HID endpoint.
pub const GADGET_HEADER: u8 = 0x01;

const HID_RELEASE: u8 = 0x00;
const HID_TOUCH: u8 = 0x01;
const HID_RESET_RESOLUTION: u8 = 0x03;

/// Encode a bridge record: `action:u8, slot:u8, x:u32, y:u32`.
///
/// The helper on the other end of the socket rotates by itself, so points
/// are only scaled: by `(height, width)` in the natural and half-turn
/// orientations and by `(width, height)` when sideways. Control ops have no
/// bridge encoding.
pub fn bridge_record(frame: &TouchFrame, orientation: Orientation) -> Option<[u8; BRIDGE_RECORD_LEN]> {
    let screen = frame.screen;
    let (slot, x, y) = match frame.op {
        TouchOp::Require { slot, at } | TouchOp::Move { slot, at } => {
            let (ex, ey) = if orientation.is_sideways() {
                (screen.width, screen.height)
            } else {
                (screen.height, screen.width)
            };
            (slot, from_canonical_u32(at.x, ex), from_canonical_u32(at.y, ey))
        }
        TouchOp::Release { slot } => (slot, 0, 0),
        TouchOp::ResetResolution { .. } => return None,
    };
    let mut out = [0u8; BRIDGE_RECORD_LEN];
    out[0] = frame.op.action() as u8;
    out[1] = slot.0;
    out[2..6].copy_from_slice(&x.to_le_bytes());
    out[6..10].copy_from_slice(&y.to_le_bytes());
    Some(out)
}

/// Encode a HID touch report: `header, action, slot, x:u32, y:u32, 0`.
///
/// Touch coordinates stay canonical after rotation; the microcontroller
/// descriptor declares the same logical range.
pub fn hid_report(header: u8, op: &TouchOp, orientation: Orientation) -> [u8; HID_REPORT_LEN] {
    let (action, slot, x, y) = match *op {
        TouchOp::Require { slot, at } | TouchOp::Move { slot, at } => {
            let p = orientation.rotate(at);
            (HID_TOUCH, slot.0, p.x.unsigned_abs(), p.y.unsigned_abs())
        }
        TouchOp::Release { slot } => (HID_RELEASE, slot.0, 0, 0),
        TouchOp::ResetResolution { width, height } => (HID_RESET_RESOLUTION, 0, width, height),
    };
    let mut out = [0u8; HID_REPORT_LEN];
    out[0] = header;
    out[1] = action;
    out[2] = slot;
    out[3..7].copy_from_slice(&x.to_le_bytes());
    out[7..11].copy_from_slice(&y.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use touchslot_types::{CanonicalPoint, ScreenSize, SlotId, CANONICAL_MAX};

    fn at_half() -> CanonicalPoint {
        CanonicalPoint::new(CANONICAL_MAX / 2, CANONICAL_MAX)
    }

    #[test]
    fn bridge_scales_by_swapped_extents_when_upright() {
        let frame = TouchFrame::new(
            TouchOp::Require {
                slot: SlotId(3),
                at: at_half(),
            },
            ScreenSize::new(2400, 1080),
        );
        let rec = bridge_record(&frame, Orientation::Natural).unwrap();
        assert_eq!(rec[0], 0);
        assert_eq!(rec[1], 3);
        assert_eq!(u32::from_le_bytes([rec[2], rec[3], rec[4], rec[5]]), 539);
        assert_eq!(u32::from_le_bytes([rec[6], rec[7], rec[8], rec[9]]), 2400);

        let rec = bridge_record(&frame, Orientation::Quarter).unwrap();
        assert_eq!(u32::from_le_bytes([rec[2], rec[3], rec[4], rec[5]]), 1199);
        assert_eq!(u32::from_le_bytes([rec[6], rec[7], rec[8], rec[9]]), 1080);
    }

    #[test]
    fn bridge_release_carries_zero_coordinates() {
        let frame = TouchFrame::new(TouchOp::Release { slot: SlotId(1) }, ScreenSize::new(10, 10));
        let rec = bridge_record(&frame, Orientation::Natural).unwrap();
        assert_eq!(rec, [1, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
        let reset = TouchFrame::new(
            TouchOp::ResetResolution {
                width: 1,
                height: 1,
            },
            ScreenSize::new(10, 10),
        );
        assert!(bridge_record(&reset, Orientation::Natural).is_none());
    }

    #[test]
    fn hid_touch_report_is_rotated() {
        let op = TouchOp::Move {
            slot: SlotId(2),
            at: CanonicalPoint::new(0, 0),
        };
        let rep = hid_report(SERIAL_HEADER, &op, Orientation::Quarter);
        assert_eq!(rep[..3], [0xF4, 0x01, 2]);
        assert_eq!(
            u32::from_le_bytes([rep[3], rep[4], rep[5], rep[6]]),
            CANONICAL_MAX.unsigned_abs()
        );
        assert_eq!(u32::from_le_bytes([rep[7], rep[8], rep[9], rep[10]]), 0);
        assert_eq!(rep[11], 0);
    }

    #[test]
    fn hid_release_and_reset() {
        let rel = hid_report(GADGET_HEADER, &TouchOp::Release { slot: SlotId(5) }, Orientation::Half);
        assert_eq!(rel, [0x01, 0x00, 5, 0, 0, 0, 0, 0, 0, 0, 0, 0]);

        let reset = hid_report(
            SERIAL_HEADER,
            &TouchOp::ResetResolution {
                width: 1920,
                height: 1080,
            },
            Orientation::Quarter,
        );
        assert_eq!(reset[1], 0x03);
        assert_eq!(u32::from_le_bytes([reset[3], reset[4], reset[5], reset[6]]), 1920);
        assert_eq!(u32::from_le_bytes([reset[7], reset[8], reset[9], reset[10]]), 1080);
    }
}
