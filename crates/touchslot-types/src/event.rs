//! Raw kernel input events and the batches the router consumes.
//!
//! The kernel `input_event` record is a `timeval` followed by
//! `type:u16, code:u16, value:i32`. The encoder here writes that layout
//! explicitly with a zeroed timestamp; nothing depends on how the compiler
//! lays out a Rust struct.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Bytes in the kernel `timeval` that prefixes every input event.
pub const KERNEL_TIMEVAL_SIZE: usize = if cfg!(target_pointer_width = "64") {
    16
} else {
    8
};

/// Bytes in one kernel input event record on this target.
pub const KERNEL_EVENT_SIZE: usize = KERNEL_TIMEVAL_SIZE + 8;

/// Linux input event type and code constants used by the engine.
pub mod codes {
    pub const EV_SYN: u16 = 0x00;
    pub const EV_KEY: u16 = 0x01;
    pub const EV_REL: u16 = 0x02;
    pub const EV_ABS: u16 = 0x03;

    pub const SYN_REPORT: u16 = 0x00;

    pub const REL_X: u16 = 0x00;
    pub const REL_Y: u16 = 0x01;
    pub const REL_HWHEEL: u16 = 0x06;
    pub const REL_WHEEL: u16 = 0x08;

    pub const ABS_X: u16 = 0x00;
    pub const ABS_RZ: u16 = 0x05;
    pub const ABS_MT_SLOT: u16 = 0x2f;
    pub const ABS_MT_TOUCH_MAJOR: u16 = 0x30;
    pub const ABS_MT_POSITION_X: u16 = 0x35;
    pub const ABS_MT_POSITION_Y: u16 = 0x36;
    pub const ABS_MT_TRACKING_ID: u16 = 0x39;

    pub const KEY_ESC: u16 = 1;
    pub const KEY_SCROLLLOCK: u16 = 70;
    pub const BTN_LEFT: u16 = 0x110;
    pub const BTN_RIGHT: u16 = 0x111;
    pub const BTN_TASK: u16 = 0x117;
    pub const BTN_TOUCH: u16 = 0x14a;
}

/// One `type/code/value` input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    #[must_use]
    pub const fn new(kind: u16, code: u16, value: i32) -> Self {
        Self { kind, code, value }
    }

    #[must_use]
    pub const fn syn() -> Self {
        Self::new(codes::EV_SYN, codes::SYN_REPORT, 0)
    }

    #[must_use]
    pub const fn abs(code: u16, value: i32) -> Self {
        Self::new(codes::EV_ABS, code, value)
    }

    #[must_use]
    pub const fn key(code: u16, value: i32) -> Self {
        Self::new(codes::EV_KEY, code, value)
    }

    #[must_use]
    pub const fn rel(code: u16, value: i32) -> Self {
        Self::new(codes::EV_REL, code, value)
    }

    #[must_use]
    pub fn is_syn_report(&self) -> bool {
        self.kind == codes::EV_SYN && self.code == codes::SYN_REPORT
    }

    /// Append this event as one kernel record with a zero timestamp.
    pub fn write_kernel_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[0u8; KERNEL_TIMEVAL_SIZE]);
        out.extend_from_slice(&self.kind.to_le_bytes());
        out.extend_from_slice(&self.code.to_le_bytes());
        out.extend_from_slice(&self.value.to_le_bytes());
    }

    /// Decode one kernel record. The timestamp is ignored.
    pub fn from_kernel_bytes(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < KERNEL_EVENT_SIZE {
            return Err(CodecError::Truncated {
                needed: KERNEL_EVENT_SIZE,
                got: buf.len(),
            });
        }
        let t = KERNEL_TIMEVAL_SIZE;
        Ok(Self {
            kind: u16::from_le_bytes([buf[t], buf[t + 1]]),
            code: u16::from_le_bytes([buf[t + 2], buf[t + 3]]),
            value: i32::from_le_bytes([buf[t + 4], buf[t + 5], buf[t + 6], buf[t + 7]]),
        })
    }
}

/// Encode a sequence of events into one contiguous kernel write.
#[must_use]
pub fn encode_kernel_events(events: &[RawEvent]) -> Vec<u8> {
    let mut out = Vec::with_capacity(events.len() * KERNEL_EVENT_SIZE);
    for ev in events {
        ev.write_kernel_bytes(&mut out);
    }
    out
}

/// Decode a buffer holding whole kernel records.
pub fn decode_kernel_events(buf: &[u8]) -> Result<Vec<RawEvent>, CodecError> {
    if buf.len() % KERNEL_EVENT_SIZE != 0 {
        return Err(CodecError::Truncated {
            needed: buf.len().next_multiple_of(KERNEL_EVENT_SIZE),
            got: buf.len(),
        });
    }
    buf.chunks_exact(KERNEL_EVENT_SIZE)
        .map(RawEvent::from_kernel_bytes)
        .collect()
}

/// What kind of physical device produced a batch.
///
/// The discriminants are the relay wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    Mouse = 0,
    Keyboard = 1,
    Gamepad = 2,
    Touch = 3,
    Unknown = 4,
}

impl DeviceKind {
    #[must_use]
    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => Self::Mouse,
            1 => Self::Keyboard,
            2 => Self::Gamepad,
            3 => Self::Touch,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn wire(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Mouse => "mouse",
            Self::Keyboard => "keyboard",
            Self::Gamepad => "gamepad",
            Self::Touch => "touchscreen",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Key transition carried in an `EV_KEY` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    Up,
    Down,
    Repeat,
}

impl KeyState {
    #[must_use]
    pub fn from_value(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            2 => Some(Self::Repeat),
            _ => None,
        }
    }

    #[must_use]
    pub fn value(self) -> i32 {
        match self {
            Self::Up => 0,
            Self::Down => 1,
            Self::Repeat => 2,
        }
    }
}

/// Events from one device up to (not including) a `SYN_REPORT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    pub device: String,
    pub kind: DeviceKind,
    pub events: Vec<RawEvent>,
}

impl EventBatch {
    #[must_use]
    pub fn new(device: impl Into<String>, kind: DeviceKind, events: Vec<RawEvent>) -> Self {
        Self {
            device: device.into(),
            kind,
            events,
        }
    }
}

/// Scroll wheel axis on the virtual mouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WheelAxis {
    Vertical,
    Horizontal,
}

/// An event forwarded to the virtual keyboard/mouse while mapping is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassthroughEvent {
    /// Relative pointer motion.
    MouseMove { dx: i32, dy: i32 },
    /// Wheel ticks.
    Wheel { axis: WheelAxis, delta: i32 },
    /// Key or mouse button, by Linux key code.
    Key { code: u16, state: KeyState },
}

impl PassthroughEvent {
    /// Kernel events for this passthrough, terminated by `SYN_REPORT`.
    #[must_use]
    pub fn to_raw(&self) -> Vec<RawEvent> {
        let mut out = match *self {
            Self::MouseMove { dx, dy } => {
                vec![RawEvent::rel(codes::REL_X, dx), RawEvent::rel(codes::REL_Y, dy)]
            }
            Self::Wheel { axis, delta } => {
                let code = match axis {
                    WheelAxis::Vertical => codes::REL_WHEEL,
                    WheelAxis::Horizontal => codes::REL_HWHEEL,
                };
                vec![RawEvent::rel(code, delta)]
            }
            Self::Key { code, state } => vec![RawEvent::key(code, state.value())],
        };
        out.push(RawEvent::syn());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_record_layout() {
        let mut buf = Vec::new();
        RawEvent::abs(codes::ABS_MT_TRACKING_ID, -1).write_kernel_bytes(&mut buf);
        assert_eq!(buf.len(), KERNEL_EVENT_SIZE);
        assert!(buf[..KERNEL_TIMEVAL_SIZE].iter().all(|b| *b == 0));
        let t = KERNEL_TIMEVAL_SIZE;
        assert_eq!(&buf[t..t + 2], &[0x03, 0x00]);
        assert_eq!(&buf[t + 2..t + 4], &[0x39, 0x00]);
        assert_eq!(&buf[t + 4..t + 8], &[0xff, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn decode_reads_back_a_sequence() {
        let events = [
            RawEvent::abs(codes::ABS_MT_SLOT, 3),
            RawEvent::key(codes::BTN_TOUCH, 1),
            RawEvent::syn(),
        ];
        let bytes = encode_kernel_events(&events);
        assert_eq!(decode_kernel_events(&bytes).unwrap(), events.to_vec());
    }

    #[test]
    fn partial_record_is_rejected() {
        let bytes = encode_kernel_events(&[RawEvent::syn()]);
        let err = decode_kernel_events(&bytes[..KERNEL_EVENT_SIZE - 1]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn passthrough_key_ends_with_syn() {
        let raw = PassthroughEvent::Key {
            code: 30,
            state: KeyState::Down,
        }
        .to_raw();
        assert_eq!(raw, vec![RawEvent::key(30, 1), RawEvent::syn()]);
    }

    #[test]
    fn unknown_wire_kind_degrades() {
        assert_eq!(DeviceKind::from_wire(2), DeviceKind::Gamepad);
        assert_eq!(DeviceKind::from_wire(200), DeviceKind::Unknown);
        assert_eq!(DeviceKind::Touch.wire(), 3);
    }
}
