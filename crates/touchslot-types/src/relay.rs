//! Remote relay datagram.
//!
//! Layout: `[count:u8][type:u16 code:u16 value:i32]*count[kind:u8][name...]`,
//! all little-endian. The name runs to the end of the datagram.

use crate::error::CodecError;
use crate::event::{DeviceKind, EventBatch, RawEvent};

/// Default UDP port for relayed input.
pub const DEFAULT_RELAY_PORT: u16 = 61069;

/// Device name the sender substitutes for keyboards and mice, so every
/// relayed keyboard/mouse appears as one logical device on the receiver.
pub const RELAYED_KEYBOARD_MOUSE: &str = "rkm";

/// Device name of relayed gamepads, matching the built-in gamepad profile.
pub const RELAYED_GAMEPAD: &str = "rjs";

const EVENT_BYTES: usize = 8;

/// Encode a batch into one datagram.
pub fn encode_datagram(batch: &EventBatch) -> Result<Vec<u8>, CodecError> {
    let count =
        u8::try_from(batch.events.len()).map_err(|_| CodecError::TooManyEvents(batch.events.len()))?;
    let mut out = Vec::with_capacity(2 + batch.events.len() * EVENT_BYTES + batch.device.len());
    out.push(count);
    for ev in &batch.events {
        out.extend_from_slice(&ev.kind.to_le_bytes());
        out.extend_from_slice(&ev.code.to_le_bytes());
        out.extend_from_slice(&ev.value.to_le_bytes());
    }
    out.push(batch.kind.wire());
    out.extend_from_slice(batch.device.as_bytes());
    Ok(out)
}

/// Decode one datagram.
pub fn decode_datagram(buf: &[u8]) -> Result<EventBatch, CodecError> {
    let (&count, rest) = buf.split_first().ok_or(CodecError::Empty)?;
    let body = usize::from(count) * EVENT_BYTES;
    if rest.len() < body + 1 {
        return Err(CodecError::Truncated {
            needed: body + 2,
            got: buf.len(),
        });
    }
    let events = rest[..body]
        .chunks_exact(EVENT_BYTES)
        .map(|c| RawEvent {
            kind: u16::from_le_bytes([c[0], c[1]]),
            code: u16::from_le_bytes([c[2], c[3]]),
            value: i32::from_le_bytes([c[4], c[5], c[6], c[7]]),
        })
        .collect();
    let kind = DeviceKind::from_wire(rest[body]);
    let device = std::str::from_utf8(&rest[body + 1..])
        .map_err(|_| CodecError::InvalidName)?
        .to_string();
    Ok(EventBatch {
        device,
        kind,
        events,
    })
}

/// Name under which a local device is relayed.
#[must_use]
pub fn relayed_name(kind: DeviceKind, name: &str) -> &str {
    match kind {
        DeviceKind::Keyboard | DeviceKind::Mouse => RELAYED_KEYBOARD_MOUSE,
        _ => name,
    }
}
