//! Pointer overlay datagrams.
//!
//! Outbound frames are ASCII `x,y,visible,down,orientation`. The overlay
//! process reports the display orientation back as a single byte.

use std::fmt;

use crate::error::CodecError;
use crate::orientation::Orientation;

/// Default UDP port of the overlay display process.
pub const DEFAULT_OVERLAY_PORT: u16 = 6533;

/// Cursor state pushed to the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerFrame {
    pub x: i32,
    pub y: i32,
    pub visible: bool,
    pub down: bool,
    pub orientation: Orientation,
}

impl PointerFrame {
    /// A frame that hides the cursor.
    #[must_use]
    pub fn hidden(orientation: Orientation) -> Self {
        Self {
            x: 0,
            y: 0,
            visible: false,
            down: false,
            orientation,
        }
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for PointerFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.x,
            self.y,
            u8::from(self.visible),
            u8::from(self.down),
            self.orientation.index()
        )
    }
}

/// Parse an orientation report from the overlay.
pub fn parse_orientation_report(buf: &[u8]) -> Result<Orientation, CodecError> {
    let first = *buf.first().ok_or(CodecError::Empty)?;
    Orientation::from_index(first)
        .ok_or_else(|| CodecError::Overlay(format!("orientation byte {first} out of range")))
}
