//! HID touch output: a serial-attached microcontroller or the USB gadget
//! endpoint of this device.
//!
//! Both drive a host that cannot report its display orientation back, so
//! the orientation cell is pinned to the configured rotation.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serialport::SerialPort;
use touchslot_types::{OrientationCell, TouchFrame, TouchOp};
use tracing::{debug, info};

use crate::error::InputError;
use crate::frame::{hid_report, GADGET_HEADER, SERIAL_HEADER};
use crate::TouchSink;

/// Default serial baud rate of the HID microcontroller.
pub const DEFAULT_BAUD: u32 = 2_000_000;

/// Default USB gadget HID endpoint.
pub const DEFAULT_GADGET_PATH: &str = "/dev/hidg0";

pub struct HidSink<W> {
    writer: W,
    header: u8,
    orientation: OrientationCell,
    accepts_reset: bool,
}

impl<W: Write + Send + 'static> HidSink<W> {
    pub fn new(writer: W, header: u8, orientation: OrientationCell, accepts_reset: bool) -> Self {
        Self {
            writer,
            header,
            orientation,
            accepts_reset,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }
}

impl HidSink<Box<dyn SerialPort>> {
    /// Open the serial link to the HID microcontroller.
    pub fn serial(path: &str, baud: u32, orientation: OrientationCell) -> Result<Self, InputError> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| InputError::DeviceOpen(format!("{path}: {e}")))?;
        info!(path, baud, rotation = %orientation.get(), "opened serial HID bridge");
        Ok(Self::new(port, SERIAL_HEADER, orientation, true))
    }
}

impl HidSink<File> {
    /// Open the USB gadget HID endpoint.
    pub fn gadget(path: &Path, orientation: OrientationCell) -> Result<Self, InputError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| InputError::DeviceOpen(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), rotation = %orientation.get(), "opened USB gadget HID endpoint");
        Ok(Self::new(file, GADGET_HEADER, orientation, false))
    }
}

#[async_trait]
impl<W: Write + Send + 'static> TouchSink for HidSink<W> {
    async fn apply(&mut self, frame: &TouchFrame) -> Result<(), InputError> {
        if matches!(frame.op, TouchOp::ResetResolution { .. }) && !self.accepts_reset {
            return Ok(());
        }
        let report = hid_report(self.header, &frame.op, self.orientation.get());
        self.writer
            .write_all(&report)
            .map_err(|e| InputError::Write(e.to_string()))?;
        debug!(op = ?frame.op, "wrote HID report");
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), InputError> {
        self.writer
            .flush()
            .map_err(|e| InputError::Write(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use touchslot_types::{CanonicalPoint, Orientation, ScreenSize, SlotId};

    fn reset() -> TouchFrame {
        TouchFrame::new(
            TouchOp::ResetResolution {
                width: 1280,
                height: 720,
            },
            ScreenSize::new(1280, 720),
        )
    }

    #[tokio::test]
    async fn serial_forwards_resolution_reset() {
        let mut sink = HidSink::new(Vec::new(), SERIAL_HEADER, OrientationCell::default(), true);
        sink.apply(&reset()).await.unwrap();
        assert_eq!(sink.writer().len(), 12);
        assert_eq!(sink.writer()[1], 0x03);
    }

    #[tokio::test]
    async fn gadget_ignores_resolution_reset() {
        let mut sink = HidSink::new(Vec::new(), GADGET_HEADER, OrientationCell::default(), false);
        sink.apply(&reset()).await.unwrap();
        assert!(sink.writer().is_empty());

        let touch = TouchFrame::new(
            TouchOp::Require {
                slot: SlotId(0),
                at: CanonicalPoint::new(5, 9),
            },
            ScreenSize::new(1280, 720),
        );
        sink.apply(&touch).await.unwrap();
        assert_eq!(sink.writer()[0], GADGET_HEADER);
    }

    #[tokio::test]
    async fn pinned_rotation_applies_to_every_report() {
        let cell = OrientationCell::new(Orientation::Half);
        let mut sink = HidSink::new(Vec::new(), SERIAL_HEADER, cell, true);
        let touch = TouchFrame::new(
            TouchOp::Move {
                slot: SlotId(1),
                at: CanonicalPoint::new(0, 0),
            },
            ScreenSize::new(1280, 720),
        );
        sink.apply(&touch).await.unwrap();
        let w = sink.writer();
        assert_eq!(u32::from_le_bytes([w[3], w[4], w[5], w[6]]), 0x7fff_fffe);
    }
}
