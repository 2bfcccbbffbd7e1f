//! Event-stream touch output.
//!
//! Shared by the uinput touchscreen and the direct write to a real
//! touchscreen node: rotate by the current orientation, scale into the
//! device's axis range, encode through [`MtEncoder`] and write the kernel
//! records in one call.

use std::io::Write;

use async_trait::async_trait;
use touchslot_types::event::encode_kernel_events;
use touchslot_types::{OrientationCell, TouchFrame, TouchOp};
use tracing::debug;

use crate::error::InputError;
use crate::mt::MtEncoder;
use crate::TouchSink;

pub struct StreamSink<W> {
    writer: W,
    encoder: MtEncoder,
    orientation: OrientationCell,
    max_x: i32,
    max_y: i32,
}

impl<W: Write + Send + 'static> StreamSink<W> {
    /// `max_x`/`max_y` are the device's `ABS_MT_POSITION_*` maxima.
    pub fn new(writer: W, orientation: OrientationCell, max_x: i32, max_y: i32) -> Self {
        Self {
            writer,
            encoder: MtEncoder::new(),
            orientation,
            max_x,
            max_y,
        }
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    fn encode(&mut self, op: &TouchOp) -> Vec<u8> {
        let orientation = self.orientation.get();
        let events = match *op {
            TouchOp::Require { slot, at } => {
                let (x, y) = orientation.rotate(at).to_device(self.max_x, self.max_y);
                self.encoder.require(slot, x, y)
            }
            TouchOp::Move { slot, at } => {
                let (x, y) = orientation.rotate(at).to_device(self.max_x, self.max_y);
                self.encoder.move_to(slot, x, y)
            }
            TouchOp::Release { slot } => self.encoder.release(slot),
            TouchOp::ResetResolution { .. } => return Vec::new(),
        };
        encode_kernel_events(&events)
    }
}

#[async_trait]
impl<W: Write + Send + 'static> TouchSink for StreamSink<W> {
    async fn apply(&mut self, frame: &TouchFrame) -> Result<(), InputError> {
        let bytes = self.encode(&frame.op);
        if bytes.is_empty() {
            return Ok(());
        }
        self.writer
            .write_all(&bytes)
            .map_err(|e| InputError::Write(e.to_string()))?;
        debug!(op = ?frame.op, bytes = bytes.len(), "wrote touch events");
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
    use touchslot_types::event::decode_kernel_events;
    use touchslot_types::{
        codes, CanonicalPoint, Orientation, RawEvent, ScreenSize, SlotId, CANONICAL_MAX,
    };

    fn frame(op: TouchOp) -> TouchFrame {
        TouchFrame::new(op, ScreenSize::new(1920, 1080))
    }

    #[tokio::test]
    async fn require_is_rotated_then_scaled() {
        let cell = OrientationCell::new(Orientation::Quarter);
        let mut sink = StreamSink::new(Vec::new(), cell, 1080, 2400);
        sink.apply(&frame(TouchOp::Require {
            slot: SlotId(0),
            at: CanonicalPoint::new(0, 0),
        }))
        .await
        .unwrap();

        let events = decode_kernel_events(sink.writer()).unwrap();
        assert!(events.contains(&RawEvent::abs(codes::ABS_MT_POSITION_X, 1080)));
        assert!(events.contains(&RawEvent::abs(codes::ABS_MT_POSITION_Y, 0)));
    }

    #[tokio::test]
    async fn canonical_device_range_is_identity() {
        let cell = OrientationCell::new(Orientation::Natural);
        let mut sink = StreamSink::new(Vec::new(), cell, CANONICAL_MAX, CANONICAL_MAX);
        let at = CanonicalPoint::new(123_456, 654_321);
        sink.apply(&frame(TouchOp::Require { slot: SlotId(4), at }))
            .await
            .unwrap();
        let events = decode_kernel_events(sink.writer()).unwrap();
        assert_eq!(events[3], RawEvent::abs(codes::ABS_MT_POSITION_X, 123_456));
        assert_eq!(events[4], RawEvent::abs(codes::ABS_MT_POSITION_Y, 654_321));
    }

    #[tokio::test]
    async fn reset_resolution_writes_nothing() {
        let mut sink = StreamSink::new(Vec::new(), OrientationCell::default(), 100, 100);
        sink.apply(&frame(TouchOp::ResetResolution {
            width: 1920,
            height: 1080,
        }))
        .await
        .unwrap();
        assert!(sink.writer().is_empty());
    }
}
