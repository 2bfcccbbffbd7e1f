//! Shared types for touchslot.
//!
//! This crate contains everything shared across the touchslot workspace:
//! the canonical coordinate space and orientation rotation, touch ops,
//! raw kernel input events with their byte codec, the remote relay
//! datagram, the pointer overlay frame and the key-name table.

pub mod coord;
pub mod error;
pub mod event;
pub mod keys;
pub mod orientation;
pub mod overlay;
pub mod relay;
pub mod touch;

pub use coord::{from_canonical_u32, CanonicalPoint, PixelPoint, ScreenSize, CANONICAL_MAX};
pub use error::CodecError;
pub use event::{
    codes, DeviceKind, EventBatch, KeyState, PassthroughEvent, RawEvent, WheelAxis,
    KERNEL_EVENT_SIZE,
};
pub use orientation::{Orientation, OrientationCell};
pub use overlay::PointerFrame;
pub use touch::{SlotId, TouchAction, TouchFrame, TouchOp};
