//! Touch output backends, input capture and passthrough emulation.
//!
//! This crate defines the three seams the engine talks through:
//!
//! - [`TouchSink`]: consumes canonical [`TouchFrame`]s and turns them into
//!   physical touch output (uinput, accessibility bridge, serial HID, USB
//!   gadget, or a raw write to the real touchscreen).
//! - [`InputCapture`]: produces [`EventBatch`]es from physical or relayed
//!   input devices.
//! - [`InputEmulation`]: replays keyboard/mouse passthrough on a virtual
//!   device while mapping is off.
//!
//! The Linux backends live behind the `linux` feature. The `mock` feature
//! provides recording backends for tests.

use async_trait::async_trait;
use tokio::sync::mpsc;
use touchslot_types::{EventBatch, PassthroughEvent, TouchFrame};

pub mod bridge;
pub mod error;
pub mod frame;
pub mod hid;
pub mod merge;
pub mod mt;
pub mod probe;
pub mod relay;
pub mod stream;

#[cfg(feature = "linux")]
pub mod linux;

#[cfg(feature = "mock")]
pub mod mock;

pub use error::InputError;

/// Turns canonical touch ops into physical touch output.
#[async_trait]
pub trait TouchSink: Send + 'static {
    /// Encode and write one touch frame.
    async fn apply(&mut self, frame: &TouchFrame) -> Result<(), InputError>;

    /// Release the output device.
    async fn shutdown(&mut self) -> Result<(), InputError>;
}

/// Captures input devices and forwards their SYN-delimited batches.
#[async_trait]
pub trait InputCapture: Send + 'static {
    /// Start capturing, sending batches to `tx`.
    async fn start(&mut self, tx: mpsc::Sender<EventBatch>) -> Result<(), InputError>;

    /// Stop all readers and release grabbed devices.
    async fn shutdown(&mut self) -> Result<(), InputError>;
}

/// Replays keyboard and mouse passthrough on a virtual device.
#[async_trait]
pub trait InputEmulation: Send + 'static {
    /// Emit one passthrough event followed by a sync report.
    async fn emit(&mut self, event: PassthroughEvent) -> Result<(), InputError>;

    /// Destroy the virtual device.
    async fn shutdown(&mut self) -> Result<(), InputError>;
}
