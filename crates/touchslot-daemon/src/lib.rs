//! Core daemon for touchslot.
//!
//! Maps keyboard, mouse and gamepad input to multitouch on an Android
//! device. Key actions and virtual sticks claim fingers from a fixed slot
//! pool; the chosen backend turns the resulting touch ops into real
//! touches.

pub mod actions;
pub mod allocator;
pub mod config;
pub mod daemon;
pub mod display;
pub mod engine;
pub mod error;
pub mod jitter;
pub mod mapping;
pub mod measure;
pub mod mixer;
pub mod pointer;
pub mod profile;
pub mod router;
pub mod setup;
pub mod state;
pub mod stick;

pub use allocator::Allocator;
pub use config::Settings;
pub use daemon::{Daemon, DaemonEvent};
pub use engine::{Engine, EngineOptions};
pub use error::DaemonError;
pub use mapping::{ActionKind, Mapping, MappingError};
pub use mixer::Mixer;
pub use pointer::PointerBounds;
pub use profile::GamepadProfile;
