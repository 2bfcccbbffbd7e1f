//! Canonical touch operations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::coord::{CanonicalPoint, ScreenSize};

/// Index of a virtual finger in the slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub u8);

impl SlotId {
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric action codes shared by every frame-based backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TouchAction {
    Require = 0,
    Release = 1,
    Move = 2,
    ResetResolution = 3,
}

/// One canonical touch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TouchOp {
    /// Put a new finger down on a free slot.
    Require { slot: SlotId, at: CanonicalPoint },
    /// Move a finger that is already down.
    Move { slot: SlotId, at: CanonicalPoint },
    /// Lift a finger.
    Release { slot: SlotId },
    /// Tell an external HID bridge the mapping resolution.
    ResetResolution { width: u32, height: u32 },
}

impl TouchOp {
    #[must_use]
    pub fn action(&self) -> TouchAction {
        match self {
            Self::Require { .. } => TouchAction::Require,
            Self::Move { .. } => TouchAction::Move,
            Self::Release { .. } => TouchAction::Release,
            Self::ResetResolution { .. } => TouchAction::ResetResolution,
        }
    }

    #[must_use]
    pub fn slot(&self) -> Option<SlotId> {
        match self {
            Self::Require { slot, .. } | Self::Move { slot, .. } | Self::Release { slot } => {
                Some(*slot)
            }
            Self::ResetResolution { .. } => None,
        }
    }
}

/// A touch op together with the mapping screen that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchFrame {
    pub op: TouchOp,
    pub screen: ScreenSize,
}

impl TouchFrame {
    #[must_use]
    pub fn new(op: TouchOp, screen: ScreenSize) -> Self {
        Self { op, screen }
    }
}
