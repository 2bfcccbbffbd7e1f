//! Display orientation and the quarter-turn rotation applied by backends.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::coord::{CanonicalPoint, CANONICAL_MAX};

/// Rotation state of the device display, in quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Orientation {
    /// 0 degrees.
    #[default]
    Natural,
    /// 90 degrees.
    Quarter,
    /// 180 degrees.
    Half,
    /// 270 degrees.
    ThreeQuarter,
}

impl Orientation {
    /// Parse the 0..=3 index used by Android and on the wire.
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Natural),
            1 => Some(Self::Quarter),
            2 => Some(Self::Half),
            3 => Some(Self::ThreeQuarter),
            _ => None,
        }
    }

    #[must_use]
    pub fn index(self) -> u8 {
        match self {
            Self::Natural => 0,
            Self::Quarter => 1,
            Self::Half => 2,
            Self::ThreeQuarter => 3,
        }
    }

    /// Whether the display's long axis is swapped relative to the panel.
    #[must_use]
    pub fn is_sideways(self) -> bool {
        matches!(self, Self::Quarter | Self::ThreeQuarter)
    }

    /// Rotate a canonical point from the display frame into the panel frame.
    #[must_use]
    pub fn rotate(self, p: CanonicalPoint) -> CanonicalPoint {
        match self {
            Self::Natural => p,
            Self::Quarter => CanonicalPoint::new(CANONICAL_MAX - p.y, p.x),
            Self::Half => CanonicalPoint::new(CANONICAL_MAX - p.x, CANONICAL_MAX - p.y),
            Self::ThreeQuarter => CanonicalPoint::new(p.y, CANONICAL_MAX - p.x),
        }
    }
}

impl TryFrom<u8> for Orientation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_index(value).ok_or_else(|| format!("orientation must be 0..=3, got {value}"))
    }
}

impl From<Orientation> for u8 {
    fn from(o: Orientation) -> Self {
        o.index()
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

/// Process-wide orientation shared between the poller, the overlay and every
/// backend. Reads and writes are single atomic operations.
#[derive(Debug, Clone, Default)]
pub struct OrientationCell(Arc<AtomicU8>);

impl OrientationCell {
    #[must_use]
    pub fn new(initial: Orientation) -> Self {
        Self(Arc::new(AtomicU8::new(initial.index())))
    }

    #[must_use]
    pub fn get(&self) -> Orientation {
        Orientation::from_index(self.0.load(Ordering::Relaxed)).unwrap_or_default()
    }

    /// Store a new orientation, returning the previous one.
    pub fn set(&self, orientation: Orientation) -> Orientation {
        Orientation::from_index(self.0.swap(orientation.index(), Ordering::Relaxed))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_quarter_turns_are_identity() {
        let points = [
            CanonicalPoint::new(0, 0),
            CanonicalPoint::new(12_345, 987_654_321),
            CanonicalPoint::new(CANONICAL_MAX, 1),
            CanonicalPoint::new(CANONICAL_MAX, CANONICAL_MAX),
        ];
        for p in points {
            let mut q = p;
            for _ in 0..4 {
                q = Orientation::Quarter.rotate(q);
            }
            assert_eq!(q, p);
        }
    }

    #[test]
    fn quarter_turn_moves_origin_along_the_top_edge() {
        let once = Orientation::Quarter.rotate(CanonicalPoint::new(0, 0));
        assert_eq!(once, CanonicalPoint::new(CANONICAL_MAX, 0));
        let twice = Orientation::Quarter.rotate(once);
        assert_eq!(twice, CanonicalPoint::new(CANONICAL_MAX, CANONICAL_MAX));
        assert_eq!(Orientation::Half.rotate(CanonicalPoint::new(0, 0)), twice);
    }

    #[test]
    fn three_quarter_is_quarter_cubed() {
        let p = CanonicalPoint::new(100, 200);
        let cubed = Orientation::Quarter.rotate(Orientation::Quarter.rotate(Orientation::Quarter.rotate(p)));
        assert_eq!(Orientation::ThreeQuarter.rotate(p), cubed);
    }

    #[test]
    fn cell_is_shared_between_clones() {
        let cell = OrientationCell::new(Orientation::Natural);
        let other = cell.clone();
        assert_eq!(other.set(Orientation::ThreeQuarter), Orientation::Natural);
        assert_eq!(cell.get(), Orientation::ThreeQuarter);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        assert!(Orientation::from_index(4).is_none());
        assert!(serde_json::from_str::<Orientation>("7").is_err());
        assert_eq!(serde_json::from_str::<Orientation>("2").unwrap(), Orientation::Half);
    }
}
