//! Small random offsets so repeated touches never land on the same pixel.

use rand::Rng;
use touchslot_types::PixelPoint;

/// Offsets are drawn uniformly from `[-JITTER_PX, JITTER_PX)`.
pub const JITTER_PX: i32 = 10;

#[derive(Debug, Clone, Copy)]
pub struct Jitter {
    enabled: bool,
}

impl Default for Jitter {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Jitter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// No jitter at all; positions come out exactly as mapped.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn offset(self) -> i32 {
        if self.enabled {
            rand::thread_rng().gen_range(-JITTER_PX..JITTER_PX)
        } else {
            0
        }
    }

    pub fn apply(self, p: PixelPoint) -> PixelPoint {
        p.offset(self.offset(), self.offset())
    }
}
