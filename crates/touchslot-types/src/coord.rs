//! Canonical coordinate space and screen geometry.
//!
//! Every touch position inside the engine lives in a fixed-point space
//! `[0, CANONICAL_MAX]` per axis. Pixel and device ranges are applied only
//! at the edges: mapping pixels on the way in, backend resolution on the
//! way out.

use serde::{Deserialize, Serialize};

/// Upper bound of the canonical coordinate space (inclusive).
pub const CANONICAL_MAX: i32 = 0x7fff_fffe;

/// Pixel size of a screen or display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Scale a pixel point on this screen into canonical space.
    #[must_use]
    pub fn to_canonical(&self, p: PixelPoint) -> CanonicalPoint {
        CanonicalPoint {
            x: to_canonical(p.x, self.width),
            y: to_canonical(p.y, self.height),
        }
    }

    /// Pixel point at the given fraction of this screen (truncated).
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn fraction(&self, fx: f64, fy: f64) -> PixelPoint {
        PixelPoint {
            x: (fx * f64::from(self.width)) as i32,
            y: (fy * f64::from(self.height)) as i32,
        }
    }
}

/// A position in mapping pixels. May be slightly outside the screen after
/// jitter is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    #[must_use]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

/// A position in canonical space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CanonicalPoint {
    pub x: i32,
    pub y: i32,
}

impl CanonicalPoint {
    #[must_use]
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Scale into a device range `[0, max_x] x [0, max_y]`.
    #[must_use]
    pub fn to_device(self, max_x: i32, max_y: i32) -> (i32, i32) {
        (from_canonical(self.x, max_x), from_canonical(self.y, max_y))
    }

    /// Whether both axes are inside `[0, CANONICAL_MAX]`.
    #[must_use]
    pub fn in_range(self) -> bool {
        (0..=CANONICAL_MAX).contains(&self.x) && (0..=CANONICAL_MAX).contains(&self.y)
    }
}

/// `value * CANONICAL_MAX / extent`, clamped into the canonical range.
///
/// A zero extent maps everything to 0.
#[must_use]
pub fn to_canonical(value: i32, extent: u32) -> i32 {
    if extent == 0 {
        return 0;
    }
    let scaled = i64::from(value) * i64::from(CANONICAL_MAX) / i64::from(extent);
    clamp_canonical(scaled)
}

/// `value * extent / CANONICAL_MAX`.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn from_canonical(value: i32, extent: i32) -> i32 {
    (i64::from(value) * i64::from(extent) / i64::from(CANONICAL_MAX)) as i32
}

/// `value * extent / CANONICAL_MAX` for unsigned wire fields. Negative
/// inputs encode as 0.
#[must_use]
pub fn from_canonical_u32(value: i32, extent: u32) -> u32 {
    let scaled = i64::from(value) * i64::from(extent) / i64::from(CANONICAL_MAX);
    u32::try_from(scaled).unwrap_or(0)
}

/// Clamp a wide intermediate into `[0, CANONICAL_MAX]`.
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn clamp_canonical(value: i64) -> i32 {
    value.clamp(0, i64::from(CANONICAL_MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_edges_map_to_canonical_edges() {
        let screen = ScreenSize::new(1920, 1080);
        assert_eq!(
            screen.to_canonical(PixelPoint::new(0, 0)),
            CanonicalPoint::new(0, 0)
        );
        assert_eq!(
            screen.to_canonical(PixelPoint::new(1920, 1080)),
            CanonicalPoint::new(CANONICAL_MAX, CANONICAL_MAX)
        );
    }

    #[test]
    fn jitter_past_the_edge_is_clamped() {
        let screen = ScreenSize::new(1000, 1000);
        let p = screen.to_canonical(PixelPoint::new(-7, 1009));
        assert_eq!(p, CanonicalPoint::new(0, CANONICAL_MAX));
    }

    #[test]
    fn device_scaling_is_proportional() {
        let half = CanonicalPoint::new(CANONICAL_MAX / 2, CANONICAL_MAX);
        assert_eq!(half.to_device(1080, 2400), (539, 2400));
        assert_eq!(half.to_device(CANONICAL_MAX, CANONICAL_MAX), (CANONICAL_MAX / 2, CANONICAL_MAX));
    }

    #[test]
    fn fraction_truncates_like_mapping_positions() {
        let screen = ScreenSize::new(3200, 1440);
        assert_eq!(screen.fraction(0.52, 0.5), PixelPoint::new(1664, 720));
    }

    #[test]
    fn unsigned_wire_scaling() {
        assert_eq!(from_canonical_u32(CANONICAL_MAX, 2400), 2400);
        assert_eq!(from_canonical_u32(-5, 2400), 0);
    }

    #[test]
    fn zero_extent_does_not_divide() {
        assert_eq!(to_canonical(100, 0), 0);
    }
}
