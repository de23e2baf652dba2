//! Affine attribute interpolation
//!
//! Shared by the edge walker (stepping in y) and the span fill (stepping
//! in x). For every selected lane:
//!
//! ```text
//! delta = ((v2 - v1) << MEXP) / (p2 - p1)      truncating
//! frac  = (at << MEXP) - p1 + ROUND_BIAS
//! value = v1 + (delta * frac) >> MEXP
//! ```
//!
//! This is plain affine interpolation in screen space, no perspective
//! correction.

use super::fixed::{Fixed, MAGIC, MEXP};
use super::types::{Channels, Vertex4};

/// Samples are taken at pixel centres
pub const ROUND_BIAS: i32 = MAGIC / 2;

/// Substituted for a zero axis delta
pub const MIN_NONZERO: i32 = 1;

/// Axis the interpolation parameter runs along
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    fn of(self, v: &Vertex4) -> Fixed {
        match self {
            Axis::X => v.x,
            Axis::Y => v.y,
        }
    }
}

/// Precomputed per-lane slopes between two vertices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeRamp {
    origin: Fixed,
    base: [Fixed; 4],
    delta: [Fixed; 4],
    channels: Channels,
}

impl AttributeRamp {
    pub fn new(p1: &Vertex4, p2: &Vertex4, axis: Axis, channels: Channels) -> Self {
        let origin = axis.of(p1);
        let mut denominator = (axis.of(p2) - origin).raw() as i64;
        if denominator == 0 {
            denominator = MIN_NONZERO as i64;
        }

        let base = p1.lanes();
        let end = p2.lanes();
        let mut delta = [Fixed::ZERO; 4];
        for lane in 0..4 {
            if channels.has_lane(lane) {
                let span = end[lane].raw() as i64 - base[lane].raw() as i64;
                delta[lane] = Fixed::from_i64_saturating((span << MEXP) / denominator);
            }
        }

        Self { origin, base, delta, channels }
    }

    /// Distance from the first vertex to the centre of pixel `at`
    fn frac(&self, at: i32) -> i64 {
        ((at as i64) << MEXP) - self.origin.raw() as i64 + ROUND_BIAS as i64
    }

    /// Attribute values at integer position `at` along the axis
    pub fn at(&self, at: i32) -> Vertex4 {
        let frac = self.frac(at);
        let mut out = self.base;
        for lane in 0..4 {
            if self.channels.has_lane(lane) {
                let step = (self.delta[lane].raw() as i64 * frac) >> MEXP;
                out[lane] = Fixed::from_i64_saturating(self.base[lane].raw() as i64 + step);
            }
        }
        Vertex4::from_lanes(out)
    }

    /// Per-pixel increment; unselected lanes are zero
    pub fn delta(&self) -> Vertex4 {
        Vertex4::from_lanes(self.delta)
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }
}

/// Value at `at` and the per-unit increment between `p1` and `p2`.
/// Unselected lanes keep p1's value with a zero delta.
pub fn interpolate(
    p1: &Vertex4,
    p2: &Vertex4,
    axis: Axis,
    at: i32,
    channels: Channels,
) -> (Vertex4, Vertex4) {
    let ramp = AttributeRamp::new(p1, p2, axis, channels);
    (ramp.at(at), ramp.delta())
}
