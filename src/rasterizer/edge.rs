//! Edge walking
//!
//! Steps one polygon edge a scanline at a time with an integer DDA
//! (Abrash, Graphics Programming Black Book ch. 38). x never goes through
//! a division per line: a whole-pixel advance plus an error term covers
//! every slope class. z and w come from the attribute ramp when selected.

use super::interp::{AttributeRamp, Axis};
use super::types::{Channels, EdgeSample, Vertex4};

/// Slope class of an edge in scanline space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slope {
    /// dx == 0
    Vertical,
    /// |dx| == dy
    Diagonal,
    /// dy > |dx|
    YMajor,
    /// |dx| > dy
    XMajor,
}

/// Iterator over the scanline samples of one edge, top to bottom
///
/// Emits exactly `height - skip_first` samples (none when the edge does not
/// go downward), so consecutive edges of a chain never sample the shared
/// vertex row twice.
#[derive(Debug, Clone)]
pub struct EdgeWalker {
    slope: Slope,
    x: i32,
    y: i32,
    remaining: i32,
    /// +1 or -1
    step: i32,
    /// Whole pixels advanced every line
    major_step: i32,
    error: i32,
    error_advance: i32,
    height: i32,
    ramp: Option<AttributeRamp>,
}

impl EdgeWalker {
    /// Walk from `from` to `to`. `x_bias` is added to both x endpoints
    /// (screen offset, and -1 on right edges).
    pub fn new(from: &Vertex4, to: &Vertex4, x_bias: i32, skip_first: bool, channels: Channels) -> Self {
        let x1 = from.x.to_int() + x_bias;
        let x2 = to.x.to_int() + x_bias;
        let y1 = from.y.to_int();
        let y2 = to.y.to_int();

        let delta_x = x2 - x1;
        let height = y2 - y1;
        let width = delta_x.abs();
        let step = if delta_x > 0 { 1 } else { -1 };
        let skip = skip_first as i32;

        let attrs = channels & (Channels::Z | Channels::W);
        let ramp = if attrs.is_empty() {
            None
        } else {
            Some(AttributeRamp::new(from, to, Axis::Y, attrs))
        };

        if height <= 0 {
            return Self {
                slope: Slope::Vertical,
                x: x1,
                y: y1,
                remaining: 0,
                step,
                major_step: 0,
                error: 0,
                error_advance: 0,
                height: 0,
                ramp,
            };
        }

        let slope = if width == 0 {
            Slope::Vertical
        } else if width == height {
            Slope::Diagonal
        } else if height > width {
            Slope::YMajor
        } else {
            Slope::XMajor
        };

        let (major_step, error_advance) = match slope {
            Slope::Vertical => (0, 0),
            Slope::Diagonal => (step, 0),
            Slope::YMajor => (0, width),
            Slope::XMajor => ((width / height) * step, width % height),
        };

        // Edges heading left round the other way so both sides of a
        // polygon agree on which pixel a fractional crossing belongs to
        let error = if delta_x >= 0 { 0 } else { -height + 1 };

        let mut walker = Self {
            slope,
            x: x1,
            y: y1,
            remaining: height - skip,
            step,
            major_step,
            error,
            error_advance,
            height,
            ramp,
        };
        if skip_first {
            walker.advance();
        }
        walker
    }

    pub fn slope(&self) -> Slope {
        self.slope
    }

    /// Samples left to emit
    pub fn remaining(&self) -> usize {
        self.remaining.max(0) as usize
    }

    fn advance(&mut self) {
        self.x += self.major_step;
        self.error += self.error_advance;
        if self.error > 0 {
            self.x += self.step;
            self.error -= self.height;
        }
        self.y += 1;
    }
}

impl Iterator for EdgeWalker {
    type Item = EdgeSample;

    fn next(&mut self) -> Option<EdgeSample> {
        if self.remaining <= 0 {
            return None;
        }
        self.remaining -= 1;

        let mut sample = EdgeSample { y: self.y, x: self.x, ..Default::default() };
        if let Some(ramp) = &self.ramp {
            let v = ramp.at(self.y);
            sample.z = v.z;
            sample.w = v.w;
        }
        self.advance();
        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining();
        (n, Some(n))
    }
}

impl ExactSizeIterator for EdgeWalker {}
