//! Core types for the rasterizer

use std::collections::TryReserveError;
use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::fixed::Fixed;

/// Maximum number of vertices in one face
pub const MAX_FACE_VERTICES: usize = 10;

/// A screen-space vertex with four 22.10 lanes
///
/// `x`/`y` are pixel coordinates, `z` is depth (smaller is nearer) and `w`
/// carries the shade offset into the face's gradient band, in palette steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vertex4 {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub w: Fixed,
}

impl Vertex4 {
    pub fn new(x: Fixed, y: Fixed, z: Fixed, w: Fixed) -> Self {
        Self { x, y, z, w }
    }

    /// Build from integer coordinates
    pub fn from_ints(x: i32, y: i32, z: i32, w: i32) -> Self {
        Self {
            x: Fixed::from_int(x),
            y: Fixed::from_int(y),
            z: Fixed::from_int(z),
            w: Fixed::from_int(w),
        }
    }

    /// Lanes in mask order (x, y, z, w)
    pub fn lanes(&self) -> [Fixed; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn from_lanes(l: [Fixed; 4]) -> Self {
        Self { x: l[0], y: l[1], z: l[2], w: l[3] }
    }
}

bitflags! {
    /// Vertex lanes selected for interpolation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Channels: u8 {
        const X = 0x1;
        const Y = 0x2;
        const Z = 0x4;
        const W = 0x8;
    }
}

impl Channels {
    /// Whether lane `i` (0 = x .. 3 = w) is selected
    pub fn has_lane(self, i: usize) -> bool {
        i < 4 && self.bits() & (1 << i) != 0
    }
}

/// A polygon face (indices into a vertex array)
#[derive(Debug, Clone, Copy)]
pub struct Face {
    pub indices: [usize; MAX_FACE_VERTICES],
    pub size: usize,
    pub normal: [Fixed; 3],
    pub max_z: Fixed,
    /// Gradient band id used for shading
    pub gradient: usize,
    pub transparent: bool,
}

impl Face {
    /// Create a face from a vertex loop. Indices past MAX_FACE_VERTICES are ignored.
    pub fn new(loop_indices: &[usize]) -> Self {
        let size = loop_indices.len().min(MAX_FACE_VERTICES);
        let mut indices = [0; MAX_FACE_VERTICES];
        indices[..size].copy_from_slice(&loop_indices[..size]);
        Self {
            indices,
            size,
            normal: [Fixed::ZERO; 3],
            max_z: Fixed::ZERO,
            gradient: 0,
            transparent: false,
        }
    }

    pub fn with_gradient(mut self, gradient: usize) -> Self {
        self.gradient = gradient;
        self
    }

    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices[..self.size]
    }
}

/// Inclusive integer clip rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl Window {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Window covering a whole `width` x `height` surface
    pub fn screen(width: usize, height: usize) -> Self {
        Self::new(0, 0, width as i32 - 1, height as i32 - 1)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }

    /// Intersection of two windows (may come out empty)
    pub fn intersect(&self, other: &Window) -> Window {
        Window {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x0 > self.x1 || self.y0 > self.y1
    }
}

/// One per-scanline sample produced by an edge walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeSample {
    pub y: i32,
    pub x: i32,
    pub z: Fixed,
    pub w: Fixed,
}

/// Inclusive pixel run on one scanline
///
/// `x_start..=x_end` is already clipped; `left`/`right` are the unclipped
/// edge samples the run was built from, kept for attribute interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub y: i32,
    pub x_start: i32,
    pub x_end: i32,
    pub left: EdgeSample,
    pub right: EdgeSample,
}

impl Span {
    pub fn width(&self) -> i32 {
        self.x_end - self.x_start + 1
    }

    /// Interpolation endpoints across the run. The right endpoint sits one
    /// past the last pixel, so the axis delta is never zero.
    pub fn endpoints(&self) -> (Vertex4, Vertex4) {
        let y = Fixed::from_int(self.y);
        (
            Vertex4::new(Fixed::from_int(self.left.x), y, self.left.z, self.left.w),
            Vertex4::new(Fixed::from_int(self.right.x + 1), y, self.right.z, self.right.w),
        )
    }
}

/// Spans of one polygon, top to bottom
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanList {
    pub y_start: i32,
    pub spans: Vec<Span>,
}

impl SpanList {
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Span> {
        self.spans.iter()
    }
}

/// Contiguous palette range used to shade one class of surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradientBand {
    pub first: u8,
    pub last: u8,
}

impl GradientBand {
    pub fn new(first: u8, last: u8) -> Self {
        Self { first, last }
    }

    pub fn color_count(&self) -> i32 {
        self.last as i32 - self.first as i32 + 1
    }

    pub fn contains(&self, index: u8) -> bool {
        index >= self.first && index <= self.last
    }
}

/// All gradient bands plus the band used behind see-through faces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradientTable {
    pub bands: Vec<GradientBand>,
    /// Band used when a transparent face covers background (index 0)
    pub tube: GradientBand,
}

impl GradientTable {
    pub fn new(bands: Vec<GradientBand>, tube: GradientBand) -> Self {
        Self { bands, tube }
    }

    pub fn get(&self, id: usize) -> Option<GradientBand> {
        self.bands.get(id).copied()
    }

    /// Band containing `index`. Every band is checked and the last match
    /// wins, so overlapping bands resolve to the later entry.
    pub fn band_containing(&self, index: u8) -> Option<GradientBand> {
        let mut found = None;
        for band in &self.bands {
            if band.contains(index) {
                found = Some(*band);
            }
        }
        found
    }
}

/// 2x2 ordered-dither thresholds indexed by `[x & 1][y & 1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DitherMatrix(pub [[i32; 2]; 2]);

impl DitherMatrix {
    pub const BAYER: DitherMatrix = DitherMatrix([[0, 2], [3, 1]]);

    pub fn threshold(&self, x: i32, y: i32) -> i32 {
        self.0[(x & 1) as usize][(y & 1) as usize]
    }
}

impl Default for DitherMatrix {
    fn default() -> Self {
        Self::BAYER
    }
}

/// Per-face pixel write policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// Constant color, no depth test
    Flat { color: u8 },
    /// Constant color, written only where nearer than the z-buffer
    DepthTested { color: u8 },
    /// Dithered shade from the face's gradient band
    Shaded { depth_test: bool },
    /// Brighten whatever is underneath by one step within its band
    Transparent,
}

impl FillPolicy {
    /// Policy a face asks for through its own flags
    pub fn for_face(face: &Face, depth_test: bool) -> Self {
        if face.transparent {
            FillPolicy::Transparent
        } else {
            FillPolicy::Shaded { depth_test }
        }
    }

    /// Lanes the span fill needs interpolated
    pub fn channels(&self) -> Channels {
        match self {
            FillPolicy::Flat { .. } | FillPolicy::Transparent => Channels::empty(),
            FillPolicy::DepthTested { .. } => Channels::Z,
            FillPolicy::Shaded { depth_test: true } => Channels::Z | Channels::W,
            FillPolicy::Shaded { depth_test: false } => Channels::W,
        }
    }
}

/// Error type for rasterizer operations
#[derive(Debug)]
pub enum RasterError {
    /// The transient span list could not be allocated; skip the face
    SpanAlloc(TryReserveError),
    /// Writing a screenshot failed
    Image(image::ImageError),
}

impl From<TryReserveError> for RasterError {
    fn from(e: TryReserveError) -> Self {
        RasterError::SpanAlloc(e)
    }
}

impl From<image::ImageError> for RasterError {
    fn from(e: image::ImageError) -> Self {
        RasterError::Image(e)
    }
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterError::SpanAlloc(e) => write!(f, "Span list allocation failed: {}", e),
            RasterError::Image(e) => write!(f, "Image error: {}", e),
        }
    }
}

impl std::error::Error for RasterError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_containing_last_match_wins() {
        let table = GradientTable::new(
            vec![GradientBand::new(16, 31), GradientBand::new(24, 40)],
            GradientBand::new(200, 215),
        );
        assert_eq!(table.band_containing(20), Some(GradientBand::new(16, 31)));
        assert_eq!(table.band_containing(28), Some(GradientBand::new(24, 40)));
        assert_eq!(table.band_containing(100), None);
    }

    #[test]
    fn test_face_truncates_loop() {
        let idx: Vec<usize> = (0..14).collect();
        let face = Face::new(&idx);
        assert_eq!(face.size, MAX_FACE_VERTICES);
        assert_eq!(face.indices(), &idx[..MAX_FACE_VERTICES]);
    }

    #[test]
    fn test_channels_lanes() {
        let c = Channels::Z | Channels::W;
        assert!(!c.has_lane(0));
        assert!(!c.has_lane(1));
        assert!(c.has_lane(2));
        assert!(c.has_lane(3));
    }

    #[test]
    fn test_policy_for_face() {
        let face = Face::new(&[0, 1, 2]);
        assert_eq!(FillPolicy::for_face(&face, true), FillPolicy::Shaded { depth_test: true });
        let glass = face.with_transparent(true);
        assert_eq!(FillPolicy::for_face(&glass, true), FillPolicy::Transparent);
    }
}
