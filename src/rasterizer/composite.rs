//! Per-pixel write policies
//!
//! Each policy fills one span of one scanline. Rows come in as slices of
//! the framebuffer (and z-buffer), indexed by absolute x.

use super::fixed::Fixed;
use super::interp::{interpolate, Axis};
use super::types::{Channels, DitherMatrix, FillPolicy, GradientBand, GradientTable, Span};

/// Palette index for intensity `w` at pixel (x, y) within `band`
///
/// The integer part of `w` is the step into the band. The top two bits of
/// the fraction pick one of four sub-shades, realised by bumping to the next
/// step wherever the dither threshold is below them.
pub fn shade_index(band: GradientBand, w: Fixed, x: i32, y: i32, dither: &DitherMatrix) -> u8 {
    let mut offset = w.to_int();
    let quarter = (w.raw() >> 8) & 3;
    if dither.threshold(x, y) < quarter {
        offset += 1;
    }
    // An inverted band collapses onto its first entry
    let top = (band.color_count() - 1).max(0);
    let offset = offset.clamp(0, top);
    (band.first as i32 + offset) as u8
}

/// Next brighter index for a see-through overlay, or None to leave the pixel
pub fn remap_transparent(pixel: u8, gradients: &GradientTable) -> Option<u8> {
    let band = if pixel == 0 {
        gradients.tube
    } else {
        gradients.band_containing(pixel)?
    };
    if pixel < band.first {
        Some(band.first)
    } else {
        Some(pixel.saturating_add(1).min(band.last))
    }
}

/// Writes spans according to a `FillPolicy`
pub struct PixelCompositor<'a> {
    pub gradients: &'a GradientTable,
    pub dither: DitherMatrix,
}

impl<'a> PixelCompositor<'a> {
    pub fn new(gradients: &'a GradientTable) -> Self {
        Self { gradients, dither: DitherMatrix::BAYER }
    }

    /// Fill `span` into `row`. `band` is only read by `Shaded`; without a
    /// depth row the depth-tested policies draw untested.
    pub fn composite(
        &self,
        policy: FillPolicy,
        band: Option<GradientBand>,
        row: &mut [u8],
        depth: Option<&mut [i32]>,
        span: &Span,
    ) {
        match policy {
            FillPolicy::Flat { color } => flat_span(row, span, color),
            FillPolicy::DepthTested { color } => match depth {
                Some(depth) => depth_span(row, depth, span, color),
                None => flat_span(row, span, color),
            },
            FillPolicy::Shaded { depth_test } => {
                if let Some(band) = band {
                    let depth = if depth_test { depth } else { None };
                    self.shaded_span(row, depth, span, band);
                }
            }
            FillPolicy::Transparent => self.transparent_span(row, span),
        }
    }

    fn shaded_span(&self, row: &mut [u8], mut depth: Option<&mut [i32]>, span: &Span, band: GradientBand) {
        let channels = if depth.is_some() { Channels::Z | Channels::W } else { Channels::W };
        let (p1, p2) = span.endpoints();
        let (mut value, delta) = interpolate(&p1, &p2, Axis::X, span.x_start, channels);

        for x in span.x_start..=span.x_end {
            let i = x as usize;
            let visible = match depth.as_deref_mut() {
                Some(zrow) => {
                    if value.z.raw() < zrow[i] {
                        zrow[i] = value.z.raw();
                        true
                    } else {
                        false
                    }
                }
                None => true,
            };
            if visible {
                row[i] = shade_index(band, value.w, x, span.y, &self.dither);
            }
            value.z += delta.z;
            value.w += delta.w;
        }
    }

    fn transparent_span(&self, row: &mut [u8], span: &Span) {
        let run = &mut row[span.x_start as usize..=span.x_end as usize];
        for pixel in run {
            if let Some(next) = remap_transparent(*pixel, self.gradients) {
                *pixel = next;
            }
        }
    }
}

/// Constant color, no depth test
pub fn flat_span(row: &mut [u8], span: &Span, color: u8) {
    row[span.x_start as usize..=span.x_end as usize].fill(color);
}

/// Constant color where nearer than the stored depth. Equal depth loses,
/// so the first writer at a depth keeps the pixel.
pub fn depth_span(row: &mut [u8], depth: &mut [i32], span: &Span, color: u8) {
    let (p1, p2) = span.endpoints();
    let (mut value, delta) = interpolate(&p1, &p2, Axis::X, span.x_start, Channels::Z);

    for x in span.x_start as usize..=span.x_end as usize {
        let z = value.z.raw();
        if z < depth[x] {
            depth[x] = z;
            row[x] = color;
        }
        value.z += delta.z;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::types::EdgeSample;

    fn span(y: i32, x0: i32, x1: i32, z0: i32, z1: i32, w0: Fixed, w1: Fixed) -> Span {
        Span {
            y,
            x_start: x0,
            x_end: x1,
            left: EdgeSample { y, x: x0, z: Fixed::from_int(z0), w: w0 },
            right: EdgeSample { y, x: x1, z: Fixed::from_int(z1), w: w1 },
        }
    }

    fn table() -> GradientTable {
        GradientTable::new(
            vec![GradientBand::new(16, 23), GradientBand::new(32, 47)],
            GradientBand::new(200, 207),
        )
    }

    #[test]
    fn test_shade_index_dither_levels() {
        let band = GradientBand::new(16, 23);
        let d = DitherMatrix::BAYER;
        // 2.0: no sub-shade, never bumped
        let w = Fixed::from_int(2);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(shade_index(band, w, x, y, &d), 18);
        }
        // 2.5: half the 2x2 cell bumps
        let w = Fixed::from_raw(2 * 1024 + 512);
        let bumped = [(0, 0), (1, 0), (0, 1), (1, 1)]
            .iter()
            .filter(|&&(x, y)| shade_index(band, w, x, y, &d) == 19)
            .count();
        assert_eq!(bumped, 2);
    }

    #[test]
    fn test_shade_index_clamped_to_band() {
        let band = GradientBand::new(16, 23);
        let d = DitherMatrix::BAYER;
        assert_eq!(shade_index(band, Fixed::from_int(-5), 0, 0, &d), 16);
        assert_eq!(shade_index(band, Fixed::from_int(40), 0, 0, &d), 23);
        assert_eq!(shade_index(band, Fixed::from_raw(7 * 1024 + 900), 0, 0, &d), 23);
    }

    #[test]
    fn test_shade_index_inverted_band_uses_first() {
        let band = GradientBand::new(40, 39);
        let d = DitherMatrix::BAYER;
        for raw in [-2048, 0, 3 * 1024 + 800, 50 * 1024] {
            for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                assert_eq!(shade_index(band, Fixed::from_raw(raw), x, y, &d), 40);
            }
        }
    }

    #[test]
    fn test_remap_transparent() {
        let t = table();
        assert_eq!(remap_transparent(0, &t), Some(200));
        assert_eq!(remap_transparent(18, &t), Some(19));
        assert_eq!(remap_transparent(23, &t), Some(23));
        assert_eq!(remap_transparent(100, &t), None);
    }

    #[test]
    fn test_depth_span_strict_less() {
        let mut row = [0u8; 8];
        let mut depth = [i32::MAX; 8];
        let s = span(0, 1, 5, 10, 10, Fixed::ZERO, Fixed::ZERO);
        depth_span(&mut row, &mut depth, &s, 3);
        assert_eq!(row, [0, 3, 3, 3, 3, 3, 0, 0]);

        // Same depth does not overwrite
        depth_span(&mut row, &mut depth, &s, 9);
        assert_eq!(row, [0, 3, 3, 3, 3, 3, 0, 0]);
    }

    #[test]
    fn test_transparent_span_brightens() {
        let t = table();
        let compositor = PixelCompositor::new(&t);
        let mut row = [0u8, 18, 23, 100, 0];
        let s = span(0, 0, 4, 0, 0, Fixed::ZERO, Fixed::ZERO);
        compositor.composite(FillPolicy::Transparent, None, &mut row, None, &s);
        assert_eq!(row, [200, 19, 23, 100, 200]);
    }

    #[test]
    fn test_shaded_span_ramps_through_band() {
        let t = table();
        let compositor = PixelCompositor::new(&t);
        let mut row = [0u8; 16];
        let s = span(0, 0, 15, 0, 0, Fixed::ZERO, Fixed::from_int(16));
        compositor.composite(
            FillPolicy::Shaded { depth_test: false },
            t.get(1),
            &mut row,
            None,
            &s,
        );
        assert!(row.iter().all(|&c| (32..=47).contains(&c)));
        assert!(row.windows(2).all(|p| p[1] + 1 >= p[0]));
        assert!(row[15] > row[0]);
    }
}
