//! Framebuffer, depth buffer and the renderer context
//!
//! `Renderer` owns every surface a frame touches. A frame runs
//! `begin_frame` -> draw calls -> `swap`, over and over.

use std::path::Path;

use tracing::{debug, trace, warn};

use super::composite::PixelCompositor;
use super::display::{Flip, Palette, SwapChain};
use super::types::{Channels, Face, FillPolicy, GradientTable, RasterError, SpanList, Vertex4, Window};
use crate::config::RendererConfig;

/// Indexed-color framebuffer, row-major (`y * width + x`)
pub struct Framebuffer {
    pub pixels: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![0; width * height],
            width,
            height,
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Window covering the whole buffer
    pub fn window(&self) -> Window {
        Window::screen(self.width, self.height)
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Caller guarantees (x, y) is inside the buffer
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, color: u8) {
        let idx = self.index(x, y);
        self.pixels[idx] = color;
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[self.index(x, y)]
    }

    /// Bounds-checked write; out-of-range pixels are dropped
    pub fn scissor_pixel(&mut self, x: i32, y: i32, color: u8) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.set_pixel(x as usize, y as usize, color);
        }
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.width;
        &self.pixels[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.width;
        &mut self.pixels[start..start + self.width]
    }

    /// Fill every span of `list` with `color`
    pub fn hline_span(&mut self, list: &SpanList, color: u8) {
        let bounds = self.window();
        for span in list.iter() {
            if span.y < bounds.y0 || span.y > bounds.y1 {
                continue;
            }
            let x0 = span.x_start.max(bounds.x0);
            let x1 = span.x_end.min(bounds.x1);
            if x0 > x1 {
                continue;
            }
            self.row_mut(span.y as usize)[x0 as usize..=x1 as usize].fill(color);
        }
    }

    /// Darken every pixel by `step` palette entries, stopping at 0
    pub fn fade_toward_black(&mut self, step: u8) {
        for p in &mut self.pixels {
            *p = p.saturating_sub(step);
        }
    }

    /// Plot a palette-indexed line, dropping the parts off screen
    pub fn draw_line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32, color: u8) {
        for (x, y) in LinePoints::new(x0, y0, x1, y1) {
            self.scissor_pixel(x, y, color);
        }
    }
}

/// Pixels of a Bresenham line, both endpoints included
#[derive(Debug, Clone)]
pub struct LinePoints {
    x: i32,
    y: i32,
    end: (i32, i32),
    dx: i32,
    /// Negative
    dy: i32,
    sx: i32,
    sy: i32,
    err: i32,
    done: bool,
}

impl LinePoints {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        Self {
            x: x0,
            y: y0,
            end: (x1, y1),
            dx,
            dy,
            sx: if x0 < x1 { 1 } else { -1 },
            sy: if y0 < y1 { 1 } else { -1 },
            err: dx + dy,
            done: false,
        }
    }
}

impl Iterator for LinePoints {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        if self.done {
            return None;
        }
        let point = (self.x, self.y);
        if point == self.end {
            self.done = true;
            return Some(point);
        }
        let e2 = 2 * self.err;
        if e2 >= self.dy {
            self.err += self.dy;
            self.x += self.sx;
        }
        if e2 <= self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }
        Some(point)
    }
}

/// Per-pixel depth, smaller is nearer
pub struct ZBuffer {
    pub depth: Vec<i32>,
    pub width: usize,
    pub height: usize,
}

impl ZBuffer {
    /// Cleared value, behind everything
    pub const FAR: i32 = i32::MAX;

    pub fn new(width: usize, height: usize) -> Self {
        Self {
            depth: vec![Self::FAR; width * height],
            width,
            height,
        }
    }

    pub fn clear(&mut self) {
        self.depth.fill(Self::FAR);
    }

    pub fn get(&self, x: usize, y: usize) -> i32 {
        self.depth[y * self.width + x]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [i32] {
        let start = y * self.width;
        &mut self.depth[start..start + self.width]
    }
}

/// Where the renderer is in its per-frame cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Clearing,
    Rasterizing,
    Swapping,
}

/// Renderer context: surfaces, palette, gradient bands and swap chain
pub struct Renderer {
    framebuffer: Framebuffer,
    zbuffer: Option<ZBuffer>,
    gradients: GradientTable,
    palette: Palette,
    swap_chain: SwapChain,
    fade_step: u8,
    state: FrameState,
}

impl Renderer {
    pub fn new(config: &RendererConfig) -> Self {
        debug!(
            width = config.width,
            height = config.height,
            swap_buffers = config.swap_buffers,
            depth_buffer = config.depth_buffer,
            "creating renderer"
        );
        Self {
            framebuffer: Framebuffer::new(config.width, config.height),
            zbuffer: config
                .depth_buffer
                .then(|| ZBuffer::new(config.width, config.height)),
            gradients: GradientTable::new(config.gradients.clone(), config.tube_band),
            palette: Palette::default(),
            swap_chain: SwapChain::new(config.swap_buffers, config.width, config.height),
            fade_step: config.fade_step,
            state: FrameState::Idle,
        }
    }

    fn set_state(&mut self, state: FrameState) {
        if self.state != state {
            trace!(from = ?self.state, to = ?state, "frame state");
            self.state = state;
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    pub fn framebuffer_mut(&mut self) -> &mut Framebuffer {
        &mut self.framebuffer
    }

    pub fn zbuffer(&self) -> Option<&ZBuffer> {
        self.zbuffer.as_ref()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Only change between frames
    pub fn palette_mut(&mut self) -> &mut Palette {
        &mut self.palette
    }

    pub fn gradients(&self) -> &GradientTable {
        &self.gradients
    }

    /// Only change between frames
    pub fn gradients_mut(&mut self) -> &mut GradientTable {
        &mut self.gradients
    }

    pub fn swap_chain(&self) -> &SwapChain {
        &self.swap_chain
    }

    /// Clear color and depth and get ready for draw calls
    pub fn begin_frame(&mut self) {
        self.set_state(FrameState::Clearing);
        self.clear();
        self.set_state(FrameState::Rasterizing);
    }

    pub fn clear(&mut self) {
        self.framebuffer.clear();
        if let Some(z) = &mut self.zbuffer {
            z.clear();
        }
    }

    /// Fast flat fill of a convex polygon, clipped to the screen.
    /// Zero-height polygons are a successful no-op.
    pub fn fill_convex_polygon(
        &mut self,
        vertices: &[Vertex4],
        color: u8,
        x_offset: i32,
        y_offset: i32,
    ) -> Result<(), RasterError> {
        self.set_state(FrameState::Rasterizing);
        let indices: Vec<usize> = (0..vertices.len()).collect();
        let window = self.framebuffer.window();
        let list = SpanList::build(vertices, &indices, &window, x_offset, y_offset, Channels::empty())
            .inspect_err(|e| warn!(error = %e, "skipping polygon"))?;
        self.framebuffer.hline_span(&list, color);
        Ok(())
    }

    /// Scan-convert `face` and composite it with `policy`
    ///
    /// Concave loops are fine as long as they are y-monotone. Each scanline
    /// gets one span, so a notch opening up or down is filled in.
    pub fn rasterize_face(
        &mut self,
        face: &Face,
        vertices: &[Vertex4],
        window: Window,
        policy: FillPolicy,
    ) -> Result<(), RasterError> {
        self.set_state(FrameState::Rasterizing);
        let window = window.intersect(&self.framebuffer.window());
        if window.is_empty() {
            return Ok(());
        }

        let band = match policy {
            FillPolicy::Shaded { .. } => match self.gradients.get(face.gradient) {
                Some(band) => Some(band),
                None => {
                    warn!(gradient = face.gradient, "face references an unknown gradient band");
                    return Ok(());
                }
            },
            _ => None,
        };

        let list = SpanList::build(vertices, face.indices(), &window, 0, 0, policy.channels())
            .inspect_err(|e| warn!(error = %e, "skipping face"))?;
        trace!(?policy, spans = list.len(), "rasterize face");

        let compositor = PixelCompositor::new(&self.gradients);
        for span in list.iter() {
            let y = span.y as usize;
            let row = self.framebuffer.row_mut(y);
            let depth = self.zbuffer.as_mut().map(|z| z.row_mut(y));
            compositor.composite(policy, band, row, depth, span);
        }
        Ok(())
    }

    /// Darken the whole frame one step
    pub fn fade_toward_black(&mut self) {
        self.framebuffer.fade_toward_black(self.fade_step);
    }

    /// Present the frame through `platform`. Blocks for as long as the flip does.
    pub fn swap(&mut self, platform: &mut dyn Flip) {
        self.set_state(FrameState::Swapping);
        self.swap_chain.present(&self.framebuffer, &self.palette, platform);
        self.set_state(FrameState::Idle);
    }

    /// Write the current frame as a PNG
    pub fn save_screenshot<P: AsRef<Path>>(&self, path: P) -> Result<(), RasterError> {
        let path = path.as_ref();
        let img = self.palette.to_rgb_image(&self.framebuffer);
        img.save_with_format(path, image::ImageFormat::Png)?;
        debug!(path = %path.display(), "saved screenshot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::fixed::Fixed;
    use crate::rasterizer::types::GradientBand;

    fn renderer(w: usize, h: usize) -> Renderer {
        let config = RendererConfig {
            width: w,
            height: h,
            gradients: vec![GradientBand::new(16, 31)],
            ..RendererConfig::default()
        };
        Renderer::new(&config)
    }

    fn triangle(z: i32) -> Vec<Vertex4> {
        vec![
            Vertex4::from_ints(0, 0, z, 0),
            Vertex4::from_ints(10, 0, z, 0),
            Vertex4::from_ints(5, 10, z, 0),
        ]
    }

    #[test]
    fn test_scissor_pixel_drops_out_of_range() {
        let mut fb = Framebuffer::new(320, 200);
        fb.scissor_pixel(-5, 10, 9);
        fb.scissor_pixel(400, 10, 9);
        fb.scissor_pixel(10, 200, 9);
        assert!(fb.pixels.iter().all(|&p| p == 0));
        fb.scissor_pixel(319, 199, 9);
        assert_eq!(fb.pixel(319, 199), 9);
    }

    #[test]
    fn test_addressing_is_row_major() {
        let mut fb = Framebuffer::new(320, 200);
        fb.set_pixel(7, 3, 1);
        assert_eq!(fb.pixels[3 * 320 + 7], 1);
    }

    #[test]
    fn test_fade_toward_black_floors_at_zero() {
        let mut fb = Framebuffer::new(4, 1);
        fb.pixels.copy_from_slice(&[0, 3, 4, 255]);
        fb.fade_toward_black(4);
        assert_eq!(fb.pixels, vec![0, 0, 0, 251]);
    }

    #[test]
    fn test_draw_line_clips() {
        let mut fb = Framebuffer::new(8, 8);
        fb.draw_line(-4, 2, 12, 2, 5);
        assert!(fb.row(2).iter().all(|&p| p == 5));
        assert!(fb.row(1).iter().all(|&p| p == 0));
    }

    #[test]
    fn test_line_points_cover_both_ends() {
        let points: Vec<(i32, i32)> = LinePoints::new(0, 0, 4, 2).collect();
        assert_eq!(points.first(), Some(&(0, 0)));
        assert_eq!(points.last(), Some(&(4, 2)));
        assert_eq!(points.len(), 5);
        assert_eq!(LinePoints::new(3, 3, 3, 3).count(), 1);
        let back: Vec<(i32, i32)> = LinePoints::new(2, 5, 2, 1).collect();
        assert_eq!(back, vec![(2, 5), (2, 4), (2, 3), (2, 2), (2, 1)]);
    }

    #[test]
    fn test_fill_convex_flat_triangle() {
        let mut r = renderer(20, 20);
        r.fill_convex_polygon(&triangle(0), 7, 0, 0).unwrap();
        let row5: Vec<usize> = (0..20).filter(|&x| r.framebuffer().pixel(x, 5) == 7).collect();
        assert_eq!(row5, vec![3, 4, 5, 6, 7]);
        // Flat top row and bottom row are never drawn
        assert!(r.framebuffer().row(0).iter().all(|&p| p == 0));
        assert!(r.framebuffer().row(10).iter().all(|&p| p == 0));
    }

    #[test]
    fn test_concave_y_monotone_notch_stays_open() {
        // Arrowhead pointing left, reflex vertex at (6, 5)
        let face = Face::new(&[0, 1, 2, 3]);
        let verts = vec![
            Vertex4::from_ints(10, 0, 0, 0),
            Vertex4::from_ints(6, 5, 0, 0),
            Vertex4::from_ints(10, 10, 0, 0),
            Vertex4::from_ints(0, 5, 0, 0),
        ];
        let mut r = renderer(20, 20);
        r.rasterize_face(&face, &verts, Window::new(0, 0, 19, 19), FillPolicy::Flat { color: 3 })
            .unwrap();
        assert_eq!(r.framebuffer().pixel(3, 5), 3);
        assert_eq!(r.framebuffer().pixel(5, 5), 3);
        assert_eq!(r.framebuffer().pixel(8, 5), 0);
        assert_eq!(r.framebuffer().pixel(8, 4), 0);
    }

    #[test]
    fn test_fill_convex_zero_height_is_noop() {
        let mut r = renderer(20, 20);
        let flat = vec![
            Vertex4::from_ints(0, 4, 0, 0),
            Vertex4::from_ints(10, 4, 0, 0),
            Vertex4::from_ints(5, 4, 0, 0),
        ];
        assert!(r.fill_convex_polygon(&flat, 7, 0, 0).is_ok());
        assert!(r.framebuffer().pixels.iter().all(|&p| p == 0));
        assert!(r.fill_convex_polygon(&[], 7, 0, 0).is_ok());
    }

    #[test]
    fn test_nearer_face_wins_in_either_order() {
        let face = Face::new(&[0, 1, 2]);
        let window = Window::new(0, 0, 19, 19);
        for order in [[100, 50], [50, 100]] {
            let mut r = renderer(20, 20);
            r.begin_frame();
            for z in order {
                let color = if z == 50 { 2 } else { 1 };
                r.rasterize_face(&face, &triangle(z), window, FillPolicy::DepthTested { color })
                    .unwrap();
            }
            assert_eq!(r.framebuffer().pixel(5, 5), 2);
        }
    }

    #[test]
    fn test_redraw_at_same_depth_is_idempotent() {
        let face = Face::new(&[0, 1, 2]);
        let window = Window::new(0, 0, 19, 19);
        let mut r = renderer(20, 20);
        r.begin_frame();
        r.rasterize_face(&face, &triangle(30), window, FillPolicy::DepthTested { color: 4 }).unwrap();
        let before = r.framebuffer().pixels.clone();
        r.rasterize_face(&face, &triangle(30), window, FillPolicy::DepthTested { color: 9 }).unwrap();
        assert_eq!(r.framebuffer().pixels, before);
    }

    #[test]
    fn test_window_limits_face() {
        let face = Face::new(&[0, 1, 2]);
        let mut r = renderer(20, 20);
        r.rasterize_face(&face, &triangle(0), Window::new(0, 0, 4, 19), FillPolicy::Flat { color: 3 })
            .unwrap();
        for y in 0..20 {
            for x in 5..20 {
                assert_eq!(r.framebuffer().pixel(x, y), 0);
            }
        }
        assert_eq!(r.framebuffer().pixel(4, 5), 3);
    }

    #[test]
    fn test_shaded_face_stays_in_band() {
        let face = Face::new(&[0, 1, 2]).with_gradient(0);
        let verts = vec![
            Vertex4::from_ints(0, 0, 10, 0),
            Vertex4::from_ints(19, 0, 10, 15),
            Vertex4::from_ints(10, 19, 10, 8),
        ];
        let mut r = renderer(20, 20);
        r.begin_frame();
        r.rasterize_face(&face, &verts, Window::new(0, 0, 19, 19), FillPolicy::Shaded { depth_test: true })
            .unwrap();
        let drawn: Vec<u8> = r.framebuffer().pixels.iter().copied().filter(|&p| p != 0).collect();
        assert!(!drawn.is_empty());
        assert!(drawn.iter().all(|&p| (16..=31).contains(&p)));
    }

    #[test]
    fn test_shaded_faces_depth_test() {
        let config = RendererConfig {
            width: 20,
            height: 20,
            gradients: vec![GradientBand::new(16, 31), GradientBand::new(48, 63)],
            ..RendererConfig::default()
        };
        let near = Face::new(&[0, 1, 2]).with_gradient(1);
        let far = Face::new(&[0, 1, 2]).with_gradient(0);
        let window = Window::new(0, 0, 19, 19);
        let policy = FillPolicy::Shaded { depth_test: true };

        for near_first in [true, false] {
            let mut r = Renderer::new(&config);
            r.begin_frame();
            let draws = if near_first {
                [(near, 50), (far, 100)]
            } else {
                [(far, 100), (near, 50)]
            };
            for (face, z) in draws {
                r.rasterize_face(&face, &triangle(z), window, policy).unwrap();
            }
            assert!((48..=63).contains(&r.framebuffer().pixel(5, 5)));
            assert_eq!(r.zbuffer().unwrap().get(5, 5), Fixed::from_int(50).raw());
        }
    }

    #[test]
    fn test_shaded_without_depth_test_leaves_zbuffer() {
        let face = Face::new(&[0, 1, 2]).with_gradient(0);
        let mut r = renderer(20, 20);
        r.begin_frame();
        r.rasterize_face(&face, &triangle(50), Window::new(0, 0, 19, 19), FillPolicy::Shaded { depth_test: false })
            .unwrap();
        assert!((16..=31).contains(&r.framebuffer().pixel(5, 5)));
        assert!(r.zbuffer().unwrap().depth.iter().all(|&z| z == ZBuffer::FAR));
    }

    #[test]
    fn test_inverted_band_shades_without_panic() {
        let config = RendererConfig {
            width: 20,
            height: 20,
            gradients: vec![GradientBand::new(40, 39)],
            ..RendererConfig::default()
        };
        let mut r = Renderer::new(&config);
        let face = Face::new(&[0, 1, 2]).with_gradient(0);
        r.rasterize_face(&face, &triangle(0), Window::new(0, 0, 19, 19), FillPolicy::Shaded { depth_test: false })
            .unwrap();
        assert_eq!(r.framebuffer().pixel(5, 5), 40);
    }

    #[test]
    fn test_unknown_gradient_draws_nothing() {
        let face = Face::new(&[0, 1, 2]).with_gradient(5);
        let mut r = renderer(20, 20);
        r.rasterize_face(&face, &triangle(0), Window::new(0, 0, 19, 19), FillPolicy::Shaded { depth_test: false })
            .unwrap();
        assert!(r.framebuffer().pixels.iter().all(|&p| p == 0));
    }

    struct Recorder {
        last: Vec<u16>,
    }

    impl Flip for Recorder {
        fn flip(&mut self, target: usize, pixels: &[u16]) -> usize {
            self.last = pixels.to_vec();
            target
        }
    }

    #[test]
    fn test_frame_cycle() {
        let mut r = renderer(20, 20);
        assert_eq!(r.state(), FrameState::Idle);
        r.begin_frame();
        assert_eq!(r.state(), FrameState::Rasterizing);
        r.fill_convex_polygon(&triangle(0), 255, 0, 0).unwrap();
        let mut platform = Recorder { last: Vec::new() };
        r.swap(&mut platform);
        assert_eq!(r.state(), FrameState::Idle);
        assert_eq!(platform.last.len(), 400);
        assert_eq!(platform.last[5 * 20 + 5], 0xFFFF);
        assert_eq!(platform.last[15], 0);
    }
}
