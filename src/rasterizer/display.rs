//! Palette conversion and buffer swapping
//!
//! The renderer draws palette indices. Presenting a frame expands every
//! index through a 256-entry RGB565 table into one of N physical targets,
//! then hands that target to the platform's flip primitive.

use tracing::{debug, warn};

use super::render::Framebuffer;

/// Pack 8-bit RGB into RGB565
pub fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 >> 3) << 11) | ((g as u16 >> 2) << 5) | (b as u16 >> 3)
}

/// 256-color palette with its display lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    rgb: [[u8; 3]; 256],
    lut: [u16; 256],
}

impl Palette {
    pub fn from_rgb8(rgb: &[[u8; 3]; 256]) -> Self {
        let mut palette = Self { rgb: *rgb, lut: [0; 256] };
        for i in 0..256 {
            palette.set(i as u8, rgb[i]);
        }
        palette
    }

    /// Build from a VGA DAC dump: 256 triples of 6-bit values
    pub fn from_vga(dac: &[u8; 768]) -> Self {
        let mut rgb = [[0u8; 3]; 256];
        for (entry, chunk) in rgb.iter_mut().zip(dac.chunks_exact(3)) {
            for (out, &v) in entry.iter_mut().zip(chunk) {
                let v = v & 0x3F;
                *out = (v << 2) | (v >> 4);
            }
        }
        Self::from_rgb8(&rgb)
    }

    /// Linear gray ramp, index 0 black
    pub fn grayscale() -> Self {
        let mut rgb = [[0u8; 3]; 256];
        for (i, entry) in rgb.iter_mut().enumerate() {
            *entry = [i as u8; 3];
        }
        Self::from_rgb8(&rgb)
    }

    pub fn set(&mut self, index: u8, color: [u8; 3]) {
        self.rgb[index as usize] = color;
        self.lut[index as usize] = rgb565(color[0], color[1], color[2]);
    }

    pub fn rgb8(&self, index: u8) -> [u8; 3] {
        self.rgb[index as usize]
    }

    /// Native display color for a palette index
    pub fn color(&self, index: u8) -> u16 {
        self.lut[index as usize]
    }

    /// Expand the framebuffer into an RGB image
    pub fn to_rgb_image(&self, fb: &Framebuffer) -> image::RgbImage {
        image::RgbImage::from_fn(fb.width as u32, fb.height as u32, |x, y| {
            image::Rgb(self.rgb8(fb.pixel(x as usize, y as usize)))
        })
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::grayscale()
    }
}

/// Platform flip primitive
pub trait Flip {
    /// Present physical target `target`, blocking until the platform accepts
    /// it. Returns the target that is on screen afterwards.
    fn flip(&mut self, target: usize, pixels: &[u16]) -> usize;
}

/// N physical display buffers used round-robin
pub struct SwapChain {
    targets: Vec<Vec<u16>>,
    next: usize,
    displayed: Option<usize>,
}

impl SwapChain {
    /// At least two targets are always allocated.
    pub fn new(count: usize, width: usize, height: usize) -> Self {
        let count = if count < 2 {
            warn!(requested = count, "swap chain needs at least 2 targets, using 2");
            2
        } else {
            count
        };
        Self {
            targets: vec![vec![0; width * height]; count],
            next: 0,
            displayed: None,
        }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Target the next present will write into
    pub fn next_target(&self) -> usize {
        self.next
    }

    /// Target the platform last reported on screen
    pub fn displayed(&self) -> Option<usize> {
        self.displayed
    }

    pub fn target(&self, i: usize) -> &[u16] {
        &self.targets[i]
    }

    /// Convert `fb` through `palette`, flip it, and pick the following
    /// target. Returns the target now displayed.
    pub fn present(&mut self, fb: &Framebuffer, palette: &Palette, platform: &mut dyn Flip) -> usize {
        let target = self.next;
        let buffer = &mut self.targets[target];
        if buffer.len() != fb.pixels.len() {
            buffer.resize(fb.pixels.len(), 0);
        }
        for (out, &index) in buffer.iter_mut().zip(fb.pixels.iter()) {
            *out = palette.color(index);
        }

        let shown = platform.flip(target, buffer);
        self.displayed = Some(shown);

        let n = self.targets.len();
        let mut next = (target + 1) % n;
        if next == shown {
            next = (next + 1) % n;
        }
        self.next = next;
        debug!(target, shown, next, "swap");
        shown
    }
}
