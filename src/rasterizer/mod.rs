//! Fixed-point scanline rasterizer for an indexed-color framebuffer
//!
//! Pipeline per polygon:
//! - `edge`: integer DDA down each polygon edge (x), affine z/intensity
//! - `span`: left/right edge pairing into clipped horizontal spans
//! - `interp`: affine attribute interpolation shared by edges and spans
//! - `composite`: flat, z-buffered, dithered-shade and see-through writes
//! - `render` / `display`: surfaces, renderer context and buffer swapping

mod composite;
mod display;
mod edge;
mod fixed;
mod interp;
mod render;
mod span;
mod types;

pub use composite::*;
pub use display::*;
pub use edge::*;
pub use fixed::*;
pub use interp::*;
pub use render::*;
pub use span::*;
pub use types::*;

/// Screen dimensions (VGA mode 13h)
pub const WIDTH: usize = 320;
pub const HEIGHT: usize = 200;
