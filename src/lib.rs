//! Cylindrix software renderer
//!
//! Scan conversion and pixel compositing for a 320x200 palette-indexed
//! display, in 22.10 fixed point:
//! - Edge-walking polygon fill with a strict top/left fill convention
//! - Affine depth and intensity interpolation
//! - Z-buffering, 2x2 ordered-dither shading within palette bands
//! - See-through faces by palette remapping
//! - Round-robin multi-buffer swap through a palette lookup table

pub mod config;
pub mod rasterizer;
