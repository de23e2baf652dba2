//! Cylindrix renderer demo
//!
//! Drives the software rasterizer with a few animated faces and shows the
//! swapped frames in a macroquad window:
//! - Dithered Gouraud-style shading within palette bands
//! - Z-buffered overlapping faces
//! - A see-through glass panel
//! - Flat convex fill and line primitives for the HUD
//!
//! Keys: F fades to black while held, P saves screenshot.png, Esc quits.

use cylindrix_raster::config::{load_config, RendererConfig};
use cylindrix_raster::rasterizer::{
    Face, FillPolicy, Fixed, Flip, GradientBand, Renderer, Vertex4,
};
use macroquad::prelude::*;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SCALE: i32 = 3;
const CONFIG_PATH: &str = "renderer.ron";

fn window_conf() -> Conf {
    Conf {
        window_title: "Cylindrix Renderer".to_owned(),
        window_width: cylindrix_raster::rasterizer::WIDTH as i32 * SCALE,
        window_height: cylindrix_raster::rasterizer::HEIGHT as i32 * SCALE,
        window_resizable: true,
        ..Default::default()
    }
}

/// Uploads each flipped target into a texture; the texture is what is on screen
struct MacroquadDisplay {
    texture: Texture2D,
    rgba: Vec<u8>,
    width: usize,
    height: usize,
}

impl MacroquadDisplay {
    fn new(width: usize, height: usize) -> Self {
        let rgba = vec![0; width * height * 4];
        let texture = Texture2D::from_rgba8(width as u16, height as u16, &rgba);
        texture.set_filter(FilterMode::Nearest);
        Self { texture, rgba, width, height }
    }
}

impl Flip for MacroquadDisplay {
    fn flip(&mut self, target: usize, pixels: &[u16]) -> usize {
        for (out, &c) in self.rgba.chunks_exact_mut(4).zip(pixels) {
            let r = ((c >> 11) & 0x1F) as u8;
            let g = ((c >> 5) & 0x3F) as u8;
            let b = (c & 0x1F) as u8;
            out[0] = (r << 3) | (r >> 2);
            out[1] = (g << 2) | (g >> 4);
            out[2] = (b << 3) | (b >> 2);
            out[3] = 255;
        }
        self.texture
            .update_from_bytes(self.width as u32, self.height as u32, &self.rgba);
        target
    }
}

/// Fill a band with a ramp from dark to `color`
fn paint_band(renderer: &mut Renderer, band: GradientBand, color: [f32; 3]) {
    let count = band.color_count();
    for i in 0..count {
        let t = (i + 1) as f32 / count as f32;
        let rgb = [
            (color[0] * t * 255.0) as u8,
            (color[1] * t * 255.0) as u8,
            (color[2] * t * 255.0) as u8,
        ];
        renderer.palette_mut().set(band.first + i as u8, rgb);
    }
}

/// Regular polygon in screen space. `shade` gives each vertex its intensity.
fn ngon(cx: f32, cy: f32, radius: f32, sides: usize, angle: f32, z: f32, shade: impl Fn(usize) -> f32) -> Vec<Vertex4> {
    (0..sides)
        .map(|i| {
            let a = angle + i as f32 * std::f32::consts::TAU / sides as f32;
            Vertex4::new(
                Fixed::from_f32(cx + a.cos() * radius),
                Fixed::from_f32(cy + a.sin() * radius),
                Fixed::from_f32(z),
                Fixed::from_f32(shade(i)),
            )
        })
        .collect()
}

fn draw_scene(renderer: &mut Renderer, t: f32, depth_test: bool) {
    let screen = renderer.framebuffer().window();

    // Shaded hexagon, intensity rotating around the rim
    let hex = ngon(100.0, 100.0, 70.0, 6, t * 0.5, 300.0, |i| {
        8.0 + 7.5 * ((t * 2.0) + i as f32).sin()
    });
    let face = Face::new(&[0, 1, 2, 3, 4, 5]).with_gradient(0);
    if let Err(e) = renderer.rasterize_face(&face, &hex, screen, FillPolicy::Shaded { depth_test }) {
        warn!("{}", e);
    }

    // Two triangles passing through each other in depth
    for (gradient, phase) in [(1usize, 0.0f32), (2, std::f32::consts::PI)] {
        let z = 200.0 + 80.0 * (t + phase).sin();
        let tri = ngon(200.0, 100.0, 60.0, 3, t * (1.0 + gradient as f32 * 0.3), z, |i| {
            4.0 + i as f32 * 5.0
        });
        let face = Face::new(&[0, 1, 2]).with_gradient(gradient);
        if let Err(e) = renderer.rasterize_face(&face, &tri, screen, FillPolicy::Shaded { depth_test }) {
            warn!("{}", e);
        }
    }

    // Glass panel sliding across
    let x = 160.0 + 120.0 * (t * 0.7).sin();
    let glass = vec![
        Vertex4::from_ints(x as i32 - 30, 40, 0, 0),
        Vertex4::from_ints(x as i32 + 30, 40, 0, 0),
        Vertex4::from_ints(x as i32 + 30, 160, 0, 0),
        Vertex4::from_ints(x as i32 - 30, 160, 0, 0),
    ];
    let face = Face::new(&[0, 1, 2, 3]).with_transparent(true);
    if let Err(e) = renderer.rasterize_face(&face, &glass, screen, FillPolicy::for_face(&face, depth_test)) {
        warn!("{}", e);
    }

    // HUD box and radar sweep
    let hud = [
        Vertex4::from_ints(0, 0, 0, 0),
        Vertex4::from_ints(60, 0, 0, 0),
        Vertex4::from_ints(60, 12, 0, 0),
        Vertex4::from_ints(0, 12, 0, 0),
    ];
    if let Err(e) = renderer.fill_convex_polygon(&hud, 64, 256, 186) {
        warn!("{}", e);
    }
    let (cx, cy) = (290, 30);
    let sweep = t * 2.0;
    let fb = renderer.framebuffer_mut();
    fb.draw_line(cx, cy, cx + (sweep.cos() * 24.0) as i32, cy + (sweep.sin() * 24.0) as i32, 255);
}

#[macroquad::main(window_conf)]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = if Path::new(CONFIG_PATH).exists() {
        match load_config(CONFIG_PATH) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load {}: {}, using defaults", CONFIG_PATH, e);
                RendererConfig::default()
            }
        }
    } else {
        RendererConfig::default()
    };

    let mut renderer = Renderer::new(&config);
    let mut display = MacroquadDisplay::new(config.width, config.height);

    let colors = [[1.0, 0.3, 0.2], [0.3, 1.0, 0.3], [0.3, 0.5, 1.0], [1.0, 0.9, 0.2]];
    for (band, color) in config.gradients.iter().zip(colors.iter().cycle()) {
        paint_band(&mut renderer, *band, *color);
    }
    paint_band(&mut renderer, config.tube_band, [0.2, 0.9, 0.9]);
    renderer.palette_mut().set(255, [255, 255, 255]);

    info!("=== Cylindrix Renderer ===");

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        if is_key_down(KeyCode::F) {
            // Keep the last frame and darken it
            renderer.fade_toward_black();
        } else {
            renderer.begin_frame();
            draw_scene(&mut renderer, get_time() as f32, config.depth_buffer);
        }

        if is_key_pressed(KeyCode::P) {
            match renderer.save_screenshot("screenshot.png") {
                Ok(()) => info!("Saved screenshot.png"),
                Err(e) => warn!("{}", e),
            }
        }

        renderer.swap(&mut display);

        clear_background(BLACK);
        let scale = (screen_width() / config.width as f32).min(screen_height() / config.height as f32);
        let w = config.width as f32 * scale;
        let h = config.height as f32 * scale;
        draw_texture_ex(
            &display.texture,
            (screen_width() - w) / 2.0,
            (screen_height() - h) / 2.0,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(w, h)),
                ..Default::default()
            },
        );

        next_frame().await
    }
}
