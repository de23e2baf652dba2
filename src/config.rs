//! Renderer configuration
//!
//! Uses RON (Rusty Object Notation) for human-readable config files.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rasterizer::{GradientBand, HEIGHT, WIDTH};

/// Renderer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub width: usize,
    pub height: usize,
    /// Physical display buffers (at least 2 are used)
    pub swap_buffers: usize,
    /// Allocate a z-buffer
    pub depth_buffer: bool,
    /// Palette steps removed per fade_toward_black call
    pub fade_step: u8,
    /// Band see-through faces brighten into over background pixels
    pub tube_band: GradientBand,
    /// Shading bands, indexed by face gradient id
    pub gradients: Vec<GradientBand>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            swap_buffers: 3,
            depth_buffer: true,
            fade_step: 4,
            tube_band: GradientBand::new(192, 207),
            gradients: vec![
                GradientBand::new(16, 31),
                GradientBand::new(32, 47),
                GradientBand::new(48, 63),
                GradientBand::new(64, 79),
            ],
        }
    }
}

/// Error type for config loading
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    ParseError(ron::error::SpannedError),
    SerializeError(ron::Error),
    /// A band whose `first` lies above its `last`
    InvalidBand(GradientBand),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::IoError(e)
    }
}

impl From<ron::error::SpannedError> for ConfigError {
    fn from(e: ron::error::SpannedError) -> Self {
        ConfigError::ParseError(e)
    }
}

impl From<ron::Error> for ConfigError {
    fn from(e: ron::Error) -> Self {
        ConfigError::SerializeError(e)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {}", e),
            ConfigError::InvalidBand(band) => {
                write!(f, "Invalid gradient band: first {} > last {}", band.first, band.last)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a config from a RON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RendererConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let config = load_config_from_str(&contents)?;
    debug!(path = %path.display(), "loaded renderer config");
    Ok(config)
}

/// Load a config from a RON string. Inverted gradient bands are rejected.
pub fn load_config_from_str(s: &str) -> Result<RendererConfig, ConfigError> {
    let config: RendererConfig = ron::from_str(s)?;
    let mut bands = config.gradients.iter().chain(std::iter::once(&config.tube_band));
    if let Some(&band) = bands.find(|b| b.first > b.last) {
        return Err(ConfigError::InvalidBand(band));
    }
    Ok(config)
}

/// Save a config to a RON file
pub fn save_config<P: AsRef<Path>>(config: &RendererConfig, path: P) -> Result<(), ConfigError> {
    let pretty = ron::ser::PrettyConfig::new()
        .depth_limit(3)
        .indentor("  ".to_string());

    let contents = ron::ser::to_string_pretty(config, pretty)?;
    fs::write(path, contents)?;
    Ok(())
}
