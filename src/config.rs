//! Batch configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults are
//! overridden by a sparse user `config.toml` placed in the source directory.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [resize]
//! widths = [320, 640, 1280]  # Target widths
//! height = 0                 # Target height (0 = follow the aspect ratio)
//! filter = "triangle"        # Resampling filter name
//! optim = true               # Output will be run through the optimizers
//! best_fit = false           # Fit inside the box instead of stretching
//! fill = false               # Pad best-fit results out to the full box
//! background = "#ffffff"     # Padding color used by fill
//!
//! [optimize]
//! svgo = 0                   # Passes per tool (0 = skip)
//! image_optim = 0
//! picopt = 0
//! imageoptim = 0
//!
//! [rasterize]
//! program = "phantomjs"      # SVG renderer command
//! args = ["rasterize.js"]    # Arguments placed before the payload
//!
//! [processing]
//! max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::Filter;
use crate::optimize::OptimizePasses;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Batch configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RespimgConfig {
    /// Resize targets and pipeline switches.
    pub resize: ResizeConfig,
    /// Optimizer passes run over the output directory.
    pub optimize: OptimizePasses,
    /// External SVG renderer.
    pub rasterize: RasterizeConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl RespimgConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resize.widths.is_empty() {
            return Err(ConfigError::Validation(
                "resize.widths must not be empty".into(),
            ));
        }
        if self.resize.widths.contains(&0) {
            return Err(ConfigError::Validation(
                "resize.widths values must be non-zero".into(),
            ));
        }
        if self.resize.fill && !self.resize.best_fit {
            return Err(ConfigError::Validation(
                "resize.fill requires resize.best_fit".into(),
            ));
        }
        self.resize.background_rgba()?;
        if self.rasterize.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "rasterize.program must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Resize settings for the batch harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    /// Target widths. Each source produces one variant per width.
    pub widths: Vec<u32>,
    /// Target height for every width; zero follows the aspect ratio.
    pub height: u32,
    /// Resampling filter name. Unknown names fall back to triangle.
    pub filter: String,
    /// Use the lighter sharpening tuned for optimizer-bound output.
    pub optim: bool,
    /// Fit inside the requested box instead of stretching.
    pub best_fit: bool,
    /// Pad best-fit results to the full box.
    pub fill: bool,
    /// Hex padding color for fill.
    pub background: String,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            widths: vec![320, 640, 1280],
            height: 0,
            filter: Filter::default().name().to_string(),
            optim: true,
            best_fit: false,
            fill: false,
            background: "#ffffff".to_string(),
        }
    }
}

impl ResizeConfig {
    pub fn filter(&self) -> Filter {
        Filter::from_name(&self.filter)
    }

    pub fn background_rgba(&self) -> Result<Rgba<u8>, ConfigError> {
        parse_hex_color(&self.background).ok_or_else(|| {
            ConfigError::Validation(format!(
                "resize.background must be #rgb, #rrggbb or #rrggbbaa, got {:?}",
                self.background
            ))
        })
    }
}

/// External SVG rasterizer command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RasterizeConfig {
    /// Program to run.
    pub program: String,
    /// Arguments placed before `<base64> <width> <height> <output>`.
    pub args: Vec<String>,
}

impl Default for RasterizeConfig {
    fn default() -> Self {
        Self {
            program: "phantomjs".to_string(),
            args: vec!["rasterize.js".to_string()],
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` into a color.
pub fn parse_hex_color(hex: &str) -> Option<Rgba<u8>> {
    let digits = hex.strip_prefix('#')?;
    if !digits.is_ascii() {
        return None;
    }
    let byte = |s: &str| u8::from_str_radix(s, 16).ok();
    match digits.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in digits.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 17;
            }
            Some(Rgba([rgb[0], rgb[1], rgb[2], 255]))
        }
        6 | 8 => {
            let r = byte(&digits[0..2])?;
            let g = byte(&digits[2..4])?;
            let b = byte(&digits[4..6])?;
            let a = if digits.len() == 8 {
                byte(&digits[6..8])?
            } else {
                255
            };
            Some(Rgba([r, g, b, a]))
        }
        _ => None,
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// Base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(RespimgConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<RespimgConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RespimgConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<RespimgConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# respimg Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file as config.toml in the batch source directory.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Resizing
# ---------------------------------------------------------------------------
[resize]
# Target widths. Every JPEG/PNG source yields one <stem>-w<width> variant
# per entry, with the height following the source aspect ratio.
widths = [320, 640, 1280]

# Target height applied to every width. 0 keeps the aspect ratio, which
# makes best_fit and fill irrelevant.
height = 0

# Resampling filter: point, box, triangle, hermite, hanning, hamming,
# blackman, gaussian, quadratic, cubic, catrom, mitchell, lanczos,
# bessel, sinc. Unknown names fall back to triangle.
filter = "triangle"

# Output is meant for the optimizers below: lighter sharpening, metadata
# left for the optimizers to strip.
optim = true

# Fit inside the width x height box instead of stretching to it.
best_fit = false

# With best_fit, pad the result out to the full box.
fill = false

# Padding color used by fill (#rgb, #rrggbb or #rrggbbaa).
background = "#ffffff"

# ---------------------------------------------------------------------------
# Optimization passes over the output directory (0 = skip the tool)
# ---------------------------------------------------------------------------
[optimize]
svgo = 0
image_optim = 0
picopt = 0
imageoptim = 0

# ---------------------------------------------------------------------------
# SVG rasterization
# ---------------------------------------------------------------------------
[rasterize]
# Invoked as: <program> <args..> <base64-svg> <width> <height> <output.png>
# It must exit zero and create the output file.
program = "phantomjs"
args = ["rasterize.js"]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
