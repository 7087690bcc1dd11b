//! Shared test utilities for the respimg test suite.
//!
//! Synthetic images and source trees, generated on the fly so tests never
//! depend on checked-in binary fixtures.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = setup_source_tree();
//! let raster = RustRaster::open(&tmp.path().join("photo.jpg")).unwrap();
//! ```

use image::{DynamicImage, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use std::path::Path;
use tempfile::TempDir;

// =========================================================================
// Synthetic images
// =========================================================================

/// An RGB gradient: red follows x, green follows y.
pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// Write a small valid JPEG with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write a small valid RGBA PNG with a half-transparent right side.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        let alpha = if x < width / 2 { 255 } else { 128 };
        Rgba([(y % 256) as u8, 64, (x % 256) as u8, alpha])
    });
    img.save(path).unwrap();
}

/// Write a minimal SVG declaring its size on the root element.
pub fn create_test_svg(path: &Path, width: u32, height: u32) {
    let svg = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}">
  <rect width="{width}" height="{height}" fill="teal"/>
</svg>
"#
    );
    std::fs::write(path, svg).unwrap();
}

// =========================================================================
// Source trees
// =========================================================================

/// A temp source directory holding a mix of rasters, an SVG and a stray file.
///
/// ```text
/// photo.jpg        800x600
/// icon.png         400x400
/// logo.svg         200x100
/// notes.txt
/// nested/wide.jpg  1200x300
/// ```
pub fn setup_source_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    create_test_jpeg(&root.join("photo.jpg"), 800, 600);
    create_test_png(&root.join("icon.png"), 400, 400);
    create_test_svg(&root.join("logo.svg"), 200, 100);
    std::fs::write(root.join("notes.txt"), "not an image").unwrap();
    std::fs::create_dir_all(root.join("nested")).unwrap();
    create_test_jpeg(&root.join("nested/wide.jpg"), 1200, 300);
    tmp
}
