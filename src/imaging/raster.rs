//! Raster engine trait and shared types.
//!
//! The [`RasterImage`] trait is the capability the resize pipeline drives: a
//! mutable image handle that can be queried for its size, alpha and metadata,
//! and mutated through resize, sample, sharpen, posterize, strip and extent
//! commands. The pipeline never touches pixel buffers itself.
//!
//! The production implementation is
//! [`RustRaster`](super::rust_backend::RustRaster), built on the `image`
//! crate. Tests use the recording mock in [`tests`].

use super::params::{Colorspace, Filter, Interlace, Quality, Sharpening};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A mutable raster image owned by an imaging engine.
///
/// Every mutation is synchronous and either succeeds or reports an engine
/// error. Implementations must not retry internally.
pub trait RasterImage {
    fn width(&self) -> u32;

    fn height(&self) -> u32;

    fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }

    /// Whether the image carries a defined alpha channel.
    fn alpha_channel_defined(&self) -> bool;

    /// Activate a fully opaque alpha channel.
    fn set_alpha_opaque(&mut self) -> Result<(), RasterError>;

    fn set_bit_depth(&mut self, depth: u8) -> Result<(), RasterError>;

    fn set_interlace(&mut self, interlace: Interlace) -> Result<(), RasterError>;

    /// Names of the embedded profiles (`icc`, `exif`, `xmp`, ...).
    fn profile_names(&self) -> Vec<String>;

    fn remove_profile(&mut self, name: &str) -> Result<(), RasterError>;

    /// Engines without property deletion get properties blanked instead.
    fn supports_property_deletion(&self) -> bool {
        true
    }

    fn delete_property(&mut self, name: &str) -> Result<(), RasterError>;

    fn set_property(&mut self, name: &str, value: &str) -> Result<(), RasterError>;

    /// Set an engine or encoder option such as `png:compression-level`.
    fn set_option(&mut self, key: &str, value: &str) -> Result<(), RasterError>;

    /// Filtered resize to exactly `width` x `height`.
    fn resize(&mut self, width: u32, height: u32, filter: Filter, blur: f64)
    -> Result<(), RasterError>;

    /// Fast point sample to exactly `width` x `height`.
    fn sample(&mut self, width: u32, height: u32) -> Result<(), RasterError>;

    fn unsharp_mask(&mut self, sharpening: Sharpening) -> Result<(), RasterError>;

    fn posterize(&mut self, levels: u32, dither: bool) -> Result<(), RasterError>;

    fn set_compression_quality(&mut self, quality: Quality) -> Result<(), RasterError>;

    fn set_colorspace(&mut self, colorspace: Colorspace) -> Result<(), RasterError>;

    /// Remove every profile, property and comment.
    fn strip_metadata(&mut self) -> Result<(), RasterError>;

    /// Resize the canvas to `width` x `height` without scaling the pixels.
    ///
    /// `offset_x`/`offset_y` give the new canvas origin relative to the
    /// image's top-left corner, so negative offsets add margin on the
    /// left/top. Uncovered area takes the engine's background color.
    fn extent_canvas(
        &mut self,
        width: u32,
        height: u32,
        offset_x: i64,
        offset_y: i64,
    ) -> Result<(), RasterError>;
}
