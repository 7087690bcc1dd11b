//! The resize-and-normalize pipeline.
//!
//! These functions combine the pure [`calculations`](super::calculations)
//! with a [`RasterImage`] engine. They decide which engine commands to issue
//! and in what order; the engine does the pixel work.
//!
//! ```text
//! plan_size → select_strategy → apply_resize → normalize → fill_box (optional)
//! ```
//!
//! Every step runs against the same handle and assumes the state left by the
//! previous one. The first engine error aborts the whole call.

use super::calculations::{
    ResizeStrategy, ScaleFactors, fill_margins, needs_fill, plan_size, select_strategy,
};
use super::params::{Colorspace, Filter, Interlace, Quality, Sharpening, SizeRequest};
use super::raster::{Dimensions, RasterError, RasterImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("invalid size request {columns}x{rows}: both dimensions must be non-negative and not both zero")]
    InvalidSizeRequest { columns: i64, rows: i64 },
    #[error("source image has no pixels")]
    EmptySource,
    #[error("{operation} failed: {source}")]
    EngineOperationFailed {
        operation: &'static str,
        #[source]
        source: RasterError,
    },
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, ResizeError>;

/// Support window applied to every filtered resize.
pub const FILTER_SUPPORT: &str = "2.0";

/// Levels per channel kept by the posterize step.
pub const POSTERIZE_LEVELS: u32 = 136;

/// Properties that bloat output without affecting rendering.
pub const BLOAT_PROPERTIES: [&str; 9] = [
    "comment",
    "Thumb::URI",
    "Thumb::MTime",
    "Thumb::Size",
    "Thumb::Mimetype",
    "software",
    "Thumb::Image::Width",
    "Thumb::Image::Height",
    "Thumb::Document::Pages",
];

/// Encoder hints set on every image regardless of the output format.
pub const ENCODER_OPTIONS: [(&str, &str); 5] = [
    ("jpeg:fancy-upsampling", "off"),
    ("png:compression-filter", "5"),
    ("png:compression-level", "9"),
    ("png:compression-strategy", "1"),
    ("png:exclude-chunk", "all"),
];

/// Profiles that survive normalization.
const COLOR_PROFILES: [&str; 2] = ["icc", "icm"];

trait EngineResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T>;
}

impl<T> EngineResultExt<T> for std::result::Result<T, RasterError> {
    fn during(self, operation: &'static str) -> Result<T> {
        self.map_err(|source| ResizeError::EngineOperationFailed { operation, source })
    }
}

/// Resize `image` per `request` and normalize it for web delivery.
///
/// Returns the final canvas size: the planned size, or the requested box
/// when best-fit padding applies.
pub fn better_resize(
    image: &mut impl RasterImage,
    request: &SizeRequest,
    filter: Filter,
    optim: bool,
) -> Result<Dimensions> {
    let natural = image.dimensions();
    if natural.width == 0 || natural.height == 0 {
        return Err(ResizeError::EmptySource);
    }
    let resolved = plan_size(natural, request)?;

    image
        .set_option("filter:support", FILTER_SUPPORT)
        .during("set_option")?;

    let factors = ScaleFactors::requested(natural, request, resolved);
    let strategy = select_strategy(factors, resolved);
    log::debug!("resizing {natural} to {resolved} with {filter} ({strategy:?})");
    apply_resize(image, strategy, resolved, filter)?;

    normalize(image, optim)?;

    if needs_fill(request, resolved) {
        fill_box(image, request, resolved)?;
    }

    Ok(image.dimensions())
}

/// Run the chosen strategy: an optional point sample, then the filtered resize.
pub fn apply_resize(
    image: &mut impl RasterImage,
    strategy: ResizeStrategy,
    resolved: Dimensions,
    filter: Filter,
) -> Result<()> {
    if let ResizeStrategy::TwoStage { sample } = strategy {
        image.sample(sample.width, sample.height).during("sample")?;
    }
    image
        .resize(resolved.width, resolved.height, filter, 1.0)
        .during("resize")
}

/// Normalize a freshly resized image for compact, consistent output.
///
/// Every step sets a fixed value, so running this twice leaves alpha, depth,
/// interlace and colorspace where the first run put them.
pub fn normalize(image: &mut impl RasterImage, optim: bool) -> Result<()> {
    if !image.alpha_channel_defined() {
        image.set_alpha_opaque().during("set_alpha_opaque")?;
    }
    image.set_bit_depth(8).during("set_bit_depth")?;
    image
        .set_interlace(Interlace::None)
        .during("set_interlace")?;

    for name in image.profile_names() {
        if !COLOR_PROFILES.contains(&name.as_str()) {
            image.remove_profile(&name).during("remove_profile")?;
        }
    }

    clear_bloat_properties(image)?;

    image
        .unsharp_mask(Sharpening::for_optim(optim))
        .during("unsharp_mask")?;
    image
        .posterize(POSTERIZE_LEVELS, false)
        .during("posterize")?;
    image
        .set_compression_quality(Quality::WEB)
        .during("set_compression_quality")?;
    for (key, value) in ENCODER_OPTIONS {
        image.set_option(key, value).during("set_option")?;
    }
    // Re-pinned: profile and encoder steps may have reset it
    image
        .set_interlace(Interlace::None)
        .during("set_interlace")?;
    image
        .set_colorspace(Colorspace::Srgb)
        .during("set_colorspace")?;

    if !optim {
        image.strip_metadata().during("strip_metadata")?;
    }
    Ok(())
}

fn clear_bloat_properties(image: &mut impl RasterImage) -> Result<()> {
    if image.supports_property_deletion() {
        for name in BLOAT_PROPERTIES {
            image.delete_property(name).during("delete_property")?;
        }
    } else {
        for name in BLOAT_PROPERTIES {
            image.set_property(name, "").during("set_property")?;
        }
    }
    Ok(())
}

/// Pad a best-fit result out to the requested box, centered.
pub fn fill_box(
    image: &mut impl RasterImage,
    request: &SizeRequest,
    resolved: Dimensions,
) -> Result<()> {
    let (margin_x, margin_y) = fill_margins(request, resolved);
    image
        .extent_canvas(
            request.columns,
            request.rows,
            -i64::from(margin_x),
            -i64::from(margin_y),
        )
        .during("extent_canvas")
}
