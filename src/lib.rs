//! # respimg
//!
//! Produce compact, web-ready resized variants of JPEG and PNG images, render
//! SVGs to PNG at the same widths, and hand the result to lossless
//! optimizers.
//!
//! # Architecture: One Resize, Four Steps
//!
//! Every raster goes through the same routine, [`imaging::better_resize`]:
//!
//! ```text
//! 1. Plan       columns/rows/best-fit  →  target dimensions
//! 2. Strategy   natural vs target      →  direct, or 5x point sample first
//! 3. Normalize  alpha, depth, profiles, metadata, sharpen, posterize, encoder hints
//! 4. Fill       best-fit result        →  centered on the requested box
//! ```
//!
//! The pixel work sits behind the [`imaging::RasterImage`] trait. Production
//! code uses [`imaging::RustRaster`] (the `image` crate); tests use a
//! recording mock that asserts the exact sequence of engine calls.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Scale planner, strategy selector, normalizer, fill, and the raster engine |
//! | [`rasterize`] | SVG size probing and the external renderer call |
//! | [`optimize`] | Ordered optimizer passes (svgo, image_optim, picopt, ImageOptim) |
//! | [`batch`] | Walk a source tree and run everything in parallel |
//! | [`naming`] | `<stem>-w<width>.<ext>` output naming |
//! | [`config`] | `config.toml` loading, validation, and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Point Sample Before Large Reductions
//!
//! Filtered resampling cost grows with the source size. When a reduction
//! keeps no more than a tenth of the pixel area and the intermediate would
//! stay at least 128px on both axes, the source is first point-sampled to
//! five times the target, then filtered down. The thresholds are fixed
//! constants in [`imaging`].
//!
//! ## External Tools Behind Traits
//!
//! The SVG renderer and the optimizers are separate programs. They are
//! reached through [`rasterize::Rasterizer`] and [`optimize::ToolRunner`], so
//! the sequencing and error handling are tested without them installed.

pub mod batch;
pub mod config;
pub mod imaging;
pub mod naming;
pub mod optimize;
pub mod output;
pub mod rasterize;

#[cfg(test)]
pub(crate) mod test_helpers;
