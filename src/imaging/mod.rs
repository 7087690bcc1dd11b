//! Image resizing: size planning, resample strategy, normalization.
//!
//! | Step | Function |
//! |---|---|
//! | **Plan** | [`plan_size`]: columns/rows/best-fit → concrete dimensions |
//! | **Strategy** | [`select_strategy`]: direct resize or point-sample first |
//! | **Normalize** | [`normalize`]: alpha, depth, profiles, sharpen, posterize, encoder hints |
//! | **Fill** | [`fill_box`]: center a best-fit result in the requested box |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Raster**: [`RasterImage`] engine trait + shared types
//! - **Operations**: The pipeline, issuing engine commands in order
//! - **Rust backend**: [`RustRaster`], the `image`-crate engine

mod calculations;
pub mod operations;
mod params;
pub mod raster;
pub mod rust_backend;

pub use calculations::{
    DIRECT_RESIZE_AREA, MIN_SAMPLE_DIMENSION, ResizeStrategy, SAMPLE_FACTOR, ScaleFactors,
    fill_margins, needs_fill, plan_size, select_strategy,
};
pub use operations::{ResizeError, apply_resize, better_resize, fill_box, normalize};
pub use params::{Colorspace, Filter, Interlace, Quality, Sharpening, SizeRequest};
pub use raster::{Dimensions, RasterError, RasterImage};
pub use rust_backend::{RustRaster, supported_input_extensions};
